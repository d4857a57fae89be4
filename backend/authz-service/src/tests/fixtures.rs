/// Test fixtures: an in-process relational store and a ready-made service graph
///
/// `InMemoryDb` implements every repository trait over plain collections so
/// services run without Postgres; `MemoryStore` stands in for Redis.
use crate::db::{
    ApplicationRepository, AuditRepository, PermissionRepository, RoleRepository, UserChanges,
    UserRepository,
};
use crate::error::{AuthzError, Result};
use crate::models::{
    Application, AuditLogEntry, AuditQuery, NewAuditEntry, Permission, Role,
    UpdatePermissionRequest, UpdateRoleRequest, User,
};
use crate::security::hash_password;
use crate::services::RequestContext;
use crate::state::{AppState, Repositories, ServiceSettings};
use actix_middleware::{HttpMetrics, RateLimitConfig};
use async_trait::async_trait;
use chrono::Utc;
use jwt_security::{TokenConfig, TokenService};
use redis_utils::MemoryStore;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const TEST_SECRET: &str = "k7Qp2Zr9Xw4Lm8Tn3Vb6Hc1Jd5Fg0SaYe2Ru7Io4Pl9Kj3Mh6Nb8Vc1Xz5Qw0Ert";
pub const TEST_ISSUER: &str = "https://authz.test";
pub const TEST_PASSWORD: &str = "SecurePass123!";
pub const TEST_CLIENT: &str = "203.0.113.7";

#[derive(Default)]
struct Tables {
    next_id: i64,
    applications: BTreeMap<i64, Application>,
    users: BTreeMap<i64, User>,
    roles: BTreeMap<i64, Role>,
    permissions: BTreeMap<i64, Permission>,
    /// (user_id, role_id)
    user_roles: BTreeSet<(i64, i64)>,
    /// (role_id, permission_id)
    role_permissions: BTreeSet<(i64, i64)>,
    audit: Vec<AuditLogEntry>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

fn duplicate(what: &str) -> AuthzError {
    AuthzError::Conflict(format!("{} already exists", what))
}

#[derive(Default)]
pub struct InMemoryDb {
    tables: Mutex<Tables>,
    permission_checks: AtomicUsize,
    audit_unavailable: AtomicBool,
    audit_delay_ms: AtomicU64,
}

impl InMemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `user_has_permission` evaluations that reached the store.
    pub fn permission_checks(&self) -> usize {
        self.permission_checks.load(Ordering::SeqCst)
    }

    /// Make audit inserts fail.
    pub fn set_audit_unavailable(&self, unavailable: bool) {
        self.audit_unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Stall every audit insert by `delay`.
    pub fn set_audit_delay(&self, delay: Duration) {
        self.audit_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn audit_entries(&self) -> Vec<AuditLogEntry> {
        self.tables.lock().unwrap().audit.clone()
    }

    pub fn audit_actions(&self) -> Vec<String> {
        self.audit_entries()
            .into_iter()
            .map(|entry| entry.action)
            .collect()
    }

    pub fn role_has_permission(&self, role_id: i64, permission_id: i64) -> bool {
        self.tables
            .lock()
            .unwrap()
            .role_permissions
            .contains(&(role_id, permission_id))
    }

    pub fn role_permission_count(&self) -> usize {
        self.tables.lock().unwrap().role_permissions.len()
    }
}

#[async_trait]
impl ApplicationRepository for InMemoryDb {
    async fn create(
        &self,
        name: &str,
        description: Option<&str>,
        api_key: &str,
    ) -> Result<Application> {
        let mut t = self.tables.lock().unwrap();
        if t.applications.values().any(|a| a.api_key == api_key) {
            return Err(duplicate("Application"));
        }
        let now = Utc::now();
        let application = Application {
            id: t.next_id(),
            name: name.to_string(),
            description: description.map(str::to_string),
            api_key: api_key.to_string(),
            created_at: now,
            updated_at: now,
        };
        t.applications.insert(application.id, application.clone());
        Ok(application)
    }

    async fn update(
        &self,
        id: i64,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<Option<Application>> {
        let mut t = self.tables.lock().unwrap();
        Ok(t.applications.get_mut(&id).map(|a| {
            if let Some(name) = name {
                a.name = name.to_string();
            }
            if let Some(description) = description {
                a.description = Some(description.to_string());
            }
            a.updated_at = Utc::now();
            a.clone()
        }))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let mut t = self.tables.lock().unwrap();
        if t.applications.remove(&id).is_none() {
            return Ok(false);
        }
        let roles: Vec<i64> = t
            .roles
            .values()
            .filter(|r| r.application_id == id)
            .map(|r| r.id)
            .collect();
        let permissions: Vec<i64> = t
            .permissions
            .values()
            .filter(|p| p.application_id == id)
            .map(|p| p.id)
            .collect();
        t.roles.retain(|_, r| r.application_id != id);
        t.permissions.retain(|_, p| p.application_id != id);
        t.user_roles.retain(|(_, r)| !roles.contains(r));
        t.role_permissions
            .retain(|(r, p)| !roles.contains(r) && !permissions.contains(p));
        Ok(true)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Application>> {
        Ok(self.tables.lock().unwrap().applications.get(&id).cloned())
    }

    async fn find_by_api_key(&self, api_key: &str) -> Result<Option<Application>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .applications
            .values()
            .find(|a| a.api_key == api_key)
            .cloned())
    }

    async fn set_api_key(&self, id: i64, api_key: &str) -> Result<Option<Application>> {
        let mut t = self.tables.lock().unwrap();
        Ok(t.applications.get_mut(&id).map(|a| {
            a.api_key = api_key.to_string();
            a.updated_at = Utc::now();
            a.clone()
        }))
    }
}

#[async_trait]
impl UserRepository for InMemoryDb {
    async fn create(&self, username: &str, email: &str, password_hash: &str) -> Result<User> {
        let mut t = self.tables.lock().unwrap();
        if t.users.values().any(|u| u.username == username) {
            return Err(duplicate("User"));
        }
        let now = Utc::now();
        let user = User {
            id: t.next_id(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: now,
            updated_at: now,
        };
        t.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update(&self, id: i64, changes: &UserChanges) -> Result<Option<User>> {
        let mut t = self.tables.lock().unwrap();
        Ok(t.users.get_mut(&id).map(|u| {
            if let Some(username) = &changes.username {
                u.username = username.clone();
            }
            if let Some(email) = &changes.email {
                u.email = email.clone();
            }
            if let Some(hash) = &changes.password_hash {
                u.password_hash = hash.clone();
            }
            u.updated_at = Utc::now();
            u.clone()
        }))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let mut t = self.tables.lock().unwrap();
        let existed = t.users.remove(&id).is_some();
        t.user_roles.retain(|(u, _)| *u != id);
        Ok(existed)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        Ok(self.tables.lock().unwrap().users.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn application_ids(&self, user_id: i64) -> Result<Vec<i64>> {
        let t = self.tables.lock().unwrap();
        let ids: BTreeSet<i64> = t
            .user_roles
            .iter()
            .filter(|(u, _)| *u == user_id)
            .filter_map(|(_, role)| t.roles.get(role))
            .map(|role| role.application_id)
            .collect();
        Ok(ids.into_iter().collect())
    }
}

#[async_trait]
impl RoleRepository for InMemoryDb {
    async fn create(
        &self,
        application_id: i64,
        name: &str,
        description: Option<&str>,
    ) -> Result<Role> {
        let mut t = self.tables.lock().unwrap();
        if t
            .roles
            .values()
            .any(|r| r.application_id == application_id && r.name == name)
        {
            return Err(duplicate("Role"));
        }
        let now = Utc::now();
        let role = Role {
            id: t.next_id(),
            name: name.to_string(),
            description: description.map(str::to_string),
            application_id,
            created_at: now,
            updated_at: now,
        };
        t.roles.insert(role.id, role.clone());
        Ok(role)
    }

    async fn update(&self, id: i64, changes: &UpdateRoleRequest) -> Result<Option<Role>> {
        let mut t = self.tables.lock().unwrap();
        Ok(t.roles.get_mut(&id).map(|r| {
            if let Some(name) = &changes.name {
                r.name = name.clone();
            }
            if let Some(description) = &changes.description {
                r.description = Some(description.clone());
            }
            r.updated_at = Utc::now();
            r.clone()
        }))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let mut t = self.tables.lock().unwrap();
        let existed = t.roles.remove(&id).is_some();
        t.user_roles.retain(|(_, r)| *r != id);
        t.role_permissions.retain(|(r, _)| *r != id);
        Ok(existed)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Role>> {
        Ok(self.tables.lock().unwrap().roles.get(&id).cloned())
    }

    async fn list_by_application(&self, application_id: i64) -> Result<Vec<Role>> {
        let t = self.tables.lock().unwrap();
        let mut roles: Vec<Role> = t
            .roles
            .values()
            .filter(|r| r.application_id == application_id)
            .cloned()
            .collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn count_user_assignments(&self, role_id: i64) -> Result<i64> {
        let t = self.tables.lock().unwrap();
        Ok(t.user_roles.iter().filter(|(_, r)| *r == role_id).count() as i64)
    }

    async fn assign_to_user(&self, role_id: i64, user_id: i64) -> Result<bool> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .user_roles
            .insert((user_id, role_id)))
    }

    async fn remove_from_user(&self, role_id: i64, user_id: i64) -> Result<bool> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .user_roles
            .remove(&(user_id, role_id)))
    }

    async fn roles_for_user(&self, user_id: i64, application_id: i64) -> Result<Vec<Role>> {
        let t = self.tables.lock().unwrap();
        let mut roles: Vec<Role> = t
            .user_roles
            .iter()
            .filter(|(u, _)| *u == user_id)
            .filter_map(|(_, r)| t.roles.get(r))
            .filter(|r| r.application_id == application_id)
            .cloned()
            .collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }
}

#[async_trait]
impl PermissionRepository for InMemoryDb {
    async fn create(
        &self,
        application_id: i64,
        name: &str,
        description: Option<&str>,
        resource: &str,
        action: &str,
    ) -> Result<Permission> {
        let mut t = self.tables.lock().unwrap();
        if t
            .permissions
            .values()
            .any(|p| p.application_id == application_id && p.name == name)
        {
            return Err(duplicate("Permission"));
        }
        let now = Utc::now();
        let permission = Permission {
            id: t.next_id(),
            name: name.to_string(),
            description: description.map(str::to_string),
            resource: resource.to_string(),
            action: action.to_string(),
            application_id,
            created_at: now,
            updated_at: now,
        };
        t.permissions.insert(permission.id, permission.clone());
        Ok(permission)
    }

    async fn update(
        &self,
        id: i64,
        changes: &UpdatePermissionRequest,
    ) -> Result<Option<Permission>> {
        let mut t = self.tables.lock().unwrap();
        Ok(t.permissions.get_mut(&id).map(|p| {
            if let Some(name) = &changes.name {
                p.name = name.clone();
            }
            if let Some(description) = &changes.description {
                p.description = Some(description.clone());
            }
            if let Some(resource) = &changes.resource {
                p.resource = resource.clone();
            }
            if let Some(action) = &changes.action {
                p.action = action.clone();
            }
            p.updated_at = Utc::now();
            p.clone()
        }))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let mut t = self.tables.lock().unwrap();
        let existed = t.permissions.remove(&id).is_some();
        t.role_permissions.retain(|(_, p)| *p != id);
        Ok(existed)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Permission>> {
        Ok(self.tables.lock().unwrap().permissions.get(&id).cloned())
    }

    async fn list_by_application(&self, application_id: i64) -> Result<Vec<Permission>> {
        let t = self.tables.lock().unwrap();
        let mut permissions: Vec<Permission> = t
            .permissions
            .values()
            .filter(|p| p.application_id == application_id)
            .cloned()
            .collect();
        permissions.sort_by(|a, b| (&a.resource, &a.action).cmp(&(&b.resource, &b.action)));
        Ok(permissions)
    }

    async fn count_role_assignments(&self, permission_id: i64) -> Result<i64> {
        let t = self.tables.lock().unwrap();
        Ok(t.role_permissions
            .iter()
            .filter(|(_, p)| *p == permission_id)
            .count() as i64)
    }

    async fn assign_to_role(&self, permission_id: i64, role_id: i64) -> Result<bool> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .role_permissions
            .insert((role_id, permission_id)))
    }

    async fn remove_from_role(&self, permission_id: i64, role_id: i64) -> Result<bool> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .role_permissions
            .remove(&(role_id, permission_id)))
    }

    async fn permissions_for_role(
        &self,
        role_id: i64,
        application_id: i64,
    ) -> Result<Vec<Permission>> {
        let t = self.tables.lock().unwrap();
        let mut permissions: Vec<Permission> = t
            .role_permissions
            .iter()
            .filter(|(r, _)| *r == role_id)
            .filter_map(|(_, p)| t.permissions.get(p))
            .filter(|p| p.application_id == application_id)
            .cloned()
            .collect();
        permissions.sort_by(|a, b| (&a.resource, &a.action).cmp(&(&b.resource, &b.action)));
        Ok(permissions)
    }

    async fn user_has_permission(
        &self,
        user_id: i64,
        resource: &str,
        action: &str,
        application_id: i64,
    ) -> Result<bool> {
        self.permission_checks.fetch_add(1, Ordering::SeqCst);
        let t = self.tables.lock().unwrap();
        Ok(t
            .user_roles
            .iter()
            .filter(|(u, _)| *u == user_id)
            .flat_map(|(_, role)| {
                t.role_permissions
                    .iter()
                    .filter(move |(r, _)| r == role)
                    .map(|(_, p)| *p)
            })
            .filter_map(|p| t.permissions.get(&p))
            .any(|p| {
                p.resource == resource && p.action == action && p.application_id == application_id
            }))
    }
}

#[async_trait]
impl AuditRepository for InMemoryDb {
    async fn insert(&self, entry: &NewAuditEntry) -> Result<i64> {
        let delay = self.audit_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.audit_unavailable.load(Ordering::SeqCst) {
            return Err(AuthzError::Database("audit store offline".to_string()));
        }
        let mut t = self.tables.lock().unwrap();
        let id = t.next_id();
        t.audit.push(AuditLogEntry {
            id,
            application_id: entry.application_id,
            user_id: entry.user_id,
            action: entry.action.clone(),
            resource: entry.resource.clone(),
            ip_address: entry.ip_address.clone(),
            user_agent: entry.user_agent.clone(),
            status: entry.status.as_str().to_string(),
            details: serde_json::Value::Object(entry.details.clone()),
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn query(
        &self,
        query: &AuditQuery,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AuditLogEntry>> {
        let t = self.tables.lock().unwrap();
        let mut entries: Vec<AuditLogEntry> = t
            .audit
            .iter()
            .filter(|e| e.application_id == Some(query.application_id))
            .filter(|e| query.user_id.map_or(true, |u| e.user_id == Some(u)))
            .filter(|e| query.action.as_ref().map_or(true, |a| &e.action == a))
            .filter(|e| query.start_date.map_or(true, |s| e.created_at >= s))
            .filter(|e| query.end_date.map_or(true, |end| e.created_at <= end))
            .cloned()
            .collect();
        entries.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(entries
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

pub fn token_config() -> TokenConfig {
    TokenConfig {
        secret: TEST_SECRET.to_string(),
        issuer: TEST_ISSUER.to_string(),
        access_ttl_secs: 3600,
        refresh_ttl_secs: 604_800,
    }
}

pub fn token_service() -> TokenService {
    TokenService::new(token_config()).expect("token config is valid")
}

pub fn ctx() -> RequestContext {
    RequestContext {
        actor_id: None,
        ip_address: TEST_CLIENT.to_string(),
        user_agent: Some("authz-tests/1.0".to_string()),
    }
}

pub fn actor(user_id: i64) -> RequestContext {
    RequestContext {
        actor_id: Some(user_id),
        ..ctx()
    }
}

/// A fully wired service graph over in-process stores.
pub struct TestEnv {
    pub db: Arc<InMemoryDb>,
    pub cache: Arc<MemoryStore>,
    pub state: AppState,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with_rate_limit(1000)
    }

    pub fn with_rate_limit(max_requests: u64) -> Self {
        let db = Arc::new(InMemoryDb::new());
        let cache = Arc::new(MemoryStore::new());

        let repos = Repositories {
            applications: db.clone(),
            users: db.clone(),
            roles: db.clone(),
            permissions: db.clone(),
            audit: db.clone(),
        };
        let settings = ServiceSettings {
            rate_limit: RateLimitConfig {
                max_requests,
                window_seconds: 60,
                ..Default::default()
            },
            permission_cache_ttl_secs: 3600,
            audit_write_timeout: Duration::from_millis(500),
        };
        let metrics = Arc::new(HttpMetrics::new().expect("metrics registry"));

        let state = AppState::new(repos, cache.clone(), token_service(), settings, metrics);

        Self { db, cache, state }
    }

    pub async fn seed_application(&self, name: &str) -> Application {
        ApplicationRepository::create(&*self.db, name, None, &format!("{:0>64}", name))
            .await
            .expect("seed application")
    }

    pub async fn seed_user(&self, username: &str) -> User {
        let hash = hash_password(TEST_PASSWORD).expect("hash password");
        UserRepository::create(
            &*self.db,
            username,
            &format!("{}@example.com", username),
            &hash,
        )
        .await
        .expect("seed user")
    }

    /// Create a role granting (resource, action) and hand it to the user.
    pub async fn grant(
        &self,
        user_id: i64,
        application_id: i64,
        resource: &str,
        action: &str,
    ) -> (Role, Permission) {
        let service = &self.state.permissions;
        let role = service
            .create_role(
                application_id,
                crate::models::CreateRoleRequest {
                    name: format!("{}_{}_role", resource, action),
                    description: None,
                },
                &ctx(),
            )
            .await
            .expect("create role");
        let permission = service
            .create_permission(
                application_id,
                crate::models::CreatePermissionRequest {
                    name: format!("{}_{}", resource, action),
                    description: None,
                    resource: resource.to_string(),
                    action: action.to_string(),
                },
                &ctx(),
            )
            .await
            .expect("create permission");
        service
            .assign_permission_to_role(permission.id, role.id, application_id, &ctx())
            .await
            .expect("assign permission");
        service
            .assign_role_to_user(role.id, user_id, application_id, &ctx())
            .await
            .expect("assign role");
        (role, permission)
    }
}
