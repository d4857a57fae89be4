use crate::db::{PermissionRepository, RoleRepository, UserRepository};
use crate::error::{AuthzError, Result};
use crate::models::{
    AuditStatus, CreatePermissionRequest, CreateRoleRequest, Permission, Role,
    UpdatePermissionRequest, UpdateRoleRequest,
};
use crate::services::audit_log::{AuditEvent, AuditLog, RequestContext};
use redis_utils::CacheStore;
use std::sync::Arc;
use validator::Validate;

const GRANTED: &str = "1";
const NOT_GRANTED: &str = "0";

pub fn role_permissions_key(role_id: i64, application_id: i64) -> String {
    format!("role_permissions:{}:{}", role_id, application_id)
}

/// Set of application ids with a cached `role_permissions` entry for the role.
pub fn role_permissions_index_key(role_id: i64) -> String {
    format!("role_permissions_index:{}", role_id)
}

pub fn user_permission_key(
    user_id: i64,
    resource: &str,
    action: &str,
    application_id: i64,
) -> String {
    format!(
        "user_permission:{}:{}:{}:{}",
        user_id, resource, action, application_id
    )
}

/// Role/permission graph with cache-aside reads.
///
/// `has_permission` answers (negative ones included) live for one cache TTL
/// and are not invalidated by assignment changes. Role permission sets are
/// invalidated on every assignment change before the change is acknowledged.
pub struct PermissionService {
    roles: Arc<dyn RoleRepository>,
    permissions: Arc<dyn PermissionRepository>,
    users: Arc<dyn UserRepository>,
    cache: Arc<dyn CacheStore>,
    audit: Arc<AuditLog>,
    cache_ttl_secs: u64,
}

impl PermissionService {
    pub fn new(
        roles: Arc<dyn RoleRepository>,
        permissions: Arc<dyn PermissionRepository>,
        users: Arc<dyn UserRepository>,
        cache: Arc<dyn CacheStore>,
        audit: Arc<AuditLog>,
        cache_ttl_secs: u64,
    ) -> Self {
        Self {
            roles,
            permissions,
            users,
            cache,
            audit,
            cache_ttl_secs,
        }
    }

    // ---- roles ----

    pub async fn create_role(
        &self,
        application_id: i64,
        request: CreateRoleRequest,
        ctx: &RequestContext,
    ) -> Result<Role> {
        request.validate()?;

        let role = self
            .roles
            .create(application_id, &request.name, request.description.as_deref())
            .await?;

        tracing::info!(role_id = role.id, application_id, "Role created");
        self.audit
            .record_best_effort(
                AuditEvent::new("role_created", "roles", AuditStatus::Success, ctx)
                    .application(application_id)
                    .detail("role_id", role.id)
                    .detail("name", role.name.clone()),
            )
            .await;

        Ok(role)
    }

    pub async fn update_role(
        &self,
        role_id: i64,
        application_id: i64,
        request: UpdateRoleRequest,
        ctx: &RequestContext,
    ) -> Result<Role> {
        request.validate()?;
        if request.is_empty() {
            return Err(AuthzError::Validation("no fields to update".to_string()));
        }

        self.scoped_role_for_mutation(role_id, application_id)
            .await?;

        let role = self
            .roles
            .update(role_id, &request)
            .await?
            .ok_or_else(|| AuthzError::NotFound("Role".to_string()))?;

        self.audit
            .record_best_effort(
                AuditEvent::new("role_updated", "roles", AuditStatus::Success, ctx)
                    .application(application_id)
                    .detail("role_id", role_id),
            )
            .await;

        Ok(role)
    }

    /// Refused with `Conflict` while any user holds the role.
    pub async fn delete_role(
        &self,
        role_id: i64,
        application_id: i64,
        ctx: &RequestContext,
    ) -> Result<()> {
        self.scoped_role_for_mutation(role_id, application_id)
            .await?;

        let holders = self.roles.count_user_assignments(role_id).await?;
        if holders > 0 {
            return Err(AuthzError::Conflict(format!(
                "Role is assigned to {} user(s)",
                holders
            )));
        }

        if !self.roles.delete(role_id).await? {
            return Err(AuthzError::NotFound("Role".to_string()));
        }
        self.invalidate_role_permissions(role_id, application_id)
            .await?;

        tracing::info!(role_id, application_id, "Role deleted");
        self.audit
            .record_best_effort(
                AuditEvent::new("role_deleted", "roles", AuditStatus::Success, ctx)
                    .application(application_id)
                    .detail("role_id", role_id),
            )
            .await;

        Ok(())
    }

    pub async fn get_role(&self, role_id: i64, application_id: i64) -> Result<Role> {
        match self.roles.find_by_id(role_id).await? {
            Some(role) if role.application_id == application_id => Ok(role),
            _ => Err(AuthzError::NotFound("Role".to_string())),
        }
    }

    pub async fn list_roles(&self, application_id: i64) -> Result<Vec<Role>> {
        self.roles.list_by_application(application_id).await
    }

    pub async fn user_roles(&self, user_id: i64, application_id: i64) -> Result<Vec<Role>> {
        self.require_user(user_id).await?;
        self.roles.roles_for_user(user_id, application_id).await
    }

    // ---- permissions ----

    pub async fn create_permission(
        &self,
        application_id: i64,
        request: CreatePermissionRequest,
        ctx: &RequestContext,
    ) -> Result<Permission> {
        request.validate()?;

        let permission = self
            .permissions
            .create(
                application_id,
                &request.name,
                request.description.as_deref(),
                &request.resource,
                &request.action,
            )
            .await?;

        tracing::info!(
            permission_id = permission.id,
            application_id,
            resource = %permission.resource,
            action = %permission.action,
            "Permission created"
        );
        self.audit
            .record_best_effort(
                AuditEvent::new(
                    "permission_created",
                    "permissions",
                    AuditStatus::Success,
                    ctx,
                )
                .application(application_id)
                .detail("permission_id", permission.id)
                .detail("resource", permission.resource.clone())
                .detail("action", permission.action.clone()),
            )
            .await;

        Ok(permission)
    }

    pub async fn update_permission(
        &self,
        permission_id: i64,
        application_id: i64,
        request: UpdatePermissionRequest,
        ctx: &RequestContext,
    ) -> Result<Permission> {
        request.validate()?;
        if request.is_empty() {
            return Err(AuthzError::Validation("no fields to update".to_string()));
        }

        self.scoped_permission_for_mutation(permission_id, application_id)
            .await?;

        let permission = self
            .permissions
            .update(permission_id, &request)
            .await?
            .ok_or_else(|| AuthzError::NotFound("Permission".to_string()))?;

        self.audit
            .record_best_effort(
                AuditEvent::new(
                    "permission_updated",
                    "permissions",
                    AuditStatus::Success,
                    ctx,
                )
                .application(application_id)
                .detail("permission_id", permission_id),
            )
            .await;

        Ok(permission)
    }

    /// Refused with `Conflict` while any role grants the permission.
    pub async fn delete_permission(
        &self,
        permission_id: i64,
        application_id: i64,
        ctx: &RequestContext,
    ) -> Result<()> {
        self.scoped_permission_for_mutation(permission_id, application_id)
            .await?;

        let grants = self
            .permissions
            .count_role_assignments(permission_id)
            .await?;
        if grants > 0 {
            return Err(AuthzError::Conflict(format!(
                "Permission is assigned to {} role(s)",
                grants
            )));
        }

        if !self.permissions.delete(permission_id).await? {
            return Err(AuthzError::NotFound("Permission".to_string()));
        }

        tracing::info!(permission_id, application_id, "Permission deleted");
        self.audit
            .record_best_effort(
                AuditEvent::new(
                    "permission_deleted",
                    "permissions",
                    AuditStatus::Success,
                    ctx,
                )
                .application(application_id)
                .detail("permission_id", permission_id),
            )
            .await;

        Ok(())
    }

    pub async fn get_permission(
        &self,
        permission_id: i64,
        application_id: i64,
    ) -> Result<Permission> {
        match self.permissions.find_by_id(permission_id).await? {
            Some(permission) if permission.application_id == application_id => Ok(permission),
            _ => Err(AuthzError::NotFound("Permission".to_string())),
        }
    }

    pub async fn list_permissions(&self, application_id: i64) -> Result<Vec<Permission>> {
        self.permissions.list_by_application(application_id).await
    }

    // ---- assignments ----

    /// Idempotent: granting an existing pair succeeds without change.
    pub async fn assign_permission_to_role(
        &self,
        permission_id: i64,
        role_id: i64,
        application_id: i64,
        ctx: &RequestContext,
    ) -> Result<()> {
        self.scoped_role_for_mutation(role_id, application_id)
            .await?;
        self.scoped_permission_for_mutation(permission_id, application_id)
            .await?;

        let created = self
            .permissions
            .assign_to_role(permission_id, role_id)
            .await?;
        self.invalidate_role_permissions(role_id, application_id)
            .await?;

        tracing::info!(permission_id, role_id, application_id, created, "Permission assigned to role");
        self.audit
            .record_best_effort(
                AuditEvent::new(
                    "permission_assigned",
                    "role_permissions",
                    AuditStatus::Success,
                    ctx,
                )
                .application(application_id)
                .detail("permission_id", permission_id)
                .detail("role_id", role_id)
                .detail("created", created),
            )
            .await;

        Ok(())
    }

    /// Removing a pair that does not exist still succeeds.
    pub async fn remove_permission_from_role(
        &self,
        permission_id: i64,
        role_id: i64,
        application_id: i64,
        ctx: &RequestContext,
    ) -> Result<()> {
        self.scoped_role_for_mutation(role_id, application_id)
            .await?;
        self.scoped_permission_for_mutation(permission_id, application_id)
            .await?;

        let removed = self
            .permissions
            .remove_from_role(permission_id, role_id)
            .await?;
        self.invalidate_role_permissions(role_id, application_id)
            .await?;

        tracing::info!(permission_id, role_id, application_id, removed, "Permission removed from role");
        self.audit
            .record_best_effort(
                AuditEvent::new(
                    "permission_removed",
                    "role_permissions",
                    AuditStatus::Success,
                    ctx,
                )
                .application(application_id)
                .detail("permission_id", permission_id)
                .detail("role_id", role_id)
                .detail("removed", removed),
            )
            .await;

        Ok(())
    }

    /// Idempotent. Cached `has_permission` answers for the user expire on TTL.
    pub async fn assign_role_to_user(
        &self,
        role_id: i64,
        user_id: i64,
        application_id: i64,
        ctx: &RequestContext,
    ) -> Result<()> {
        self.scoped_role_for_mutation(role_id, application_id)
            .await?;
        self.require_user(user_id).await?;

        let created = self.roles.assign_to_user(role_id, user_id).await?;

        tracing::info!(role_id, user_id, application_id, created, "Role assigned to user");
        self.audit
            .record_best_effort(
                AuditEvent::new("role_assigned", "user_roles", AuditStatus::Success, ctx)
                    .application(application_id)
                    .detail("role_id", role_id)
                    .detail("target_user_id", user_id)
                    .detail("created", created),
            )
            .await;

        Ok(())
    }

    pub async fn remove_role_from_user(
        &self,
        role_id: i64,
        user_id: i64,
        application_id: i64,
        ctx: &RequestContext,
    ) -> Result<()> {
        self.scoped_role_for_mutation(role_id, application_id)
            .await?;
        self.require_user(user_id).await?;

        let removed = self.roles.remove_from_user(role_id, user_id).await?;

        tracing::info!(role_id, user_id, application_id, removed, "Role removed from user");
        self.audit
            .record_best_effort(
                AuditEvent::new("role_removed", "user_roles", AuditStatus::Success, ctx)
                    .application(application_id)
                    .detail("role_id", role_id)
                    .detail("target_user_id", user_id)
                    .detail("removed", removed),
            )
            .await;

        Ok(())
    }

    // ---- cached reads ----

    /// Permissions granted to a role, ordered by (resource, action).
    pub async fn get_role_permissions(
        &self,
        role_id: i64,
        application_id: i64,
    ) -> Result<Vec<Permission>> {
        let key = role_permissions_key(role_id, application_id);

        match self.cache.get(&key).await {
            Ok(Some(cached)) => match serde_json::from_str::<Vec<Permission>>(&cached) {
                Ok(permissions) => return Ok(permissions),
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Discarding undecodable cache entry")
                }
            },
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cache read failed, falling back to database")
            }
        }

        self.get_role(role_id, application_id).await?;
        let permissions = self
            .permissions
            .permissions_for_role(role_id, application_id)
            .await?;

        match serde_json::to_string(&permissions) {
            Ok(serialized) => {
                self.populate_role_permissions(role_id, application_id, &key, &serialized)
                    .await
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to serialize role permissions")
            }
        }

        Ok(permissions)
    }

    /// Whether any of the user's roles grants (resource, action) in the application.
    pub async fn has_permission(
        &self,
        user_id: i64,
        resource: &str,
        action: &str,
        application_id: i64,
    ) -> Result<bool> {
        let key = user_permission_key(user_id, resource, action, application_id);

        match self.cache.get(&key).await {
            Ok(Some(cached)) if cached == GRANTED => return Ok(true),
            Ok(Some(cached)) if cached == NOT_GRANTED => return Ok(false),
            Ok(Some(cached)) => {
                tracing::warn!(key = %key, value = %cached, "Discarding unexpected cache value")
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cache read failed, falling back to database")
            }
        }

        let granted = self
            .permissions
            .user_has_permission(user_id, resource, action, application_id)
            .await?;

        let value = if granted { GRANTED } else { NOT_GRANTED };
        if let Err(e) = self.cache.set_ex(&key, value, self.cache_ttl_secs).await {
            tracing::warn!(key = %key, error = %e, "Failed to cache permission answer");
        }

        Ok(granted)
    }

    /// Drop every cached permission set of a role, whatever application
    /// scope it was cached under.
    pub async fn invalidate_role_permissions(
        &self,
        role_id: i64,
        application_id: i64,
    ) -> Result<()> {
        let index_key = role_permissions_index_key(role_id);
        let scopes = self.cache.smembers(&index_key).await?;

        let mut keys: Vec<String> = scopes
            .iter()
            .filter_map(|scope| scope.parse::<i64>().ok())
            .filter(|scope| *scope != application_id)
            .map(|scope| role_permissions_key(role_id, scope))
            .collect();
        keys.push(role_permissions_key(role_id, application_id));
        keys.push(index_key);

        let removed = self.cache.del(&keys).await?;
        tracing::debug!(role_id, removed, "Invalidated role permission cache");
        Ok(())
    }

    /// Index first, then value: every cached value key is reachable from the index.
    async fn populate_role_permissions(
        &self,
        role_id: i64,
        application_id: i64,
        key: &str,
        serialized: &str,
    ) {
        let index_key = role_permissions_index_key(role_id);
        if let Err(e) = self
            .cache
            .sadd_ex(&index_key, &application_id.to_string(), self.cache_ttl_secs)
            .await
        {
            tracing::warn!(key = %index_key, error = %e, "Failed to index role permission cache");
            return;
        }

        if let Err(e) = self.cache.set_ex(key, serialized, self.cache_ttl_secs).await {
            tracing::warn!(key = %key, error = %e, "Failed to cache role permissions");
        }
    }

    /// Missing and foreign rows fail identically.
    async fn scoped_role_for_mutation(&self, role_id: i64, application_id: i64) -> Result<Role> {
        match self.roles.find_by_id(role_id).await? {
            Some(role) if role.application_id == application_id => Ok(role),
            _ => Err(AuthzError::Conflict(
                "Role does not belong to this application".to_string(),
            )),
        }
    }

    async fn scoped_permission_for_mutation(
        &self,
        permission_id: i64,
        application_id: i64,
    ) -> Result<Permission> {
        match self.permissions.find_by_id(permission_id).await? {
            Some(permission) if permission.application_id == application_id => Ok(permission),
            _ => Err(AuthzError::Conflict(
                "Permission does not belong to this application".to_string(),
            )),
        }
    }

    async fn require_user(&self, user_id: i64) -> Result<()> {
        match self.users.find_by_id(user_id).await? {
            Some(_) => Ok(()),
            None => Err(AuthzError::NotFound("User".to_string())),
        }
    }
}
