//! Relational store access.
//!
//! Services depend on these traits, not on `PgPool`, so they can be built
//! over substitute stores. The Postgres implementations live in the submodules.

pub mod applications;
pub mod audit_logs;
pub mod permissions;
pub mod roles;
pub mod users;

pub use applications::PgApplicationRepository;
pub use audit_logs::PgAuditRepository;
pub use permissions::PgPermissionRepository;
pub use roles::PgRoleRepository;
pub use users::PgUserRepository;

use crate::error::Result;
use crate::models::{
    Application, AuditLogEntry, AuditQuery, NewAuditEntry, Permission, Role, UpdatePermissionRequest,
    UpdateRoleRequest, User,
};
use async_trait::async_trait;

#[async_trait]
pub trait ApplicationRepository: Send + Sync {
    async fn create(&self, name: &str, description: Option<&str>, api_key: &str)
        -> Result<Application>;
    async fn update(
        &self,
        id: i64,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<Option<Application>>;
    async fn delete(&self, id: i64) -> Result<bool>;
    async fn find_by_id(&self, id: i64) -> Result<Option<Application>>;
    async fn find_by_api_key(&self, api_key: &str) -> Result<Option<Application>>;
    async fn set_api_key(&self, id: i64, api_key: &str) -> Result<Option<Application>>;
}

/// Column changes for a user update; `None` leaves the column unchanged.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, username: &str, email: &str, password_hash: &str) -> Result<User>;
    async fn update(&self, id: i64, changes: &UserChanges) -> Result<Option<User>>;
    async fn delete(&self, id: i64) -> Result<bool>;
    async fn find_by_id(&self, id: i64) -> Result<Option<User>>;
    async fn find_by_username(&self, username: &str) -> Result<Option<User>>;
    /// Applications in which the user holds at least one role, ascending
    async fn application_ids(&self, user_id: i64) -> Result<Vec<i64>>;
}

#[async_trait]
pub trait RoleRepository: Send + Sync {
    async fn create(
        &self,
        application_id: i64,
        name: &str,
        description: Option<&str>,
    ) -> Result<Role>;
    async fn update(&self, id: i64, changes: &UpdateRoleRequest) -> Result<Option<Role>>;
    async fn delete(&self, id: i64) -> Result<bool>;
    async fn find_by_id(&self, id: i64) -> Result<Option<Role>>;
    /// Roles of an application ordered by name
    async fn list_by_application(&self, application_id: i64) -> Result<Vec<Role>>;
    async fn count_user_assignments(&self, role_id: i64) -> Result<i64>;
    /// Returns `false` when the pair already existed.
    async fn assign_to_user(&self, role_id: i64, user_id: i64) -> Result<bool>;
    /// Returns `false` when the pair did not exist.
    async fn remove_from_user(&self, role_id: i64, user_id: i64) -> Result<bool>;
    /// Roles held by a user within one application, ordered by name
    async fn roles_for_user(&self, user_id: i64, application_id: i64) -> Result<Vec<Role>>;
}

#[async_trait]
pub trait PermissionRepository: Send + Sync {
    async fn create(
        &self,
        application_id: i64,
        name: &str,
        description: Option<&str>,
        resource: &str,
        action: &str,
    ) -> Result<Permission>;
    async fn update(&self, id: i64, changes: &UpdatePermissionRequest)
        -> Result<Option<Permission>>;
    async fn delete(&self, id: i64) -> Result<bool>;
    async fn find_by_id(&self, id: i64) -> Result<Option<Permission>>;
    /// Permissions of an application ordered by (resource, action)
    async fn list_by_application(&self, application_id: i64) -> Result<Vec<Permission>>;
    async fn count_role_assignments(&self, permission_id: i64) -> Result<i64>;
    /// Returns `false` when the pair already existed.
    async fn assign_to_role(&self, permission_id: i64, role_id: i64) -> Result<bool>;
    /// Returns `false` when the pair did not exist.
    async fn remove_from_role(&self, permission_id: i64, role_id: i64) -> Result<bool>;
    /// Permissions granted to a role within one application, ordered by (resource, action)
    async fn permissions_for_role(&self, role_id: i64, application_id: i64)
        -> Result<Vec<Permission>>;
    /// Whether any role held by the user grants (resource, action) in the application
    async fn user_has_permission(
        &self,
        user_id: i64,
        resource: &str,
        action: &str,
        application_id: i64,
    ) -> Result<bool>;
}

#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn insert(&self, entry: &NewAuditEntry) -> Result<i64>;
    /// Newest first; `limit`/`offset` already normalized by the caller.
    async fn query(&self, query: &AuditQuery, limit: i64, offset: i64)
        -> Result<Vec<AuditLogEntry>>;
    async fn ping(&self) -> Result<()>;
}
