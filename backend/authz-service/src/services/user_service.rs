use crate::db::{UserChanges, UserRepository};
use crate::error::{AuthzError, Result};
use crate::models::{AuditStatus, CreateUserRequest, UpdateUserRequest, User};
use crate::security::hash_password;
use crate::services::audit_log::{AuditEvent, AuditLog, RequestContext};
use std::sync::Arc;
use validator::Validate;

const RESOURCE: &str = "users";

pub struct UserService {
    users: Arc<dyn UserRepository>,
    audit: Arc<AuditLog>,
}

impl UserService {
    pub fn new(users: Arc<dyn UserRepository>, audit: Arc<AuditLog>) -> Self {
        Self { users, audit }
    }

    /// Users are global; `application_id` scopes the audit record only.
    /// The new user is visible to the application once it holds one of its roles.
    pub async fn create(
        &self,
        request: CreateUserRequest,
        application_id: i64,
        ctx: &RequestContext,
    ) -> Result<User> {
        request.validate()?;

        let password_hash = hash_password(&request.password)?;
        let user = self
            .users
            .create(&request.username, &request.email, &password_hash)
            .await?;

        tracing::info!(user_id = user.id, "User created");
        self.audit
            .record_best_effort(
                AuditEvent::new("user_created", RESOURCE, AuditStatus::Success, ctx)
                    .application(application_id)
                    .detail("target_user_id", user.id)
                    .detail("username", user.username.clone()),
            )
            .await;

        Ok(user)
    }

    /// Partial update. A new password is re-hashed.
    ///
    /// Only users managed exclusively by `application_id` can be changed.
    pub async fn update(
        &self,
        id: i64,
        request: UpdateUserRequest,
        application_id: i64,
        ctx: &RequestContext,
    ) -> Result<User> {
        request.validate()?;
        if request.is_empty() {
            return Err(AuthzError::Validation("no fields to update".to_string()));
        }

        self.require_exclusive_member(id, application_id).await?;

        let password_hash = match request.password.as_deref() {
            Some(password) => Some(hash_password(password)?),
            None => None,
        };
        let changes = UserChanges {
            username: request.username,
            email: request.email,
            password_hash,
        };

        let user = self
            .users
            .update(id, &changes)
            .await?
            .ok_or_else(|| AuthzError::NotFound("User".to_string()))?;

        self.audit
            .record_best_effort(
                AuditEvent::new("user_updated", RESOURCE, AuditStatus::Success, ctx)
                    .application(application_id)
                    .detail("target_user_id", id)
                    .detail("password_changed", changes.password_hash.is_some()),
            )
            .await;

        Ok(user)
    }

    /// Only users managed exclusively by `application_id` can be removed.
    pub async fn delete(&self, id: i64, application_id: i64, ctx: &RequestContext) -> Result<()> {
        self.require_exclusive_member(id, application_id).await?;

        if !self.users.delete(id).await? {
            return Err(AuthzError::NotFound("User".to_string()));
        }

        tracing::info!(user_id = id, "User deleted");
        self.audit
            .record_best_effort(
                AuditEvent::new("user_deleted", RESOURCE, AuditStatus::Success, ctx)
                    .application(application_id)
                    .detail("target_user_id", id),
            )
            .await;

        Ok(())
    }

    /// A user is visible to an application only while holding one of its roles.
    pub async fn get_by_id(&self, id: i64, application_id: i64) -> Result<User> {
        self.require_member(id, application_id).await?;
        self.users
            .find_by_id(id)
            .await?
            .ok_or_else(|| AuthzError::NotFound("User".to_string()))
    }

    pub async fn get_by_username(&self, username: &str) -> Result<User> {
        self.users
            .find_by_username(username)
            .await?
            .ok_or_else(|| AuthzError::NotFound("User".to_string()))
    }

    async fn require_member(&self, id: i64, application_id: i64) -> Result<Vec<i64>> {
        let applications = self.users.application_ids(id).await?;
        if !applications.contains(&application_id) {
            return Err(AuthzError::NotFound("User".to_string()));
        }
        Ok(applications)
    }

    /// Credentials are shared by every application the user belongs to, so a
    /// single tenant may only change users no other tenant depends on.
    async fn require_exclusive_member(&self, id: i64, application_id: i64) -> Result<()> {
        let applications = self.require_member(id, application_id).await?;
        if applications.iter().any(|app| *app != application_id) {
            tracing::warn!(
                user_id = id,
                application_id,
                "Refusing change to user shared with other applications"
            );
            return Err(AuthzError::Conflict(
                "User is shared with other applications".to_string(),
            ));
        }
        Ok(())
    }
}
