use crate::db::{ApplicationRepository, UserRepository};
use crate::error::{AuthzError, Result};
use crate::models::audit::{
    ACTION_AUTH_ERROR, ACTION_LOGIN_FAILED, ACTION_LOGIN_SUCCESS, ACTION_TOKEN_REFRESH,
};
use crate::models::{AuditStatus, LoginRequest, LoginResponse, RefreshRequest, User};
use crate::security::{constant_time_eq, verify_password};
use crate::services::audit_log::{AuditEvent, AuditLog, RequestContext};
use jwt_security::{TokenPair, TokenService};
use std::sync::Arc;
use validator::Validate;

const AUTH_RESOURCE: &str = "auth";

pub struct AuthService {
    users: Arc<dyn UserRepository>,
    applications: Arc<dyn ApplicationRepository>,
    tokens: Arc<TokenService>,
    audit: Arc<AuditLog>,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        applications: Arc<dyn ApplicationRepository>,
        tokens: Arc<TokenService>,
        audit: Arc<AuditLog>,
    ) -> Self {
        Self {
            users,
            applications,
            tokens,
            audit,
        }
    }

    /// Password login scoped to one application.
    ///
    /// Unknown user and wrong password both yield `InvalidCredentials`.
    pub async fn authenticate(
        &self,
        request: LoginRequest,
        ctx: &RequestContext,
    ) -> Result<LoginResponse> {
        request.validate()?;

        if self
            .applications
            .find_by_id(request.application_id)
            .await?
            .is_none()
        {
            return Err(AuthzError::NotFound("Application".to_string()));
        }

        let user = match self.users.find_by_username(&request.username).await? {
            Some(user) if verify_password(&request.password, &user.password_hash)? => user,
            found => {
                let user_id = found.map(|u| u.id);
                tracing::info!(
                    username = %request.username,
                    application_id = request.application_id,
                    "Login failed"
                );
                self.audit
                    .record_best_effort(
                        AuditEvent::new(
                            ACTION_LOGIN_FAILED,
                            AUTH_RESOURCE,
                            AuditStatus::Failure,
                            ctx,
                        )
                        .application(request.application_id)
                        .user(user_id)
                        .detail("username", request.username.clone())
                        .detail("reason", "invalid_credentials"),
                    )
                    .await;
                return Err(AuthzError::InvalidCredentials);
            }
        };

        let tokens = self
            .tokens
            .issue_pair(&user.token_user(), request.application_id)?;

        tracing::info!(
            user_id = user.id,
            application_id = request.application_id,
            "User logged in"
        );
        self.audit
            .record_best_effort(
                AuditEvent::new(
                    ACTION_LOGIN_SUCCESS,
                    AUTH_RESOURCE,
                    AuditStatus::Success,
                    ctx,
                )
                .application(request.application_id)
                .user(Some(user.id)),
            )
            .await;

        Ok(LoginResponse {
            user: user.summary(),
            tokens,
        })
    }

    /// Exchange a refresh token for a new pair.
    ///
    /// The only path that accepts refresh claims.
    pub async fn refresh(&self, request: RefreshRequest, ctx: &RequestContext) -> Result<TokenPair> {
        let user = match self.refresh_subject(&request).await {
            Ok(user) => user,
            Err(err) => {
                self.audit
                    .record_best_effort(
                        AuditEvent::new(
                            ACTION_AUTH_ERROR,
                            AUTH_RESOURCE,
                            AuditStatus::Failure,
                            ctx,
                        )
                        .application(request.application_id)
                        .detail("reason", err.audit_reason()),
                    )
                    .await;
                return Err(err);
            }
        };

        let tokens = self
            .tokens
            .issue_pair(&user.token_user(), request.application_id)?;

        tracing::info!(
            user_id = user.id,
            application_id = request.application_id,
            "Token refreshed"
        );
        self.audit
            .record_best_effort(
                AuditEvent::new(
                    ACTION_TOKEN_REFRESH,
                    AUTH_RESOURCE,
                    AuditStatus::Success,
                    ctx,
                )
                .application(request.application_id)
                .user(Some(user.id)),
            )
            .await;

        Ok(tokens)
    }

    /// Constant-time comparison against the application's stored key.
    pub async fn validate_api_key(&self, api_key: &str, application_id: i64) -> Result<bool> {
        let application = self
            .applications
            .find_by_id(application_id)
            .await?
            .ok_or_else(|| AuthzError::NotFound("Application".to_string()))?;

        Ok(constant_time_eq(
            api_key.as_bytes(),
            application.api_key.as_bytes(),
        ))
    }

    async fn refresh_subject(&self, request: &RefreshRequest) -> Result<User> {
        let claims = self.tokens.validate(&request.refresh_token)?;

        if !TokenService::is_refresh_token(&claims) {
            return Err(AuthzError::Unauthenticated("not_refresh_token".to_string()));
        }
        if TokenService::application_id(&claims) != request.application_id {
            return Err(AuthzError::Unauthenticated(
                "application_mismatch".to_string(),
            ));
        }

        self.users
            .find_by_id(TokenService::user_id(&claims))
            .await?
            .ok_or_else(|| AuthzError::Unauthenticated("user_not_found".to_string()))
    }
}
