//! Authorization pipeline
//!
//! rate limit -> bearer token -> token validation -> permission check -> allow.
//! Every decision past the rate limiter writes exactly one audit record:
//! `auth_error` for identity failures, `access_denied` for missing grants and
//! `access_granted` for admitted requests.

use crate::error::AuthzError;
use crate::models::audit::{ACTION_ACCESS_DENIED, ACTION_ACCESS_GRANTED, ACTION_AUTH_ERROR};
use crate::models::AuditStatus;
use crate::services::{AuditEvent, AuditLog, PermissionService, RequestContext};
use actix_middleware::{client_address, user_agent, Admission, HttpMetrics, RateLimiter};
use actix_web::{
    body::{EitherBody, MessageBody},
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    http::{header::AUTHORIZATION, Method},
    Error, FromRequest, HttpMessage, HttpRequest, ResponseError,
};
use futures::future::{ready, Ready};
use jwt_security::TokenService;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;

/// Identity of an admitted request, attached to request extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: i64,
    pub application_id: i64,
}

impl FromRequest for AuthContext {
    type Error = AuthzError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<AuthContext>()
                .copied()
                .ok_or_else(|| AuthzError::Unauthenticated("missing_auth_context".to_string())),
        )
    }
}

/// Request facts the pipeline decides on.
#[derive(Debug, Clone, Default)]
pub struct RequestInfo {
    pub client_address: String,
    pub user_agent: Option<String>,
    pub authorization: Option<String>,
}

impl RequestInfo {
    pub fn from_service_request(req: &ServiceRequest) -> Self {
        Self {
            client_address: client_address(req),
            user_agent: user_agent(req),
            authorization: req
                .headers()
                .get(AUTHORIZATION)
                .and_then(|h| h.to_str().ok())
                .map(str::to_string),
        }
    }

    fn audit_context(&self, actor_id: Option<i64>) -> RequestContext {
        RequestContext {
            actor_id,
            ip_address: self.client_address.clone(),
            user_agent: self.user_agent.clone(),
        }
    }
}

/// Token from an `Authorization: Bearer <token>` header value.
///
/// The scheme is matched case-insensitively.
pub fn extract_bearer(header: &str) -> Option<&str> {
    let mut parts = header.trim().splitn(2, char::is_whitespace);
    let scheme = parts.next()?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let token = parts.next()?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Permission action implied by an HTTP method.
pub fn action_for_method(method: &Method) -> &'static str {
    match *method {
        Method::GET | Method::HEAD => "read",
        Method::POST => "create",
        Method::PUT | Method::PATCH => "update",
        Method::DELETE => "delete",
        _ => "read",
    }
}

pub struct AuthorizationPipeline {
    limiter: Arc<RateLimiter>,
    tokens: Arc<TokenService>,
    permissions: Arc<PermissionService>,
    audit: Arc<AuditLog>,
    metrics: Option<Arc<HttpMetrics>>,
}

impl AuthorizationPipeline {
    pub fn new(
        limiter: Arc<RateLimiter>,
        tokens: Arc<TokenService>,
        permissions: Arc<PermissionService>,
        audit: Arc<AuditLog>,
    ) -> Self {
        Self {
            limiter,
            tokens,
            permissions,
            audit,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<HttpMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Decide whether the request may perform `action` on `resource`.
    pub async fn authorize(
        &self,
        info: &RequestInfo,
        resource: &str,
        action: &str,
    ) -> crate::error::Result<AuthContext> {
        match self.limiter.check(&info.client_address).await {
            Admission::Admitted => {}
            Admission::Limited => {
                self.record_metric("rate_limited");
                return Err(AuthzError::RateLimited);
            }
            Admission::Unavailable => {
                self.record_metric("error");
                return Err(AuthzError::ServiceUnavailable(
                    "rate limiter unavailable".to_string(),
                ));
            }
        }

        let token = match info.authorization.as_deref().and_then(extract_bearer) {
            Some(token) => token,
            None => {
                let err = AuthzError::Unauthenticated("missing_token".to_string());
                self.auth_error(info, None, None, resource, action, &err)
                    .await;
                return Err(err);
            }
        };

        let claims = match self.tokens.validate(token) {
            Ok(claims) => claims,
            Err(e) => {
                let err = AuthzError::from(e);
                self.auth_error(info, None, None, resource, action, &err)
                    .await;
                return Err(err);
            }
        };

        let user_id = TokenService::user_id(&claims);
        let application_id = TokenService::application_id(&claims);

        if TokenService::is_refresh_token(&claims) {
            let err = AuthzError::Unauthenticated("refresh_token_not_allowed".to_string());
            self.auth_error(info, Some(user_id), Some(application_id), resource, action, &err)
                .await;
            return Err(err);
        }

        let granted = match self
            .permissions
            .has_permission(user_id, resource, action, application_id)
            .await
        {
            Ok(granted) => granted,
            Err(err) => {
                tracing::error!(
                    user_id,
                    application_id,
                    resource,
                    action,
                    error = %err,
                    "Permission check failed"
                );
                self.record_metric("error");
                self.audit
                    .record_best_effort(
                        self.decision_event(
                            ACTION_AUTH_ERROR,
                            AuditStatus::Failure,
                            info,
                            Some(user_id),
                            Some(application_id),
                            resource,
                            action,
                        )
                        .detail("reason", "permission_check_failed"),
                    )
                    .await;
                return Err(err);
            }
        };

        if !granted {
            tracing::info!(user_id, application_id, resource, action, "Access denied");
            self.record_metric("denied");
            self.audit
                .record_best_effort(
                    self.decision_event(
                        ACTION_ACCESS_DENIED,
                        AuditStatus::Denied,
                        info,
                        Some(user_id),
                        Some(application_id),
                        resource,
                        action,
                    )
                    .detail("reason", AuthzError::Forbidden.audit_reason()),
                )
                .await;
            return Err(AuthzError::Forbidden);
        }

        tracing::debug!(user_id, application_id, resource, action, "Access granted");
        self.record_metric("granted");
        self.audit
            .record_best_effort(self.decision_event(
                ACTION_ACCESS_GRANTED,
                AuditStatus::Success,
                info,
                Some(user_id),
                Some(application_id),
                resource,
                action,
            ))
            .await;

        Ok(AuthContext {
            user_id,
            application_id,
        })
    }

    async fn auth_error(
        &self,
        info: &RequestInfo,
        user_id: Option<i64>,
        application_id: Option<i64>,
        resource: &str,
        action: &str,
        err: &AuthzError,
    ) {
        tracing::info!(
            client_address = %info.client_address,
            resource,
            action,
            reason = %err.audit_reason(),
            "Authentication failed"
        );
        self.record_metric("unauthenticated");
        self.audit
            .record_best_effort(
                self.decision_event(
                    ACTION_AUTH_ERROR,
                    AuditStatus::Failure,
                    info,
                    user_id,
                    application_id,
                    resource,
                    action,
                )
                .detail("reason", err.audit_reason()),
            )
            .await;
    }

    #[allow(clippy::too_many_arguments)]
    fn decision_event(
        &self,
        audit_action: &str,
        status: AuditStatus,
        info: &RequestInfo,
        user_id: Option<i64>,
        application_id: Option<i64>,
        resource: &str,
        action: &str,
    ) -> AuditEvent {
        let mut event = AuditEvent::new(audit_action, resource, status, &info.audit_context(user_id))
            .detail("requested_action", action);
        event.application_id = application_id;
        event
    }

    fn record_metric(&self, outcome: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_decision(outcome);
        }
    }
}

/// actix-web wrapper around `AuthorizationPipeline` for one resource.
///
/// The action defaults to the one implied by the request method.
pub struct AuthorizationMiddleware {
    pipeline: Arc<AuthorizationPipeline>,
    resource: Rc<str>,
    action: Option<Rc<str>>,
}

impl AuthorizationMiddleware {
    pub fn new(pipeline: Arc<AuthorizationPipeline>, resource: &str) -> Self {
        Self {
            pipeline,
            resource: Rc::from(resource),
            action: None,
        }
    }

    /// Require a fixed action regardless of method.
    pub fn action(mut self, action: &str) -> Self {
        self.action = Some(Rc::from(action));
        self
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthorizationMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = AuthorizationMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthorizationMiddlewareService {
            service: Rc::new(service),
            pipeline: self.pipeline.clone(),
            resource: self.resource.clone(),
            action: self.action.clone(),
        }))
    }
}

pub struct AuthorizationMiddlewareService<S> {
    service: Rc<S>,
    pipeline: Arc<AuthorizationPipeline>,
    resource: Rc<str>,
    action: Option<Rc<str>>,
}

impl<S, B> Service<ServiceRequest> for AuthorizationMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let pipeline = self.pipeline.clone();
        let resource = self.resource.clone();
        let action: Rc<str> = match &self.action {
            Some(action) => action.clone(),
            None => Rc::from(action_for_method(req.method())),
        };

        Box::pin(async move {
            let info = RequestInfo::from_service_request(&req);

            match pipeline.authorize(&info, &resource, &action).await {
                Ok(ctx) => {
                    req.extensions_mut().insert(ctx);
                    let res = service.call(req).await?;
                    Ok(res.map_into_left_body())
                }
                Err(err) => Ok(req
                    .into_response(err.error_response())
                    .map_into_right_body()),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer("Bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(extract_bearer("bearer   abc"), Some("abc"));
        assert_eq!(extract_bearer("  BEARER abc  "), Some("abc"));
        assert_eq!(extract_bearer("Basic dXNlcjpwYXNz"), None);
        assert_eq!(extract_bearer("Bearer"), None);
        assert_eq!(extract_bearer("Bearer    "), None);
        assert_eq!(extract_bearer(""), None);
    }

    #[test]
    fn test_action_for_method() {
        assert_eq!(action_for_method(&Method::GET), "read");
        assert_eq!(action_for_method(&Method::POST), "create");
        assert_eq!(action_for_method(&Method::PUT), "update");
        assert_eq!(action_for_method(&Method::PATCH), "update");
        assert_eq!(action_for_method(&Method::DELETE), "delete");
    }
}
