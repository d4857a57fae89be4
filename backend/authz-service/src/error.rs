use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use jwt_security::TokenError;
use redis_utils::CacheError;
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AuthzError>;

/// Service error taxonomy.
///
/// Authentication and authorization failures carry an internal reason for the
/// audit trail; the HTTP body only ever shows the generic message.
#[derive(Debug, Error)]
pub enum AuthzError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Authentication failed: {0}")]
    Unauthenticated(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Access denied")]
    Forbidden,

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthzError {
    /// Reason recorded in audit details for pipeline denials.
    pub fn audit_reason(&self) -> String {
        match self {
            AuthzError::Unauthenticated(reason) => reason.clone(),
            AuthzError::InvalidCredentials => "invalid_credentials".to_string(),
            AuthzError::Forbidden => "insufficient_permissions".to_string(),
            AuthzError::RateLimited => "rate_limited".to_string(),
            other => other.to_string(),
        }
    }
}

impl ResponseError for AuthzError {
    fn status_code(&self) -> StatusCode {
        match self {
            AuthzError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthzError::Unauthenticated(_) | AuthzError::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }
            AuthzError::Forbidden => StatusCode::FORBIDDEN,
            AuthzError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AuthzError::Conflict(_) => StatusCode::CONFLICT,
            AuthzError::NotFound(_) => StatusCode::NOT_FOUND,
            AuthzError::ServiceUnavailable(_) | AuthzError::Cache(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AuthzError::Database(_) | AuthzError::Config(_) | AuthzError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let body = match self {
            AuthzError::Validation(msg) => json!({ "error": "Validation failed", "message": msg }),
            AuthzError::Unauthenticated(_) => {
                json!({ "error": "Unauthorized", "message": "Authentication required" })
            }
            AuthzError::InvalidCredentials => {
                json!({ "error": "Unauthorized", "message": "Invalid credentials" })
            }
            AuthzError::Forbidden => json!({
                "error": "Access denied",
                "message": "Insufficient permissions for this action"
            }),
            AuthzError::RateLimited => json!({ "error": "Rate limit exceeded" }),
            AuthzError::Conflict(msg) => json!({ "error": "Conflict", "message": msg }),
            AuthzError::NotFound(what) => {
                json!({ "error": "Not found", "message": format!("{} not found", what) })
            }
            AuthzError::ServiceUnavailable(_) | AuthzError::Cache(_) => {
                tracing::error!(error = %self, "Dependency unavailable");
                json!({ "error": "Service temporarily unavailable" })
            }
            AuthzError::Database(_) | AuthzError::Config(_) | AuthzError::Internal(_) => {
                tracing::error!(error = %self, "Internal error");
                json!({ "error": "Internal server error" })
            }
        };

        HttpResponse::build(status).json(body)
    }
}

impl From<sqlx::Error> for AuthzError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => AuthzError::NotFound("Record".to_string()),
            sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                // unique_violation
                Some("23505") => AuthzError::Conflict("Resource already exists".to_string()),
                // foreign_key_violation
                Some("23503") => {
                    AuthzError::Conflict("Resource is referenced by another record".to_string())
                }
                _ => AuthzError::Database(err.to_string()),
            },
            _ => AuthzError::Database(err.to_string()),
        }
    }
}

impl From<TokenError> for AuthzError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired | TokenError::BadSignature | TokenError::Malformed(_) => {
                AuthzError::Unauthenticated(err.reason().to_string())
            }
            TokenError::Encoding(_) | TokenError::Configuration(_) => {
                AuthzError::Internal(err.to_string())
            }
        }
    }
}

impl From<validator::ValidationErrors> for AuthzError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(message) => format!("{}: {}", field, message),
                    None => format!("{}: {}", field, e.code),
                })
            })
            .collect();
        messages.sort();
        AuthzError::Validation(messages.join("; "))
    }
}
