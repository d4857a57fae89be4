use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;

pub const ACTION_ACCESS_GRANTED: &str = "access_granted";
pub const ACTION_ACCESS_DENIED: &str = "access_denied";
pub const ACTION_AUTH_ERROR: &str = "auth_error";
pub const ACTION_LOGIN_SUCCESS: &str = "login_success";
pub const ACTION_LOGIN_FAILED: &str = "login_failed";
pub const ACTION_TOKEN_REFRESH: &str = "token_refresh";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    Success,
    Failure,
    Denied,
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::Success => "success",
            AuditStatus::Failure => "failure",
            AuditStatus::Denied => "denied",
        }
    }
}

/// Persisted audit record. Never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuditLogEntry {
    pub id: i64,
    /// Absent when the request never resolved to an application
    pub application_id: Option<i64>,
    pub user_id: Option<i64>,
    pub action: String,
    pub resource: String,
    pub ip_address: String,
    pub user_agent: Option<String>,
    pub status: String,
    pub details: Value,
    pub created_at: DateTime<Utc>,
}

/// Audit record ready for insertion; `details` already sanitized.
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub application_id: Option<i64>,
    pub user_id: Option<i64>,
    pub action: String,
    pub resource: String,
    pub ip_address: String,
    pub user_agent: Option<String>,
    pub status: AuditStatus,
    pub details: Map<String, Value>,
}

/// Audit search. Filters are optional and ANDed together.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditQuery {
    #[serde(skip)]
    pub application_id: i64,
    pub user_id: Option<i64>,
    pub action: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}
