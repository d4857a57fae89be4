use crate::db::AuditRepository;
use crate::error::{AuthzError, Result};
use crate::models::{AuditLogEntry, AuditQuery, AuditStatus, NewAuditEntry};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

/// Keys stripped from audit details, compared case-insensitively.
pub const SENSITIVE_FIELDS: [&str; 7] = [
    "password",
    "token",
    "refresh_token",
    "api_key",
    "secret",
    "credit_card",
    "ssn",
];

pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Where a request came from, for audit attribution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Authenticated caller, when known
    pub actor_id: Option<i64>,
    pub ip_address: String,
    pub user_agent: Option<String>,
}

/// One audit event before sanitization.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub application_id: Option<i64>,
    pub user_id: Option<i64>,
    pub action: String,
    pub resource: String,
    pub ip_address: String,
    pub user_agent: Option<String>,
    pub status: AuditStatus,
    pub details: Map<String, Value>,
}

impl AuditEvent {
    pub fn new(action: &str, resource: &str, status: AuditStatus, ctx: &RequestContext) -> Self {
        Self {
            application_id: None,
            user_id: ctx.actor_id,
            action: action.to_string(),
            resource: resource.to_string(),
            ip_address: ctx.ip_address.clone(),
            user_agent: ctx.user_agent.clone(),
            status,
            details: Map::new(),
        }
    }

    pub fn application(mut self, application_id: i64) -> Self {
        self.application_id = Some(application_id);
        self
    }

    pub fn user(mut self, user_id: Option<i64>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }
}

/// Drop every sensitive key from `details`.
pub fn sanitize_details(details: Map<String, Value>) -> Map<String, Value> {
    details
        .into_iter()
        .filter(|(key, _)| {
            !SENSITIVE_FIELDS
                .iter()
                .any(|field| key.eq_ignore_ascii_case(field))
        })
        .collect()
}

/// Append-only audit trail
pub struct AuditLog {
    repo: Arc<dyn AuditRepository>,
    write_timeout: Duration,
}

impl AuditLog {
    pub fn new(repo: Arc<dyn AuditRepository>, write_timeout: Duration) -> Self {
        Self {
            repo,
            write_timeout,
        }
    }

    /// Sanitize and persist one event. Fails only when the store does.
    pub async fn record(&self, event: AuditEvent) -> Result<i64> {
        let entry = NewAuditEntry {
            application_id: event.application_id,
            user_id: event.user_id,
            action: event.action,
            resource: event.resource,
            ip_address: event.ip_address,
            user_agent: event.user_agent,
            status: event.status,
            details: sanitize_details(event.details),
        };

        match timeout(self.write_timeout, self.repo.insert(&entry)).await {
            Ok(result) => result,
            Err(_) => Err(AuthzError::ServiceUnavailable(format!(
                "audit write timed out after {}ms",
                self.write_timeout.as_millis()
            ))),
        }
    }

    /// `record`, with failures logged and swallowed.
    ///
    /// Used on decision and mutation paths, which must not fail because the
    /// audit store is slow or down.
    pub async fn record_best_effort(&self, event: AuditEvent) {
        let action = event.action.clone();
        let application_id = event.application_id;

        if let Err(e) = self.record(event).await {
            tracing::warn!(
                action = %action,
                application_id = ?application_id,
                error = %e,
                "Audit log write failed"
            );
        }
    }

    /// Filtered, newest-first page of an application's audit trail.
    pub async fn query(&self, mut query: AuditQuery) -> Result<Vec<AuditLogEntry>> {
        if let (Some(start), Some(end)) = (query.start_date, query.end_date) {
            if start > end {
                return Err(AuthzError::Validation(
                    "start_date: must not be after end_date".to_string(),
                ));
            }
        }

        let page = query.page.unwrap_or(1).max(1);
        let limit = query
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        query.page = Some(page);
        query.limit = Some(limit);

        let offset = (i64::from(page) - 1) * i64::from(limit);
        self.repo.query(&query, i64::from(limit), offset).await
    }

    pub async fn ping(&self) -> Result<()> {
        self.repo.ping().await
    }
}
