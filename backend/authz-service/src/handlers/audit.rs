use crate::error::AuthzError;
use crate::middleware::AuthContext;
use crate::models::AuditQuery;
use crate::services::audit_log::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde_json::json;

/// GET /api/v1/audit-logs
///
/// Always scoped to the caller's application.
pub async fn query_audit_logs(
    state: web::Data<AppState>,
    auth: AuthContext,
    query: web::Query<AuditQuery>,
) -> Result<HttpResponse, AuthzError> {
    let mut query = query.into_inner();
    query.application_id = auth.application_id;

    let page = query.page.unwrap_or(1).max(1);
    let limit = query
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let entries = state.audit.query(query).await?;

    Ok(HttpResponse::Ok().json(json!({
        "data": entries,
        "page": page,
        "limit": limit,
    })))
}
