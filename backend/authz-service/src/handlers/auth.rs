use super::request_context;
use crate::error::AuthzError;
use crate::models::{LoginRequest, RefreshRequest};
use crate::state::AppState;
use actix_web::{web, HttpRequest, HttpResponse};

/// POST /api/v1/auth/login
pub async fn login(
    state: web::Data<AppState>,
    req: HttpRequest,
    payload: web::Json<LoginRequest>,
) -> Result<HttpResponse, AuthzError> {
    let ctx = request_context(&req, None);
    let response = state.auth.authenticate(payload.into_inner(), &ctx).await?;
    Ok(HttpResponse::Ok().json(response))
}

/// POST /api/v1/auth/refresh
pub async fn refresh(
    state: web::Data<AppState>,
    req: HttpRequest,
    payload: web::Json<RefreshRequest>,
) -> Result<HttpResponse, AuthzError> {
    let ctx = request_context(&req, None);
    let tokens = state.auth.refresh(payload.into_inner(), &ctx).await?;
    Ok(HttpResponse::Ok().json(tokens))
}
