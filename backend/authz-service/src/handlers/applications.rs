//! Applications. `current` is the application of the caller's token.

use super::request_context;
use crate::error::AuthzError;
use crate::middleware::AuthContext;
use crate::models::{CreateApplicationRequest, UpdateApplicationRequest};
use crate::state::AppState;
use actix_web::{web, HttpRequest, HttpResponse};

pub async fn create_application(
    state: web::Data<AppState>,
    auth: AuthContext,
    req: HttpRequest,
    payload: web::Json<CreateApplicationRequest>,
) -> Result<HttpResponse, AuthzError> {
    let ctx = request_context(&req, Some(auth.user_id));
    let application = state
        .applications
        .create(payload.into_inner(), &ctx)
        .await?;
    Ok(HttpResponse::Created().json(application))
}

pub async fn get_current(
    state: web::Data<AppState>,
    auth: AuthContext,
) -> Result<HttpResponse, AuthzError> {
    let application = state.applications.get_by_id(auth.application_id).await?;
    Ok(HttpResponse::Ok().json(application))
}

pub async fn update_current(
    state: web::Data<AppState>,
    auth: AuthContext,
    req: HttpRequest,
    payload: web::Json<UpdateApplicationRequest>,
) -> Result<HttpResponse, AuthzError> {
    let ctx = request_context(&req, Some(auth.user_id));
    let application = state
        .applications
        .update(auth.application_id, payload.into_inner(), &ctx)
        .await?;
    Ok(HttpResponse::Ok().json(application))
}

pub async fn delete_current(
    state: web::Data<AppState>,
    auth: AuthContext,
    req: HttpRequest,
) -> Result<HttpResponse, AuthzError> {
    let ctx = request_context(&req, Some(auth.user_id));
    state
        .applications
        .delete(auth.application_id, &ctx)
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn regenerate_api_key(
    state: web::Data<AppState>,
    auth: AuthContext,
    req: HttpRequest,
) -> Result<HttpResponse, AuthzError> {
    let ctx = request_context(&req, Some(auth.user_id));
    let application = state
        .applications
        .regenerate_api_key(auth.application_id, &ctx)
        .await?;
    Ok(HttpResponse::Ok().json(application))
}
