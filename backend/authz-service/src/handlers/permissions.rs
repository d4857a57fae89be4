use super::request_context;
use crate::error::AuthzError;
use crate::middleware::AuthContext;
use crate::models::{CreatePermissionRequest, UpdatePermissionRequest};
use crate::state::AppState;
use actix_web::{web, HttpRequest, HttpResponse};

pub async fn list_permissions(
    state: web::Data<AppState>,
    auth: AuthContext,
) -> Result<HttpResponse, AuthzError> {
    let permissions = state
        .permissions
        .list_permissions(auth.application_id)
        .await?;
    Ok(HttpResponse::Ok().json(permissions))
}

pub async fn create_permission(
    state: web::Data<AppState>,
    auth: AuthContext,
    req: HttpRequest,
    payload: web::Json<CreatePermissionRequest>,
) -> Result<HttpResponse, AuthzError> {
    let ctx = request_context(&req, Some(auth.user_id));
    let permission = state
        .permissions
        .create_permission(auth.application_id, payload.into_inner(), &ctx)
        .await?;
    Ok(HttpResponse::Created().json(permission))
}

pub async fn get_permission(
    state: web::Data<AppState>,
    auth: AuthContext,
    path: web::Path<i64>,
) -> Result<HttpResponse, AuthzError> {
    let permission = state
        .permissions
        .get_permission(path.into_inner(), auth.application_id)
        .await?;
    Ok(HttpResponse::Ok().json(permission))
}

pub async fn update_permission(
    state: web::Data<AppState>,
    auth: AuthContext,
    req: HttpRequest,
    path: web::Path<i64>,
    payload: web::Json<UpdatePermissionRequest>,
) -> Result<HttpResponse, AuthzError> {
    let ctx = request_context(&req, Some(auth.user_id));
    let permission = state
        .permissions
        .update_permission(path.into_inner(), auth.application_id, payload.into_inner(), &ctx)
        .await?;
    Ok(HttpResponse::Ok().json(permission))
}

pub async fn delete_permission(
    state: web::Data<AppState>,
    auth: AuthContext,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse, AuthzError> {
    let ctx = request_context(&req, Some(auth.user_id));
    state
        .permissions
        .delete_permission(path.into_inner(), auth.application_id, &ctx)
        .await?;
    Ok(HttpResponse::NoContent().finish())
}
