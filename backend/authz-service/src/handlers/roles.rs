use super::request_context;
use crate::error::AuthzError;
use crate::middleware::AuthContext;
use crate::models::{CreateRoleRequest, UpdateRoleRequest};
use crate::state::AppState;
use actix_web::{web, HttpRequest, HttpResponse};

pub async fn list_roles(
    state: web::Data<AppState>,
    auth: AuthContext,
) -> Result<HttpResponse, AuthzError> {
    let roles = state.permissions.list_roles(auth.application_id).await?;
    Ok(HttpResponse::Ok().json(roles))
}

pub async fn create_role(
    state: web::Data<AppState>,
    auth: AuthContext,
    req: HttpRequest,
    payload: web::Json<CreateRoleRequest>,
) -> Result<HttpResponse, AuthzError> {
    let ctx = request_context(&req, Some(auth.user_id));
    let role = state
        .permissions
        .create_role(auth.application_id, payload.into_inner(), &ctx)
        .await?;
    Ok(HttpResponse::Created().json(role))
}

pub async fn get_role(
    state: web::Data<AppState>,
    auth: AuthContext,
    path: web::Path<i64>,
) -> Result<HttpResponse, AuthzError> {
    let role = state
        .permissions
        .get_role(path.into_inner(), auth.application_id)
        .await?;
    Ok(HttpResponse::Ok().json(role))
}

pub async fn update_role(
    state: web::Data<AppState>,
    auth: AuthContext,
    req: HttpRequest,
    path: web::Path<i64>,
    payload: web::Json<UpdateRoleRequest>,
) -> Result<HttpResponse, AuthzError> {
    let ctx = request_context(&req, Some(auth.user_id));
    let role = state
        .permissions
        .update_role(path.into_inner(), auth.application_id, payload.into_inner(), &ctx)
        .await?;
    Ok(HttpResponse::Ok().json(role))
}

pub async fn delete_role(
    state: web::Data<AppState>,
    auth: AuthContext,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse, AuthzError> {
    let ctx = request_context(&req, Some(auth.user_id));
    state
        .permissions
        .delete_role(path.into_inner(), auth.application_id, &ctx)
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn get_role_permissions(
    state: web::Data<AppState>,
    auth: AuthContext,
    path: web::Path<i64>,
) -> Result<HttpResponse, AuthzError> {
    let permissions = state
        .permissions
        .get_role_permissions(path.into_inner(), auth.application_id)
        .await?;
    Ok(HttpResponse::Ok().json(permissions))
}

/// POST /api/v1/roles/{id}/permissions/{permission_id}
pub async fn assign_permission(
    state: web::Data<AppState>,
    auth: AuthContext,
    req: HttpRequest,
    path: web::Path<(i64, i64)>,
) -> Result<HttpResponse, AuthzError> {
    let (role_id, permission_id) = path.into_inner();
    let ctx = request_context(&req, Some(auth.user_id));
    state
        .permissions
        .assign_permission_to_role(permission_id, role_id, auth.application_id, &ctx)
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

/// DELETE /api/v1/roles/{id}/permissions/{permission_id}
pub async fn remove_permission(
    state: web::Data<AppState>,
    auth: AuthContext,
    req: HttpRequest,
    path: web::Path<(i64, i64)>,
) -> Result<HttpResponse, AuthzError> {
    let (role_id, permission_id) = path.into_inner();
    let ctx = request_context(&req, Some(auth.user_id));
    state
        .permissions
        .remove_permission_from_role(permission_id, role_id, auth.application_id, &ctx)
        .await?;
    Ok(HttpResponse::NoContent().finish())
}
