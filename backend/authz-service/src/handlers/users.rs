use super::request_context;
use crate::error::AuthzError;
use crate::middleware::AuthContext;
use crate::models::{CreateUserRequest, UpdateUserRequest};
use crate::state::AppState;
use actix_web::{web, HttpRequest, HttpResponse};

pub async fn create_user(
    state: web::Data<AppState>,
    auth: AuthContext,
    req: HttpRequest,
    payload: web::Json<CreateUserRequest>,
) -> Result<HttpResponse, AuthzError> {
    let ctx = request_context(&req, Some(auth.user_id));
    let user = state
        .users
        .create(payload.into_inner(), auth.application_id, &ctx)
        .await?;
    Ok(HttpResponse::Created().json(user.summary()))
}

pub async fn get_user(
    state: web::Data<AppState>,
    auth: AuthContext,
    path: web::Path<i64>,
) -> Result<HttpResponse, AuthzError> {
    let user = state
        .users
        .get_by_id(path.into_inner(), auth.application_id)
        .await?;
    Ok(HttpResponse::Ok().json(user.summary()))
}

pub async fn update_user(
    state: web::Data<AppState>,
    auth: AuthContext,
    req: HttpRequest,
    path: web::Path<i64>,
    payload: web::Json<UpdateUserRequest>,
) -> Result<HttpResponse, AuthzError> {
    let ctx = request_context(&req, Some(auth.user_id));
    let user = state
        .users
        .update(path.into_inner(), payload.into_inner(), auth.application_id, &ctx)
        .await?;
    Ok(HttpResponse::Ok().json(user.summary()))
}

pub async fn delete_user(
    state: web::Data<AppState>,
    auth: AuthContext,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse, AuthzError> {
    let ctx = request_context(&req, Some(auth.user_id));
    state
        .users
        .delete(path.into_inner(), auth.application_id, &ctx)
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

/// Roles the user holds in the caller's application
pub async fn get_user_roles(
    state: web::Data<AppState>,
    auth: AuthContext,
    path: web::Path<i64>,
) -> Result<HttpResponse, AuthzError> {
    let roles = state
        .permissions
        .user_roles(path.into_inner(), auth.application_id)
        .await?;
    Ok(HttpResponse::Ok().json(roles))
}

pub async fn assign_role(
    state: web::Data<AppState>,
    auth: AuthContext,
    req: HttpRequest,
    path: web::Path<(i64, i64)>,
) -> Result<HttpResponse, AuthzError> {
    let (user_id, role_id) = path.into_inner();
    let ctx = request_context(&req, Some(auth.user_id));
    state
        .permissions
        .assign_role_to_user(role_id, user_id, auth.application_id, &ctx)
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn remove_role(
    state: web::Data<AppState>,
    auth: AuthContext,
    req: HttpRequest,
    path: web::Path<(i64, i64)>,
) -> Result<HttpResponse, AuthzError> {
    let (user_id, role_id) = path.into_inner();
    let ctx = request_context(&req, Some(auth.user_id));
    state
        .permissions
        .remove_role_from_user(role_id, user_id, auth.application_id, &ctx)
        .await?;
    Ok(HttpResponse::NoContent().finish())
}
