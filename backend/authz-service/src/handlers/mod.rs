/// HTTP handlers and route table
pub mod applications;
pub mod audit;
pub mod auth;
pub mod health;
pub mod permissions;
pub mod roles;
pub mod users;

use crate::middleware::AuthorizationMiddleware;
use crate::services::RequestContext;
use crate::state::AppState;
use actix_middleware::{resolve_client_address, RateLimitMiddleware};
use actix_web::{http::header::USER_AGENT, web, HttpRequest};

/// Audit attribution for a handler request.
pub fn request_context(req: &HttpRequest, actor_id: Option<i64>) -> RequestContext {
    let peer = req.peer_addr().map(|addr| addr.ip().to_string());

    RequestContext {
        actor_id,
        ip_address: resolve_client_address(req.headers(), peer.as_deref()),
        user_agent: req
            .headers()
            .get(USER_AGENT)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string),
    }
}

/// Register every route. Protected resources are wrapped one by one so each
/// carries its own permission resource name.
pub fn configure(cfg: &mut web::ServiceConfig, state: &AppState) {
    let guard = |resource: &str| AuthorizationMiddleware::new(state.pipeline.clone(), resource);

    cfg.route("/health", web::get().to(health::health))
        .route("/readiness", web::get().to(health::readiness))
        .route("/metrics", web::get().to(health::metrics));

    cfg.service(
        web::scope("/api/v1/auth")
            .wrap(RateLimitMiddleware::new(state.limiter.clone()))
            .route("/login", web::post().to(auth::login))
            .route("/refresh", web::post().to(auth::refresh)),
    );

    cfg.service(
        web::scope("/api/v1")
            // roles
            .service(
                web::resource("/roles")
                    .wrap(guard("roles"))
                    .route(web::get().to(roles::list_roles))
                    .route(web::post().to(roles::create_role)),
            )
            .service(
                web::resource("/roles/{id}")
                    .wrap(guard("roles"))
                    .route(web::get().to(roles::get_role))
                    .route(web::put().to(roles::update_role))
                    .route(web::delete().to(roles::delete_role)),
            )
            .service(
                web::resource("/roles/{id}/permissions")
                    .wrap(guard("roles").action("read"))
                    .route(web::get().to(roles::get_role_permissions)),
            )
            .service(
                web::resource("/roles/{id}/permissions/{permission_id}")
                    .wrap(guard("role_permissions"))
                    .route(web::post().to(roles::assign_permission))
                    .route(web::delete().to(roles::remove_permission)),
            )
            // permissions
            .service(
                web::resource("/permissions")
                    .wrap(guard("permissions"))
                    .route(web::get().to(permissions::list_permissions))
                    .route(web::post().to(permissions::create_permission)),
            )
            .service(
                web::resource("/permissions/{id}")
                    .wrap(guard("permissions"))
                    .route(web::get().to(permissions::get_permission))
                    .route(web::put().to(permissions::update_permission))
                    .route(web::delete().to(permissions::delete_permission)),
            )
            // users
            .service(
                web::resource("/users")
                    .wrap(guard("users"))
                    .route(web::post().to(users::create_user)),
            )
            .service(
                web::resource("/users/{id}")
                    .wrap(guard("users"))
                    .route(web::get().to(users::get_user))
                    .route(web::put().to(users::update_user))
                    .route(web::delete().to(users::delete_user)),
            )
            .service(
                web::resource("/users/{id}/roles")
                    .wrap(guard("user_roles").action("read"))
                    .route(web::get().to(users::get_user_roles)),
            )
            .service(
                web::resource("/users/{id}/roles/{role_id}")
                    .wrap(guard("user_roles"))
                    .route(web::post().to(users::assign_role))
                    .route(web::delete().to(users::remove_role)),
            )
            // applications
            .service(
                web::resource("/applications")
                    .wrap(guard("applications"))
                    .route(web::post().to(applications::create_application)),
            )
            .service(
                web::resource("/applications/current")
                    .wrap(guard("applications"))
                    .route(web::get().to(applications::get_current))
                    .route(web::put().to(applications::update_current))
                    .route(web::delete().to(applications::delete_current)),
            )
            .service(
                web::resource("/applications/current/api-key")
                    .wrap(guard("applications").action("update"))
                    .route(web::post().to(applications::regenerate_api_key)),
            )
            // audit trail
            .service(
                web::resource("/audit-logs")
                    .wrap(guard("audit_logs"))
                    .route(web::get().to(audit::query_audit_logs)),
            ),
    );
}
