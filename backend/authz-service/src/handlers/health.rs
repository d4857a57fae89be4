/// Liveness, readiness and metrics endpoints
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde_json::json;

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

/// Ready when both the relational store and the cache answer.
pub async fn readiness(state: web::Data<AppState>) -> HttpResponse {
    let database = state.audit.ping().await;
    let cache = state.cache.ping().await;

    if let Err(e) = &database {
        tracing::warn!(error = %e, "Readiness: database unavailable");
    }
    if let Err(e) = &cache {
        tracing::warn!(error = %e, "Readiness: cache unavailable");
    }

    let body = json!({
        "database": if database.is_ok() { "ok" } else { "unavailable" },
        "cache": if cache.is_ok() { "ok" } else { "unavailable" },
    });

    if database.is_ok() && cache.is_ok() {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::ServiceUnavailable().json(body)
    }
}

pub async fn metrics(state: web::Data<AppState>) -> HttpResponse {
    match state.metrics.render() {
        Ok(text) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(text),
        Err(e) => {
            tracing::error!(error = %e, "Failed to render metrics");
            HttpResponse::InternalServerError().finish()
        }
    }
}
