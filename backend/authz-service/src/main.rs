/// Authorization service entry point
use actix_middleware::{
    CorrelationIdMiddleware, HttpMetrics, Logging, MetricsMiddleware, SecurityHeaders,
};
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use jwt_security::TokenService;
use redis_utils::{CacheStore, RedisPool};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;

use authz_service::{
    config::Config, handlers, logging::init_tracing, AppState, Repositories, ServiceSettings,
};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Config::from_env().context("Failed to load configuration from environment")?;
    let bind_address = config.bind_address();

    tracing::info!(address = %bind_address, "Starting authz-service");

    let db_pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database connection pool initialized and migrations applied");

    let redis = RedisPool::connect(&config.redis_url).await?;
    let cache: Arc<dyn CacheStore> = Arc::new(redis.store());

    let tokens = TokenService::new(config.token_config()).context("Invalid token configuration")?;
    let metrics = Arc::new(HttpMetrics::new().context("Failed to register metrics")?);

    let state = AppState::new(
        Repositories::postgres(Arc::new(db_pool)),
        cache,
        tokens,
        ServiceSettings::from(&config),
        metrics.clone(),
    );

    HttpServer::new(move || {
        let state = state.clone();

        App::new()
            .app_data(web::Data::new(state.clone()))
            .configure(|cfg| handlers::configure(cfg, &state))
            .wrap(MetricsMiddleware::new(metrics.clone()))
            .wrap(Logging)
            .wrap(CorrelationIdMiddleware)
            .wrap(SecurityHeaders)
    })
    .bind(&bind_address)
    .with_context(|| format!("Failed to bind {}", bind_address))?
    .run()
    .await?;

    tracing::info!("authz-service stopped");
    Ok(())
}
