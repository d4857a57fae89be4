use crate::config::Config;
use crate::db::{
    ApplicationRepository, AuditRepository, PermissionRepository, PgApplicationRepository,
    PgAuditRepository, PgPermissionRepository, PgRoleRepository, PgUserRepository,
    RoleRepository, UserRepository,
};
use crate::middleware::AuthorizationPipeline;
use crate::services::{ApplicationService, AuditLog, AuthService, PermissionService, UserService};
use actix_middleware::{HttpMetrics, RateLimitConfig, RateLimiter};
use jwt_security::TokenService;
use redis_utils::CacheStore;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

/// Store handles every service is built over.
#[derive(Clone)]
pub struct Repositories {
    pub applications: Arc<dyn ApplicationRepository>,
    pub users: Arc<dyn UserRepository>,
    pub roles: Arc<dyn RoleRepository>,
    pub permissions: Arc<dyn PermissionRepository>,
    pub audit: Arc<dyn AuditRepository>,
}

impl Repositories {
    pub fn postgres(pool: Arc<PgPool>) -> Self {
        Self {
            applications: Arc::new(PgApplicationRepository::new(pool.clone())),
            users: Arc::new(PgUserRepository::new(pool.clone())),
            roles: Arc::new(PgRoleRepository::new(pool.clone())),
            permissions: Arc::new(PgPermissionRepository::new(pool.clone())),
            audit: Arc::new(PgAuditRepository::new(pool)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub rate_limit: RateLimitConfig,
    pub permission_cache_ttl_secs: u64,
    pub audit_write_timeout: Duration,
}

impl From<&Config> for ServiceSettings {
    fn from(config: &Config) -> Self {
        Self {
            rate_limit: config.rate_limit_config(),
            permission_cache_ttl_secs: config.permission_cache_ttl,
            audit_write_timeout: Duration::from_millis(config.audit_write_timeout_ms),
        }
    }
}

/// Shared application state, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub permissions: Arc<PermissionService>,
    pub applications: Arc<ApplicationService>,
    pub users: Arc<UserService>,
    pub audit: Arc<AuditLog>,
    pub cache: Arc<dyn CacheStore>,
    pub limiter: Arc<RateLimiter>,
    pub pipeline: Arc<AuthorizationPipeline>,
    pub metrics: Arc<HttpMetrics>,
}

impl AppState {
    pub fn new(
        repos: Repositories,
        cache: Arc<dyn CacheStore>,
        tokens: TokenService,
        settings: ServiceSettings,
        metrics: Arc<HttpMetrics>,
    ) -> Self {
        let tokens = Arc::new(tokens);
        let audit = Arc::new(AuditLog::new(repos.audit.clone(), settings.audit_write_timeout));
        let limiter = Arc::new(RateLimiter::new(cache.clone(), settings.rate_limit));

        let permissions = Arc::new(PermissionService::new(
            repos.roles.clone(),
            repos.permissions.clone(),
            repos.users.clone(),
            cache.clone(),
            audit.clone(),
            settings.permission_cache_ttl_secs,
        ));
        let auth = Arc::new(AuthService::new(
            repos.users.clone(),
            repos.applications.clone(),
            tokens.clone(),
            audit.clone(),
        ));
        let applications = Arc::new(ApplicationService::new(
            repos.applications.clone(),
            audit.clone(),
        ));
        let users = Arc::new(UserService::new(repos.users.clone(), audit.clone()));

        let pipeline = Arc::new(
            AuthorizationPipeline::new(limiter.clone(), tokens, permissions.clone(), audit.clone())
                .with_metrics(metrics.clone()),
        );

        Self {
            auth,
            permissions,
            applications,
            users,
            audit,
            cache,
            limiter,
            pipeline,
            metrics,
        }
    }
}
