/// Configuration management
use actix_middleware::{FailureMode, RateLimitConfig};
use jwt_security::{validate_secret_strength, TokenConfig};
use serde::Deserialize;

use crate::error::AuthzError;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_server_host")]
    pub server_host: String,
    #[serde(default = "default_server_port")]
    pub server_port: u16,

    pub database_url: String,
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    pub redis_url: String,

    pub jwt_secret_key: String,
    /// Access token lifetime in seconds
    #[serde(default = "default_jwt_expiration")]
    pub jwt_expiration: i64,
    /// Refresh token lifetime in seconds
    #[serde(default = "default_jwt_refresh_expiration")]
    pub jwt_refresh_expiration: i64,
    /// Issuer and audience claim
    pub app_url: String,

    /// Requests allowed per client address per window
    #[serde(default = "default_rate_limit")]
    pub rate_limit: u64,
    #[serde(default = "default_rate_limit_window")]
    pub rate_limit_window: u64,
    #[serde(default)]
    pub rate_limit_failure_mode: FailureMode,
    #[serde(default = "default_rate_limit_redis_timeout_ms")]
    pub rate_limit_redis_timeout_ms: u64,

    /// TTL of cached permission answers, in seconds
    #[serde(default = "default_permission_cache_ttl")]
    pub permission_cache_ttl: u64,
    #[serde(default = "default_audit_write_timeout_ms")]
    pub audit_write_timeout_ms: u64,
}

fn default_server_host() -> String {
    "0.0.0.0".to_string()
}

fn default_server_port() -> u16 {
    8080
}

fn default_db_max_connections() -> u32 {
    20
}

fn default_jwt_expiration() -> i64 {
    3600
}

fn default_jwt_refresh_expiration() -> i64 {
    604_800
}

fn default_rate_limit() -> u64 {
    100
}

fn default_rate_limit_window() -> u64 {
    3600
}

fn default_rate_limit_redis_timeout_ms() -> u64 {
    100
}

fn default_permission_cache_ttl() -> u64 {
    3600
}

fn default_audit_write_timeout_ms() -> u64 {
    500
}

impl Config {
    /// Load from the environment (and `.env` when present), then validate.
    pub fn from_env() -> Result<Self, AuthzError> {
        dotenv::dotenv().ok();
        let config: Config =
            envy::from_env().map_err(|e| AuthzError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AuthzError> {
        if !validate_secret_strength(&self.jwt_secret_key).is_usable() {
            return Err(AuthzError::Config(
                "JWT_SECRET_KEY is too weak: use at least 32 random bytes".to_string(),
            ));
        }
        if self.jwt_expiration <= 0 {
            return Err(AuthzError::Config(
                "JWT_EXPIRATION must be positive".to_string(),
            ));
        }
        if self.jwt_refresh_expiration <= self.jwt_expiration {
            return Err(AuthzError::Config(
                "JWT_REFRESH_EXPIRATION must exceed JWT_EXPIRATION".to_string(),
            ));
        }
        if self.app_url.trim().is_empty() {
            return Err(AuthzError::Config("APP_URL must be set".to_string()));
        }
        if self.rate_limit == 0 || self.rate_limit_window == 0 {
            return Err(AuthzError::Config(
                "RATE_LIMIT and RATE_LIMIT_WINDOW must be positive".to_string(),
            ));
        }
        if self.permission_cache_ttl == 0 {
            return Err(AuthzError::Config(
                "PERMISSION_CACHE_TTL must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn token_config(&self) -> TokenConfig {
        TokenConfig {
            secret: self.jwt_secret_key.clone(),
            issuer: self.app_url.clone(),
            access_ttl_secs: self.jwt_expiration,
            refresh_ttl_secs: self.jwt_refresh_expiration,
        }
    }

    pub fn rate_limit_config(&self) -> RateLimitConfig {
        RateLimitConfig {
            max_requests: self.rate_limit,
            window_seconds: self.rate_limit_window,
            redis_timeout_ms: self.rate_limit_redis_timeout_ms,
            failure_mode: self.rate_limit_failure_mode,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}
