//! Fixed-window rate limiting per client address
//!
//! One counter per address under `rate_limit:{address}`. The first request in a
//! window creates the counter with the window TTL; increments never extend it.
//! A burst straddling a window boundary can therefore admit up to twice the limit.

use crate::client_ip::client_address;
use actix_web::{
    body::{EitherBody, MessageBody},
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpResponse,
};
use futures::future::{ready, Ready};
use redis_utils::{CacheError, CacheStore};
use serde::Deserialize;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

pub const RATE_LIMIT_EXCEEDED: &str = "Rate limit exceeded";

/// What to do when the counter store is slow or unreachable
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// Admit the request and log a warning
    #[default]
    FailOpen,
    /// Reject with 503
    FailClosed,
}

impl std::str::FromStr for FailureMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail_open" | "open" => Ok(FailureMode::FailOpen),
            "fail_closed" | "closed" => Ok(FailureMode::FailClosed),
            other => Err(format!("unknown rate limit failure mode: {other}")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub max_requests: u64,
    pub window_seconds: u64,
    /// Store operation timeout in milliseconds
    pub redis_timeout_ms: u64,
    #[serde(default)]
    pub failure_mode: FailureMode,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window_seconds: 3600,
            redis_timeout_ms: 100,
            failure_mode: FailureMode::FailOpen,
        }
    }
}

/// Outcome of a rate-limit check after timeout and failure-mode handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    Limited,
    /// Store failed and the limiter is configured to fail closed
    Unavailable,
}

pub fn rate_limit_key(client_address: &str) -> String {
    format!("rate_limit:{}", client_address)
}

pub struct RateLimiter {
    store: Arc<dyn CacheStore>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CacheStore>, config: RateLimitConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Count this request against `client_address`.
    ///
    /// Returns `true` while the post-increment count is within the limit.
    pub async fn admit(&self, client_address: &str) -> Result<bool, CacheError> {
        let key = rate_limit_key(client_address);
        let count = self
            .store
            .incr_window(&key, self.config.window_seconds)
            .await?;
        Ok(count <= self.config.max_requests)
    }

    /// `admit` bounded by the store timeout, with the failure mode applied.
    pub async fn check(&self, client_address: &str) -> Admission {
        let result = timeout(
            Duration::from_millis(self.config.redis_timeout_ms),
            self.admit(client_address),
        )
        .await;

        let failure = match result {
            Ok(Ok(true)) => return Admission::Admitted,
            Ok(Ok(false)) => {
                tracing::info!(client_address, "Rate limit exceeded");
                return Admission::Limited;
            }
            Ok(Err(e)) => e,
            Err(_) => CacheError::Timeout(self.config.redis_timeout_ms),
        };

        match self.config.failure_mode {
            FailureMode::FailOpen => {
                tracing::warn!(error = %failure, "Rate limit store error (allowing request)");
                Admission::Admitted
            }
            FailureMode::FailClosed => {
                tracing::error!(error = %failure, "Rate limit store error (rejecting request)");
                Admission::Unavailable
            }
        }
    }
}

pub fn rate_limited_response() -> HttpResponse {
    HttpResponse::TooManyRequests().json(serde_json::json!({ "error": RATE_LIMIT_EXCEEDED }))
}

pub fn unavailable_response() -> HttpResponse {
    HttpResponse::ServiceUnavailable()
        .json(serde_json::json!({ "error": "Service temporarily unavailable" }))
}

/// Standalone rate-limit middleware for routes outside the authorization pipeline
pub struct RateLimitMiddleware {
    limiter: Arc<RateLimiter>,
}

impl RateLimitMiddleware {
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self { limiter }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimitMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RateLimitMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitMiddlewareService {
            service: Rc::new(service),
            limiter: self.limiter.clone(),
        }))
    }
}

pub struct RateLimitMiddlewareService<S> {
    service: Rc<S>,
    limiter: Arc<RateLimiter>,
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let limiter = self.limiter.clone();

        Box::pin(async move {
            let address = client_address(&req);

            match limiter.check(&address).await {
                Admission::Admitted => {
                    let res = service.call(req).await?;
                    Ok(res.map_into_left_body())
                }
                Admission::Limited => Ok(req
                    .into_response(rate_limited_response())
                    .map_into_right_body()),
                Admission::Unavailable => Ok(req
                    .into_response(unavailable_response())
                    .map_into_right_body()),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redis_utils::MemoryStore;

    fn limiter(store: Arc<MemoryStore>, max_requests: u64, window_seconds: u64) -> RateLimiter {
        RateLimiter::new(
            store,
            RateLimitConfig {
                max_requests,
                window_seconds,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_rate_limit_config_default() {
        let config = RateLimitConfig::default();
        assert_eq!(config.max_requests, 100);
        assert_eq!(config.window_seconds, 3600);
        assert_eq!(config.redis_timeout_ms, 100);
        assert_eq!(config.failure_mode, FailureMode::FailOpen);
    }

    #[test]
    fn test_failure_mode_parsing() {
        assert_eq!("fail_open".parse::<FailureMode>(), Ok(FailureMode::FailOpen));
        assert_eq!("CLOSED".parse::<FailureMode>(), Ok(FailureMode::FailClosed));
        assert!("sometimes".parse::<FailureMode>().is_err());
    }

    #[test]
    fn test_rate_limit_key_format() {
        assert_eq!(rate_limit_key("192.168.1.1"), "rate_limit:192.168.1.1");
    }

    #[tokio::test]
    async fn test_limit_plus_one_is_denied() {
        // GIVEN: a limit of 3 per window
        let store = Arc::new(MemoryStore::new());
        let limiter = limiter(store.clone(), 3, 60);

        // WHEN: 4 requests arrive from one address
        let mut results = Vec::new();
        for _ in 0..4 {
            results.push(limiter.admit("10.0.0.1").await.unwrap());
        }

        // THEN: the 4th is denied while other addresses are unaffected
        assert_eq!(results, vec![true, true, true, false]);
        assert!(limiter.admit("10.0.0.2").await.unwrap());
        assert!(store.ttl("rate_limit:10.0.0.1").unwrap() <= Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_window_expiry_readmits() {
        let store = Arc::new(MemoryStore::new());
        let limiter = limiter(store, 1, 1);

        assert!(limiter.admit("10.0.0.1").await.unwrap());
        assert!(!limiter.admit("10.0.0.1").await.unwrap());

        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert!(limiter.admit("10.0.0.1").await.unwrap());
    }

    #[tokio::test]
    async fn test_fail_open_admits_on_store_error() {
        let store = Arc::new(MemoryStore::new());
        store.set_unavailable(true);
        let limiter = limiter(store, 1, 60);

        assert_eq!(limiter.check("10.0.0.1").await, Admission::Admitted);
    }

    #[tokio::test]
    async fn test_fail_closed_rejects_on_store_error() {
        let store = Arc::new(MemoryStore::new());
        store.set_unavailable(true);
        let limiter = RateLimiter::new(
            store,
            RateLimitConfig {
                failure_mode: FailureMode::FailClosed,
                ..Default::default()
            },
        );

        assert_eq!(limiter.check("10.0.0.1").await, Admission::Unavailable);
    }
}
