//! # Actix Middleware Library
//!
//! HTTP middleware shared by the authorization services
//!
//! ## Modules
//! - `client_ip`: client address resolution from forwarding headers
//! - `rate_limit`: fixed-window rate limiting per client address
//! - `security_headers`: standard hardening response headers
//! - `correlation_id`: request correlation IDs
//! - `logging`: structured request logging
//! - `metrics`: Prometheus HTTP and decision metrics

pub mod client_ip;
pub mod correlation_id;
pub mod logging;
pub mod metrics;
pub mod rate_limit;
pub mod security_headers;

pub use client_ip::{client_address, resolve_client_address, user_agent, UNKNOWN_CLIENT_ADDRESS};
pub use correlation_id::{get_correlation_id, CorrelationId, CorrelationIdMiddleware};
pub use logging::Logging;
pub use metrics::{HttpMetrics, MetricsMiddleware};
pub use rate_limit::{
    rate_limit_key, rate_limited_response, unavailable_response, Admission, FailureMode,
    RateLimitConfig, RateLimitMiddleware, RateLimiter, RATE_LIMIT_EXCEEDED,
};
pub use security_headers::SecurityHeaders;
