//! Multi-tenant authorization service
//!
//! Issues and validates session tokens, evaluates role-based permissions per
//! application, throttles clients and keeps an append-only audit trail of
//! every access decision.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod middleware;
pub mod models;
pub mod security;
pub mod services;
pub mod state;

pub use error::{AuthzError, Result};
pub use state::{AppState, Repositories, ServiceSettings};

#[cfg(test)]
mod tests;
