//! Redis plumbing shared by the authorization services.
//!
//! - `RedisPool`: connection manager construction, owned by the process startup routine
//! - `CacheStore`: the key-value operations the core issues (get, set-with-TTL,
//!   delete, fixed-window increment, scope index sets)
//! - `RedisStore` / `MemoryStore`: Redis-backed and in-process implementations

mod error;
mod memory;
mod store;

pub use error::{CacheError, CacheResult};
pub use memory::MemoryStore;
pub use store::{CacheStore, RedisStore};

use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use redis::{Client, ConnectionInfo, IntoConnectionInfo};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::info;

/// Shared Redis connection manager guarded by a Tokio mutex.
pub type SharedConnectionManager = Arc<Mutex<ConnectionManager>>;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Redis connection pool.
///
/// Constructed once at startup and handed to every service that needs the
/// cache; there is no process-global instance.
pub struct RedisPool {
    manager: SharedConnectionManager,
}

impl RedisPool {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let info: ConnectionInfo = redis_url
            .into_connection_info()
            .context("failed to parse REDIS_URL connection string")?;

        let db = info.redis.db;
        let client = Client::open(info).context("failed to construct Redis client")?;

        let connection_manager = timeout(DEFAULT_CONNECT_TIMEOUT, ConnectionManager::new(client))
            .await
            .context("timed out connecting to Redis")?
            .context("failed to initialize Redis connection manager")?;

        info!(db, "Redis connection manager initialized");

        Ok(Self {
            manager: Arc::new(Mutex::new(connection_manager)),
        })
    }

    pub fn manager(&self) -> SharedConnectionManager {
        self.manager.clone()
    }

    /// Build a `RedisStore` over this pool's connection manager.
    pub fn store(&self) -> RedisStore {
        RedisStore::new(self.manager())
    }
}
