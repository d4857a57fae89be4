use crate::error::{CacheError, CacheResult};
use crate::SharedConnectionManager;
use async_trait::async_trait;
use redis::AsyncCommands;

/// Key-value operations used by the permission cache and the rate limiter.
///
/// TTLs are in seconds. Implementations must be safe to share across tasks.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> CacheResult<()>;

    /// Delete keys. Returns the number of keys that existed.
    async fn del(&self, keys: &[String]) -> CacheResult<u64>;

    /// Increment a fixed-window counter.
    ///
    /// The first increment in a window creates the key with `ttl_secs`;
    /// later increments never extend it. Returns the post-increment count.
    async fn incr_window(&self, key: &str, ttl_secs: u64) -> CacheResult<u64>;

    /// Add a member to a set and (re)arm the set's TTL.
    async fn sadd_ex(&self, key: &str, member: &str, ttl_secs: u64) -> CacheResult<()>;

    async fn smembers(&self, key: &str) -> CacheResult<Vec<String>>;

    async fn ping(&self) -> CacheResult<()>;
}

/// Redis-backed `CacheStore`.
#[derive(Clone)]
pub struct RedisStore {
    redis: SharedConnectionManager,
}

impl RedisStore {
    pub fn new(redis: SharedConnectionManager) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.redis.lock().await;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> CacheResult<()> {
        let mut conn = self.redis.lock().await;
        conn.set_ex::<_, _, ()>(key, value, ttl_secs).await?;
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> CacheResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.redis.lock().await;
        let removed: u64 = conn.del(keys).await?;
        Ok(removed)
    }

    async fn incr_window(&self, key: &str, ttl_secs: u64) -> CacheResult<u64> {
        let mut conn = self.redis.lock().await;

        // SET NX seeds the window with its TTL; INCR keeps the existing TTL.
        let (_, count): (Option<String>, u64) = redis::pipe()
            .atomic()
            .cmd("SET")
            .arg(key)
            .arg(0)
            .arg("EX")
            .arg(ttl_secs)
            .arg("NX")
            .cmd("INCR")
            .arg(key)
            .query_async(&mut *conn)
            .await
            .map_err(|e| match e.kind() {
                redis::ErrorKind::TypeError => CacheError::WrongType(key.to_string()),
                _ => CacheError::Redis(e),
            })?;

        Ok(count)
    }

    async fn sadd_ex(&self, key: &str, member: &str, ttl_secs: u64) -> CacheResult<()> {
        let mut conn = self.redis.lock().await;
        redis::pipe()
            .atomic()
            .sadd(key, member)
            .ignore()
            .expire(key, ttl_secs as i64)
            .ignore()
            .query_async::<_, ()>(&mut *conn)
            .await?;
        Ok(())
    }

    async fn smembers(&self, key: &str) -> CacheResult<Vec<String>> {
        let mut conn = self.redis.lock().await;
        let members: Vec<String> = conn.smembers(key).await?;
        Ok(members)
    }

    async fn ping(&self) -> CacheResult<()> {
        let mut conn = self.redis.lock().await;
        redis::cmd("PING").query_async::<_, String>(&mut *conn).await?;
        Ok(())
    }
}
