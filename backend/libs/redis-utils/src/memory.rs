use crate::error::{CacheError, CacheResult};
use crate::store::CacheStore;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    Set(HashSet<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

/// In-process `CacheStore` with Redis-compatible TTL semantics.
///
/// Used for single-node deployments and tests. `set_unavailable(true)`
/// makes every operation fail the way an unreachable Redis would.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
    unavailable: AtomicBool,
    gets: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of `get` calls served so far.
    pub fn get_count(&self) -> u64 {
        self.gets.load(Ordering::SeqCst)
    }

    /// Whether a live key exists.
    pub fn contains(&self, key: &str) -> bool {
        let now = Instant::now();
        self.lock()
            .get(key)
            .map(|e| e.is_live(now))
            .unwrap_or(false)
    }

    /// Remaining TTL of a live key, if it has one.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.lock()
            .get(key)
            .filter(|e| e.is_live(now))
            .and_then(|e| e.expires_at)
            .map(|at| at.saturating_duration_since(now))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry>> {
        // A panic while holding the lock cannot leave a map half-updated.
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn check_available(&self) -> CacheResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CacheError::Redis(redis::RedisError::from((
                redis::ErrorKind::IoError,
                "store unavailable",
            ))));
        }
        Ok(())
    }

    fn live_entry<'a>(
        map: &'a mut HashMap<String, Entry>,
        key: &str,
        now: Instant,
    ) -> Option<&'a mut Entry> {
        if map.get(key).is_some_and(|e| !e.is_live(now)) {
            map.remove(key);
        }
        map.get_mut(key)
    }
}

fn expiry(ttl_secs: u64) -> Option<Instant> {
    Some(Instant::now() + Duration::from_secs(ttl_secs))
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        self.check_available()?;
        self.gets.fetch_add(1, Ordering::SeqCst);
        let now = Instant::now();
        let mut map = self.lock();
        match Self::live_entry(&mut map, key, now) {
            None => Ok(None),
            Some(Entry {
                value: Value::Str(s),
                ..
            }) => Ok(Some(s.clone())),
            Some(_) => Err(CacheError::WrongType(key.to_string())),
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> CacheResult<()> {
        self.check_available()?;
        self.lock().insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at: expiry(ttl_secs),
            },
        );
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> CacheResult<u64> {
        self.check_available()?;
        let now = Instant::now();
        let mut map = self.lock();
        let removed = keys
            .iter()
            .filter_map(|k| map.remove(k))
            .filter(|e| e.is_live(now))
            .count();
        Ok(removed as u64)
    }

    async fn incr_window(&self, key: &str, ttl_secs: u64) -> CacheResult<u64> {
        self.check_available()?;
        let now = Instant::now();
        let mut map = self.lock();
        match Self::live_entry(&mut map, key, now) {
            Some(entry) => match &mut entry.value {
                Value::Str(s) => {
                    let current: u64 = s
                        .parse()
                        .map_err(|_| CacheError::WrongType(key.to_string()))?;
                    let next = current + 1;
                    *s = next.to_string();
                    Ok(next)
                }
                Value::Set(_) => Err(CacheError::WrongType(key.to_string())),
            },
            None => {
                map.insert(
                    key.to_string(),
                    Entry {
                        value: Value::Str("1".to_string()),
                        expires_at: expiry(ttl_secs),
                    },
                );
                Ok(1)
            }
        }
    }

    async fn sadd_ex(&self, key: &str, member: &str, ttl_secs: u64) -> CacheResult<()> {
        self.check_available()?;
        let now = Instant::now();
        let mut map = self.lock();
        match Self::live_entry(&mut map, key, now) {
            Some(entry) => match &mut entry.value {
                Value::Set(set) => {
                    set.insert(member.to_string());
                    entry.expires_at = expiry(ttl_secs);
                }
                Value::Str(_) => return Err(CacheError::WrongType(key.to_string())),
            },
            None => {
                map.insert(
                    key.to_string(),
                    Entry {
                        value: Value::Set(HashSet::from([member.to_string()])),
                        expires_at: expiry(ttl_secs),
                    },
                );
            }
        }
        Ok(())
    }

    async fn smembers(&self, key: &str) -> CacheResult<Vec<String>> {
        self.check_available()?;
        let now = Instant::now();
        let mut map = self.lock();
        match Self::live_entry(&mut map, key, now) {
            None => Ok(Vec::new()),
            Some(Entry {
                value: Value::Set(set),
                ..
            }) => Ok(set.iter().cloned().collect()),
            Some(_) => Err(CacheError::WrongType(key.to_string())),
        }
    }

    async fn ping(&self) -> CacheResult<()> {
        self.check_available()
    }
}
