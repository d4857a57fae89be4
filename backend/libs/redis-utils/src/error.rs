//! Cache error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Cache operation timed out after {0}ms")]
    Timeout(u64),

    #[error("Wrong value type at key {0}")]
    WrongType(String),

    #[error("Invalid cache data: {0}")]
    InvalidData(String),
}

pub type CacheResult<T> = Result<T, CacheError>;
