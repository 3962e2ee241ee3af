//! Token store adapter.
//!
//! Exposes exactly two primitives over the shared ephemeral store: a TTL'd
//! write and an atomic get-and-delete. There is intentionally no read that
//! leaves the entry in place.

pub mod memory;
pub mod redis_store;

use std::time::Duration;

use async_trait::async_trait;

pub use self::memory::MemoryTokenStore;
pub use self::redis_store::RedisTokenStore;

/// Infrastructure failure talking to the token store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("token store connection failed: {0}")]
    Connection(String),

    #[error("token store command failed: {0}")]
    Command(String),

    #[error("token store call timed out after {0:?}")]
    Timeout(Duration),
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Write `value` under `key`, expiring after `ttl`.
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Read and delete `key` as one indivisible operation. At most one
    /// caller ever observes a given value.
    async fn take(&self, key: &str) -> Result<Option<String>, StoreError>;
}

/// Run a store call under `limit`, mapping elapsed time to [`StoreError::Timeout`].
pub(crate) async fn bounded<T, F>(limit: Duration, call: F) -> Result<T, StoreError>
where
    F: std::future::Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(limit)),
    }
}
