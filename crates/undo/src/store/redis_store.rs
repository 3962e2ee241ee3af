//! Redis-backed token store.
//!
//! Uses a `deadpool-redis` connection pool. Consumption runs as a Lua
//! script on the server so the read and the delete cannot interleave with
//! another client's consume.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Config, Pool, Runtime};

use super::{StoreError, TokenStore};

/// Server-side get-and-delete. Returns the value, or nil if absent.
const TAKE_SCRIPT: &str = r"
local value = redis.call('GET', KEYS[1])
if value then
    redis.call('DEL', KEYS[1])
end
return value
";

#[derive(Clone)]
pub struct RedisTokenStore {
    pool: Pool,
    take_script: redis::Script,
}

impl std::fmt::Debug for RedisTokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisTokenStore").finish_non_exhaustive()
    }
}

impl RedisTokenStore {
    pub fn new(pool: Pool) -> Self {
        Self {
            pool,
            take_script: redis::Script::new(TAKE_SCRIPT),
        }
    }

    /// Build a store from a Redis URL such as `redis://localhost:6379`.
    pub fn from_url(redis_url: &str) -> Result<Self, StoreError> {
        let pool = Config::from_url(redis_url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(Self::new(pool))
    }

    async fn connection(&self) -> Result<deadpool_redis::Connection, StoreError> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))
    }
}

#[async_trait]
impl TokenStore for RedisTokenStore {
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut connection = self.connection().await?;
        // SET with EX is a single command; the entry never exists without a TTL.
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut *connection)
            .await
            .map_err(|e| StoreError::Command(e.to_string()))?;
        Ok(())
    }

    async fn take(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut connection = self.connection().await?;
        let value: Option<String> = self
            .take_script
            .key(key)
            .invoke_async(&mut *connection)
            .await
            .map_err(|e| StoreError::Command(e.to_string()))?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use todo_core::undo::{generate_token, single_key};

    use super::*;

    fn store() -> RedisTokenStore {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".into());
        RedisTokenStore::from_url(&url).unwrap()
    }

    #[tokio::test]
    #[ignore = "Requires Redis instance"]
    async fn take_returns_value_once() {
        let store = store();
        let key = single_key(1, &generate_token());
        store.put(&key, "payload", Duration::from_secs(60)).await.unwrap();

        assert_eq!(store.take(&key).await.unwrap().as_deref(), Some("payload"));
        assert_eq!(store.take(&key).await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ignore = "Requires Redis instance"]
    async fn concurrent_takes_have_one_winner() {
        let store = store();
        let key = single_key(1, &generate_token());
        store.put(&key, "payload", Duration::from_secs(60)).await.unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                let key = key.clone();
                tokio::spawn(async move { store.take(&key).await.unwrap() })
            })
            .collect();
        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    #[ignore = "Requires Redis instance"]
    async fn entry_expires_with_ttl() {
        let store = store();
        let key = single_key(1, &generate_token());
        // Sub-second TTLs are rounded up to one second.
        store.put(&key, "payload", Duration::from_millis(10)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(store.take(&key).await.unwrap(), None);
    }
}
