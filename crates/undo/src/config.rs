use std::time::Duration;

use todo_core::undo::{DEFAULT_MAX_BATCH_SIZE, DEFAULT_TTL_SECS};

/// Default per-round-trip bound on token store calls, in milliseconds.
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 2000;

/// Deployment-wide undo settings.
#[derive(Debug, Clone)]
pub struct UndoConfig {
    /// How long a token stays redeemable. Applies to every token; there is
    /// no per-call override.
    pub ttl: Duration,
    /// Upper bound on the number of items a batch token may carry.
    pub max_batch_size: usize,
    /// Bound on each store round-trip.
    pub store_timeout: Duration,
}

impl Default for UndoConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            store_timeout: Duration::from_millis(DEFAULT_STORE_TIMEOUT_MS),
        }
    }
}

impl UndoConfig {
    /// Load undo configuration from environment variables.
    ///
    /// | Env Var                 | Default |
    /// |-------------------------|---------|
    /// | `UNDO_TTL_SECS`         | `60`    |
    /// | `UNDO_MAX_BATCH_SIZE`   | `100`   |
    /// | `UNDO_STORE_TIMEOUT_MS` | `2000`  |
    ///
    /// # Panics
    ///
    /// Panics if a value is not a positive integer.
    pub fn from_env() -> Self {
        let ttl_secs: u64 = std::env::var("UNDO_TTL_SECS")
            .unwrap_or_else(|_| DEFAULT_TTL_SECS.to_string())
            .parse()
            .expect("UNDO_TTL_SECS must be a valid u64");
        assert!(ttl_secs > 0, "UNDO_TTL_SECS must be greater than zero");

        let max_batch_size: usize = std::env::var("UNDO_MAX_BATCH_SIZE")
            .unwrap_or_else(|_| DEFAULT_MAX_BATCH_SIZE.to_string())
            .parse()
            .expect("UNDO_MAX_BATCH_SIZE must be a valid usize");
        assert!(max_batch_size > 0, "UNDO_MAX_BATCH_SIZE must be greater than zero");

        let store_timeout_ms: u64 = std::env::var("UNDO_STORE_TIMEOUT_MS")
            .unwrap_or_else(|_| DEFAULT_STORE_TIMEOUT_MS.to_string())
            .parse()
            .expect("UNDO_STORE_TIMEOUT_MS must be a valid u64");

        Self {
            ttl: Duration::from_secs(ttl_secs),
            max_batch_size,
            store_timeout: Duration::from_millis(store_timeout_ms),
        }
    }

    /// TTL in whole seconds, as advertised to clients in `undoExpiresIn`.
    pub fn ttl_secs(&self) -> u64 {
        self.ttl.as_secs()
    }
}
