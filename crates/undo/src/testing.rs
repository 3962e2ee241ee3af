//! Shared fixtures for the coordinator and batch tests.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use todo_core::types::DbId;
use todo_events::EventBus;

use crate::config::UndoConfig;
use crate::coordinator::UndoCoordinator;
use crate::gateway::memory::MemoryGateway;
use crate::issuer::UndoIssuer;
use crate::store::{MemoryTokenStore, StoreError, TokenStore};
use crate::Clock;

pub(crate) const OWNER: DbId = 1;
pub(crate) const OTHER: DbId = 2;

/// A store that refuses every call.
pub(crate) struct DownStore;

#[async_trait]
impl TokenStore for DownStore {
    async fn put(&self, _: &str, _: &str, _: Duration) -> Result<(), StoreError> {
        Err(StoreError::Connection("connection refused".into()))
    }

    async fn take(&self, _: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::Connection("connection refused".into()))
    }
}

pub(crate) struct Harness {
    pub gateway: Arc<MemoryGateway>,
    pub events: Arc<EventBus>,
    pub issuer: UndoIssuer,
    pub coordinator: UndoCoordinator,
    offset_secs: Arc<AtomicI64>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryTokenStore::new()))
    }

    pub fn with_store(store: Arc<dyn TokenStore>) -> Self {
        Self::build(store, UndoConfig::default())
    }

    pub fn build(store: Arc<dyn TokenStore>, config: UndoConfig) -> Self {
        let offset_secs = Arc::new(AtomicI64::new(0));
        let offset = offset_secs.clone();
        let clock: Clock = Arc::new(move || {
            chrono::Utc::now() + chrono::Duration::seconds(offset.load(Ordering::SeqCst))
        });

        let gateway = Arc::new(MemoryGateway::new());
        let events = Arc::new(EventBus::default());
        Self {
            issuer: UndoIssuer::new(store.clone(), config.clone(), clock.clone()),
            coordinator: UndoCoordinator::new(
                store,
                gateway.clone(),
                events.clone(),
                config,
                clock,
            ),
            gateway,
            events,
            offset_secs,
        }
    }

    /// Move the coordinator's clock forward without touching the store.
    pub fn advance_clock(&self, secs: i64) {
        self.offset_secs.fetch_add(secs, Ordering::SeqCst);
    }
}
