//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! Every undoable mutation and every undo restoration publishes an
//! owner-scoped [`PlatformEvent`] here. Read-side caches subscribe and evict
//! the owner's entries when a [`CACHE_INVALIDATE`] event arrives.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use todo_core::types::DbId;

/// Event type emitted whenever an owner's cached aggregate views are stale.
pub const CACHE_INVALIDATE: &str = "cache.invalidate";

/// Bounded so a stalled subscriber cannot grow memory without limit.
const DEFAULT_CAPACITY: usize = 1024;

// ---------------------------------------------------------------------------
// PlatformEvent
// ---------------------------------------------------------------------------

/// What an event is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Subject {
    /// A single task or project.
    Entity { entity_type: String, entity_id: DbId },
    /// Several records touched by one batch operation or batch undo.
    Batch { items: usize },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformEvent {
    /// Dot-separated event name, e.g. `"cache.invalidate"`.
    pub event_type: String,
    /// The user whose data changed. Events never cross owners.
    pub owner_id: Option<DbId>,
    pub subject: Option<Subject>,
    pub timestamp: DateTime<Utc>,
}

impl PlatformEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            owner_id: None,
            subject: None,
            timestamp: Utc::now(),
        }
    }

    /// Invalidation after a change to one entity.
    pub fn cache_invalidation(owner_id: DbId, entity_type: &str, entity_id: DbId) -> Self {
        Self::new(CACHE_INVALIDATE)
            .for_owner(owner_id)
            .about(Subject::Entity {
                entity_type: entity_type.to_owned(),
                entity_id,
            })
    }

    /// Invalidation after a batch operation touched `items` records.
    pub fn batch_invalidation(owner_id: DbId, items: usize) -> Self {
        Self::new(CACHE_INVALIDATE)
            .for_owner(owner_id)
            .about(Subject::Batch { items })
    }

    pub fn for_owner(mut self, owner_id: DbId) -> Self {
        self.owner_id = Some(owner_id);
        self
    }

    pub fn about(mut self, subject: Subject) -> Self {
        self.subject = Some(subject);
        self
    }

    /// The owner whose caches must be dropped, if this is an invalidation.
    pub fn invalidated_owner(&self) -> Option<DbId> {
        if self.event_type == CACHE_INVALIDATE {
            self.owner_id
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Fan-out bus, shared as `Arc<EventBus>`.
///
/// ```rust
/// use todo_events::bus::{EventBus, PlatformEvent};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(PlatformEvent::cache_invalidation(7, "task", 42));
/// assert_eq!(rx.try_recv().unwrap().invalidated_owner(), Some(7));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<PlatformEvent>,
}

impl EventBus {
    /// When the buffer is full the oldest events are overwritten and slow
    /// receivers observe `Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, event: PlatformEvent) {
        tracing::trace!(
            event_type = %event.event_type,
            owner_id = ?event.owner_id,
            "Publishing event"
        );
        // SendError only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlatformEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
