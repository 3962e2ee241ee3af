//! Undo token records as they are serialized into the token store.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::snapshot::Snapshot;
use crate::types::{DbId, Timestamp};
use crate::undo::{ActionKind, EntityType};

/// A single-operation undo token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UndoToken {
    pub token: String,
    pub owner_id: DbId,
    pub action_kind: ActionKind,
    pub entity_type: EntityType,
    pub entity_id: DbId,
    pub snapshot: Snapshot,
    pub issued_at: Timestamp,
    pub expires_at: Timestamp,
}

impl UndoToken {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        token: String,
        owner_id: DbId,
        action_kind: ActionKind,
        entity_type: EntityType,
        entity_id: DbId,
        snapshot: Snapshot,
        issued_at: Timestamp,
        ttl: Duration,
    ) -> Self {
        Self {
            token,
            owner_id,
            action_kind,
            entity_type,
            entity_id,
            snapshot,
            issued_at,
            expires_at: issued_at + ttl,
        }
    }

    /// A token is stale once `now` reaches `expires_at`, regardless of
    /// whether the store has evicted it yet.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }
}

/// One reversible operation inside a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItem {
    pub entity_type: EntityType,
    pub entity_id: DbId,
    pub action_kind: ActionKind,
    pub snapshot: Snapshot,
}

/// A token covering several operations, restored in reverse order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchUndoToken {
    pub token: String,
    pub owner_id: DbId,
    /// Items in original execution order.
    pub items: Vec<BatchItem>,
    pub issued_at: Timestamp,
    pub expires_at: Timestamp,
}

impl BatchUndoToken {
    pub fn new(
        token: String,
        owner_id: DbId,
        items: Vec<BatchItem>,
        issued_at: Timestamp,
        ttl: Duration,
    ) -> Self {
        Self {
            token,
            owner_id,
            items,
            issued_at,
            expires_at: issued_at + ttl,
        }
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }

    /// Items in the order they must be restored (last executed first).
    pub fn restore_order(&self) -> impl Iterator<Item = &BatchItem> {
        self.items.iter().rev()
    }
}
