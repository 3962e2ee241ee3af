//! Undo token vocabulary: action kinds, entity types, token generation and
//! store key layout.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default number of seconds an undo token stays redeemable.
pub const DEFAULT_TTL_SECS: u64 = 60;

/// Default ceiling on the number of items a batch token may carry.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 100;

/// Length of a generated token string (alphanumeric, ~5.95 bits per char).
pub const TOKEN_LENGTH: usize = 48;

/// Prefix that marks a token as a batch token.
pub const BATCH_TOKEN_PREFIX: &str = "batch_";

/// Number of leading token characters that may appear in logs.
pub const LOG_PREFIX_LENGTH: usize = 8;

const SINGLE_KEY_NAMESPACE: &str = "undo";
const BATCH_KEY_NAMESPACE: &str = "undo-batch";

// ---------------------------------------------------------------------------
// ActionKind
// ---------------------------------------------------------------------------

/// The kind of mutation an undo token reverses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Create,
    Update,
    Delete,
    StatusChange,
    Archive,
    Move,
    Reorder,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Create => "create",
            ActionKind::Update => "update",
            ActionKind::Delete => "delete",
            ActionKind::StatusChange => "status_change",
            ActionKind::Archive => "archive",
            ActionKind::Move => "move",
            ActionKind::Reorder => "reorder",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// EntityType
// ---------------------------------------------------------------------------

/// Record kinds that can be the target of an undo token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Task,
    Project,
}

impl EntityType {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityType::Task => "task",
            EntityType::Project => "project",
        }
    }

    /// Entity name used in [`CoreError::NotFound`].
    pub fn label(self) -> &'static str {
        match self {
            EntityType::Task => "Task",
            EntityType::Project => "Project",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "task" => Ok(EntityType::Task),
            "project" => Ok(EntityType::Project),
            other => Err(CoreError::Validation(format!(
                "Invalid entity type '{other}'. Must be one of: task, project"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Token generation
// ---------------------------------------------------------------------------

fn random_token_body() -> String {
    rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// Generate an opaque token for a single undo.
pub fn generate_token() -> String {
    random_token_body()
}

/// Generate an opaque token for a batch undo.
pub fn generate_batch_token() -> String {
    format!("{BATCH_TOKEN_PREFIX}{}", random_token_body())
}

/// Returns `true` if the token was minted by [`generate_batch_token`].
pub fn is_batch_token(token: &str) -> bool {
    token.starts_with(BATCH_TOKEN_PREFIX)
}

/// Cheap shape check applied before any store round-trip.
///
/// Rejects anything that could not have been minted here, including
/// strings containing the `:` key separator.
pub fn is_well_formed_token(token: &str) -> bool {
    let body = token.strip_prefix(BATCH_TOKEN_PREFIX).unwrap_or(token);
    body.len() == TOKEN_LENGTH && body.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// Truncated token suitable for log fields.
pub fn log_prefix(token: &str) -> &str {
    let body = token.strip_prefix(BATCH_TOKEN_PREFIX).unwrap_or(token);
    let end = body
        .char_indices()
        .nth(LOG_PREFIX_LENGTH)
        .map_or(body.len(), |(i, _)| i);
    &body[..end]
}

// ---------------------------------------------------------------------------
// Store keys
// ---------------------------------------------------------------------------

/// Store key for a single undo token: `undo:{owner_id}:{token}`.
pub fn single_key(owner_id: DbId, token: &str) -> String {
    format!("{SINGLE_KEY_NAMESPACE}:{owner_id}:{token}")
}

/// Store key for a batch undo token: `undo-batch:{owner_id}:{token}`.
pub fn batch_key(owner_id: DbId, token: &str) -> String {
    format!("{BATCH_KEY_NAMESPACE}:{owner_id}:{token}")
}
