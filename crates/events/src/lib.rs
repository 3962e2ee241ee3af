//! In-process event bus for the todo-me backend.
//!
//! - [`EventBus`]: publish/subscribe hub backed by `tokio::sync::broadcast`.
//! - [`PlatformEvent`]: the canonical domain event envelope.
//! - [`CACHE_INVALIDATE`]: the owner-scoped signal read-side caches
//!   listen for after any undoable mutation or undo restoration.

pub mod bus;

pub use bus::{EventBus, PlatformEvent, Subject, CACHE_INVALIDATE};
