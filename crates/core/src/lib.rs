//! Pure domain types for the todo-me undo subsystem.
//!
//! Nothing in this crate performs I/O. Persistence lives in `todo-db`,
//! the token store and restoration flow in `todo-undo`.

pub mod error;
pub mod snapshot;
pub mod token;
pub mod types;
pub mod undo;
