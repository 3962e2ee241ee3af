//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument. Every lookup of a user-owned row
//! is scoped by `owner_id`; there is deliberately no bare-id lookup.

pub mod project_repo;
pub mod tag_repo;
pub mod task_repo;

pub use project_repo::ProjectRepo;
pub use tag_repo::TagRepo;
pub use task_repo::TaskRepo;
