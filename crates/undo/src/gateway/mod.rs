//! Owner-scoped access to the primary entities.
//!
//! Both the entity services (HTTP handlers) and the undo coordinator go
//! through [`EntityGateway`]. Every lookup takes the owner id; there is no
//! bare-id fetch.

#[cfg(any(test, feature = "test-support"))]
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use todo_core::types::DbId;
use todo_db::models::project::{CreateProject, Project};
use todo_db::models::tag::{CreateTag, Tag};
use todo_db::models::task::{CreateTask, Task};

pub use self::postgres::PgGateway;

#[async_trait]
pub trait EntityGateway: Send + Sync {
    /// Confirm the backing datastore is reachable.
    async fn ping(&self) -> Result<(), sqlx::Error>;

    // -- tasks --

    async fn create_task(&self, owner_id: DbId, input: &CreateTask) -> Result<Task, sqlx::Error>;

    async fn find_task(&self, owner_id: DbId, id: DbId) -> Result<Option<Task>, sqlx::Error>;

    async fn list_tasks(&self, owner_id: DbId) -> Result<Vec<Task>, sqlx::Error>;

    /// Tasks among `ids` owned by `owner_id`; others are skipped.
    async fn find_tasks(&self, owner_id: DbId, ids: &[DbId]) -> Result<Vec<Task>, sqlx::Error>;

    /// Flush all mutable columns. `None` if the row is gone.
    async fn save_task(&self, task: &Task) -> Result<Option<Task>, sqlx::Error>;

    /// Re-create a deleted task under its original id. `None` on id collision.
    async fn insert_task(&self, task: &Task) -> Result<Option<Task>, sqlx::Error>;

    async fn delete_task(&self, owner_id: DbId, id: DbId) -> Result<bool, sqlx::Error>;

    // -- projects --

    async fn create_project(
        &self,
        owner_id: DbId,
        input: &CreateProject,
    ) -> Result<Project, sqlx::Error>;

    async fn find_project(&self, owner_id: DbId, id: DbId) -> Result<Option<Project>, sqlx::Error>;

    async fn list_projects(&self, owner_id: DbId) -> Result<Vec<Project>, sqlx::Error>;

    async fn save_project(&self, project: &Project) -> Result<Option<Project>, sqlx::Error>;

    async fn insert_project(&self, project: &Project) -> Result<Option<Project>, sqlx::Error>;

    /// Delete a project, detaching its child projects and tasks.
    async fn delete_project(&self, owner_id: DbId, id: DbId) -> Result<bool, sqlx::Error>;

    /// `true` if `target_id` is `start_id` or one of its ancestors.
    async fn project_chain_contains(
        &self,
        owner_id: DbId,
        start_id: DbId,
        target_id: DbId,
    ) -> Result<bool, sqlx::Error>;

    // -- tags --

    async fn create_tag(&self, owner_id: DbId, input: &CreateTag) -> Result<Tag, sqlx::Error>;

    async fn list_tags(&self, owner_id: DbId) -> Result<Vec<Tag>, sqlx::Error>;

    /// The subset of `ids` that exist and belong to `owner_id`.
    async fn find_owned_tag_ids(
        &self,
        owner_id: DbId,
        ids: &[DbId],
    ) -> Result<Vec<DbId>, sqlx::Error>;
}
