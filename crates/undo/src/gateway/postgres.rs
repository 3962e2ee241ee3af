//! [`EntityGateway`] over the `todo-db` repositories.

use async_trait::async_trait;
use todo_core::types::DbId;
use todo_db::models::project::{CreateProject, Project};
use todo_db::models::tag::{CreateTag, Tag};
use todo_db::models::task::{CreateTask, Task};
use todo_db::repositories::{ProjectRepo, TagRepo, TaskRepo};
use todo_db::DbPool;

use super::EntityGateway;

#[derive(Clone)]
pub struct PgGateway {
    pool: DbPool,
}

impl PgGateway {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EntityGateway for PgGateway {
    async fn ping(&self) -> Result<(), sqlx::Error> {
        todo_db::health_check(&self.pool).await
    }

    async fn create_task(&self, owner_id: DbId, input: &CreateTask) -> Result<Task, sqlx::Error> {
        TaskRepo::create(&self.pool, owner_id, input).await
    }

    async fn find_task(&self, owner_id: DbId, id: DbId) -> Result<Option<Task>, sqlx::Error> {
        TaskRepo::find_by_owner_and_id(&self.pool, owner_id, id).await
    }

    async fn list_tasks(&self, owner_id: DbId) -> Result<Vec<Task>, sqlx::Error> {
        TaskRepo::list_for_owner(&self.pool, owner_id).await
    }

    async fn find_tasks(&self, owner_id: DbId, ids: &[DbId]) -> Result<Vec<Task>, sqlx::Error> {
        TaskRepo::find_many_by_owner(&self.pool, owner_id, ids).await
    }

    async fn save_task(&self, task: &Task) -> Result<Option<Task>, sqlx::Error> {
        TaskRepo::save(&self.pool, task).await
    }

    async fn insert_task(&self, task: &Task) -> Result<Option<Task>, sqlx::Error> {
        TaskRepo::insert_with_id(&self.pool, task).await
    }

    async fn delete_task(&self, owner_id: DbId, id: DbId) -> Result<bool, sqlx::Error> {
        TaskRepo::delete(&self.pool, owner_id, id).await
    }

    async fn create_project(
        &self,
        owner_id: DbId,
        input: &CreateProject,
    ) -> Result<Project, sqlx::Error> {
        ProjectRepo::create(&self.pool, owner_id, input).await
    }

    async fn find_project(&self, owner_id: DbId, id: DbId) -> Result<Option<Project>, sqlx::Error> {
        ProjectRepo::find_by_owner_and_id(&self.pool, owner_id, id).await
    }

    async fn list_projects(&self, owner_id: DbId) -> Result<Vec<Project>, sqlx::Error> {
        ProjectRepo::list_for_owner(&self.pool, owner_id).await
    }

    async fn save_project(&self, project: &Project) -> Result<Option<Project>, sqlx::Error> {
        ProjectRepo::save(&self.pool, project).await
    }

    async fn insert_project(&self, project: &Project) -> Result<Option<Project>, sqlx::Error> {
        ProjectRepo::insert_with_id(&self.pool, project).await
    }

    async fn delete_project(&self, owner_id: DbId, id: DbId) -> Result<bool, sqlx::Error> {
        ProjectRepo::delete(&self.pool, owner_id, id).await
    }

    async fn project_chain_contains(
        &self,
        owner_id: DbId,
        start_id: DbId,
        target_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        ProjectRepo::ancestor_chain_contains(&self.pool, owner_id, start_id, target_id).await
    }

    async fn create_tag(&self, owner_id: DbId, input: &CreateTag) -> Result<Tag, sqlx::Error> {
        TagRepo::create(&self.pool, owner_id, input).await
    }

    async fn list_tags(&self, owner_id: DbId) -> Result<Vec<Tag>, sqlx::Error> {
        TagRepo::list_for_owner(&self.pool, owner_id).await
    }

    async fn find_owned_tag_ids(
        &self,
        owner_id: DbId,
        ids: &[DbId],
    ) -> Result<Vec<DbId>, sqlx::Error> {
        TagRepo::find_owned_ids(&self.pool, owner_id, ids).await
    }
}
