//! Re-authorization of restored references.
//!
//! A reference captured in a snapshot was legitimate when the token was
//! issued; that says nothing about now. Before any state is applied, every
//! reference is resolved again through owner-scoped lookups. A reference
//! that no longer resolves for the redeeming owner, points at an archived
//! project, or would close a cycle is discarded: the field is restored as
//! unset and the discard is reported to the caller.

use serde::Serialize;
use todo_core::types::DbId;

use crate::gateway::EntityGateway;
use crate::snapshot::project::{ProjectRestore, PARENT_ID};
use crate::snapshot::task::{TaskRestore, PROJECT_ID, TAG_IDS};

/// Why a restored reference was dropped.
///
/// A reference owned by another user resolves exactly like a missing one,
/// so it is reported as [`DiscardReason::Missing`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscardReason {
    Missing,
    Archived,
    Cycle,
}

/// A snapshot reference that was not restored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscardedReference {
    pub field: &'static str,
    pub reference_id: DbId,
    pub reason: DiscardReason,
}

/// Restores that survived re-authorization, plus what was dropped.
#[derive(Debug)]
pub struct Authorized<R> {
    pub restores: Vec<R>,
    pub discarded: Vec<DiscardedReference>,
}

/// Resolve a project reference for `owner_id`. `None` means usable.
async fn project_reference_problem(
    gateway: &dyn EntityGateway,
    owner_id: DbId,
    project_id: DbId,
) -> Result<Option<DiscardReason>, sqlx::Error> {
    Ok(match gateway.find_project(owner_id, project_id).await? {
        None => Some(DiscardReason::Missing),
        Some(project) if project.is_archived => Some(DiscardReason::Archived),
        Some(_) => None,
    })
}

pub async fn authorize_task_restores(
    gateway: &dyn EntityGateway,
    owner_id: DbId,
    restores: Vec<TaskRestore>,
) -> Result<Authorized<TaskRestore>, sqlx::Error> {
    let mut kept = Vec::with_capacity(restores.len());
    let mut discarded = Vec::new();

    for restore in restores {
        match restore {
            TaskRestore::Project(Some(project_id)) => {
                match project_reference_problem(gateway, owner_id, project_id).await? {
                    None => kept.push(TaskRestore::Project(Some(project_id))),
                    Some(reason) => {
                        discarded.push(DiscardedReference {
                            field: PROJECT_ID,
                            reference_id: project_id,
                            reason,
                        });
                        kept.push(TaskRestore::Project(None));
                    }
                }
            }
            TaskRestore::Tags(tag_ids) => {
                let owned = gateway.find_owned_tag_ids(owner_id, &tag_ids).await?;
                let (valid, invalid): (Vec<DbId>, Vec<DbId>) =
                    tag_ids.into_iter().partition(|id| owned.contains(id));
                discarded.extend(invalid.into_iter().map(|id| DiscardedReference {
                    field: TAG_IDS,
                    reference_id: id,
                    reason: DiscardReason::Missing,
                }));
                kept.push(TaskRestore::Tags(valid));
            }
            other => kept.push(other),
        }
    }

    Ok(Authorized {
        restores: kept,
        discarded,
    })
}

/// `project_id` is the project being restored; a parent equal to it or
/// currently below it in the hierarchy is a cycle.
pub async fn authorize_project_restores(
    gateway: &dyn EntityGateway,
    owner_id: DbId,
    project_id: DbId,
    restores: Vec<ProjectRestore>,
) -> Result<Authorized<ProjectRestore>, sqlx::Error> {
    let mut kept = Vec::with_capacity(restores.len());
    let mut discarded = Vec::new();

    for restore in restores {
        match restore {
            ProjectRestore::Parent(Some(parent_id)) => {
                let problem = if parent_id == project_id {
                    Some(DiscardReason::Cycle)
                } else if let Some(reason) =
                    project_reference_problem(gateway, owner_id, parent_id).await?
                {
                    Some(reason)
                } else if gateway
                    .project_chain_contains(owner_id, parent_id, project_id)
                    .await?
                {
                    Some(DiscardReason::Cycle)
                } else {
                    None
                };
                match problem {
                    None => kept.push(ProjectRestore::Parent(Some(parent_id))),
                    Some(reason) => {
                        discarded.push(DiscardedReference {
                            field: PARENT_ID,
                            reference_id: parent_id,
                            reason,
                        });
                        kept.push(ProjectRestore::Parent(None));
                    }
                }
            }
            other => kept.push(other),
        }
    }

    Ok(Authorized {
        restores: kept,
        discarded,
    })
}
