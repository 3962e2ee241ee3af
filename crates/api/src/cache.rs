//! Read-side cache of each owner's project hierarchy.
//!
//! Entries are evicted by the `cache.invalidate` signal published after
//! every undoable mutation and every undo. Pending signals are drained
//! before each read and each store, and a tree loaded across an
//! invalidation is never stored, so a read that follows a mutation never
//! sees the tree from before it.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::broadcast::Receiver;
use todo_core::types::DbId;
use todo_db::models::project::Project;
use todo_events::PlatformEvent;

/// A project with its children, ordered by position.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectNode {
    #[serde(flatten)]
    pub project: Project,
    pub children: Vec<ProjectNode>,
}

/// Counts invalidations for one owner. A tree built from a read that
/// started at one generation is only stored if no invalidation arrived since.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generation {
    epoch: u64,
    owner: u64,
}

pub enum Lookup {
    Hit(Arc<Vec<ProjectNode>>),
    /// Pass the generation back to [`ProjectTreeCache::insert`].
    Miss(Generation),
}

#[derive(Default)]
struct Entries {
    trees: HashMap<DbId, Arc<Vec<ProjectNode>>>,
    generations: HashMap<DbId, u64>,
    /// Bumped when the receiver lags and every owner must be treated as stale.
    epoch: u64,
}

impl Entries {
    fn generation(&self, owner_id: DbId) -> Generation {
        Generation {
            epoch: self.epoch,
            owner: self.generations.get(&owner_id).copied().unwrap_or(0),
        }
    }
}

pub struct ProjectTreeCache {
    events: Mutex<Receiver<PlatformEvent>>,
    entries: Mutex<Entries>,
}

impl ProjectTreeCache {
    pub fn new(events: Receiver<PlatformEvent>) -> Self {
        Self {
            events: Mutex::new(events),
            entries: Mutex::new(Entries::default()),
        }
    }

    /// Apply every invalidation published since the last call.
    fn drain(&self, entries: &mut Entries) {
        let Ok(mut events) = self.events.lock() else {
            return;
        };
        loop {
            match events.try_recv() {
                Ok(event) => {
                    if let Some(owner_id) = event.invalidated_owner() {
                        entries.trees.remove(&owner_id);
                        *entries.generations.entry(owner_id).or_default() += 1;
                    }
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Project tree cache lagged, clearing");
                    entries.trees.clear();
                    entries.epoch += 1;
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
    }

    /// A poisoned lock reads as a miss that can never be stored.
    pub fn get(&self, owner_id: DbId) -> Lookup {
        let Ok(mut entries) = self.entries.lock() else {
            return Lookup::Miss(Generation {
                epoch: u64::MAX,
                owner: u64::MAX,
            });
        };
        self.drain(&mut entries);
        match entries.trees.get(&owner_id) {
            Some(tree) => Lookup::Hit(Arc::clone(tree)),
            None => Lookup::Miss(entries.generation(owner_id)),
        }
    }

    /// Store a tree read after `get` returned `seen`. Returns `false` if an
    /// invalidation for the owner arrived in between and the tree was dropped.
    pub fn insert(&self, owner_id: DbId, seen: Generation, tree: Arc<Vec<ProjectNode>>) -> bool {
        let Ok(mut entries) = self.entries.lock() else {
            return false;
        };
        self.drain(&mut entries);
        if entries.generation(owner_id) != seen {
            tracing::debug!(user_id = owner_id, "Discarding project tree read before invalidation");
            return false;
        }
        entries.trees.insert(owner_id, tree);
        true
    }
}

/// Assemble a forest from a flat list. A project whose parent is not in the
/// list is treated as a root.
pub fn build_tree(projects: Vec<Project>) -> Vec<ProjectNode> {
    let ids: HashSet<DbId> = projects.iter().map(|p| p.id).collect();
    let mut children: HashMap<Option<DbId>, Vec<Project>> = HashMap::new();
    for project in projects {
        let parent = project.parent_id.filter(|id| ids.contains(id));
        children.entry(parent).or_default().push(project);
    }
    for siblings in children.values_mut() {
        siblings.sort_by_key(|p| (p.position, p.id));
    }

    let mut visited = HashSet::new();
    attach(None, &mut children, &mut visited)
}

fn attach(
    parent: Option<DbId>,
    children: &mut HashMap<Option<DbId>, Vec<Project>>,
    visited: &mut HashSet<DbId>,
) -> Vec<ProjectNode> {
    let Some(siblings) = children.remove(&parent) else {
        return Vec::new();
    };
    let mut nodes = Vec::with_capacity(siblings.len());
    for project in siblings {
        if !visited.insert(project.id) {
            continue;
        }
        let nested = attach(Some(project.id), children, visited);
        nodes.push(ProjectNode {
            project,
            children: nested,
        });
    }
    nodes
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use todo_events::EventBus;

    use super::*;

    fn node(project: Project) -> ProjectNode {
        ProjectNode {
            project,
            children: Vec::new(),
        }
    }

    fn project(id: DbId, parent_id: Option<DbId>, position: i32) -> Project {
        let now = Utc::now();
        Project {
            id,
            owner_id: 1,
            parent_id,
            name: format!("p{id}"),
            description: None,
            is_archived: false,
            archived_at: None,
            position,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn builds_nested_forest_in_position_order() {
        let tree = build_tree(vec![
            project(1, None, 1),
            project(2, None, 0),
            project(3, Some(1), 0),
            project(4, Some(99), 0),
        ]);

        let roots: Vec<DbId> = tree.iter().map(|n| n.project.id).collect();
        assert_eq!(roots, vec![2, 4, 1]);
        let one = tree.iter().find(|n| n.project.id == 1).unwrap();
        assert_eq!(one.children[0].project.id, 3);
    }

    fn miss(cache: &ProjectTreeCache, owner_id: DbId) -> Generation {
        match cache.get(owner_id) {
            Lookup::Miss(generation) => generation,
            Lookup::Hit(_) => panic!("expected a miss for owner {owner_id}"),
        }
    }

    fn fill(cache: &ProjectTreeCache, owner_id: DbId) {
        let seen = miss(cache, owner_id);
        assert!(cache.insert(owner_id, seen, Arc::new(Vec::new())));
    }

    #[test]
    fn invalidation_evicts_only_that_owner() {
        let bus = EventBus::default();
        let cache = ProjectTreeCache::new(bus.subscribe());
        fill(&cache, 1);
        fill(&cache, 2);

        bus.publish(PlatformEvent::cache_invalidation(1, "project", 5));

        assert!(matches!(cache.get(1), Lookup::Miss(_)));
        assert!(matches!(cache.get(2), Lookup::Hit(_)));
    }

    #[test]
    fn tree_read_before_invalidation_is_not_stored() {
        let bus = EventBus::default();
        let cache = ProjectTreeCache::new(bus.subscribe());
        let seen = miss(&cache, 1);

        // A mutation lands while the tree is being loaded.
        bus.publish(PlatformEvent::cache_invalidation(1, "project", 5));

        assert!(!cache.insert(1, seen, Arc::new(vec![node(project(5, None, 0))])));
        let fresh = miss(&cache, 1);
        assert_ne!(fresh, seen);
        assert!(cache.insert(1, fresh, Arc::new(Vec::new())));
        assert!(matches!(cache.get(1), Lookup::Hit(_)));
    }

    #[test]
    fn other_owners_invalidation_does_not_block_insert() {
        let bus = EventBus::default();
        let cache = ProjectTreeCache::new(bus.subscribe());
        let seen = miss(&cache, 1);

        bus.publish(PlatformEvent::cache_invalidation(2, "project", 5));

        assert!(cache.insert(1, seen, Arc::new(Vec::new())));
    }

    #[test]
    fn unrelated_events_are_ignored() {
        let bus = EventBus::default();
        let cache = ProjectTreeCache::new(bus.subscribe());
        fill(&cache, 1);

        bus.publish(PlatformEvent::new("task.viewed").for_owner(1));

        assert!(matches!(cache.get(1), Lookup::Hit(_)));
    }
}
