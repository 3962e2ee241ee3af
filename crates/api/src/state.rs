use std::sync::Arc;

use todo_events::EventBus;
use todo_undo::{system_clock, EntityGateway, TokenStore, UndoCoordinator, UndoIssuer};

use crate::cache::ProjectTreeCache;
use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Owner-scoped access to tasks, projects and tags.
    pub gateway: Arc<dyn EntityGateway>,
    pub config: Arc<ServerConfig>,
    pub issuer: Arc<UndoIssuer>,
    pub coordinator: Arc<UndoCoordinator>,
    /// Carries the cache invalidation signal.
    pub event_bus: Arc<EventBus>,
    pub tree_cache: Arc<ProjectTreeCache>,
}

impl AppState {
    /// Wire the undo subsystem and read-side cache around `gateway` and `store`.
    pub fn new(
        gateway: Arc<dyn EntityGateway>,
        store: Arc<dyn TokenStore>,
        config: ServerConfig,
    ) -> Self {
        let event_bus = Arc::new(EventBus::default());
        let clock = system_clock();
        let tree_cache = Arc::new(ProjectTreeCache::new(event_bus.subscribe()));

        let issuer = Arc::new(UndoIssuer::new(
            Arc::clone(&store),
            config.undo.clone(),
            Arc::clone(&clock),
        ));
        let coordinator = Arc::new(UndoCoordinator::new(
            store,
            Arc::clone(&gateway),
            Arc::clone(&event_bus),
            config.undo.clone(),
            clock,
        ));

        Self {
            gateway,
            config: Arc::new(config),
            issuer,
            coordinator,
            event_bus,
            tree_cache,
        }
    }
}
