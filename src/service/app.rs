//! Application wiring
//!
//! Builds the component graph once and shares it between the event
//! router and the discovery endpoints.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::Result;
use crate::game::{GameRegistry, RouletteGame};
use crate::room::RoomManager;
use crate::router::{ConnectionRegistry, EventRouter};
use crate::session::{MemorySessionStore, SessionOracle};

/// Shared application state.
pub struct AppState {
    pub config: AppConfig,
    pub registry: Arc<GameRegistry>,
    pub manager: Arc<RoomManager>,
    pub sessions: Arc<MemorySessionStore>,
    pub connections: Arc<ConnectionRegistry>,
    pub router: Arc<EventRouter>,
}

impl AppState {
    /// Wire up the service with the built-in game catalogue.
    pub fn build(config: AppConfig) -> Result<Arc<Self>> {
        let registry = Arc::new(GameRegistry::new());
        registry.register(RouletteGame::catalogue_entry())?;

        let sessions = Arc::new(MemorySessionStore::new());
        let oracle: Arc<dyn SessionOracle> = sessions.clone();
        let connections = Arc::new(ConnectionRegistry::new());
        let manager = Arc::new(RoomManager::new(
            registry.clone(),
            oracle.clone(),
            connections.clone(),
        ));
        let router = Arc::new(EventRouter::new(
            manager.clone(),
            oracle,
            connections.clone(),
        ));

        tracing::info!(
            "Service '{}' wired with {} registered game(s)",
            config.service.name,
            registry.list_available()?.len()
        );

        Ok(Arc::new(Self {
            config,
            registry,
            manager,
            sessions,
            connections,
            router,
        }))
    }
}
