use std::sync::Arc;

use crate::backend::PageBackend;
use crate::config::ServerConfig;
use crate::sessions::SessionRegistry;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything inside is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Page storage (Postgres or memory).
    pub backend: Arc<dyn PageBackend>,
    /// Open editor sessions.
    pub sessions: Arc<SessionRegistry>,
    /// Page lifecycle events.
    pub event_bus: Arc<biolink_events::EventBus>,
}

impl AppState {
    pub fn new(
        config: ServerConfig,
        backend: Arc<dyn PageBackend>,
        event_bus: Arc<biolink_events::EventBus>,
    ) -> Self {
        let sessions = Arc::new(SessionRegistry::new(
            Arc::clone(&backend),
            config.pipeline,
            Arc::clone(&event_bus),
        ));
        Self {
            config: Arc::new(config),
            backend,
            sessions,
            event_bus,
        }
    }
}
