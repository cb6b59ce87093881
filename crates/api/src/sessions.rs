//! Open editor sessions, one per page.

use std::collections::HashMap;
use std::sync::Arc;

use biolink_core::error::CoreError;
use biolink_core::page::PageData;
use biolink_core::types::DbId;
use biolink_events::EventBus;
use biolink_pipeline::{EditorSession, PipelineConfig};
use tokio::sync::RwLock;

use crate::backend::PageBackend;
use crate::error::{AppError, AppResult};

/// Keeps one [`EditorSession`] per page so every request editing the page
/// shares its local state and autosave timer.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<DbId, EditorSession>>,
    backend: Arc<dyn PageBackend>,
    config: PipelineConfig,
    event_bus: Arc<EventBus>,
}

impl SessionRegistry {
    pub fn new(
        backend: Arc<dyn PageBackend>,
        config: PipelineConfig,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            backend,
            config,
            event_bus,
        }
    }

    /// The session for `page_id`, loading the page on first use.
    pub async fn open(&self, page_id: DbId) -> AppResult<EditorSession> {
        if let Some(session) = self.sessions.read().await.get(&page_id) {
            return Ok(session.clone());
        }

        let page = self
            .backend
            .load_page(page_id)
            .await?
            .ok_or(AppError::Core(CoreError::NotFound {
                entity: "Page",
                id: page_id,
            }))?;

        let mut sessions = self.sessions.write().await;
        let session = sessions
            .entry(page_id)
            .or_insert_with(|| self.start(page))
            .clone();
        tracing::debug!(page_id, open_sessions = sessions.len(), "Editor session opened");
        Ok(session)
    }

    /// Register a session for a page that was just created.
    pub async fn insert(&self, page: PageData) -> AppResult<EditorSession> {
        let page_id = page.id.ok_or_else(|| {
            AppError::InternalError("created page has no id".into())
        })?;
        let session = self.start(page);
        if let Some(previous) = self.sessions.write().await.insert(page_id, session.clone()) {
            previous.close();
        }
        Ok(session)
    }

    /// Close and forget the session for `page_id`.
    ///
    /// A session with unsaved edits stays open; the editor publishes
    /// first or waits for the autosave.
    pub async fn close(&self, page_id: DbId) -> AppResult<()> {
        let mut sessions = self.sessions.write().await;
        let Some(session) = sessions.get(&page_id) else {
            return Err(AppError::NotFound(format!(
                "No open editor for page {page_id}"
            )));
        };
        if session.is_dirty() {
            return Err(AppError::Core(CoreError::Conflict(format!(
                "Page {page_id} has unsaved changes"
            ))));
        }

        if let Some(session) = sessions.remove(&page_id) {
            session.close();
        }
        tracing::debug!(page_id, open_sessions = sessions.len(), "Editor session closed");
        Ok(())
    }

    /// Cancel every pending autosave. Used on shutdown.
    pub async fn close_all(&self) {
        let mut sessions = self.sessions.write().await;
        for session in sessions.values() {
            session.close();
        }
        tracing::info!(count = sessions.len(), "Editor sessions closed");
        sessions.clear();
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    fn start(&self, page: PageData) -> EditorSession {
        EditorSession::new(
            page,
            self.backend.collaborators(),
            self.config,
            Some(Arc::clone(&self.event_bus)),
        )
    }
}
