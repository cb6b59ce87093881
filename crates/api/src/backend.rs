//! Page storage behind the HTTP layer.
//!
//! [`PageBackend`] covers what handlers need beyond an editor session:
//! creating and loading drafts, public reads and the activity log. The
//! Postgres backend is used in production; the memory backend serves
//! `STORE_BACKEND=memory` and the integration tests.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use biolink_core::block::Block;
use biolink_core::page::{PageData, Theme};
use biolink_core::types::{DbId, Timestamp};
use biolink_db::models::page::CreatePage;
use biolink_db::repositories::{ActivityRepo, PageRepo};
use biolink_db::DbPool;
use biolink_events::{EventBus, PageEvent};
use biolink_pipeline::memory::InMemoryPageStore;
use biolink_pipeline::postgres::PgPageCache;
use biolink_pipeline::{Collaborators, StoreError};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::config::StoreBackend;

/// The published view of a page served to visitors.
#[derive(Debug, Clone, Serialize)]
pub struct PublicPage {
    pub page_id: Option<DbId>,
    pub slug: String,
    pub title: Option<String>,
    pub blocks: Vec<Block>,
    pub theme: Theme,
}

/// One entry of a page's activity log.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityEntry {
    pub event_type: String,
    pub page_id: Option<DbId>,
    pub user_id: Option<DbId>,
    pub payload: serde_json::Value,
    pub created_at: Timestamp,
}

#[async_trait]
pub trait PageBackend: Send + Sync {
    fn kind(&self) -> StoreBackend;

    /// Collaborators handed to every editor session.
    fn collaborators(&self) -> Collaborators;

    async fn create_page(&self, page: PageData) -> Result<PageData, StoreError>;

    async fn load_page(&self, page_id: DbId) -> Result<Option<PageData>, StoreError>;

    async fn published_page(&self, slug: &str) -> Result<Option<PublicPage>, StoreError>;

    /// Newest entries first.
    async fn activity(&self, page_id: DbId, limit: i64) -> Result<Vec<ActivityEntry>, StoreError>;

    async fn is_healthy(&self) -> bool;
}

// ---------------------------------------------------------------------------
// Postgres
// ---------------------------------------------------------------------------

pub struct PgBackend {
    pool: DbPool,
    cache: Arc<PgPageCache>,
    collaborators: Collaborators,
}

impl PgBackend {
    pub fn new(pool: DbPool) -> Self {
        let cache = Arc::new(PgPageCache::new(pool.clone()));
        let collaborators = Collaborators {
            cache: cache.clone(),
            ..Collaborators::postgres(pool.clone())
        };
        Self {
            pool,
            cache,
            collaborators,
        }
    }
}

#[async_trait]
impl PageBackend for PgBackend {
    fn kind(&self) -> StoreBackend {
        StoreBackend::Postgres
    }

    fn collaborators(&self) -> Collaborators {
        self.collaborators.clone()
    }

    async fn create_page(&self, page: PageData) -> Result<PageData, StoreError> {
        let dto = CreatePage::from_page_data(&page)?;
        let row = PageRepo::create(&self.pool, &dto).await.map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.constraint() == Some("uq_pages_slug") {
                    return StoreError::Conflict(format!("Slug '{}' is already taken", page.slug));
                }
            }
            StoreError::Database(e)
        })?;
        Ok(row.to_page_data()?)
    }

    async fn load_page(&self, page_id: DbId) -> Result<Option<PageData>, StoreError> {
        self.cache.get(page_id).await
    }

    async fn published_page(&self, slug: &str) -> Result<Option<PublicPage>, StoreError> {
        let Some(row) = PageRepo::find_published_by_slug(&self.pool, slug).await? else {
            return Ok(None);
        };
        Ok(Some(PublicPage {
            page_id: Some(row.id),
            slug: row.slug,
            title: row.title,
            blocks: serde_json::from_value(row.published_blocks)?,
            theme: serde_json::from_value(row.published_theme)?,
        }))
    }

    async fn activity(&self, page_id: DbId, limit: i64) -> Result<Vec<ActivityEntry>, StoreError> {
        let rows = ActivityRepo::list_for_page(&self.pool, page_id, limit).await?;
        Ok(rows
            .into_iter()
            .map(|row| ActivityEntry {
                event_type: row.event_type,
                page_id: row.page_id,
                user_id: row.user_id,
                payload: row.payload,
                created_at: row.created_at,
            })
            .collect())
    }

    async fn is_healthy(&self) -> bool {
        biolink_db::health_check(&self.pool).await.is_ok()
    }
}

// ---------------------------------------------------------------------------
// Memory
// ---------------------------------------------------------------------------

pub struct MemoryBackend {
    store: Arc<InMemoryPageStore>,
    activity: Arc<Mutex<Vec<ActivityEntry>>>,
}

impl MemoryBackend {
    /// Create the backend and start recording events from `bus`.
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(bus: &EventBus) -> Self {
        let activity = Arc::new(Mutex::new(Vec::new()));
        tokio::spawn(record_activity(activity.clone(), bus.subscribe()));
        Self {
            store: Arc::new(InMemoryPageStore::new()),
            activity,
        }
    }

    pub fn store(&self) -> &Arc<InMemoryPageStore> {
        &self.store
    }
}

/// In-memory counterpart of the activity recorder.
async fn record_activity(
    log: Arc<Mutex<Vec<ActivityEntry>>>,
    mut receiver: broadcast::Receiver<PageEvent>,
) {
    loop {
        match receiver.recv().await {
            Ok(event) => {
                log.lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(ActivityEntry {
                        event_type: event.event_type,
                        page_id: event.page_id,
                        user_id: event.actor_user_id,
                        payload: event.payload,
                        created_at: event.timestamp,
                    });
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!(skipped = n, "Activity log lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[async_trait]
impl PageBackend for MemoryBackend {
    fn kind(&self) -> StoreBackend {
        StoreBackend::Memory
    }

    fn collaborators(&self) -> Collaborators {
        Collaborators::in_memory(self.store.clone())
    }

    async fn create_page(&self, page: PageData) -> Result<PageData, StoreError> {
        self.store.create_page(page)
    }

    async fn load_page(&self, page_id: DbId) -> Result<Option<PageData>, StoreError> {
        Ok(self.store.page(page_id))
    }

    async fn published_page(&self, slug: &str) -> Result<Option<PublicPage>, StoreError> {
        Ok(self.store.published_by_slug(slug).map(|page| PublicPage {
            page_id: page.id,
            slug: page.slug,
            title: page.title,
            blocks: page.blocks,
            theme: page.theme,
        }))
    }

    async fn activity(&self, page_id: DbId, limit: i64) -> Result<Vec<ActivityEntry>, StoreError> {
        let log = self.activity.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(log
            .iter()
            .rev()
            .filter(|entry| entry.page_id == Some(page_id))
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect())
    }

    async fn is_healthy(&self) -> bool {
        true
    }
}
