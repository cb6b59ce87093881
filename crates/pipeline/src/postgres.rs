//! Postgres-backed collaborators.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use biolink_core::block::Block;
use biolink_core::page::PageData;
use biolink_core::types::DbId;
use biolink_db::models::event_block::UpsertEventBlock;
use biolink_db::models::page::SavePageDraft;
use biolink_db::repositories::{EventBlockRepo, PageRepo};
use biolink_db::DbPool;
use tokio::sync::RwLock;

use crate::collaborators::{page_cache_key, EventBlockSync, PageCache, PageStore, SaveOutcome};
use crate::error::StoreError;
use crate::session::Collaborators;

/// Unique constraints whose violation is a user-facing conflict.
const SLUG_CONSTRAINT: &str = "uq_pages_slug";

fn classify(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.constraint() == Some(SLUG_CONSTRAINT) {
            return StoreError::Conflict("Slug is already taken".into());
        }
    }
    StoreError::Database(err)
}

impl Collaborators {
    pub fn postgres(pool: DbPool) -> Self {
        Self {
            store: Arc::new(PgPageStore::new(pool.clone())),
            events: Arc::new(PgEventBlockSync::new(pool.clone())),
            cache: Arc::new(PgPageCache::new(pool)),
        }
    }
}

// ---------------------------------------------------------------------------
// PgPageStore
// ---------------------------------------------------------------------------

pub struct PgPageStore {
    pool: DbPool,
}

impl PgPageStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PageStore for PgPageStore {
    async fn save_page(&self, page: &PageData, context: &str) -> Result<SaveOutcome, StoreError> {
        let dto = SavePageDraft::from_page_data(page, context)?;
        let row = PageRepo::save_draft(&self.pool, page.id, &dto)
            .await
            .map_err(classify)?;
        tracing::debug!(page_id = row.id, context, "Page draft saved");
        Ok(SaveOutcome {
            page_id: Some(row.id),
            slug: row.slug,
        })
    }

    async fn publish_page(&self, user_id: DbId) -> Result<String, StoreError> {
        PageRepo::publish_latest_for_user(&self.pool, user_id)
            .await
            .map_err(classify)?
            .ok_or(StoreError::NothingToPublish(user_id))
    }
}

// ---------------------------------------------------------------------------
// PgEventBlockSync
// ---------------------------------------------------------------------------

pub struct PgEventBlockSync {
    pool: DbPool,
}

impl PgEventBlockSync {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventBlockSync for PgEventBlockSync {
    async fn sync_event_block(
        &self,
        block: &Block,
        page_id: DbId,
        user_id: DbId,
    ) -> Result<(), StoreError> {
        let Some(dto) = UpsertEventBlock::from_block(block, page_id, user_id)? else {
            return Ok(());
        };
        EventBlockRepo::upsert(&self.pool, &dto).await?;
        Ok(())
    }

    async fn delete_event_block(&self, event_id: &str, user_id: DbId) -> Result<(), StoreError> {
        let deleted = EventBlockRepo::delete(&self.pool, user_id, event_id).await?;
        if !deleted {
            tracing::debug!(event_id, user_id, "No event mirror to delete");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// PgPageCache
// ---------------------------------------------------------------------------

/// Read-through cache of page drafts keyed by `page:{id}`.
pub struct PgPageCache {
    pool: DbPool,
    entries: RwLock<HashMap<String, PageData>>,
}

impl PgPageCache {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Cached draft, loading it on a miss.
    pub async fn get(&self, page_id: DbId) -> Result<Option<PageData>, StoreError> {
        if let Some(page) = self.entries.read().await.get(&page_cache_key(page_id)) {
            return Ok(Some(page.clone()));
        }
        self.refetch(page_id).await
    }
}

#[async_trait]
impl PageCache for PgPageCache {
    async fn invalidate(&self, key: &str) {
        self.entries.write().await.remove(key);
    }

    async fn refetch(&self, page_id: DbId) -> Result<Option<PageData>, StoreError> {
        let Some(row) = PageRepo::find_by_id(&self.pool, page_id).await? else {
            self.invalidate(&page_cache_key(page_id)).await;
            return Ok(None);
        };
        let page = row.to_page_data()?;
        self.entries
            .write()
            .await
            .insert(page_cache_key(page_id), page.clone());
        Ok(Some(page))
    }
}
