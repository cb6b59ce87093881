//! Persistence seams used by the editor pipeline.

use async_trait::async_trait;
use biolink_core::block::Block;
use biolink_core::page::PageData;
use biolink_core::types::DbId;
use serde::Serialize;

use crate::error::StoreError;

/// Result of persisting a draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveOutcome {
    /// Id of the stored row. `None` if the backend did not report one.
    pub page_id: Option<DbId>,
    pub slug: String,
}

/// Durable storage for page drafts and their published snapshot.
#[async_trait]
pub trait PageStore: Send + Sync {
    /// Persist the draft. `context` records what triggered the save.
    async fn save_page(&self, page: &PageData, context: &str) -> Result<SaveOutcome, StoreError>;

    /// Publish the user's most recently saved draft and return its slug.
    async fn publish_page(&self, user_id: DbId) -> Result<String, StoreError>;
}

/// Mirror of `event` blocks kept outside the page document.
#[async_trait]
pub trait EventBlockSync: Send + Sync {
    async fn sync_event_block(
        &self,
        block: &Block,
        page_id: DbId,
        user_id: DbId,
    ) -> Result<(), StoreError>;

    async fn delete_event_block(&self, event_id: &str, user_id: DbId) -> Result<(), StoreError>;
}

/// Read cache in front of the page store.
#[async_trait]
pub trait PageCache: Send + Sync {
    async fn invalidate(&self, key: &str);

    /// Load the current stored draft, bypassing any stale entry.
    async fn refetch(&self, page_id: DbId) -> Result<Option<PageData>, StoreError>;
}

/// Cache key for a page document.
pub fn page_cache_key(page_id: DbId) -> String {
    format!("page:{page_id}")
}
