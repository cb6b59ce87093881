//! In-process backend implementing every collaborator.
//!
//! Used by tests and by the API's `STORE_BACKEND=memory` mode. State lives
//! behind a single `std::sync::Mutex` that is never held across an await.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use biolink_core::block::Block;
use biolink_core::page::PageData;
use biolink_core::types::DbId;

use crate::collaborators::{page_cache_key, EventBlockSync, PageCache, PageStore, SaveOutcome};
use crate::error::StoreError;
use crate::session::Collaborators;

#[derive(Debug, Clone)]
struct StoredPage {
    draft: PageData,
    published: Option<PageData>,
    /// Monotonic save counter; the highest one is the most recent save.
    seq: u64,
}

/// An event block mirrored outside its page.
#[derive(Debug, Clone, PartialEq)]
pub struct MirroredEvent {
    pub page_id: DbId,
    pub user_id: DbId,
    pub block: Block,
}

#[derive(Debug, Default)]
struct MemoryState {
    next_id: DbId,
    seq: u64,
    pages: BTreeMap<DbId, StoredPage>,
    events: BTreeMap<(DbId, String), MirroredEvent>,
    deleted_events: Vec<String>,
    cache: HashMap<String, PageData>,
    saves: Vec<(PageData, String)>,
    publishes: usize,
}

impl MemoryState {
    fn slug_taken(&self, slug: &str, except: Option<DbId>) -> bool {
        self.pages
            .iter()
            .any(|(id, stored)| Some(*id) != except && stored.draft.slug == slug)
    }

    fn insert(&mut self, mut page: PageData) -> PageData {
        self.next_id += 1;
        self.seq += 1;
        page.id = Some(self.next_id);
        self.pages.insert(
            self.next_id,
            StoredPage {
                draft: page.clone(),
                published: None,
                seq: self.seq,
            },
        );
        page
    }
}

#[derive(Debug, Default)]
pub struct InMemoryPageStore {
    state: Mutex<MemoryState>,
}

impl InMemoryPageStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a brand-new page and return it with its assigned id.
    pub fn create_page(&self, page: PageData) -> Result<PageData, StoreError> {
        let mut state = self.state();
        if state.slug_taken(&page.slug, None) {
            return Err(StoreError::Conflict(format!(
                "Slug '{}' is already taken",
                page.slug
            )));
        }
        Ok(state.insert(page))
    }

    /// Current stored draft.
    pub fn page(&self, page_id: DbId) -> Option<PageData> {
        self.state().pages.get(&page_id).map(|p| p.draft.clone())
    }

    /// The published snapshot for a slug.
    pub fn published_by_slug(&self, slug: &str) -> Option<PageData> {
        self.state()
            .pages
            .values()
            .filter(|p| p.draft.slug == slug)
            .find_map(|p| p.published.clone())
    }

    pub fn save_count(&self) -> usize {
        self.state().saves.len()
    }

    /// The page and context of the most recent successful save.
    pub fn last_saved(&self) -> Option<(PageData, String)> {
        self.state().saves.last().cloned()
    }

    pub fn publish_count(&self) -> usize {
        self.state().publishes
    }

    /// Ids of the mirrored event blocks owned by `user_id`.
    pub fn event_block_ids(&self, user_id: DbId) -> Vec<String> {
        self.state()
            .events
            .keys()
            .filter(|(owner, _)| *owner == user_id)
            .map(|(_, id)| id.clone())
            .collect()
    }

    pub fn mirrored_event(&self, user_id: DbId, block_id: &str) -> Option<MirroredEvent> {
        self.state()
            .events
            .get(&(user_id, block_id.to_string()))
            .cloned()
    }

    /// Event ids passed to `delete_event_block`, in call order.
    pub fn deleted_event_ids(&self) -> Vec<String> {
        self.state().deleted_events.clone()
    }

    /// Overwrite a stored draft as if another editor had saved it.
    pub fn overwrite_draft(&self, page: PageData) -> Result<(), StoreError> {
        let id = page.id.ok_or_else(|| StoreError::Unavailable("page has no id".into()))?;
        let mut state = self.state();
        state.seq += 1;
        let seq = state.seq;
        let stored = state
            .pages
            .get_mut(&id)
            .ok_or_else(|| StoreError::Unavailable(format!("page {id} does not exist")))?;
        stored.draft = page;
        stored.seq = seq;
        Ok(())
    }
}

impl Collaborators {
    /// Route every collaborator to one in-memory store.
    pub fn in_memory(store: Arc<InMemoryPageStore>) -> Self {
        Self {
            store: store.clone(),
            events: store.clone(),
            cache: store,
        }
    }
}

#[async_trait]
impl PageStore for InMemoryPageStore {
    async fn save_page(&self, page: &PageData, context: &str) -> Result<SaveOutcome, StoreError> {
        let mut state = self.state();

        let existing = page
            .id
            .filter(|id| {
                state
                    .pages
                    .get(id)
                    .is_some_and(|stored| stored.draft.user_id == page.user_id)
            });

        if state.slug_taken(&page.slug, existing) {
            return Err(StoreError::Conflict(format!(
                "Slug '{}' is already taken",
                page.slug
            )));
        }

        let saved = match existing {
            Some(id) => {
                state.seq += 1;
                let seq = state.seq;
                let mut draft = page.clone();
                draft.id = Some(id);
                if let Some(stored) = state.pages.get_mut(&id) {
                    stored.draft = draft.clone();
                    stored.seq = seq;
                }
                draft
            }
            None => state.insert(page.clone()),
        };

        state.saves.push((saved.clone(), context.to_string()));
        Ok(SaveOutcome {
            page_id: saved.id,
            slug: saved.slug,
        })
    }

    async fn publish_page(&self, user_id: DbId) -> Result<String, StoreError> {
        let mut state = self.state();
        let stored = state
            .pages
            .values_mut()
            .filter(|p| p.draft.user_id == user_id)
            .max_by_key(|p| p.seq)
            .ok_or(StoreError::NothingToPublish(user_id))?;

        stored.draft.is_published = true;
        stored.published = Some(stored.draft.clone());
        let slug = stored.draft.slug.clone();
        state.publishes += 1;
        Ok(slug)
    }
}

#[async_trait]
impl EventBlockSync for InMemoryPageStore {
    async fn sync_event_block(
        &self,
        block: &Block,
        page_id: DbId,
        user_id: DbId,
    ) -> Result<(), StoreError> {
        if !block.is_event() {
            return Ok(());
        }
        self.state().events.insert(
            (user_id, block.id.clone()),
            MirroredEvent {
                page_id,
                user_id,
                block: block.clone(),
            },
        );
        Ok(())
    }

    async fn delete_event_block(&self, event_id: &str, user_id: DbId) -> Result<(), StoreError> {
        let mut state = self.state();
        state.events.remove(&(user_id, event_id.to_string()));
        state.deleted_events.push(event_id.to_string());
        Ok(())
    }
}

#[async_trait]
impl PageCache for InMemoryPageStore {
    async fn invalidate(&self, key: &str) {
        self.state().cache.remove(key);
    }

    async fn refetch(&self, page_id: DbId) -> Result<Option<PageData>, StoreError> {
        let mut state = self.state();
        let Some(page) = state.pages.get(&page_id).map(|p| p.draft.clone()) else {
            return Ok(None);
        };
        state.cache.insert(page_cache_key(page_id), page.clone());
        Ok(Some(page))
    }
}
