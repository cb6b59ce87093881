//! Editor session: optimistic local edits plus a debounced autosave.
//!
//! Every mutation applies to the local [`PageData`] at once, marks the
//! session dirty and starts a new save *version*. Only the newest version
//! may change the [`SaveStatus`]; older runs notice they were superseded and
//! stop quietly. Saves are serialized so an older snapshot never lands after
//! a newer one.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use biolink_core::block::Block;
use biolink_core::error::CoreError;
use biolink_core::gesture::GestureOutcome;
use biolink_core::grid::{GridConfig, GridLayoutData, GridStyle};
use biolink_core::page::{EditorMode, PageData, PagePatch, Theme};
use biolink_core::sanitize::sanitize_blocks;
use biolink_core::save_status::{SaveEvent, SaveStatus};
use biolink_core::types::DbId;
use biolink_events::{event_types, EventBus, PageEvent};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::collaborators::{page_cache_key, EventBlockSync, PageCache, PageStore, SaveOutcome};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, StoreError};

const AUTOSAVE_CONTEXT: &str = "autosave";
const MANUAL_CONTEXT: &str = "manual";

/// The persistence services a session talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn PageStore>,
    pub events: Arc<dyn EventBlockSync>,
    pub cache: Arc<dyn PageCache>,
}

/// Returned by a manual publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishResult {
    pub page_id: Option<DbId>,
    pub slug: String,
}

/// Cloneable handle to one page being edited.
///
/// Dropping the last handle (or calling [`close`](Self::close)) cancels a
/// pending autosave. A save already in flight still completes.
#[derive(Clone)]
pub struct EditorSession {
    inner: Arc<SessionState>,
}

struct SessionState {
    page: Mutex<PageData>,
    dirty: AtomicBool,
    /// Bumped only while the status channel is locked.
    version: AtomicU64,
    status: watch::Sender<SaveStatus>,
    timer: Mutex<Option<JoinHandle<()>>>,
    save_lock: tokio::sync::Mutex<()>,
    collaborators: Collaborators,
    bus: Option<Arc<EventBus>>,
    config: PipelineConfig,
    grid: GridConfig,
}

impl EditorSession {
    pub fn new(
        mut page: PageData,
        collaborators: Collaborators,
        config: PipelineConfig,
        bus: Option<Arc<EventBus>>,
    ) -> Self {
        page.ensure_profile_first();
        let (status, _) = watch::channel(SaveStatus::Idle);
        Self {
            inner: Arc::new(SessionState {
                page: Mutex::new(page),
                dirty: AtomicBool::new(false),
                version: AtomicU64::new(0),
                status,
                timer: Mutex::new(None),
                save_lock: tokio::sync::Mutex::new(()),
                collaborators,
                bus,
                config,
                grid: GridConfig::default(),
            }),
        }
    }

    // -- Read access ---------------------------------------------------------

    pub fn snapshot(&self) -> PageData {
        self.inner.page().clone()
    }

    pub fn page_id(&self) -> Option<DbId> {
        self.inner.page().id
    }

    pub fn status(&self) -> SaveStatus {
        *self.inner.status.borrow()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SaveStatus> {
        self.inner.status.subscribe()
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.load(Ordering::SeqCst)
    }

    /// Current save version. Increases on every edit, manual save and refresh.
    pub fn version(&self) -> u64 {
        self.inner.version.load(Ordering::SeqCst)
    }

    pub fn grid_config(&self) -> GridConfig {
        self.inner.grid
    }

    /// CSS placement of every placed block, in block order.
    pub fn grid_styles(&self) -> Vec<(String, GridStyle)> {
        let page = self.inner.page();
        let engine = page.grid(self.inner.grid);
        page.content_blocks()
            .filter_map(|b| engine.compute_style(&b.id).map(|style| (b.id.clone(), style)))
            .collect()
    }

    // -- Mutations -----------------------------------------------------------

    /// Append a block and return it as stored (id and layout filled in).
    pub fn add_block(&self, block: Block) -> Result<Block, PipelineError> {
        self.mutate(|page, grid| {
            page.add_block(block, grid)?;
            page.blocks
                .last()
                .cloned()
                .ok_or_else(|| CoreError::Internal("block list empty after insert".into()))
        })
    }

    /// Merge a JSON patch into a block and return the result.
    pub fn update_block(
        &self,
        block_id: &str,
        patch: &serde_json::Value,
    ) -> Result<Block, PipelineError> {
        self.mutate(|page, grid| {
            page.update_block(block_id, patch, grid)?;
            page.find_block(block_id)
                .cloned()
                .ok_or_else(|| CoreError::BlockNotFound(block_id.to_string()))
        })
    }

    /// Move or resize a block. Overlaps and out-of-bounds layouts are rejected.
    pub fn set_block_layout(
        &self,
        block_id: &str,
        layout: GridLayoutData,
    ) -> Result<(), PipelineError> {
        self.mutate(|page, grid| page.set_block_layout(block_id, layout, grid))
    }

    /// Apply a finished drag or resize. Returns whether anything changed.
    pub fn apply_gesture(&self, outcome: GestureOutcome) -> Result<bool, PipelineError> {
        match outcome.committed() {
            Some(layout) => {
                self.set_block_layout(outcome.block_id(), layout)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn delete_block(&self, block_id: &str) -> Result<Block, PipelineError> {
        let removed = self.mutate(|page, _| page.delete_block(block_id))?;
        if removed.is_event() {
            self.inner.spawn_event_delete(removed.id.clone());
        }
        Ok(removed)
    }

    pub fn reorder_blocks(&self, ordered_ids: &[String]) -> Result<(), PipelineError> {
        self.mutate(|page, _| page.reorder_blocks(ordered_ids))
    }

    /// Replace the block list. Event blocks that disappear lose their mirror.
    pub fn replace_blocks(&self, blocks: Vec<Block>) -> Result<(), PipelineError> {
        let blocks = sanitize_blocks(blocks);
        let removed_events = self.mutate(|page, grid| {
            let before = page.event_block_ids();
            page.replace_blocks(blocks, grid)?;
            let after = page.event_block_ids();
            Ok(before
                .into_iter()
                .filter(|id| !after.contains(id))
                .collect::<Vec<_>>())
        })?;
        for event_id in removed_events {
            self.inner.spawn_event_delete(event_id);
        }
        Ok(())
    }

    pub fn update_theme(&self, theme: Theme) -> Result<(), PipelineError> {
        self.mutate(|page, _| {
            page.update_theme(theme);
            Ok(())
        })
    }

    pub fn update_editor_mode(&self, mode: EditorMode) -> Result<(), PipelineError> {
        self.mutate(|page, grid| {
            page.update_editor_mode(mode, grid);
            Ok(())
        })
    }

    pub fn update_page_data_partial(&self, patch: PagePatch) -> Result<(), PipelineError> {
        self.mutate(|page, grid| page.apply_patch(patch, grid))
    }

    fn mutate<T>(
        &self,
        apply: impl FnOnce(&mut PageData, GridConfig) -> Result<T, CoreError>,
    ) -> Result<T, PipelineError> {
        let value = {
            let mut page = self.inner.page();
            apply(&mut page, self.inner.grid)?
        };
        SessionState::schedule(&self.inner);
        Ok(value)
    }

    // -- Explicit operations -------------------------------------------------

    /// Save once and publish, bypassing the debounce. This is the only
    /// explicit save path; Save and Publish buttons both land here.
    ///
    /// Cancels the pending autosave and supersedes any run in flight. Errors
    /// are returned to the caller; the status reflects the outcome as well.
    pub async fn publish(&self) -> Result<PublishResult, PipelineError> {
        let state = &self.inner;
        let version = {
            let mut timer = state.timer();
            if let Some(pending) = timer.take() {
                pending.abort();
            }
            state.advance(SaveEvent::Started, None)
        };

        let _serial = state.save_lock.lock().await;
        let snapshot = state.snapshot_for_save();
        tracing::info!(page_id = ?snapshot.id, version, "Manual save and publish");

        let outcome = match state.collaborators.store.save_page(&snapshot, MANUAL_CONTEXT).await {
            Ok(outcome) => outcome,
            Err(e) => {
                SessionState::fail(state, version, &e, MANUAL_CONTEXT);
                return Err(e.into());
            }
        };
        let page_id = state.record_saved(&snapshot, &outcome, MANUAL_CONTEXT);
        state.sync_event_blocks(&snapshot, page_id);

        let slug = match state.collaborators.store.publish_page(snapshot.user_id).await {
            Ok(slug) => slug,
            Err(e) => {
                SessionState::fail(state, version, &e, MANUAL_CONTEXT);
                return Err(e.into());
            }
        };
        state.record_published(page_id, &slug);
        state.complete(version);

        Ok(PublishResult { page_id, slug })
    }

    /// Drop local state in favour of the stored copy.
    ///
    /// Invalidates the `page:{id}` cache entry, refetches, clears the dirty
    /// flag and supersedes any pending or in-flight save.
    pub async fn refresh(&self) -> Result<PageData, PipelineError> {
        let state = &self.inner;
        let page_id = state.page().id.ok_or(PipelineError::NotSaved)?;

        state
            .collaborators
            .cache
            .invalidate(&page_cache_key(page_id))
            .await;
        let mut fresh = state
            .collaborators
            .cache
            .refetch(page_id)
            .await?
            .ok_or(PipelineError::PageGone(page_id))?;
        fresh.ensure_profile_first();

        let version = {
            let mut timer = state.timer();
            if let Some(pending) = timer.take() {
                pending.abort();
            }
            *state.page() = fresh.clone();
            state.advance(SaveEvent::Reset, Some(false))
        };

        tracing::info!(page_id, version, "Editor refreshed from store");
        state.emit(event_types::PAGE_REFRESHED, Some(page_id), serde_json::json!({}));
        Ok(fresh)
    }

    /// Cancel the pending autosave. In-flight saves are left to finish.
    pub fn close(&self) {
        if let Some(pending) = self.inner.timer().take() {
            pending.abort();
        }
    }
}

impl SessionState {
    fn page(&self) -> MutexGuard<'_, PageData> {
        self.page.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn timer(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.timer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_current(&self, version: u64) -> bool {
        self.version.load(Ordering::SeqCst) == version
    }

    /// Start a new version and apply `event`. Optionally sets the dirty flag
    /// in the same step.
    fn advance(&self, event: SaveEvent, dirty: Option<bool>) -> u64 {
        let mut version = 0;
        self.status.send_modify(|status| {
            version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(dirty) = dirty {
                self.dirty.store(dirty, Ordering::SeqCst);
            }
            *status = status.next(event);
        });
        version
    }

    /// Apply `event` only if `version` is still the newest. Returns whether
    /// it was.
    fn transition_if_current(&self, version: u64, event: SaveEvent) -> bool {
        self.transition_with(version, event, || {})
    }

    fn transition_with(&self, version: u64, event: SaveEvent, on_commit: impl FnOnce()) -> bool {
        let mut current = false;
        self.status.send_if_modified(|status| {
            if !self.is_current(version) {
                return false;
            }
            current = true;
            on_commit();
            let next = status.next(event);
            let changed = next != *status;
            *status = next;
            changed
        });
        current
    }

    /// Mark the session edited and (re)arm the debounce timer.
    fn schedule(self: &Arc<Self>) {
        let mut timer = self.timer();
        let version = self.advance(SaveEvent::Edited, Some(true));

        let weak = Arc::downgrade(self);
        let debounce = self.config.debounce;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            if let Some(state) = weak.upgrade() {
                // Detached so that re-arming the timer never aborts a save.
                tokio::spawn(state.autosave(version));
            }
        });

        if let Some(previous) = timer.replace(handle) {
            previous.abort();
        }
        tracing::trace!(version, "Autosave scheduled");
    }

    async fn autosave(self: Arc<Self>, version: u64) {
        if !self.is_current(version) {
            tracing::debug!(version, "Autosave superseded before start");
            return;
        }

        let _serial = self.save_lock.lock().await;
        if !self.transition_if_current(version, SaveEvent::Started) {
            tracing::debug!(version, "Autosave superseded while waiting");
            return;
        }

        let snapshot = self.snapshot_for_save();
        let outcome = match self.save_with_retry(&snapshot, version).await {
            Ok(Some(outcome)) => outcome,
            Ok(None) => return,
            Err(e) => {
                Self::fail(&self, version, &e, AUTOSAVE_CONTEXT);
                return;
            }
        };

        let page_id = self.record_saved(&snapshot, &outcome, AUTOSAVE_CONTEXT);
        self.sync_event_blocks(&snapshot, page_id);

        if !self.is_current(version) {
            tracing::debug!(version, ?page_id, "Autosave superseded after save, skipping publish");
            return;
        }

        let slug = match self.collaborators.store.publish_page(snapshot.user_id).await {
            Ok(slug) => slug,
            Err(e) => {
                Self::fail(&self, version, &e, AUTOSAVE_CONTEXT);
                return;
            }
        };
        self.record_published(page_id, &slug);

        if self.complete(version) {
            tracing::info!(?page_id, version, slug = %slug, "Autosave complete");
        }
    }

    /// Save with fixed-backoff retries. `Ok(None)` means a newer version took
    /// over between attempts.
    async fn save_with_retry(
        &self,
        snapshot: &PageData,
        version: u64,
    ) -> Result<Option<SaveOutcome>, StoreError> {
        let max_attempts = self.config.max_attempts();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match self
                .collaborators
                .store
                .save_page(snapshot, AUTOSAVE_CONTEXT)
                .await
            {
                Ok(outcome) => return Ok(Some(outcome)),
                Err(e) if attempt < max_attempts => {
                    tracing::warn!(
                        page_id = ?snapshot.id,
                        version,
                        error = %e,
                        "Autosave attempt {attempt} failed",
                    );
                }
                Err(e) => return Err(e),
            }

            tokio::time::sleep(self.config.retry_backoff).await;

            if !self.is_current(version) {
                tracing::debug!(version, attempt, "Autosave superseded during retry");
                return Ok(None);
            }
        }
    }

    fn snapshot_for_save(&self) -> PageData {
        let mut snapshot = self.page().clone();
        snapshot.blocks = sanitize_blocks(std::mem::take(&mut snapshot.blocks));
        snapshot
    }

    /// Remember the stored id and announce the save.
    fn record_saved(&self, snapshot: &PageData, outcome: &SaveOutcome, context: &str) -> Option<DbId> {
        let page_id = outcome.page_id.or(snapshot.id);
        if let Some(id) = page_id {
            self.page().id = Some(id);
        }
        self.emit(
            event_types::PAGE_SAVED,
            page_id,
            serde_json::json!({ "context": context, "slug": outcome.slug }),
        );
        page_id
    }

    fn record_published(&self, page_id: Option<DbId>, slug: &str) {
        self.page().is_published = true;
        self.emit(
            event_types::PAGE_PUBLISHED,
            page_id,
            serde_json::json!({ "slug": slug }),
        );
    }

    /// Settle on `saved` and clear the dirty flag if nothing newer happened.
    fn complete(&self, version: u64) -> bool {
        self.transition_with(version, SaveEvent::Succeeded, || {
            self.dirty.store(false, Ordering::SeqCst);
        })
    }

    /// Show `error`, then fall back to `idle` unless something newer happened.
    fn fail(self: &Arc<Self>, version: u64, error: &StoreError, context: &str) {
        if !self.transition_if_current(version, SaveEvent::Failed) {
            tracing::debug!(version, error = %error, "Superseded save failed");
            return;
        }

        let page_id = self.page().id;
        tracing::error!(?page_id, version, context, error = %error, "Page save failed");
        self.emit(
            event_types::PAGE_SAVE_FAILED,
            page_id,
            serde_json::json!({ "context": context, "error": error.to_string() }),
        );

        let weak = Arc::downgrade(self);
        let reset_after = self.config.error_reset;
        tokio::spawn(async move {
            tokio::time::sleep(reset_after).await;
            if let Some(state) = weak.upgrade() {
                state.transition_if_current(version, SaveEvent::ErrorExpired);
            }
        });
    }

    /// Mirror every event block of a saved snapshot. Failures are logged.
    fn sync_event_blocks(&self, snapshot: &PageData, page_id: Option<DbId>) {
        let Some(page_id) = page_id else {
            tracing::warn!("Saved page has no id, skipping event sync");
            return;
        };
        let user_id = snapshot.user_id;

        for block in snapshot.blocks.iter().filter(|b| b.is_event()).cloned() {
            let events = Arc::clone(&self.collaborators.events);
            tokio::spawn(async move {
                if let Err(e) = events.sync_event_block(&block, page_id, user_id).await {
                    tracing::warn!(block_id = %block.id, page_id, error = %e, "Event block sync failed");
                }
            });
        }
    }

    fn spawn_event_delete(&self, event_id: String) {
        let user_id = self.page().user_id;
        let events = Arc::clone(&self.collaborators.events);
        tokio::spawn(async move {
            if let Err(e) = events.delete_event_block(&event_id, user_id).await {
                tracing::warn!(event_id = %event_id, error = %e, "Event block delete failed");
            }
        });
    }

    fn emit(&self, event_type: &str, page_id: Option<DbId>, payload: serde_json::Value) {
        if let Some(bus) = &self.bus {
            let user_id = self.page().user_id;
            bus.publish(
                PageEvent::new(event_type)
                    .with_page(page_id)
                    .with_actor(user_id)
                    .with_payload(payload),
            );
        }
    }
}

impl Drop for SessionState {
    fn drop(&mut self) {
        let timer = self.timer.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(pending) = timer.take() {
            pending.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use biolink_core::block::{BlockContent, BlockKind};
    use biolink_core::gesture::{DragGesture, PointerPoint};

    use super::*;
    use crate::memory::InMemoryPageStore;

    const OWNER: DbId = 7;

    /// Fails the first `failures` saves (or every save when `None`).
    struct FlakyStore {
        inner: Arc<InMemoryPageStore>,
        failures: Option<u32>,
        attempts: AtomicU32,
        delay: Duration,
    }

    impl FlakyStore {
        fn new(inner: Arc<InMemoryPageStore>, failures: Option<u32>) -> Self {
            Self {
                inner,
                failures,
                attempts: AtomicU32::new(0),
                delay: Duration::ZERO,
            }
        }

        fn slow(inner: Arc<InMemoryPageStore>, delay: Duration) -> Self {
            Self {
                delay,
                ..Self::new(inner, Some(0))
            }
        }

        fn attempts(&self) -> u32 {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PageStore for FlakyStore {
        async fn save_page(&self, page: &PageData, context: &str) -> Result<SaveOutcome, StoreError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            match self.failures {
                Some(n) if attempt > n => self.inner.save_page(page, context).await,
                _ => Err(StoreError::Unavailable(format!("attempt {attempt} refused"))),
            }
        }

        async fn publish_page(&self, user_id: DbId) -> Result<String, StoreError> {
            self.inner.publish_page(user_id).await
        }
    }

    fn page() -> PageData {
        PageData::new(OWNER, "ada-lovelace", "Ada")
    }

    fn memory_session(store: &Arc<InMemoryPageStore>) -> EditorSession {
        EditorSession::new(
            page(),
            Collaborators::in_memory(store.clone()),
            PipelineConfig::default(),
            None,
        )
    }

    fn flaky_session(
        memory: &Arc<InMemoryPageStore>,
        flaky: &Arc<FlakyStore>,
        config: PipelineConfig,
    ) -> EditorSession {
        let collaborators = Collaborators {
            store: flaky.clone(),
            ..Collaborators::in_memory(memory.clone())
        };
        EditorSession::new(page(), collaborators, config, None)
    }

    async fn wait_for(session: &EditorSession, wanted: SaveStatus) {
        let mut rx = session.subscribe_status();
        rx.wait_for(|s| *s == wanted).await.unwrap();
    }

    fn red_theme() -> Theme {
        Theme {
            accent_color: "#ff0000".into(),
            ..Theme::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_edits_produce_one_save_with_merged_state() {
        let store = Arc::new(InMemoryPageStore::new());
        let session = memory_session(&store);

        session.update_theme(red_theme()).unwrap();
        session
            .update_page_data_partial(PagePatch {
                title: Some("Hello".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(session.status(), SaveStatus::Pending);
        assert!(session.is_dirty());

        wait_for(&session, SaveStatus::Saved).await;

        assert_eq!(store.save_count(), 1);
        assert_eq!(store.publish_count(), 1);
        let (saved, context) = store.last_saved().unwrap();
        assert_eq!(context, "autosave");
        assert_eq!(saved.title.as_deref(), Some("Hello"));
        assert_eq!(saved.theme.accent_color, "#ff0000");
        assert!(!session.is_dirty());
        assert_eq!(session.page_id(), saved.id);
        assert!(session.snapshot().is_published);
    }

    #[tokio::test(start_paused = true)]
    async fn two_block_updates_200ms_apart_save_once_with_both_fields() {
        let store = Arc::new(InMemoryPageStore::new());
        let mut start = page();
        let mut link = Block::new(BlockKind::Link);
        link.id = "link-1".into();
        start.add_block(link, GridConfig::default()).unwrap();
        let session = EditorSession::new(
            start,
            Collaborators::in_memory(store.clone()),
            PipelineConfig::default(),
            None,
        );

        session
            .update_block("link-1", &serde_json::json!({ "url": "https://ada.dev" }))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        session
            .update_block("link-1", &serde_json::json!({ "icon": "globe" }))
            .unwrap();

        wait_for(&session, SaveStatus::Saved).await;

        assert_eq!(store.save_count(), 1);
        let (saved, _) = store.last_saved().unwrap();
        let link = saved.find_block("link-1").unwrap();
        assert_matches!(
            &link.content,
            BlockContent::Link { url, icon, .. }
                if url == "https://ada.dev" && icon.as_deref() == Some("globe")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn each_edit_restarts_the_debounce() {
        let store = Arc::new(InMemoryPageStore::new());
        let session = memory_session(&store);

        session.update_theme(red_theme()).unwrap();
        tokio::time::sleep(Duration::from_millis(1_400)).await;
        assert_eq!(store.save_count(), 0);

        session.add_block(Block::new(BlockKind::Link)).unwrap();
        tokio::time::sleep(Duration::from_millis(1_400)).await;
        assert_eq!(store.save_count(), 0);

        wait_for(&session, SaveStatus::Saved).await;
        assert_eq!(store.save_count(), 1);
        assert_eq!(store.last_saved().unwrap().0.blocks.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn two_failures_then_success_ends_saved() {
        let memory = Arc::new(InMemoryPageStore::new());
        let flaky = Arc::new(FlakyStore::new(memory.clone(), Some(2)));
        let session = flaky_session(&memory, &flaky, PipelineConfig::default());

        session.update_theme(red_theme()).unwrap();
        wait_for(&session, SaveStatus::Saved).await;

        assert_eq!(flaky.attempts(), 3);
        assert_eq!(memory.save_count(), 1);
        assert_eq!(memory.publish_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_show_error_then_idle() {
        let memory = Arc::new(InMemoryPageStore::new());
        let flaky = Arc::new(FlakyStore::new(memory.clone(), None));
        let session = flaky_session(&memory, &flaky, PipelineConfig::default());

        session.update_theme(red_theme()).unwrap();
        wait_for(&session, SaveStatus::Error).await;
        assert_eq!(flaky.attempts(), 3);
        assert_eq!(memory.publish_count(), 0);
        assert!(session.is_dirty());

        wait_for(&session, SaveStatus::Idle).await;
        assert_eq!(flaky.attempts(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_error_reset_does_not_clobber_newer_edit() {
        let memory = Arc::new(InMemoryPageStore::new());
        let flaky = Arc::new(FlakyStore::new(memory.clone(), None));
        let config = PipelineConfig {
            error_reset: Duration::from_millis(1_000),
            ..PipelineConfig::default()
        };
        let session = flaky_session(&memory, &flaky, config);

        session.update_theme(red_theme()).unwrap();
        wait_for(&session, SaveStatus::Error).await;

        session.update_editor_mode(EditorMode::Grid).unwrap();
        tokio::time::sleep(Duration::from_millis(1_200)).await;
        assert_eq!(session.status(), SaveStatus::Pending);
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_save_does_not_publish_or_report() {
        let memory = Arc::new(InMemoryPageStore::new());
        let slow = Arc::new(FlakyStore::slow(memory.clone(), Duration::from_millis(1_000)));
        let session = flaky_session(&memory, &slow, PipelineConfig::default());

        session.update_theme(red_theme()).unwrap();
        wait_for(&session, SaveStatus::Saving).await;

        session
            .update_page_data_partial(PagePatch {
                title: Some("Second".into()),
                ..Default::default()
            })
            .unwrap();

        // The first save lands one second after it started and is stale by then.
        tokio::time::sleep(Duration::from_millis(1_100)).await;
        assert_eq!(memory.save_count(), 1);
        assert_eq!(memory.publish_count(), 0);
        assert_eq!(session.status(), SaveStatus::Pending);

        wait_for(&session, SaveStatus::Saved).await;
        assert_eq!(memory.save_count(), 2);
        assert_eq!(memory.publish_count(), 1);
        let (saved, _) = memory.last_saved().unwrap();
        assert_eq!(saved.title.as_deref(), Some("Second"));
        assert_eq!(saved.theme.accent_color, "#ff0000");
    }

    #[tokio::test(start_paused = true)]
    async fn manual_publish_cancels_pending_autosave() {
        let store = Arc::new(InMemoryPageStore::new());
        let session = memory_session(&store);

        session.update_theme(red_theme()).unwrap();
        let result = session.publish().await.unwrap();

        assert_eq!(result.slug, "ada-lovelace");
        assert!(result.page_id.is_some());
        assert_eq!(session.status(), SaveStatus::Saved);
        assert!(!session.is_dirty());
        assert_eq!(store.last_saved().unwrap().1, "manual");

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(store.save_count(), 1);
        assert!(store.published_by_slug("ada-lovelace").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn manual_publish_returns_store_errors() {
        let memory = Arc::new(InMemoryPageStore::new());
        let flaky = Arc::new(FlakyStore::new(memory.clone(), None));
        let session = flaky_session(&memory, &flaky, PipelineConfig::default());

        let err = session.publish().await.unwrap_err();
        assert_matches!(err, PipelineError::Store(StoreError::Unavailable(_)));
        assert_eq!(flaky.attempts(), 1);
        assert_eq!(session.status(), SaveStatus::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_replaces_local_state() {
        let store = Arc::new(InMemoryPageStore::new());
        let session = memory_session(&store);
        session.publish().await.unwrap();

        let mut remote = store.page(session.page_id().unwrap()).unwrap();
        remote.title = Some("From elsewhere".into());
        store.overwrite_draft(remote).unwrap();

        session.update_theme(red_theme()).unwrap();
        let fresh = session.refresh().await.unwrap();

        assert_eq!(fresh.title.as_deref(), Some("From elsewhere"));
        assert_eq!(session.snapshot().theme, Theme::default());
        assert_eq!(session.status(), SaveStatus::Idle);
        assert!(!session.is_dirty());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn refresh_before_first_save_fails() {
        let store = Arc::new(InMemoryPageStore::new());
        let session = memory_session(&store);
        assert_matches!(session.refresh().await, Err(PipelineError::NotSaved));
    }

    #[tokio::test(start_paused = true)]
    async fn saved_event_blocks_are_mirrored() {
        let store = Arc::new(InMemoryPageStore::new());
        let session = memory_session(&store);

        let event = session.add_block(Block::new(BlockKind::Event)).unwrap();
        session.add_block(Block::new(BlockKind::Link)).unwrap();
        wait_for(&session, SaveStatus::Saved).await;
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert_eq!(store.event_block_ids(OWNER), vec![event.id.clone()]);
        let mirror = store.mirrored_event(OWNER, &event.id).unwrap();
        assert_eq!(Some(mirror.page_id), session.page_id());
    }

    #[tokio::test(start_paused = true)]
    async fn deleting_event_block_removes_mirror() {
        let store = Arc::new(InMemoryPageStore::new());
        let session = memory_session(&store);

        let event = session.add_block(Block::new(BlockKind::Event)).unwrap();
        session.delete_block(&event.id).unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert_eq!(store.deleted_event_ids(), vec![event.id]);
    }

    #[tokio::test(start_paused = true)]
    async fn replacing_blocks_drops_removed_event_mirrors() {
        let store = Arc::new(InMemoryPageStore::new());
        let session = memory_session(&store);

        let kept = session.add_block(Block::new(BlockKind::Event)).unwrap();
        let dropped = session.add_block(Block::new(BlockKind::Event)).unwrap();
        session.replace_blocks(vec![kept.clone()]).unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert_eq!(store.deleted_event_ids(), vec![dropped.id]);
        let blocks = session.snapshot().blocks;
        assert!(blocks[0].is_profile());
        assert_eq!(blocks[1].id, kept.id);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_edit_schedules_nothing() {
        let store = Arc::new(InMemoryPageStore::new());
        let session = memory_session(&store);
        let profile_id = session.snapshot().blocks[0].id.clone();

        assert_matches!(
            session.delete_block(&profile_id),
            Err(PipelineError::Core(CoreError::Validation(_)))
        );
        assert_eq!(session.status(), SaveStatus::Idle);
        assert_eq!(session.version(), 0);
        assert!(!session.is_dirty());
    }

    #[tokio::test(start_paused = true)]
    async fn replace_with_colliding_layouts_is_rejected_whole() {
        let store = Arc::new(InMemoryPageStore::new());
        let session = memory_session(&store);
        let before = session.snapshot();

        let mut first = Block::new(BlockKind::Link);
        first.grid_layout = Some(GridLayoutData::cell(1, 1));
        let mut second = Block::new(BlockKind::Text);
        second.grid_layout = Some(GridLayoutData::new(1, 1, 9, 1));

        assert_matches!(
            session.replace_blocks(vec![first, second]),
            Err(PipelineError::Core(CoreError::Conflict(_)))
        );
        assert_eq!(session.snapshot(), before);
        assert_eq!(session.version(), 0);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn close_cancels_pending_autosave() {
        let store = Arc::new(InMemoryPageStore::new());
        let session = memory_session(&store);

        session.update_theme(red_theme()).unwrap();
        session.close();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(store.save_count(), 0);
        assert_eq!(session.status(), SaveStatus::Pending);
    }

    #[tokio::test(start_paused = true)]
    async fn committed_drag_moves_block_and_reverted_drag_does_not() {
        let store = Arc::new(InMemoryPageStore::new());
        let session = memory_session(&store);
        session.update_editor_mode(EditorMode::Grid).unwrap();

        let a = session.add_block(Block::new(BlockKind::Text)).unwrap();
        let b = session.add_block(Block::new(BlockKind::Text)).unwrap();
        let a_layout = a.grid_layout.unwrap();
        assert_eq!(a_layout, GridLayoutData::cell(1, 1));
        assert_eq!(b.grid_layout, Some(GridLayoutData::cell(2, 1)));

        let engine = session.snapshot().grid(session.grid_config());
        let step = engine.config().cell_width() + engine.config().gap;

        // Onto b: rejected, reverts.
        let mut drag = DragGesture::begin(&a.id, a_layout, PointerPoint::new(0.0, 0.0));
        drag.update(PointerPoint::new(step, 0.0), &engine);
        assert!(!session.apply_gesture(drag.finish()).unwrap());

        // Into the free third column: committed.
        let mut drag = DragGesture::begin(&a.id, a_layout, PointerPoint::new(0.0, 0.0));
        drag.update(PointerPoint::new(step * 2.0, 0.0), &engine);
        assert!(session.apply_gesture(drag.finish()).unwrap());

        let moved = session.snapshot().find_block(&a.id).cloned().unwrap();
        assert_eq!(moved.grid_layout, Some(GridLayoutData::cell(3, 1)));
        let styles = session.grid_styles();
        assert_eq!(styles[0].1.grid_column, "3 / span 1");
    }

    #[tokio::test(start_paused = true)]
    async fn saves_are_published_on_the_event_bus() {
        let store = Arc::new(InMemoryPageStore::new());
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();
        let session = EditorSession::new(
            page(),
            Collaborators::in_memory(store.clone()),
            PipelineConfig::default(),
            Some(bus.clone()),
        );

        session.publish().await.unwrap();

        let saved = rx.recv().await.unwrap();
        assert_eq!(saved.event_type, event_types::PAGE_SAVED);
        assert_eq!(saved.actor_user_id, Some(OWNER));
        assert_eq!(saved.payload["context"], "manual");
        let published = rx.recv().await.unwrap();
        assert_eq!(published.event_type, event_types::PAGE_PUBLISHED);
        assert_eq!(published.payload["slug"], "ada-lovelace");
    }
}
