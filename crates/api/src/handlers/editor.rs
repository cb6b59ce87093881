//! Handlers for editing a page's blocks, theme and mode.
//!
//! Every mutation is applied to the page's editor session immediately and
//! answered with the updated document; persistence happens through the
//! session's debounced autosave.

use std::collections::BTreeMap;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use biolink_core::block::{Block, BlockKind};
use biolink_core::grid::{GridLayoutData, GridStyle};
use biolink_core::page::{EditorMode, PageData, Theme};
use biolink_core::save_status::SaveStatus;
use biolink_core::types::DbId;
use biolink_pipeline::EditorSession;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Views and request bodies
// ---------------------------------------------------------------------------

/// Local document plus save state, as seen by the editor.
#[derive(Debug, Serialize)]
pub struct EditorView {
    pub page: PageData,
    pub status: SaveStatus,
    pub dirty: bool,
    pub version: u64,
    /// CSS placement per block id, for blocks on the grid.
    pub grid_styles: BTreeMap<String, GridStyle>,
}

impl EditorView {
    pub fn of(session: &EditorSession) -> Self {
        Self {
            page: session.snapshot(),
            status: session.status(),
            dirty: session.is_dirty(),
            version: session.version(),
            grid_styles: session.grid_styles().into_iter().collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AddBlockRequest {
    #[serde(rename = "type")]
    pub kind: BlockKind,
    /// Fields merged over the starter content for `kind`.
    #[serde(default)]
    pub content: Option<serde_json::Value>,
    #[serde(default)]
    pub grid_layout: Option<GridLayoutData>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReorderRequest {
    #[validate(length(min = 1))]
    pub ordered_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct EditorModeRequest {
    pub editor_mode: EditorMode,
}

// ---------------------------------------------------------------------------
// Endpoints
// ---------------------------------------------------------------------------

/// GET /api/v1/pages/{id}/editor
pub async fn get_editor(
    State(state): State<AppState>,
    Path(page_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let session = state.sessions.open(page_id).await?;
    Ok(Json(DataResponse {
        data: EditorView::of(&session),
    }))
}

/// DELETE /api/v1/pages/{id}/editor
///
/// Drop the page's editor session. Refused with 409 while edits are unsaved.
pub async fn close_editor(
    State(state): State<AppState>,
    Path(page_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    state.sessions.close(page_id).await?;
    tracing::info!(page_id, "Editor closed");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/pages/{id}/blocks
pub async fn add_block(
    State(state): State<AppState>,
    Path(page_id): Path<DbId>,
    Json(input): Json<AddBlockRequest>,
) -> AppResult<impl IntoResponse> {
    let session = state.sessions.open(page_id).await?;

    let mut block = Block::new(input.kind);
    if let Some(content) = &input.content {
        block = block.merge_patch(content)?;
    }
    block.grid_layout = input.grid_layout;

    let block = session.add_block(block)?;
    tracing::info!(page_id, block_id = %block.id, kind = %block.kind(), "Block added");

    Ok((StatusCode::CREATED, Json(DataResponse { data: block })))
}

/// PATCH /api/v1/pages/{id}/blocks/{block_id}
///
/// Shallow JSON merge into the block. `id` and `type` cannot change.
pub async fn update_block(
    State(state): State<AppState>,
    Path((page_id, block_id)): Path<(DbId, String)>,
    Json(patch): Json<serde_json::Value>,
) -> AppResult<impl IntoResponse> {
    let session = state.sessions.open(page_id).await?;
    let block = session.update_block(&block_id, &patch)?;
    Ok(Json(DataResponse { data: block }))
}

/// DELETE /api/v1/pages/{id}/blocks/{block_id}
pub async fn delete_block(
    State(state): State<AppState>,
    Path((page_id, block_id)): Path<(DbId, String)>,
) -> AppResult<impl IntoResponse> {
    let session = state.sessions.open(page_id).await?;
    let removed = session.delete_block(&block_id)?;
    tracing::info!(page_id, block_id = %removed.id, kind = %removed.kind(), "Block deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/v1/pages/{id}/blocks
pub async fn replace_blocks(
    State(state): State<AppState>,
    Path(page_id): Path<DbId>,
    Json(blocks): Json<Vec<Block>>,
) -> AppResult<impl IntoResponse> {
    let session = state.sessions.open(page_id).await?;
    session.replace_blocks(blocks)?;
    Ok(Json(DataResponse {
        data: EditorView::of(&session),
    }))
}

/// PUT /api/v1/pages/{id}/blocks/order
pub async fn reorder_blocks(
    State(state): State<AppState>,
    Path(page_id): Path<DbId>,
    Json(input): Json<ReorderRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let session = state.sessions.open(page_id).await?;
    session.reorder_blocks(&input.ordered_ids)?;
    Ok(Json(DataResponse {
        data: EditorView::of(&session),
    }))
}

/// PUT /api/v1/pages/{id}/blocks/{block_id}/layout
///
/// Commit a drag or resize. Out-of-bounds or overlapping layouts are
/// answered with 409 and leave the block where it was.
pub async fn set_block_layout(
    State(state): State<AppState>,
    Path((page_id, block_id)): Path<(DbId, String)>,
    Json(layout): Json<GridLayoutData>,
) -> AppResult<impl IntoResponse> {
    let session = state.sessions.open(page_id).await?;
    session.set_block_layout(&block_id, layout)?;
    Ok(Json(DataResponse {
        data: EditorView::of(&session),
    }))
}

/// PUT /api/v1/pages/{id}/theme
pub async fn update_theme(
    State(state): State<AppState>,
    Path(page_id): Path<DbId>,
    Json(theme): Json<Theme>,
) -> AppResult<impl IntoResponse> {
    let session = state.sessions.open(page_id).await?;
    session.update_theme(theme)?;
    Ok(Json(DataResponse {
        data: EditorView::of(&session),
    }))
}

/// PUT /api/v1/pages/{id}/mode
pub async fn update_editor_mode(
    State(state): State<AppState>,
    Path(page_id): Path<DbId>,
    Json(input): Json<EditorModeRequest>,
) -> AppResult<impl IntoResponse> {
    let session = state.sessions.open(page_id).await?;
    session.update_editor_mode(input.editor_mode)?;
    Ok(Json(DataResponse {
        data: EditorView::of(&session),
    }))
}
