//! Handlers for page lifecycle: creation, partial updates, publishing,
//! refresh, the public view and the activity log.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use biolink_core::page::{validate_slug, EditorMode, PageData, PagePatch};
use biolink_core::types::DbId;
use serde::Deserialize;
use validator::{Validate, ValidationError};

use crate::error::{AppError, AppResult};
use crate::handlers::editor::EditorView;
use crate::response::DataResponse;
use crate::state::AppState;

const DEFAULT_ACTIVITY_LIMIT: i64 = 50;
const MAX_ACTIVITY_LIMIT: i64 = 500;

fn slug_rule(slug: &str) -> Result<(), ValidationError> {
    validate_slug(slug).map_err(|_| ValidationError::new("slug"))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePageRequest {
    #[validate(range(min = 1))]
    pub user_id: DbId,
    #[validate(custom(function = "slug_rule"))]
    pub slug: String,
    #[validate(length(max = 120))]
    pub profile_name: String,
    #[validate(length(max = 200))]
    pub title: Option<String>,
    #[serde(default)]
    pub editor_mode: EditorMode,
}

#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    pub limit: Option<i64>,
}

/// POST /api/v1/pages
pub async fn create_page(
    State(state): State<AppState>,
    Json(input): Json<CreatePageRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;

    let mut page = PageData::new(input.user_id, input.slug, input.profile_name);
    page.title = input.title;
    page.editor_mode = input.editor_mode;

    let page = state.backend.create_page(page).await?;
    let session = state.sessions.insert(page).await?;

    tracing::info!(
        page_id = ?session.page_id(),
        user_id = input.user_id,
        "Page created",
    );

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: EditorView::of(&session),
        }),
    ))
}

/// PATCH /api/v1/pages/{id}
pub async fn update_page(
    State(state): State<AppState>,
    Path(page_id): Path<DbId>,
    Json(patch): Json<PagePatch>,
) -> AppResult<impl IntoResponse> {
    let session = state.sessions.open(page_id).await?;
    session.update_page_data_partial(patch)?;
    Ok(Json(DataResponse {
        data: EditorView::of(&session),
    }))
}

/// POST /api/v1/pages/{id}/publish
///
/// Save immediately and publish. Failures are returned, not retried.
pub async fn publish_page(
    State(state): State<AppState>,
    Path(page_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let session = state.sessions.open(page_id).await?;
    let result = session.publish().await?;
    tracing::info!(page_id, slug = %result.slug, "Page published");
    Ok(Json(DataResponse { data: result }))
}

/// POST /api/v1/pages/{id}/refresh
///
/// Discard local edits and reload the stored draft.
pub async fn refresh_page(
    State(state): State<AppState>,
    Path(page_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let session = state.sessions.open(page_id).await?;
    session.refresh().await?;
    Ok(Json(DataResponse {
        data: EditorView::of(&session),
    }))
}

/// GET /api/v1/pages/{id}/activity?limit=N
pub async fn list_activity(
    State(state): State<AppState>,
    Path(page_id): Path<DbId>,
    Query(query): Query<ActivityQuery>,
) -> AppResult<impl IntoResponse> {
    let limit = query.limit.unwrap_or(DEFAULT_ACTIVITY_LIMIT);
    if !(1..=MAX_ACTIVITY_LIMIT).contains(&limit) {
        return Err(AppError::BadRequest(format!(
            "limit must be between 1 and {MAX_ACTIVITY_LIMIT}"
        )));
    }
    let entries = state.backend.activity(page_id, limit).await?;
    Ok(Json(DataResponse { data: entries }))
}

/// GET /api/v1/p/{slug}
///
/// Public, published view of a page.
pub async fn get_published_page(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<impl IntoResponse> {
    let page = state
        .backend
        .published_page(&slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No published page at '{slug}'")))?;
    Ok(Json(DataResponse { data: page }))
}
