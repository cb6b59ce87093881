use axum::routing::{get, patch, post, put};
use axum::Router;

use crate::handlers::{editor, pages};
use crate::state::AppState;

/// Page routes mounted at `/pages`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(pages::create_page))
        .route("/{id}", patch(pages::update_page))
        .route(
            "/{id}/editor",
            get(editor::get_editor).delete(editor::close_editor),
        )
        .route(
            "/{id}/blocks",
            post(editor::add_block).put(editor::replace_blocks),
        )
        .route("/{id}/blocks/order", put(editor::reorder_blocks))
        .route(
            "/{id}/blocks/{block_id}",
            patch(editor::update_block).delete(editor::delete_block),
        )
        .route("/{id}/blocks/{block_id}/layout", put(editor::set_block_layout))
        .route("/{id}/theme", put(editor::update_theme))
        .route("/{id}/mode", put(editor::update_editor_mode))
        .route("/{id}/publish", post(pages::publish_page))
        .route("/{id}/refresh", post(pages::refresh_page))
        .route("/{id}/activity", get(pages::list_activity))
}
