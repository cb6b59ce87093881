pub mod health;
pub mod pages;

use axum::routing::get;
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Read-only routes for page visitors, mounted under `/api/v1`.
///
/// ```text
/// /p/{slug}                                  published page
/// ```
pub fn public_routes() -> Router<AppState> {
    Router::new().route("/p/{slug}", get(handlers::pages::get_published_page))
}

/// Editor routes, mounted under `/api/v1`.
///
/// ```text
/// /pages                                     create (POST)
/// /pages/{id}                                partial update (PATCH)
/// /pages/{id}/editor                         editor view, close session (DELETE)
/// /pages/{id}/blocks                         add (POST), replace (PUT)
/// /pages/{id}/blocks/order                   reorder (PUT)
/// /pages/{id}/blocks/{block_id}              update (PATCH), delete
/// /pages/{id}/blocks/{block_id}/layout       move / resize (PUT)
/// /pages/{id}/theme                          update theme (PUT)
/// /pages/{id}/mode                           switch editor mode (PUT)
/// /pages/{id}/publish                        save and publish (POST)
/// /pages/{id}/refresh                        reload stored draft (POST)
/// /pages/{id}/activity                       activity log
/// ```
pub fn editor_routes() -> Router<AppState> {
    Router::new().nest("/pages", pages::router())
}
