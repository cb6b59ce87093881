//! Repository for the `page_activity` table.

use sqlx::PgPool;
use biolink_core::types::DbId;

use crate::models::activity::PageActivity;

/// Column list for `page_activity` queries.
const COLUMNS: &str = "id, page_id, user_id, event_type, payload, created_at";

/// Provides data access for the page activity log.
pub struct ActivityRepo;

impl ActivityRepo {
    /// Append an activity entry and return its ID.
    pub async fn insert(
        pool: &PgPool,
        page_id: Option<DbId>,
        user_id: Option<DbId>,
        event_type: &str,
        payload: &serde_json::Value,
    ) -> Result<DbId, sqlx::Error> {
        let row: (DbId,) = sqlx::query_as(
            "INSERT INTO page_activity (page_id, user_id, event_type, payload) \
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(page_id)
        .bind(user_id)
        .bind(event_type)
        .bind(payload)
        .fetch_one(pool)
        .await?;
        Ok(row.0)
    }

    /// Most recent activity for a page, newest first.
    pub async fn list_for_page(
        pool: &PgPool,
        page_id: DbId,
        limit: i64,
    ) -> Result<Vec<PageActivity>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM page_activity \
             WHERE page_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2"
        );
        sqlx::query_as::<_, PageActivity>(&query)
            .bind(page_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }
}
