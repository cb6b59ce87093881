//! Repository for the `page_event_blocks` table.

use sqlx::PgPool;
use biolink_core::types::DbId;

use crate::models::event_block::{EventBlockRow, UpsertEventBlock};

/// Column list for `page_event_blocks` queries.
const COLUMNS: &str = "\
    id, user_id, page_id, block_id, title, starts_at, ends_at, location, \
    ticket_url, payload, created_at, updated_at";

/// Provides data access for event-block mirrors.
pub struct EventBlockRepo;

impl EventBlockRepo {
    /// Insert or refresh the mirror of one event block.
    pub async fn upsert(
        pool: &PgPool,
        dto: &UpsertEventBlock,
    ) -> Result<EventBlockRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO page_event_blocks \
                 (user_id, page_id, block_id, title, starts_at, ends_at, location, ticket_url, payload) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (user_id, block_id) DO UPDATE SET \
                 page_id    = EXCLUDED.page_id, \
                 title      = EXCLUDED.title, \
                 starts_at  = EXCLUDED.starts_at, \
                 ends_at    = EXCLUDED.ends_at, \
                 location   = EXCLUDED.location, \
                 ticket_url = EXCLUDED.ticket_url, \
                 payload    = EXCLUDED.payload, \
                 updated_at = NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, EventBlockRow>(&query)
            .bind(dto.user_id)
            .bind(dto.page_id)
            .bind(&dto.block_id)
            .bind(&dto.title)
            .bind(dto.starts_at)
            .bind(dto.ends_at)
            .bind(&dto.location)
            .bind(&dto.ticket_url)
            .bind(&dto.payload)
            .fetch_one(pool)
            .await
    }

    /// Delete the mirror of an event block.
    ///
    /// Returns `true` if a row was deleted.
    pub async fn delete(
        pool: &PgPool,
        user_id: DbId,
        block_id: &str,
    ) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM page_event_blocks WHERE user_id = $1 AND block_id = $2")
                .bind(user_id)
                .bind(block_id)
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// List the event mirrors of a page, soonest first.
    pub async fn list_for_page(
        pool: &PgPool,
        page_id: DbId,
    ) -> Result<Vec<EventBlockRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM page_event_blocks \
             WHERE page_id = $1 ORDER BY starts_at ASC NULLS LAST, id"
        );
        sqlx::query_as::<_, EventBlockRow>(&query)
            .bind(page_id)
            .fetch_all(pool)
            .await
    }
}
