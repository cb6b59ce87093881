//! Repository for the `pages` table.

use sqlx::PgPool;
use biolink_core::types::DbId;

use crate::models::page::{CreatePage, Page, PublishedPage, SavePageDraft};

/// Column list for `pages` queries.
const COLUMNS: &str = "\
    id, user_id, slug, title, niche, editor_mode, blocks, theme, \
    published_blocks, published_theme, is_published, published_at, \
    last_save_context, created_at, updated_at";

/// Provides data access for pages.
pub struct PageRepo;

impl PageRepo {
    /// Insert a new page.
    pub async fn create(pool: &PgPool, dto: &CreatePage) -> Result<Page, sqlx::Error> {
        let query = format!(
            "INSERT INTO pages (user_id, slug, title, editor_mode, blocks, theme) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Page>(&query)
            .bind(dto.user_id)
            .bind(&dto.slug)
            .bind(&dto.title)
            .bind(&dto.editor_mode)
            .bind(&dto.blocks)
            .bind(&dto.theme)
            .fetch_one(pool)
            .await
    }

    /// Find a page by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Page>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM pages WHERE id = $1");
        sqlx::query_as::<_, Page>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find the published snapshot of a page by slug.
    ///
    /// Returns `None` if no page has the slug or it was never published.
    pub async fn find_published_by_slug(
        pool: &PgPool,
        slug: &str,
    ) -> Result<Option<PublishedPage>, sqlx::Error> {
        sqlx::query_as::<_, PublishedPage>(
            "SELECT id, slug, title, published_blocks, published_theme, published_at \
             FROM pages \
             WHERE slug = $1 AND is_published = TRUE \
               AND published_blocks IS NOT NULL AND published_at IS NOT NULL",
        )
        .bind(slug)
        .fetch_optional(pool)
        .await
    }

    /// Write the draft columns of a page.
    ///
    /// Updates the row `id` when it exists and belongs to the same user;
    /// otherwise inserts a new row. Either way the stored row is returned, so
    /// callers take the page id from the result.
    pub async fn save_draft(
        pool: &PgPool,
        id: Option<DbId>,
        dto: &SavePageDraft,
    ) -> Result<Page, sqlx::Error> {
        if let Some(id) = id {
            let query = format!(
                "UPDATE pages SET \
                     slug              = $3, \
                     title             = $4, \
                     niche             = $5, \
                     editor_mode       = $6, \
                     blocks            = $7, \
                     theme             = $8, \
                     last_save_context = $9, \
                     updated_at        = NOW() \
                 WHERE id = $1 AND user_id = $2 \
                 RETURNING {COLUMNS}"
            );
            let updated = sqlx::query_as::<_, Page>(&query)
                .bind(id)
                .bind(dto.user_id)
                .bind(&dto.slug)
                .bind(&dto.title)
                .bind(&dto.niche)
                .bind(&dto.editor_mode)
                .bind(&dto.blocks)
                .bind(&dto.theme)
                .bind(&dto.context)
                .fetch_optional(pool)
                .await?;
            if let Some(page) = updated {
                return Ok(page);
            }
            tracing::warn!(page_id = id, user_id = dto.user_id, "Page to save not found, inserting");
        }

        let query = format!(
            "INSERT INTO pages \
                 (user_id, slug, title, niche, editor_mode, blocks, theme, last_save_context) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Page>(&query)
            .bind(dto.user_id)
            .bind(&dto.slug)
            .bind(&dto.title)
            .bind(&dto.niche)
            .bind(&dto.editor_mode)
            .bind(&dto.blocks)
            .bind(&dto.theme)
            .bind(&dto.context)
            .fetch_one(pool)
            .await
    }

    /// Publish the user's most recently saved page.
    ///
    /// Copies the draft into the published snapshot and returns the slug,
    /// or `None` if the user has no pages.
    pub async fn publish_latest_for_user(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Option<String>, sqlx::Error> {
        let row: Option<(String,)> = sqlx::query_as(
            "UPDATE pages SET \
                 published_blocks = blocks, \
                 published_theme  = theme, \
                 is_published     = TRUE, \
                 published_at     = NOW() \
             WHERE id = ( \
                 SELECT id FROM pages WHERE user_id = $1 \
                 ORDER BY updated_at DESC, id DESC LIMIT 1 \
             ) \
             RETURNING slug",
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
        Ok(row.map(|(slug,)| slug))
    }
}
