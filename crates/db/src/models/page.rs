//! Page entity model and DTOs.
//!
//! The `blocks` and `theme` columns hold the JSON form of the core
//! [`PageData`] fields. The `published_*` columns are a snapshot taken at
//! publish time, so public reads never see unpublished draft edits.

use biolink_core::page::{EditorMode, PageData};
use biolink_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `pages` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Page {
    pub id: DbId,
    pub user_id: DbId,
    pub slug: String,
    pub title: Option<String>,
    pub niche: Option<String>,
    pub editor_mode: String,
    pub blocks: serde_json::Value,
    pub theme: serde_json::Value,
    pub published_blocks: Option<serde_json::Value>,
    pub published_theme: Option<serde_json::Value>,
    pub is_published: bool,
    pub published_at: Option<Timestamp>,
    pub last_save_context: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Page {
    /// Decode the draft columns into an editable document.
    pub fn to_page_data(&self) -> Result<PageData, serde_json::Error> {
        Ok(PageData {
            id: Some(self.id),
            user_id: self.user_id,
            slug: self.slug.clone(),
            title: self.title.clone(),
            blocks: serde_json::from_value(self.blocks.clone())?,
            theme: serde_json::from_value(self.theme.clone())?,
            editor_mode: EditorMode::from_name(&self.editor_mode),
            is_published: self.is_published,
            niche: self.niche.clone(),
        })
    }
}

/// The public, published view of a page.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PublishedPage {
    pub id: DbId,
    pub slug: String,
    pub title: Option<String>,
    pub published_blocks: serde_json::Value,
    pub published_theme: serde_json::Value,
    pub published_at: Timestamp,
}

/// DTO for inserting a new page.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePage {
    pub user_id: DbId,
    pub slug: String,
    pub title: Option<String>,
    pub editor_mode: String,
    pub blocks: serde_json::Value,
    pub theme: serde_json::Value,
}

impl CreatePage {
    pub fn from_page_data(page: &PageData) -> Result<Self, serde_json::Error> {
        Ok(Self {
            user_id: page.user_id,
            slug: page.slug.clone(),
            title: page.title.clone(),
            editor_mode: page.editor_mode.as_str().to_string(),
            blocks: serde_json::to_value(&page.blocks)?,
            theme: serde_json::to_value(&page.theme)?,
        })
    }
}

/// DTO for writing the draft columns of a page.
#[derive(Debug, Clone)]
pub struct SavePageDraft {
    pub user_id: DbId,
    pub slug: String,
    pub title: Option<String>,
    pub niche: Option<String>,
    pub editor_mode: String,
    pub blocks: serde_json::Value,
    pub theme: serde_json::Value,
    /// Free-form origin of the save (`"autosave"`, `"manual"`, …).
    pub context: String,
}

impl SavePageDraft {
    pub fn from_page_data(page: &PageData, context: &str) -> Result<Self, serde_json::Error> {
        Ok(Self {
            user_id: page.user_id,
            slug: page.slug.clone(),
            title: page.title.clone(),
            niche: page.niche.clone(),
            editor_mode: page.editor_mode.as_str().to_string(),
            blocks: serde_json::to_value(&page.blocks)?,
            theme: serde_json::to_value(&page.theme)?,
            context: context.to_string(),
        })
    }
}
