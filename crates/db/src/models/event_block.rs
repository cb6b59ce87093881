//! Event-block mirror rows.

use biolink_core::block::{Block, BlockContent, DEFAULT_LOCALE};
use biolink_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `page_event_blocks` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct EventBlockRow {
    pub id: DbId,
    pub user_id: DbId,
    pub page_id: DbId,
    pub block_id: String,
    pub title: String,
    pub starts_at: Option<Timestamp>,
    pub ends_at: Option<Timestamp>,
    pub location: Option<String>,
    pub ticket_url: Option<String>,
    pub payload: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for inserting or refreshing an event mirror.
#[derive(Debug, Clone)]
pub struct UpsertEventBlock {
    pub user_id: DbId,
    pub page_id: DbId,
    pub block_id: String,
    pub title: String,
    pub starts_at: Option<Timestamp>,
    pub ends_at: Option<Timestamp>,
    pub location: Option<String>,
    pub ticket_url: Option<String>,
    pub payload: serde_json::Value,
}

impl UpsertEventBlock {
    /// Build the mirror for an `event` block. Returns `None` for other kinds.
    pub fn from_block(
        block: &Block,
        page_id: DbId,
        user_id: DbId,
    ) -> Result<Option<Self>, serde_json::Error> {
        let BlockContent::Event {
            title,
            starts_at,
            ends_at,
            location,
            ticket_url,
            ..
        } = &block.content
        else {
            return Ok(None);
        };

        Ok(Some(Self {
            user_id,
            page_id,
            block_id: block.id.clone(),
            title: title.get(DEFAULT_LOCALE).unwrap_or_default().to_string(),
            starts_at: *starts_at,
            ends_at: *ends_at,
            location: location.clone(),
            ticket_url: ticket_url.clone(),
            payload: serde_json::to_value(block)?,
        }))
    }
}
