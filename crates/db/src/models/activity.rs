//! Page activity log rows.

use biolink_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `page_activity` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PageActivity {
    pub id: DbId,
    pub page_id: Option<DbId>,
    pub user_id: Option<DbId>,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub created_at: Timestamp,
}
