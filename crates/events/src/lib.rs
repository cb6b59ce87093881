//! Page lifecycle events.
//!
//! - [`EventBus`] is an in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`PageEvent`] is the event envelope.
//! - [`ActivityRecorder`] is a background task that appends every event to
//!   the `page_activity` table.

pub mod activity;
pub mod bus;

pub use activity::ActivityRecorder;
pub use bus::{EventBus, PageEvent};

/// Event type names published by the editor pipeline.
pub mod event_types {
    pub const PAGE_SAVED: &str = "page.saved";
    pub const PAGE_PUBLISHED: &str = "page.published";
    pub const PAGE_SAVE_FAILED: &str = "page.save_failed";
    pub const PAGE_REFRESHED: &str = "page.refreshed";
}
