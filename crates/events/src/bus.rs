//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! Share one [`EventBus`] via `Arc<EventBus>` across the application.

use biolink_core::types::{DbId, Timestamp};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// PageEvent
// ---------------------------------------------------------------------------

/// Something that happened to a page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageEvent {
    /// Dot-separated event name, e.g. `"page.published"`.
    pub event_type: String,

    /// The page the event concerns, once it has been persisted.
    pub page_id: Option<DbId>,

    /// The owner or editor that triggered the event.
    pub actor_user_id: Option<DbId>,

    pub payload: serde_json::Value,

    pub timestamp: Timestamp,
}

impl PageEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            page_id: None,
            actor_user_id: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    pub fn with_page(mut self, page_id: Option<DbId>) -> Self {
        self.page_id = page_id;
        self
    }

    pub fn with_actor(mut self, user_id: DbId) -> Self {
        self.actor_user_id = Some(user_id);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// ```rust
/// use biolink_events::bus::{EventBus, PageEvent};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(PageEvent::new("page.saved"));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<PageEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// Slow receivers observe `RecvError::Lagged` once the buffer is full.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// Dropped silently when nobody is subscribed.
    pub fn publish(&self, event: PageEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PageEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(
            PageEvent::new("page.saved")
                .with_page(Some(42))
                .with_actor(7)
                .with_payload(serde_json::json!({"context": "autosave"})),
        );

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(received.event_type, "page.saved");
        assert_eq!(received.page_id, Some(42));
        assert_eq!(received.actor_user_id, Some(7));
        assert_eq!(received.payload["context"], "autosave");
    }

    #[tokio::test]
    async fn every_subscriber_receives_the_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(PageEvent::new("page.published"));

        assert_eq!(rx1.recv().await.unwrap().event_type, "page.published");
        assert_eq!(rx2.recv().await.unwrap().event_type, "page.published");
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        EventBus::default().publish(PageEvent::new("page.refreshed"));
    }

    #[test]
    fn new_event_has_empty_optional_fields() {
        let event = PageEvent::new("page.saved");
        assert!(event.page_id.is_none());
        assert!(event.actor_user_id.is_none());
        assert!(event.payload.is_object());
    }
}
