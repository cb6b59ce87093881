//! Activity log writer.
//!
//! [`ActivityRecorder`] subscribes to the [`EventBus`](crate::bus::EventBus)
//! and appends every [`PageEvent`] to `page_activity`. It exits once the bus
//! is dropped.

use biolink_core::types::DbId;
use biolink_db::repositories::ActivityRepo;
use biolink_db::DbPool;
use tokio::sync::broadcast;

use crate::bus::PageEvent;

pub struct ActivityRecorder;

impl ActivityRecorder {
    /// Run the recording loop until the channel closes.
    pub async fn run(pool: DbPool, mut receiver: broadcast::Receiver<PageEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    if let Err(e) = Self::record(&pool, &event).await {
                        tracing::error!(
                            error = %e,
                            event_type = %event.event_type,
                            page_id = ?event.page_id,
                            "Failed to record page activity"
                        );
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Activity recorder lagged, some events were not recorded");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, activity recorder shutting down");
                    break;
                }
            }
        }
    }

    async fn record(pool: &DbPool, event: &PageEvent) -> Result<DbId, sqlx::Error> {
        ActivityRepo::insert(
            pool,
            event.page_id,
            event.actor_user_id,
            &event.event_type,
            &event.payload,
        )
        .await
    }
}
