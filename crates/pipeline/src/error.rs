use biolink_core::error::CoreError;
use biolink_core::types::DbId;

/// Failures reported by persistence collaborators.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("User {0} has no saved page to publish")]
    NothingToPublish(DbId),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Errors returned by [`EditorSession`](crate::EditorSession) operations.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Page has not been saved yet")]
    NotSaved,

    #[error("Page {0} no longer exists")]
    PageGone(DbId),
}
