//! Editor session and the debounced save/publish pipeline.
//!
//! An [`EditorSession`] owns the local copy of a page. Every mutation is
//! applied immediately and schedules a debounced autosave that saves,
//! mirrors event blocks, then publishes. Persistence goes through the
//! [`collaborators`] traits so the pipeline runs against Postgres
//! ([`postgres`]) or in memory ([`memory`]).

pub mod collaborators;
pub mod config;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod session;

pub use collaborators::{EventBlockSync, PageCache, PageStore, SaveOutcome};
pub use config::PipelineConfig;
pub use error::{PipelineError, StoreError};
pub use session::{Collaborators, EditorSession, PublishResult};
