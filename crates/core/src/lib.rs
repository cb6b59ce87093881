//! Domain model for the link-in-bio page builder.
//!
//! This crate has no I/O. It owns the block and page document types, the
//! grid placement engine with its drag/resize gesture interpreters, block
//! sanitation, and the save status state machine shared by the pipeline and
//! the HTTP layer.

pub mod block;
pub mod error;
pub mod gesture;
pub mod grid;
pub mod page;
pub mod sanitize;
pub mod save_status;
pub mod types;
