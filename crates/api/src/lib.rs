//! Biolink API server library.
//!
//! Exposes config, state, error handling, the page backends and routes so
//! integration tests and the binary entrypoint share them.

pub mod backend;
pub mod config;
pub mod error;
pub mod handlers;
pub mod response;
pub mod router;
pub mod routes;
pub mod sessions;
pub mod state;
