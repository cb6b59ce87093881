use std::time::Duration;

use biolink_core::save_status::{
    AUTOSAVE_DEBOUNCE_MS, ERROR_RESET_MS, SAVE_RETRY_BACKOFF_MS, SAVE_RETRY_LIMIT,
};

/// Autosave timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Quiet period after the last edit before an autosave fires.
    pub debounce: Duration,
    /// Extra attempts after a failed autosave request.
    pub retry_limit: u32,
    /// Fixed delay between attempts.
    pub retry_backoff: Duration,
    /// How long `error` is shown before falling back to `idle`.
    pub error_reset: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(AUTOSAVE_DEBOUNCE_MS),
            retry_limit: SAVE_RETRY_LIMIT,
            retry_backoff: Duration::from_millis(SAVE_RETRY_BACKOFF_MS),
            error_reset: Duration::from_millis(ERROR_RESET_MS),
        }
    }
}

impl PipelineConfig {
    /// Load from environment variables, falling back to the defaults.
    ///
    /// | Env Var                 | Default |
    /// |-------------------------|---------|
    /// | `AUTOSAVE_DEBOUNCE_MS`  | `1500`  |
    /// | `SAVE_RETRY_LIMIT`      | `2`     |
    /// | `SAVE_RETRY_BACKOFF_MS` | `500`   |
    /// | `SAVE_ERROR_RESET_MS`   | `3000`  |
    pub fn from_env() -> Self {
        let debounce_ms: u64 = std::env::var("AUTOSAVE_DEBOUNCE_MS")
            .unwrap_or_else(|_| AUTOSAVE_DEBOUNCE_MS.to_string())
            .parse()
            .expect("AUTOSAVE_DEBOUNCE_MS must be a valid u64");

        let retry_limit: u32 = std::env::var("SAVE_RETRY_LIMIT")
            .unwrap_or_else(|_| SAVE_RETRY_LIMIT.to_string())
            .parse()
            .expect("SAVE_RETRY_LIMIT must be a valid u32");

        let backoff_ms: u64 = std::env::var("SAVE_RETRY_BACKOFF_MS")
            .unwrap_or_else(|_| SAVE_RETRY_BACKOFF_MS.to_string())
            .parse()
            .expect("SAVE_RETRY_BACKOFF_MS must be a valid u64");

        let reset_ms: u64 = std::env::var("SAVE_ERROR_RESET_MS")
            .unwrap_or_else(|_| ERROR_RESET_MS.to_string())
            .parse()
            .expect("SAVE_ERROR_RESET_MS must be a valid u64");

        Self {
            debounce: Duration::from_millis(debounce_ms),
            retry_limit,
            retry_backoff: Duration::from_millis(backoff_ms),
            error_reset: Duration::from_millis(reset_ms),
        }
    }

    /// Total attempts an autosave makes before giving up.
    pub fn max_attempts(&self) -> u32 {
        self.retry_limit + 1
    }
}
