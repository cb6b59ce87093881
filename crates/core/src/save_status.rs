//! Save status state machine and autosave timing defaults.
//!
//! One debounced batch moves `idle → pending → saving → saved | error`;
//! `error` falls back to `idle` once the error has been shown for
//! [`ERROR_RESET_MS`]. A new edit moves any state back to `pending`.

use serde::{Deserialize, Serialize};

/// Quiet period before an autosave fires.
pub const AUTOSAVE_DEBOUNCE_MS: u64 = 1_500;

/// Extra save attempts after the first failure.
pub const SAVE_RETRY_LIMIT: u32 = 2;

/// Fixed delay between save attempts.
pub const SAVE_RETRY_BACKOFF_MS: u64 = 500;

/// How long `error` is shown before returning to `idle`.
pub const ERROR_RESET_MS: u64 = 3_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveStatus {
    #[default]
    Idle,
    Pending,
    Saving,
    Saved,
    Error,
}

/// Inputs that drive [`SaveStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveEvent {
    /// A local mutation scheduled a save.
    Edited,
    /// The debounce timer fired (or a manual save started).
    Started,
    Succeeded,
    Failed,
    /// The error display interval elapsed.
    ErrorExpired,
    /// Local state was discarded in favour of the remote copy.
    Reset,
}

impl SaveStatus {
    pub fn next(self, event: SaveEvent) -> SaveStatus {
        match (self, event) {
            (_, SaveEvent::Edited) => SaveStatus::Pending,
            (_, SaveEvent::Started) => SaveStatus::Saving,
            (SaveStatus::Saving, SaveEvent::Succeeded) => SaveStatus::Saved,
            (SaveStatus::Saving, SaveEvent::Failed) => SaveStatus::Error,
            (SaveStatus::Error, SaveEvent::ErrorExpired) => SaveStatus::Idle,
            (_, SaveEvent::Reset) => SaveStatus::Idle,
            (current, _) => current,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SaveStatus::Idle => "idle",
            SaveStatus::Pending => "pending",
            SaveStatus::Saving => "saving",
            SaveStatus::Saved => "saved",
            SaveStatus::Error => "error",
        }
    }

    /// Whether unsaved work is queued or in flight.
    pub fn is_busy(self) -> bool {
        matches!(self, SaveStatus::Pending | SaveStatus::Saving)
    }
}

impl std::fmt::Display for SaveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path() {
        let s = SaveStatus::Idle
            .next(SaveEvent::Edited)
            .next(SaveEvent::Started)
            .next(SaveEvent::Succeeded);
        assert_eq!(s, SaveStatus::Saved);
    }

    #[test]
    fn failure_then_expiry_returns_to_idle() {
        let s = SaveStatus::Saving.next(SaveEvent::Failed);
        assert_eq!(s, SaveStatus::Error);
        assert_eq!(s.next(SaveEvent::ErrorExpired), SaveStatus::Idle);
    }

    #[test]
    fn error_expiry_only_clears_errors() {
        assert_eq!(SaveStatus::Pending.next(SaveEvent::ErrorExpired), SaveStatus::Pending);
        assert_eq!(SaveStatus::Saved.next(SaveEvent::ErrorExpired), SaveStatus::Saved);
    }

    #[test]
    fn outcome_outside_saving_is_ignored() {
        assert_eq!(SaveStatus::Pending.next(SaveEvent::Succeeded), SaveStatus::Pending);
        assert_eq!(SaveStatus::Idle.next(SaveEvent::Failed), SaveStatus::Idle);
    }

    #[test]
    fn edit_always_goes_pending() {
        for s in [
            SaveStatus::Idle,
            SaveStatus::Pending,
            SaveStatus::Saving,
            SaveStatus::Saved,
            SaveStatus::Error,
        ] {
            assert_eq!(s.next(SaveEvent::Edited), SaveStatus::Pending);
        }
    }

    #[test]
    fn busy_states() {
        assert!(SaveStatus::Pending.is_busy());
        assert!(SaveStatus::Saving.is_busy());
        assert!(!SaveStatus::Saved.is_busy());
    }

    #[test]
    fn serializes_snake_case() {
        assert_eq!(serde_json::to_value(SaveStatus::Saving).unwrap(), "saving");
    }
}
