//! Engine settings owned by each sync manager.

use chrono::Duration;

use crate::models::SyncField;

/// Default number of records returned by one fetch.
pub const DEFAULT_LIMIT: usize = 100_000;

/// Saved/retrieved pairs further apart than this are divergent edits.
pub const DEFAULT_CONFLICT_WINDOW_SECS: i64 = 20;

/// Tuning for a [`SyncManager`](crate::SyncManager).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Threshold between ignorable near-simultaneous writes and real conflicts
    pub conflict_window: Duration,
    /// Page size when the caller passes no limit
    pub default_limit: usize,
    /// Added to the newest saved timestamp before it becomes a sync token
    pub token_epsilon: Duration,
    /// Payload fields the saver copies onto records
    pub sync_fields: Vec<SyncField>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            conflict_window: Duration::seconds(DEFAULT_CONFLICT_WINDOW_SECS),
            default_limit: DEFAULT_LIMIT,
            token_epsilon: Duration::microseconds(1),
            sync_fields: SyncField::DEFAULT.to_vec(),
        }
    }
}

impl SyncSettings {
    #[must_use]
    pub const fn with_conflict_window(mut self, window: Duration) -> Self {
        self.conflict_window = window;
        self
    }

    #[must_use]
    pub const fn with_default_limit(mut self, limit: usize) -> Self {
        self.default_limit = limit;
        self
    }

    #[must_use]
    pub fn with_sync_fields(mut self, fields: Vec<SyncField>) -> Self {
        self.sync_fields = fields;
        self
    }
}
