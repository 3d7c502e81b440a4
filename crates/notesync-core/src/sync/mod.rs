//! Sync orchestration for multi-device record stores
//!
//! One [`SyncManager`] serves one principal for one request. A sync call:
//!
//! 1. Fetches records changed since the caller's checkpoint, before writing
//!    anything, so the page is a snapshot of what other devices did
//! 2. Saves the pushed payloads
//! 3. Reconciles records that were both saved and fetched
//! 4. Issues a new sync token just past the newest saved timestamp
//!
//! No locks are taken. Correctness across concurrent devices rests on the
//! store's atomic find-or-create and per-record monotonic timestamps.

mod conflict;
mod fetch;
mod save;

use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

pub use conflict::resolve_conflicts;
pub use fetch::{checkpoint, fetch_items};
pub use save::save_items;

use crate::clock::{Clock, SystemClock};
use crate::config::SyncSettings;
use crate::db::RecordStore;
use crate::error::{Error, Result};
use crate::models::{ItemPayload, SyncField, SyncResponse};
use crate::token;

/// Per-call checkpoint and paging options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Return records strictly newer than this checkpoint
    pub sync_token: Option<String>,
    /// Return records at or after this checkpoint; wins over `sync_token`
    pub cursor_token: Option<String>,
    /// Page size; the manager's default applies when absent
    pub limit: Option<usize>,
    /// Treat an undecodable token as no checkpoint instead of failing
    pub fallback_on_invalid_token: bool,
}

/// Sync engine bound to one principal and one record store.
pub struct SyncManager<'a, S: RecordStore + ?Sized> {
    store: &'a S,
    user_uuid: String,
    settings: SyncSettings,
    clock: Arc<dyn Clock>,
}

impl<'a, S: RecordStore + ?Sized> SyncManager<'a, S> {
    /// Create a manager for `user_uuid` with default settings.
    pub fn new(store: &'a S, user_uuid: impl Into<String>) -> Result<Self> {
        let user_uuid = user_uuid.into();
        if user_uuid.trim().is_empty() {
            return Err(Error::InvalidInput("user must be set".to_string()));
        }
        Ok(Self {
            store,
            user_uuid,
            settings: SyncSettings::default(),
            clock: Arc::new(SystemClock),
        })
    }

    #[must_use]
    pub fn with_settings(mut self, settings: SyncSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the payload field whitelist used by subsequent saves.
    pub fn set_sync_fields(&mut self, fields: Vec<SyncField>) {
        self.settings.sync_fields = fields;
    }

    pub fn sync_fields(&self) -> &[SyncField] {
        &self.settings.sync_fields
    }

    /// Push `payloads` and pull everything changed since the caller's
    /// checkpoint in one step.
    pub fn sync(&self, payloads: &[ItemPayload], options: &SyncOptions) -> Result<SyncResponse> {
        let limit = options.limit.unwrap_or(self.settings.default_limit);
        let lower = checkpoint(
            options.sync_token.as_deref(),
            options.cursor_token.as_deref(),
            options.fallback_on_invalid_token,
        )?;

        let (mut retrieved_items, cursor_token) =
            fetch_items(self.store, &self.user_uuid, lower, limit)?;
        let (saved_items, mut unsaved) =
            save_items(self.store, &self.user_uuid, payloads, &self.settings.sync_fields)?;

        let last_updated = saved_items
            .iter()
            .map(|item| item.updated_at)
            .max()
            .unwrap_or_else(|| self.clock.now());

        resolve_conflicts(
            &saved_items,
            &mut retrieved_items,
            &mut unsaved,
            self.settings.conflict_window,
        );

        // Nudge past the newest write so the next exclusive fetch skips it
        let sync_token = token::encode(last_updated + self.settings.token_epsilon);

        tracing::info!(
            user = user_fingerprint(&self.user_uuid),
            retrieved = retrieved_items.len(),
            saved = saved_items.len(),
            unsaved = unsaved.len(),
            more = cursor_token.is_some(),
            "Sync completed"
        );

        Ok(SyncResponse {
            retrieved_items,
            saved_items,
            unsaved,
            sync_token,
            cursor_token,
        })
    }

    /// Permanently remove the principal's records with these uuids.
    ///
    /// Unknown uuids are ignored. This is the only hard-delete path; a
    /// payload with `deleted: true` only tombstones.
    pub fn destroy_items(&self, uuids: &[String]) -> Result<usize> {
        let unique: Vec<String> = uuids
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let removed = self.store.delete_where(&self.user_uuid, &unique)?;
        tracing::info!(
            user = user_fingerprint(&self.user_uuid),
            requested = unique.len(),
            removed,
            "Destroyed items"
        );
        Ok(removed)
    }
}

fn user_fingerprint(user_id: &str) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    user_id.hash(&mut hasher);
    hasher.finish()
}
