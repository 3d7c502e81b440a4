//! notesync-core - Core library for notesync
//!
//! This crate contains the record model, checkpoint token codec, record-store
//! collaborators, and the sync orchestration used by every notesync binding.

pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod sync;
pub mod token;

pub use config::SyncSettings;
pub use error::{Error, Result};
pub use models::{ErrorTag, Item, ItemPayload, SyncField, SyncResponse, UnsavedItem};
pub use sync::{SyncManager, SyncOptions};
