//! Data models for notesync

mod item;
mod sync_response;

pub use item::{Item, ItemPayload, SyncField};
pub use sync_response::{ErrorTag, SyncResponse, UnsavedError, UnsavedItem, UnsavedSubject};
