//! Result of one sync call

use serde::Serialize;

use super::{Item, ItemPayload};

/// Why an input or retrieved record ended up in `unsaved`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorTag {
    /// The uuid belongs to another principal
    UuidConflict,
    /// A divergent version was written elsewhere since the client's checkpoint
    SyncConflict,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnsavedError {
    pub tag: ErrorTag,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// The record an unsaved entry refers to: the client's own payload for uuid
/// conflicts, the server's copy for sync conflicts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum UnsavedSubject {
    Payload(ItemPayload),
    Item(Item),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnsavedItem {
    pub item: UnsavedSubject,
    pub error: UnsavedError,
}

impl UnsavedItem {
    pub fn uuid_conflict(payload: ItemPayload, message: impl Into<String>) -> Self {
        Self {
            item: UnsavedSubject::Payload(payload),
            error: UnsavedError {
                tag: ErrorTag::UuidConflict,
                message: Some(message.into()),
            },
        }
    }

    pub const fn sync_conflict(item: Item) -> Self {
        Self {
            item: UnsavedSubject::Item(item),
            error: UnsavedError {
                tag: ErrorTag::SyncConflict,
                message: None,
            },
        }
    }

    pub const fn tag(&self) -> ErrorTag {
        self.error.tag
    }

    pub fn uuid(&self) -> &str {
        match &self.item {
            UnsavedSubject::Payload(payload) => &payload.uuid,
            UnsavedSubject::Item(item) => &item.uuid,
        }
    }
}

/// Everything one sync call hands back. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncResponse {
    pub retrieved_items: Vec<Item>,
    pub saved_items: Vec<Item>,
    pub unsaved: Vec<UnsavedItem>,
    pub sync_token: String,
    pub cursor_token: Option<String>,
}
