//! Record model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A payload field the saver is allowed to copy onto a stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncField {
    Content,
    #[serde(alias = "encrypted_item_key")]
    EncItemKey,
    ContentType,
    AuthHash,
    Deleted,
    CreatedAt,
}

impl SyncField {
    /// Whitelist used when none is configured.
    pub const DEFAULT: [Self; 6] = [
        Self::Content,
        Self::EncItemKey,
        Self::ContentType,
        Self::AuthHash,
        Self::Deleted,
        Self::CreatedAt,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Content => "content",
            Self::EncItemKey => "enc_item_key",
            Self::ContentType => "content_type",
            Self::AuthHash => "auth_hash",
            Self::Deleted => "deleted",
            Self::CreatedAt => "created_at",
        }
    }

    /// Parse a comma separated list such as `content,deleted`.
    pub fn parse_list(raw: &str) -> Result<Vec<Self>> {
        let mut fields = Vec::new();
        for name in raw.split(',').map(str::trim).filter(|name| !name.is_empty()) {
            let field = name.parse()?;
            if !fields.contains(&field) {
                fields.push(field);
            }
        }
        Ok(fields)
    }
}

impl fmt::Display for SyncField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "content" => Ok(Self::Content),
            "enc_item_key" | "encrypted_item_key" => Ok(Self::EncItemKey),
            "content_type" => Ok(Self::ContentType),
            "auth_hash" => Ok(Self::AuthHash),
            "deleted" => Ok(Self::Deleted),
            "created_at" => Ok(Self::CreatedAt),
            other => Err(Error::InvalidInput(format!("unknown sync field `{other}`"))),
        }
    }
}

/// A stored record.
///
/// Only `uuid` and `updated_at` mean anything to the sync algorithm; the rest
/// is carried through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Client-assigned identifier, unique across all principals
    pub uuid: String,
    /// Owning principal
    #[serde(skip)]
    pub user_uuid: String,
    pub content: Option<String>,
    pub enc_item_key: Option<String>,
    pub content_type: Option<String>,
    pub auth_hash: Option<String>,
    /// Tombstone flag
    pub deleted: bool,
    /// Client-assigned creation time
    pub created_at: DateTime<Utc>,
    /// Store-assigned on every write; the only version key
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// An empty record as created by find-or-create.
    pub fn new(user_uuid: impl Into<String>, uuid: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            uuid: uuid.into(),
            user_uuid: user_uuid.into(),
            content: None,
            enc_item_key: None,
            content_type: None,
            auth_hash: None,
            deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Copy the whitelisted fields present in `payload` onto this record.
    pub fn apply(&mut self, payload: &ItemPayload, fields: &[SyncField]) {
        for field in fields {
            match field {
                SyncField::Content => {
                    if let Some(value) = &payload.content {
                        self.content = Some(value.clone());
                    }
                }
                SyncField::EncItemKey => {
                    if let Some(value) = &payload.enc_item_key {
                        self.enc_item_key = Some(value.clone());
                    }
                }
                SyncField::ContentType => {
                    if let Some(value) = &payload.content_type {
                        self.content_type = Some(value.clone());
                    }
                }
                SyncField::AuthHash => {
                    if let Some(value) = &payload.auth_hash {
                        self.auth_hash = Some(value.clone());
                    }
                }
                SyncField::Deleted => {
                    if let Some(value) = payload.deleted {
                        self.deleted = value;
                    }
                }
                SyncField::CreatedAt => {
                    if let Some(value) = payload.created_at {
                        self.created_at = value;
                    }
                }
            }
        }
    }

    /// Turn this record into a tombstone: identity and timestamps stay,
    /// content-bearing fields are cleared.
    pub fn tombstone(&mut self) {
        self.deleted = true;
        self.content = None;
        self.enc_item_key = None;
        self.auth_hash = None;
    }
}

/// A record as pushed by a client.
///
/// Absent fields leave the stored value unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPayload {
    pub uuid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(
        default,
        alias = "encrypted_item_key",
        skip_serializing_if = "Option::is_none"
    )]
    pub enc_item_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl ItemPayload {
    pub fn new(uuid: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    #[must_use]
    pub const fn with_deleted(mut self, deleted: bool) -> Self {
        self.deleted = Some(deleted);
        self
    }
}
