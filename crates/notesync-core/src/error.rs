//! Error types for notesync-core

use thiserror::Error;

use crate::token::TokenError;

/// Result type alias using notesync-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in notesync-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// A sync or cursor token could not be decoded
    #[error("Invalid sync token: {0}")]
    InvalidToken(#[from] TokenError),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The uuid is already owned by another principal
    #[error("uuid conflict: {0} is already in use")]
    UuidConflict(String),

    /// Record store failure outside of SQLite
    #[error("Record store unavailable: {0}")]
    StoreUnavailable(String),

    /// `SQLite` error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl Error {
    /// Whether this error came from the record store itself.
    pub const fn is_store_failure(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_) | Self::Sqlite(_))
    }
}
