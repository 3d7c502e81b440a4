//! Record store collaborators for notesync

mod connection;
mod memory_store;
mod migrations;
mod sqlite_store;
mod store;

pub use connection::Database;
pub use memory_store::MemoryRecordStore;
pub use sqlite_store::SqliteRecordStore;
pub use store::{LowerBound, RangeQuery, RecordStore};
