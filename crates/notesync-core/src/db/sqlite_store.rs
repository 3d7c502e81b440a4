//! `SQLite` implementation of `RecordStore`

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSqlError, Type};
use rusqlite::{params, Connection, OptionalExtension};

use super::store::{LowerBound, RangeQuery, RecordStore};
use crate::clock::{Clock, SystemClock};
use crate::error::{Error, Result};
use crate::models::Item;

const COLUMNS: &str = "uuid, user_uuid, content, enc_item_key, content_type, auth_hash, \
                       deleted, created_at, updated_at";

/// `SQLite` implementation of `RecordStore`
pub struct SqliteRecordStore<'a> {
    conn: &'a Connection,
    clock: Arc<dyn Clock>,
}

impl<'a> SqliteRecordStore<'a> {
    /// Create a new store over the given connection
    pub fn new(conn: &'a Connection) -> Self {
        Self::with_clock(conn, Arc::new(SystemClock))
    }

    /// Create a store that stamps writes with `clock`
    pub fn with_clock(conn: &'a Connection, clock: Arc<dyn Clock>) -> Self {
        Self { conn, clock }
    }

    /// Parse an item from a database row
    fn parse_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<Item> {
        Ok(Item {
            uuid: row.get(0)?,
            user_uuid: row.get(1)?,
            content: row.get(2)?,
            enc_item_key: row.get(3)?,
            content_type: row.get(4)?,
            auth_hash: row.get(5)?,
            deleted: row.get::<_, i32>(6)? != 0,
            created_at: from_micros(7, row.get(7)?)?,
            updated_at: from_micros(8, row.get(8)?)?,
        })
    }
}

fn from_micros(index: usize, micros: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            index,
            Type::Integer,
            Box::new(FromSqlError::OutOfRange(micros)),
        )
    })
}

impl RecordStore for SqliteRecordStore<'_> {
    fn find_or_create(&self, owner: &str, uuid: &str) -> Result<Item> {
        let now = self.clock.now().timestamp_micros();

        // A single statement, so racing creators cannot both insert
        self.conn.execute(
            "INSERT INTO items (uuid, user_uuid, deleted, created_at, updated_at)
             VALUES (?1, ?2, 0, ?3, ?3)
             ON CONFLICT(uuid) DO NOTHING",
            params![uuid, owner, now],
        )?;

        let item = self.conn.query_row(
            &format!("SELECT {COLUMNS} FROM items WHERE uuid = ?1"),
            params![uuid],
            Self::parse_item,
        )?;

        if item.user_uuid != owner {
            return Err(Error::UuidConflict(uuid.to_string()));
        }
        Ok(item)
    }

    fn update(&self, item: &mut Item) -> Result<()> {
        let now = self.clock.now().timestamp_micros();

        let updated_at: Option<i64> = self
            .conn
            .query_row(
                "UPDATE items
                 SET content = ?1, enc_item_key = ?2, content_type = ?3, auth_hash = ?4,
                     deleted = ?5, created_at = ?6, updated_at = MAX(?7, updated_at + 1)
                 WHERE uuid = ?8 AND user_uuid = ?9
                 RETURNING updated_at",
                params![
                    item.content,
                    item.enc_item_key,
                    item.content_type,
                    item.auth_hash,
                    i32::from(item.deleted),
                    item.created_at.timestamp_micros(),
                    now,
                    item.uuid,
                    item.user_uuid,
                ],
                |row| row.get(0),
            )
            .optional()?;

        let updated_at = updated_at.ok_or_else(|| Error::NotFound(item.uuid.clone()))?;
        item.updated_at = from_micros(8, updated_at)?;
        Ok(())
    }

    fn range_query(&self, owner: &str, query: &RangeQuery) -> Result<Vec<Item>> {
        let (op, bound) = match query.lower {
            Some(lower @ LowerBound::Inclusive(_)) => (">=", lower.micros()),
            Some(lower @ LowerBound::Exclusive(_)) => (">", lower.micros()),
            None => (">=", i64::MIN),
        };
        // SQLite treats a negative LIMIT as unbounded
        let limit = query
            .limit
            .map_or(-1, |limit| i64::try_from(limit).unwrap_or(i64::MAX));

        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COLUMNS}
             FROM items
             WHERE user_uuid = ?1 AND updated_at {op} ?2
             ORDER BY updated_at ASC, uuid ASC
             LIMIT ?3"
        ))?;

        let items = stmt
            .query_map(params![owner, bound, limit], Self::parse_item)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(items)
    }

    fn delete_where(&self, owner: &str, uuids: &[String]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let mut removed = 0;
        {
            let mut stmt = tx.prepare("DELETE FROM items WHERE user_uuid = ?1 AND uuid = ?2")?;
            for uuid in uuids {
                removed += stmt.execute(params![owner, uuid])?;
            }
        }
        tx.commit()?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::clock::ManualClock;
    use crate::db::store::conformance;
    use crate::db::Database;

    fn setup() -> (Database, Arc<ManualClock>) {
        let db = Database::open_in_memory().unwrap();
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap(),
        ));
        (db, clock)
    }

    #[test]
    fn test_find_or_create_is_idempotent() {
        let (db, clock) = setup();
        let store = SqliteRecordStore::with_clock(db.connection(), clock);
        conformance::find_or_create_is_idempotent(&store);
    }

    #[test]
    fn test_foreign_uuid_is_a_conflict() {
        let (db, clock) = setup();
        let store = SqliteRecordStore::with_clock(db.connection(), clock);
        conformance::foreign_uuid_is_a_conflict(&store);
    }

    #[test]
    fn test_update_assigns_increasing_timestamps() {
        let (db, clock) = setup();
        let store = SqliteRecordStore::with_clock(db.connection(), clock.clone());
        conformance::update_assigns_increasing_timestamps(&store, &clock);
    }

    #[test]
    fn test_range_query_orders_and_bounds() {
        let (db, clock) = setup();
        let store = SqliteRecordStore::with_clock(db.connection(), clock.clone());
        conformance::range_query_orders_and_bounds(&store, &clock);
    }

    #[test]
    fn test_sub_microsecond_bounds_agree() {
        let (db, clock) = setup();
        let store = SqliteRecordStore::with_clock(db.connection(), clock.clone());
        conformance::sub_microsecond_bounds_agree(&store, &clock);
    }

    #[test]
    fn test_delete_where_is_scoped() {
        let (db, clock) = setup();
        let store = SqliteRecordStore::with_clock(db.connection(), clock);
        conformance::delete_where_is_scoped(&store);
    }

    #[test]
    fn test_update_of_destroyed_record_is_not_found() {
        let (db, clock) = setup();
        let store = SqliteRecordStore::with_clock(db.connection(), clock);
        let mut item = store.find_or_create("alice", "gone").unwrap();
        store.delete_where("alice", &["gone".to_string()]).unwrap();

        let err = store.update(&mut item).unwrap_err();
        assert!(matches!(err, Error::NotFound(ref uuid) if uuid == "gone"));
    }

    #[test]
    fn test_fields_round_trip_through_sqlite() {
        let (db, clock) = setup();
        let store = SqliteRecordStore::with_clock(db.connection(), clock);
        let mut item = store.find_or_create("alice", "full").unwrap();
        item.content = Some("body".to_string());
        item.enc_item_key = Some("key".to_string());
        item.content_type = Some("Note".to_string());
        item.auth_hash = Some("hash".to_string());
        item.deleted = true;
        item.created_at = Utc.timestamp_opt(1_600_000_000, 654_321_000).unwrap();
        store.update(&mut item).unwrap();

        let stored = store.range_query("alice", &RangeQuery::default()).unwrap();
        assert_eq!(stored, vec![item]);
    }
}
