//! In-process implementation of `RecordStore`

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Duration;

use super::store::{RangeQuery, RecordStore};
use crate::clock::{Clock, SystemClock};
use crate::error::{Error, Result};
use crate::models::Item;

/// Records keyed by uuid behind a mutex.
///
/// Same guarantees as the `SQLite` store: find-or-create happens under one
/// lock acquisition, and updates never reuse a timestamp.
pub struct MemoryRecordStore {
    items: Mutex<HashMap<String, Item>>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            items: Mutex::new(HashMap::new()),
            clock,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Item>>> {
        self.items
            .lock()
            .map_err(|_| Error::StoreUnavailable("memory store lock poisoned".to_string()))
    }
}

impl RecordStore for MemoryRecordStore {
    fn find_or_create(&self, owner: &str, uuid: &str) -> Result<Item> {
        let now = self.clock.now();
        let mut items = self.lock()?;
        let item = items
            .entry(uuid.to_string())
            .or_insert_with(|| Item::new(owner, uuid, now));

        if item.user_uuid != owner {
            return Err(Error::UuidConflict(uuid.to_string()));
        }
        Ok(item.clone())
    }

    fn update(&self, item: &mut Item) -> Result<()> {
        let now = self.clock.now();
        let mut items = self.lock()?;
        let stored = items
            .get_mut(&item.uuid)
            .filter(|stored| stored.user_uuid == item.user_uuid)
            .ok_or_else(|| Error::NotFound(item.uuid.clone()))?;

        let next = stored.updated_at + Duration::microseconds(1);
        item.updated_at = if now > next { now } else { next };
        stored.clone_from(item);
        Ok(())
    }

    fn range_query(&self, owner: &str, query: &RangeQuery) -> Result<Vec<Item>> {
        let items = self.lock()?;
        let mut selected: Vec<Item> = items
            .values()
            .filter(|item| item.user_uuid == owner)
            .filter(|item| query.lower.is_none_or(|lower| lower.admits(item.updated_at)))
            .cloned()
            .collect();
        drop(items);

        selected.sort_by(|a, b| {
            a.updated_at
                .cmp(&b.updated_at)
                .then_with(|| a.uuid.cmp(&b.uuid))
        });
        if let Some(limit) = query.limit {
            selected.truncate(limit);
        }
        Ok(selected)
    }

    fn delete_where(&self, owner: &str, uuids: &[String]) -> Result<usize> {
        let mut items = self.lock()?;
        let mut removed = 0;
        for uuid in uuids {
            if items.get(uuid).is_some_and(|item| item.user_uuid == owner) {
                items.remove(uuid);
                removed += 1;
            }
        }
        Ok(removed)
    }
}
