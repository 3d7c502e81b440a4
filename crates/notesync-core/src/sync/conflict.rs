//! Reconcile records saved by this call with records fetched by it.

use std::collections::HashMap;

use chrono::Duration;

use crate::models::{Item, UnsavedItem};

/// Remove from `retrieved` every record this call also saved.
///
/// A retrieved version more than `window` away from the saved one is a
/// divergent edit and is handed back through `unsaved` as a `sync_conflict`;
/// anything closer is the same write seen twice and is dropped. Saved records
/// are never touched.
pub fn resolve_conflicts(
    saved: &[Item],
    retrieved: &mut Vec<Item>,
    unsaved: &mut Vec<UnsavedItem>,
    window: Duration,
) {
    if saved.is_empty() || retrieved.is_empty() {
        return;
    }

    let saved_by_uuid: HashMap<&str, &Item> =
        saved.iter().map(|item| (item.uuid.as_str(), item)).collect();

    let mut kept = Vec::with_capacity(retrieved.len());
    for item in retrieved.drain(..) {
        let Some(ours) = saved_by_uuid.get(item.uuid.as_str()) else {
            kept.push(item);
            continue;
        };

        let gap = (ours.updated_at - item.updated_at).abs();
        if gap > window {
            tracing::warn!(
                uuid = %item.uuid,
                gap_ms = gap.num_milliseconds(),
                "Divergent edit returned as sync conflict"
            );
            unsaved.push(UnsavedItem::sync_conflict(item));
        } else {
            tracing::debug!(
                uuid = %item.uuid,
                gap_ms = gap.num_milliseconds(),
                "Dropping retrieved copy of just-saved record"
            );
        }
    }
    *retrieved = kept;
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::models::ErrorTag;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn item(uuid: &str, updated_secs: i64, content: &str) -> Item {
        let mut item = Item::new("alice", uuid, at(0));
        item.updated_at = at(updated_secs);
        item.content = Some(content.to_string());
        item
    }

    fn window() -> Duration {
        Duration::seconds(20)
    }

    #[test]
    fn far_apart_versions_become_sync_conflicts() {
        let saved = vec![item("x", 0, "ours")];
        let mut retrieved = vec![item("x", 25, "theirs"), item("y", 3, "other")];
        let mut unsaved = Vec::new();

        resolve_conflicts(&saved, &mut retrieved, &mut unsaved, window());

        assert_eq!(retrieved, vec![item("y", 3, "other")]);
        assert_eq!(unsaved, vec![UnsavedItem::sync_conflict(item("x", 25, "theirs"))]);
        assert_eq!(unsaved[0].tag(), ErrorTag::SyncConflict);
        assert_eq!(saved, vec![item("x", 0, "ours")]);
    }

    #[test]
    fn close_versions_are_dropped_silently() {
        let saved = vec![item("x", 0, "ours")];
        let mut retrieved = vec![item("x", 5, "theirs")];
        let mut unsaved = Vec::new();

        resolve_conflicts(&saved, &mut retrieved, &mut unsaved, window());

        assert!(retrieved.is_empty());
        assert!(unsaved.is_empty());
    }

    #[test]
    fn gap_is_symmetric_and_window_is_exclusive() {
        let saved = vec![item("older", 30, "ours"), item("edge", 20, "ours")];
        let mut retrieved = vec![item("older", 0, "theirs"), item("edge", 0, "theirs")];
        let mut unsaved = Vec::new();

        resolve_conflicts(&saved, &mut retrieved, &mut unsaved, window());

        assert!(retrieved.is_empty());
        assert_eq!(unsaved.len(), 1);
        assert_eq!(unsaved[0].uuid(), "older");
    }

    #[test]
    fn existing_unsaved_entries_are_preserved() {
        let saved = vec![item("x", 0, "ours")];
        let mut retrieved = vec![item("x", 60, "theirs")];
        let mut unsaved = vec![UnsavedItem::uuid_conflict(
            crate::models::ItemPayload::new("taken"),
            "taken",
        )];

        resolve_conflicts(&saved, &mut retrieved, &mut unsaved, window());

        assert_eq!(unsaved.len(), 2);
        assert_eq!(unsaved[0].tag(), ErrorTag::UuidConflict);
        assert_eq!(unsaved[1].tag(), ErrorTag::SyncConflict);
    }
}
