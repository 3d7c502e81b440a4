//! Record fetcher: one bounded page of records changed since a checkpoint.

use crate::db::{LowerBound, RangeQuery, RecordStore};
use crate::error::{Error, Result};
use crate::models::Item;
use crate::token;

/// Translate the caller's tokens into the lower bound of the range query.
///
/// A cursor wins over a sync token: cursor paging is inclusive and will
/// eventually enumerate every record, including ones that share the boundary
/// timestamp.
pub fn checkpoint(
    sync_token: Option<&str>,
    cursor_token: Option<&str>,
    fallback_on_invalid_token: bool,
) -> Result<Option<LowerBound>> {
    if let Some(cursor) = cursor_token {
        if let Some(at) = decode_or_fallback(cursor, "cursor_token", fallback_on_invalid_token)? {
            return Ok(Some(LowerBound::Inclusive(at)));
        }
    }
    if let Some(sync) = sync_token {
        if let Some(at) = decode_or_fallback(sync, "sync_token", fallback_on_invalid_token)? {
            return Ok(Some(LowerBound::Exclusive(at)));
        }
    }
    Ok(None)
}

fn decode_or_fallback(
    raw: &str,
    kind: &'static str,
    fallback: bool,
) -> Result<Option<chrono::DateTime<chrono::Utc>>> {
    match token::decode(raw) {
        Ok(at) => Ok(Some(at)),
        Err(err) if fallback => {
            tracing::warn!(token = kind, error = %err, "Ignoring undecodable token");
            Ok(None)
        }
        Err(err) => Err(Error::InvalidToken(err)),
    }
}

/// Fetch at most `limit` records above `lower`, ascending by `updated_at`.
///
/// When more records remain, also returns a cursor token pointing at the
/// last returned record's timestamp.
pub fn fetch_items<S: RecordStore + ?Sized>(
    store: &S,
    owner: &str,
    lower: Option<LowerBound>,
    limit: usize,
) -> Result<(Vec<Item>, Option<String>)> {
    if limit == 0 {
        return Err(Error::InvalidInput("limit must be at least 1".to_string()));
    }

    // One extra row tells us whether the page was truncated
    let query = RangeQuery {
        lower,
        limit: limit.checked_add(1),
    };
    let mut items = store.range_query(owner, &query)?;

    let cursor_token = if items.len() > limit {
        items.truncate(limit);
        items.last().map(|last| token::encode(last.updated_at))
    } else {
        None
    };

    tracing::debug!(
        count = items.len(),
        truncated = cursor_token.is_some(),
        "Fetched sync page"
    );
    Ok((items, cursor_token))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::clock::ManualClock;
    use crate::db::MemoryRecordStore;
    use crate::token::TokenError;

    fn seeded(count: usize) -> (MemoryRecordStore, Vec<Item>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(),
        ));
        let store = MemoryRecordStore::with_clock(clock.clone());
        let mut items = Vec::new();
        for index in 0..count {
            clock.advance(Duration::seconds(1));
            let mut item = store.find_or_create("alice", &format!("item-{index}")).unwrap();
            store.update(&mut item).unwrap();
            items.push(item);
        }
        (store, items)
    }

    #[test]
    fn no_checkpoint_returns_everything() {
        let (store, items) = seeded(3);
        let (fetched, cursor) = fetch_items(&store, "alice", None, 100).unwrap();
        assert_eq!(fetched, items);
        assert_eq!(cursor, None);
    }

    #[test]
    fn truncated_page_carries_cursor_of_last_item() {
        let (store, items) = seeded(5);
        let (fetched, cursor) = fetch_items(&store, "alice", None, 2).unwrap();
        assert_eq!(fetched, items[..2].to_vec());
        assert_eq!(cursor, Some(token::encode(items[1].updated_at)));
    }

    #[test]
    fn exact_fit_has_no_cursor() {
        let (store, _) = seeded(2);
        let (fetched, cursor) = fetch_items(&store, "alice", None, 2).unwrap();
        assert_eq!(fetched.len(), 2);
        assert_eq!(cursor, None);
    }

    #[test]
    fn zero_limit_is_rejected() {
        let (store, _) = seeded(1);
        assert!(matches!(
            fetch_items(&store, "alice", None, 0),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn cursor_takes_precedence_and_is_inclusive() {
        let at = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 3).unwrap();
        let sync = token::encode(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let cursor = token::encode(at);

        let bound = checkpoint(Some(sync.as_str()), Some(cursor.as_str()), false).unwrap();
        assert_eq!(bound, Some(LowerBound::Inclusive(at)));

        let bound = checkpoint(Some(cursor.as_str()), None, false).unwrap();
        assert_eq!(bound, Some(LowerBound::Exclusive(at)));

        assert_eq!(checkpoint(None, None, false).unwrap(), None);
    }

    #[test]
    fn invalid_token_is_an_error_unless_fallback_requested() {
        let err = checkpoint(Some("%%%"), None, false).unwrap_err();
        assert!(matches!(err, Error::InvalidToken(TokenError::Base64(_))));

        assert_eq!(checkpoint(Some("%%%"), None, true).unwrap(), None);
    }

    #[test]
    fn invalid_cursor_with_fallback_uses_sync_token() {
        let at = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 3).unwrap();
        let sync = token::encode(at);
        let bound = checkpoint(Some(sync.as_str()), Some("%%%"), true).unwrap();
        assert_eq!(bound, Some(LowerBound::Exclusive(at)));
    }
}
