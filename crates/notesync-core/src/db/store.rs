//! The record store contract the sync engine relies on.

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::Item;

/// Where a range query starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LowerBound {
    /// `updated_at >= t`, used when resuming from a cursor
    Inclusive(DateTime<Utc>),
    /// `updated_at > t`, used when resuming from a sync token
    Exclusive(DateTime<Utc>),
}

impl LowerBound {
    /// The bound in whole microseconds, the resolution records are stamped
    /// at. Sub-microsecond digits round toward the excluded side, so an
    /// inclusive bound rounds up and an exclusive bound rounds down.
    pub fn micros(self) -> i64 {
        match self {
            Self::Inclusive(bound) => {
                let micros = bound.timestamp_micros();
                if bound.timestamp_subsec_nanos() % 1_000 == 0 {
                    micros
                } else {
                    micros.saturating_add(1)
                }
            }
            Self::Exclusive(bound) => bound.timestamp_micros(),
        }
    }

    pub fn admits(self, updated_at: DateTime<Utc>) -> bool {
        match self {
            Self::Inclusive(bound) => updated_at >= bound,
            Self::Exclusive(bound) => updated_at > bound,
        }
    }
}

/// Ordered selection of one principal's records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RangeQuery {
    pub lower: Option<LowerBound>,
    pub limit: Option<usize>,
}

/// Storage operations for synchronized records.
///
/// Every call is scoped to an owning principal. Implementations must make
/// `find_or_create` atomic per uuid and must give each `update` of a record
/// an `updated_at` strictly greater than the one it replaces.
pub trait RecordStore {
    /// Fetch the principal's record, creating an empty one if the uuid is new.
    ///
    /// Fails with [`Error::UuidConflict`](crate::Error::UuidConflict) when
    /// the uuid belongs to another principal.
    fn find_or_create(&self, owner: &str, uuid: &str) -> Result<Item>;

    /// Persist every mutable field of `item` and stamp a fresh `updated_at`
    /// onto it.
    fn update(&self, item: &mut Item) -> Result<()>;

    /// Records ascending by `updated_at` (ties broken by uuid).
    ///
    /// Bounds carrying sub-microsecond digits select the same records as
    /// their [`LowerBound::micros`] value.
    fn range_query(&self, owner: &str, query: &RangeQuery) -> Result<Vec<Item>>;

    /// Hard-delete the principal's records with the given uuids, returning
    /// how many were removed. Unknown uuids are ignored.
    fn delete_where(&self, owner: &str, uuids: &[String]) -> Result<usize>;
}


#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn micros_rounds_toward_the_excluded_side() {
        let at = Utc.timestamp_opt(1_700_000_000, 123_456_500).unwrap();
        let whole = at.timestamp_micros();
        assert_eq!(LowerBound::Inclusive(at).micros(), whole + 1);
        assert_eq!(LowerBound::Exclusive(at).micros(), whole);

        let exact = Utc.timestamp_opt(1_700_000_000, 123_456_000).unwrap();
        assert_eq!(LowerBound::Inclusive(exact).micros(), exact.timestamp_micros());
    }
}
