//! Time sources for record stores and the sync orchestrator.

use std::sync::Mutex;

use chrono::{DateTime, Duration, DurationRound, Utc};

/// Source of the current time.
///
/// Every timestamp handed out is truncated to whole microseconds so it
/// survives the store and the token codec unchanged.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        truncate_to_micros(Utc::now())
    }
}

/// Manually driven clock for deterministic tests and replays.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(truncate_to_micros(start)),
        }
    }

    pub fn set(&self, value: DateTime<Utc>) {
        *self.lock() = truncate_to_micros(value);
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.lock();
        *now = truncate_to_micros(*now + by);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DateTime<Utc>> {
        // A poisoned clock still holds a valid timestamp.
        self.now
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.lock()
    }
}

/// Drop any sub-microsecond component.
pub fn truncate_to_micros(value: DateTime<Utc>) -> DateTime<Utc> {
    value
        .duration_trunc(Duration::microseconds(1))
        .unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn manual_clock_advances() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        clock.advance(Duration::seconds(25));
        assert_eq!(clock.now(), start + Duration::seconds(25));
    }

    #[test]
    fn truncation_drops_nanoseconds() {
        let value = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        assert_eq!(
            truncate_to_micros(value),
            Utc.timestamp_opt(1_700_000_000, 123_456_000).unwrap()
        );
    }

    #[test]
    fn system_clock_has_microsecond_precision() {
        let now = SystemClock.now();
        assert_eq!(now.timestamp_subsec_nanos() % 1_000, 0);
    }
}
