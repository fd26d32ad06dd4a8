//! Per-key last-timestamp tracking for signed command Interests.

use std::collections::VecDeque;
use std::rc::Rc;

use crate::error::{ValidationError, ValidationErrorCode};
use crate::name::Name;
use crate::time::{Clock, Millis};

/// The minimum number of trailing name components a signed command
/// Interest carries beyond its timestamp: the encoded `SignatureInfo` and
/// `SignatureValue` components.
pub const MINIMUM_SIZE: usize = 2;

/// `Options` tuning.
#[derive(Debug, Clone, Copy)]
pub struct Options {
    pub grace_period_ms: i64,
    /// `< 0` means unbounded; `0` disables tracking entirely.
    pub max_records: i64,
    pub record_lifetime_ms: i64,
}

impl Default for Options {
    fn default() -> Self {
        Options { grace_period_ms: 120_000, max_records: 1000, record_lifetime_ms: 3_600_000 }
    }
}

#[derive(Debug, Clone)]
struct CommandTimestampRecord {
    key_name: Name,
    timestamp: i64,
    last_refreshed: Millis,
}

/// The position of the timestamp component counting from the end of a
/// signed command Interest's name: `name.len() - 3`.
pub fn timestamp_index(name_len: usize) -> Option<usize> {
    name_len.checked_sub(MINIMUM_SIZE + 1)
}

/// Extracts and parses the timestamp component from `name`, failing
/// `POLICY_ERROR` if the name is too short or the component is not a
/// decimal integer.
pub fn extract_timestamp(name: &Name) -> Result<i64, ValidationError> {
    if name.len() < MINIMUM_SIZE + 1 {
        return Err(ValidationError::new(
            ValidationErrorCode::PolicyError,
            format!("command interest name {} is too short to carry a timestamp", name),
        ));
    }
    let idx = timestamp_index(name.len()).expect("checked above");
    let component = name.get(idx).expect("index within bounds");
    component.to_string().parse::<i64>().map_err(|_| {
        ValidationError::new(ValidationErrorCode::PolicyError,
                             format!("timestamp component {} is not a decimal integer", component))
    })
}

/// Rejects replayed or stale command Interests by tracking, per signing
/// key, the highest timestamp accepted so far.
pub struct CommandInterestReplayTracker {
    clock: Rc<dyn Clock>,
    options: Options,
    /// Insertion order; oldest first, which is also LRU order since
    /// `insert_new_record` always moves a refreshed key to the back.
    records: VecDeque<CommandTimestampRecord>,
}

impl CommandInterestReplayTracker {
    /// Creates a tracker with `options`, clocked by `clock`.
    pub fn new(clock: Rc<dyn Clock>, options: Options) -> Self {
        CommandInterestReplayTracker { clock, options, records: VecDeque::new() }
    }

    /// Removes records older than `recordLifetime`, then trims to
    /// `maxRecords` if bounded.
    pub fn clean_up(&mut self) {
        let now = self.clock.now_millis();
        while let Some(front) = self.records.front() {
            if front.last_refreshed <= now - self.options.record_lifetime_ms {
                self.records.pop_front();
            } else {
                break;
            }
        }
        if self.options.max_records >= 0 {
            let limit = self.options.max_records as usize;
            while self.records.len() > limit {
                self.records.pop_front();
            }
        }
    }

    /// Checks `timestamp` from `key_name` against the grace window and
    /// monotonicity rule. Does **not** record anything -- callers register
    /// a success hook that calls [`Self::insert_new_record`] only once the
    /// command's signature verifies.
    pub fn check_timestamp(&mut self, key_name: &Name, timestamp: i64) -> Result<(), ValidationError> {
        self.clean_up();
        let now = self.clock.now_millis();
        let grace = self.options.grace_period_ms;
        if timestamp < now - grace || timestamp > now + grace {
            return Err(ValidationError::new(
                ValidationErrorCode::PolicyError,
                format!("command interest timestamp {} outside grace window of now={} (+/-{})", timestamp, now, grace),
            ));
        }
        if let Some(record) = self.records.iter().find(|r| &r.key_name == key_name) {
            if timestamp <= record.timestamp {
                return Err(ValidationError::new(
                    ValidationErrorCode::PolicyError,
                    format!("command interest timestamp {} is not greater than last accepted {} for {}",
                            timestamp, record.timestamp, key_name),
                ));
            }
        }
        Ok(())
    }

    /// Records `timestamp` as the latest accepted one for `key_name`,
    /// replacing any existing record and moving it to the back (LRU
    /// order). A no-op when tracking is disabled (`maxRecords == 0`).
    pub fn insert_new_record(&mut self, key_name: Name, timestamp: i64) {
        if self.options.max_records == 0 {
            return;
        }
        self.records.retain(|r| r.key_name != key_name);
        let now = self.clock.now_millis();
        self.records.push_back(CommandTimestampRecord { key_name, timestamp, last_refreshed: now });
        self.clean_up();
    }

    /// Current number of tracked records (for tests and introspection).
    pub fn len(&self) -> usize {
        self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::OffsetClock;

    fn tracker(options: Options) -> (Rc<OffsetClock>, CommandInterestReplayTracker) {
        let clock = Rc::new(OffsetClock::new());
        let t = CommandInterestReplayTracker::new(clock.clone(), options);
        (clock, t)
    }

    #[test]
    fn rejects_timestamp_outside_grace_window() {
        let (clock, mut t) = tracker(Options::default());
        clock.advance(0);
        assert!(t.check_timestamp(&Name::parse("/alice/KEY/k1"), 1_000_000).is_err());
    }

    #[test]
    fn enforces_monotonicity_per_key() {
        let (clock, mut t) = tracker(Options::default());
        let now = clock.now_millis();
        let key = Name::parse("/alice/KEY/k1");
        t.check_timestamp(&key, now).unwrap();
        t.insert_new_record(key.clone(), now);
        assert!(t.check_timestamp(&key, now).is_err());
        assert!(t.check_timestamp(&key, now + 1).is_ok());
    }

    #[test]
    fn lru_bound_respects_max_records() {
        let (_clock, mut t) = tracker(Options { max_records: 2, ..Options::default() });
        t.insert_new_record(Name::parse("/a/KEY/1"), 1);
        t.insert_new_record(Name::parse("/b/KEY/1"), 1);
        t.insert_new_record(Name::parse("/c/KEY/1"), 1);
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn zero_max_records_disables_tracking() {
        let (clock, mut t) = tracker(Options { max_records: 0, ..Options::default() });
        let now = clock.now_millis();
        let key = Name::parse("/alice/KEY/k1");
        t.insert_new_record(key.clone(), now);
        assert_eq!(t.len(), 0);
        assert!(t.check_timestamp(&key, now).is_ok());
    }

    #[test]
    fn extracts_timestamp_at_fixed_position() {
        let name = Name::parse("/alice/cmd/1000/siginfo/sigvalue");
        assert_eq!(extract_timestamp(&name).unwrap(), 1000);
    }

    #[test]
    fn rejects_too_short_command_name() {
        let name = Name::parse("/siginfo/sigvalue");
        assert!(extract_timestamp(&name).is_err());
    }

    quickcheck! {
        fn monotonicity_holds_for_arbitrary_timestamps(a: i32, b: i32) -> bool {
            // Wide enough that every i32 offset from "now" lands inside the
            // grace window, so the only thing under test is monotonicity.
            let options = Options { grace_period_ms: 3_000_000_000, max_records: 1000, record_lifetime_ms: i64::MAX / 2 };
            let (clock, mut t) = tracker(options);
            let now = clock.now_millis();
            let key = Name::parse("/alice/KEY/k1");

            let t1 = now + a as i64;
            let t2 = now + b as i64;

            t.check_timestamp(&key, t1).expect("within grace window");
            t.insert_new_record(key.clone(), t1);

            t.check_timestamp(&key, t2).is_ok() == (t2 > t1)
        }
    }
}
