//! Monotonic time, injected rather than read from the wall clock.
//!
//! Per the design notes, nothing in this crate calls `SystemTime::now()`
//! directly: every cache, replay tracker, and dynamic trust anchor group
//! holds a [`Clock`] so that tests can perturb "now" without sleeping.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch -- the unit every timestamp in this
/// crate (`ValidityPeriod`, `removalTime`, `CommandTimestampRecord`) is
/// expressed in.
pub type Millis = i64;

/// A source of monotonic time.
///
/// Implementations must never go backwards within one process lifetime;
/// that invariant is what lets caches and the replay tracker reason about
/// "earliest to die" without re-scanning on every call.
pub trait Clock: fmt::Debug {
    /// The current time, in milliseconds since the Unix epoch.
    fn now_millis(&self) -> Millis;
}

use std::fmt;

/// The real, wall-clock-backed [`Clock`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> Millis {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_millis() as Millis
    }
}

/// A test double that offsets [`SystemClock`] by a configurable amount.
///
/// This is the "one knob per cache, one per replay tracker, one per anchor
/// group" mentioned in the design notes: each component under test gets its
/// own `OffsetClock` so that advancing one doesn't silently advance the
/// others.
#[derive(Debug, Clone)]
pub struct OffsetClock {
    base: SystemClock,
    offset_ms: std::cell::Cell<i64>,
}

impl Default for OffsetClock {
    fn default() -> Self {
        OffsetClock { base: SystemClock, offset_ms: std::cell::Cell::new(0) }
    }
}

impl OffsetClock {
    /// Creates a new offset clock with zero offset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances (or rewinds, for a negative value) this clock by `delta_ms`.
    pub fn advance(&self, delta_ms: i64) {
        self.offset_ms.set(self.offset_ms.get() + delta_ms);
    }

    /// Sets the offset to an absolute value.
    pub fn set_offset(&self, offset_ms: i64) {
        self.offset_ms.set(offset_ms);
    }
}

impl Clock for OffsetClock {
    fn now_millis(&self) -> Millis {
        self.base.now_millis() + self.offset_ms.get()
    }
}
