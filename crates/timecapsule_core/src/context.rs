//! Per-call context supplied by the hosting environment.
//!
//! # Responsibility
//! - Carry the caller identity and current time into each operation.
//! - Provide clock implementations for production and tests.
//!
//! # Invariants
//! - Core operations never read the wall clock directly; they use `CallContext::now`.

use crate::model::capsule::{Principal, Timestamp};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Caller identity and "now" for one store operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
    pub caller: Principal,
    pub now: Timestamp,
}

impl CallContext {
    pub fn new(caller: Principal, now: Timestamp) -> Self {
        Self { caller, now }
    }

    /// Builds a context for `caller` stamped with `clock`'s current time.
    pub fn at(caller: Principal, clock: &impl Clock) -> Self {
        Self::new(caller, clock.now())
    }
}

/// Source of the current time in nanoseconds since the Unix epoch.
pub trait Clock {
    fn now(&self) -> Timestamp;
}

/// Wall clock backed by `SystemTime`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        // A clock set before 1970 reads as the epoch.
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_nanos())
            .unwrap_or(0);
        Timestamp::try_from(nanos).unwrap_or(Timestamp::MAX)
    }
}

/// Manually advanced clock for deterministic time-gated flows.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: AtomicU64::new(start),
        }
    }

    pub fn set(&self, now: Timestamp) {
        self.now.store(now, Ordering::SeqCst);
    }

    /// Moves the clock forward, pinning at `Timestamp::MAX`.
    pub fn advance(&self, nanos: u64) {
        // The closure never returns `None`, so the update cannot fail.
        let _ = self
            .now
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |now| {
                Some(now.saturating_add(nanos))
            });
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::{Clock, ManualClock, SystemClock};

    #[test]
    fn manual_clock_advances_and_sets() {
        let clock = ManualClock::new(100);
        clock.advance(50);
        assert_eq!(clock.now(), 150);
        clock.set(7);
        assert_eq!(clock.now(), 7);
    }

    #[test]
    fn manual_clock_advance_saturates() {
        let clock = ManualClock::new(u64::MAX - 5);
        clock.advance(10);
        assert_eq!(clock.now(), u64::MAX);
        clock.advance(1);
        assert_eq!(clock.now(), u64::MAX);
    }

    #[test]
    fn system_clock_is_after_2020() {
        // 2020-01-01T00:00:00Z in nanoseconds.
        assert!(SystemClock.now() > 1_577_836_800_000_000_000);
    }
}
