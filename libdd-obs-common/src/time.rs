// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Wall-clock timestamps, the clock abstraction, and monotonic-to-wall
//! conversion anchored once per trace.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::OnceLock;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// A wall-clock instant with nanosecond resolution.
///
/// Always normalized: `0 <= nanos < 1_000_000_000`, also for instants before
/// the unix epoch.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Timestamp {
    seconds: i64,
    nanos: i32,
}

impl Timestamp {
    pub fn new(seconds: i64, nanos: i32) -> Self {
        Timestamp { seconds, nanos }.normalized()
    }

    /// Build a timestamp from nanoseconds since the unix epoch.
    pub fn from_unix_nanos(nanos: i64) -> Self {
        Timestamp {
            seconds: nanos.div_euclid(NANOS_PER_SECOND),
            nanos: nanos.rem_euclid(NANOS_PER_SECOND) as i32,
        }
    }

    /// Nanoseconds since the unix epoch, saturating at the i64 range.
    pub fn as_unix_nanos(&self) -> i64 {
        (self.seconds as i128 * NANOS_PER_SECOND as i128 + self.nanos as i128)
            .clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }

    pub fn seconds(&self) -> i64 {
        self.seconds
    }

    pub fn nanos(&self) -> i32 {
        self.nanos
    }

    /// Return this timestamp shifted by a signed nanosecond offset.
    pub fn add_nanos(&self, offset: i64) -> Self {
        Timestamp {
            seconds: self.seconds + offset.div_euclid(NANOS_PER_SECOND),
            nanos: self.nanos + offset.rem_euclid(NANOS_PER_SECOND) as i32,
        }
        .normalized()
    }

    pub fn add_duration(&self, duration: Duration) -> Self {
        self.add_nanos(duration.as_nanos().min(i64::MAX as u128) as i64)
    }

    /// Signed nanosecond distance from `earlier` to `self`.
    pub fn nanos_since(&self, earlier: &Timestamp) -> i64 {
        self.as_unix_nanos() - earlier.as_unix_nanos()
    }

    fn normalized(mut self) -> Self {
        if self.nanos >= NANOS_PER_SECOND as i32 {
            self.seconds += (self.nanos as i64 / NANOS_PER_SECOND) as i64;
            self.nanos %= NANOS_PER_SECOND as i32;
        }
        if self.nanos < 0 {
            self.seconds -= 1;
            self.nanos += NANOS_PER_SECOND as i32;
        }
        self
    }
}

impl From<SystemTime> for Timestamp {
    fn from(t: SystemTime) -> Self {
        match t.duration_since(UNIX_EPOCH) {
            Ok(d) => Timestamp::new(d.as_secs() as i64, d.subsec_nanos() as i32),
            // Pre-epoch system times collapse to the epoch, same as the
            // concentrator's unix-duration handling.
            Err(_) => Timestamp::default(),
        }
    }
}

/// Source of wall-clock timestamps and monotonic nanoseconds.
///
/// `now_nanos` readings have an arbitrary origin; only differences between
/// them are meaningful. They never go backwards within a process.
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> Timestamp;
    fn now_nanos(&self) -> i64;
}

fn monotonic_anchor() -> &'static Instant {
    static ANCHOR: OnceLock<Instant> = OnceLock::new();
    ANCHOR.get_or_init(Instant::now)
}

/// The production clock: `SystemTime` for wall readings, a process-wide
/// `Instant` anchor for monotonic nanoseconds.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        // Touch the anchor eagerly so the first span doesn't pay for it.
        let _ = monotonic_anchor();
        SystemClock
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        SystemTime::now().into()
    }

    fn now_nanos(&self) -> i64 {
        monotonic_anchor().elapsed().as_nanos().min(i64::MAX as u128) as i64
    }
}

/// Converts monotonic nanosecond readings into wall-clock timestamps.
///
/// The converter captures one `(wall, monotonic)` pair at creation. A trace
/// creates a single converter at its root span and every child span reuses
/// it, so events within one trace are ordered by the monotonic reading even
/// if the wall clock is stepped mid-trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampConverter {
    wall_anchor: Timestamp,
    nano_anchor: i64,
}

impl TimestampConverter {
    pub fn new(clock: &dyn Clock) -> Self {
        TimestampConverter {
            wall_anchor: clock.now(),
            nano_anchor: clock.now_nanos(),
        }
    }

    pub fn to_timestamp(&self, nanos: i64) -> Timestamp {
        self.wall_anchor.add_nanos(nanos - self.nano_anchor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ManualClock;

    #[test]
    fn test_timestamp_normalization() {
        let t = Timestamp::new(1, 1_500_000_000);
        assert_eq!(t.seconds(), 2);
        assert_eq!(t.nanos(), 500_000_000);

        let t = Timestamp::new(1, -1);
        assert_eq!(t.seconds(), 0);
        assert_eq!(t.nanos(), 999_999_999);
    }

    #[test]
    fn test_unix_nanos_round_trip() {
        for nanos in [0i64, 1, 999_999_999, 1_000_000_000, -1, -1_000_000_001] {
            assert_eq!(Timestamp::from_unix_nanos(nanos).as_unix_nanos(), nanos);
        }
    }

    #[test]
    fn test_add_nanos() {
        let t = Timestamp::new(10, 900_000_000);
        assert_eq!(t.add_nanos(200_000_000), Timestamp::new(11, 100_000_000));
        assert_eq!(t.add_nanos(-1_000_000_000), Timestamp::new(9, 900_000_000));
    }

    #[test]
    fn test_nanos_since() {
        let earlier = Timestamp::new(1, 0);
        let later = Timestamp::new(3, 500);
        assert_eq!(later.nanos_since(&earlier), 2 * NANOS_PER_SECOND + 500);
        assert_eq!(earlier.nanos_since(&later), -(2 * NANOS_PER_SECOND + 500));
    }

    #[test]
    fn test_system_clock_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now_nanos();
        let b = clock.now_nanos();
        assert!(b >= a);
    }

    #[test]
    fn test_converter_tracks_monotonic_offsets() {
        let clock = ManualClock::new(Timestamp::new(100, 0));
        let converter = TimestampConverter::new(&clock);

        clock.advance(Duration::from_nanos(250));
        let stamped = converter.to_timestamp(clock.now_nanos());
        assert_eq!(stamped, Timestamp::new(100, 250));
    }

    #[test]
    fn test_converter_ignores_wall_clock_steps() {
        let clock = ManualClock::new(Timestamp::new(100, 0));
        let converter = TimestampConverter::new(&clock);
        let nanos_at_creation = clock.now_nanos();

        // Step the wall clock far ahead without advancing monotonic time.
        clock.set_time(Timestamp::new(10_000, 0));
        assert_eq!(
            converter.to_timestamp(nanos_at_creation),
            Timestamp::new(100, 0)
        );
    }
}
