// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Test helpers shared by the observability crates.
//!
//! Gated behind the `test-utils` feature so downstream crates can drive the
//! runtime with a deterministic clock in their own tests.

use crate::time::{Clock, Timestamp};
use crate::MutexExt;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug)]
struct ManualClockState {
    now: Timestamp,
    nanos: i64,
}

/// A clock driven entirely by the test.
///
/// `advance` moves the wall and monotonic readings in lock-step; `set_time`
/// steps only the wall clock, which is exactly what a real NTP adjustment
/// looks like to the converter.
#[derive(Debug)]
pub struct ManualClock {
    state: Mutex<ManualClockState>,
}

impl ManualClock {
    pub fn new(now: Timestamp) -> Self {
        ManualClock {
            state: Mutex::new(ManualClockState { now, nanos: 0 }),
        }
    }

    pub fn advance(&self, duration: Duration) {
        self.advance_nanos(duration.as_nanos().min(i64::MAX as u128) as i64);
    }

    pub fn advance_nanos(&self, nanos: i64) {
        let mut state = self.state.lock_or_panic();
        state.now = state.now.add_nanos(nanos);
        state.nanos += nanos;
    }

    /// Step the wall clock without touching the monotonic reading.
    pub fn set_time(&self, now: Timestamp) {
        self.state.lock_or_panic().now = now;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.state.lock_or_panic().now
    }

    fn now_nanos(&self) -> i64 {
        self.state.lock_or_panic().nanos
    }
}
