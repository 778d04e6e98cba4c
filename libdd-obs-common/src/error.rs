// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Error definitions shared across the observability runtime.

use std::error::Error;
use std::fmt::Display;

/// ObsError covers the failure modes of the recording surface.
///
/// Tolerated misuse (mutating an ended span, recording against an
/// unregistered measure) is not an error at all: those paths log at debug
/// level and return without effect. Bounded drops are tracked by counters,
/// not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObsError {
    /// A precondition on an argument was violated (empty span name,
    /// conflicting view registration, out-of-range bound, ...).
    InvalidArgument(String),
    /// The operation is not valid in the current state (snapshotting a
    /// non-recording span, interval time moving backwards).
    IllegalState(String),
    /// The operation is not supported by this aggregation kind or build
    /// profile (fractional Range/StdDev combine, interval views when
    /// disabled).
    Unsupported(String),
}

impl Display for ObsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObsError::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            ObsError::IllegalState(msg) => write!(f, "illegal state: {msg}"),
            ObsError::Unsupported(msg) => write!(f, "unsupported operation: {msg}"),
        }
    }
}

impl Error for ObsError {}

impl ObsError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        ObsError::InvalidArgument(msg.into())
    }

    pub fn illegal_state(msg: impl Into<String>) -> Self {
        ObsError::IllegalState(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        ObsError::Unsupported(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            ObsError::invalid_argument("span name is empty").to_string(),
            "invalid argument: span name is empty"
        );
        assert_eq!(
            ObsError::illegal_state("span is not recording").to_string(),
            "illegal state: span is not recording"
        );
        assert_eq!(
            ObsError::unsupported("fractional combine").to_string(),
            "unsupported operation: fractional combine"
        );
    }
}
