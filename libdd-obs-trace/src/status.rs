// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Span completion status with the canonical error code set.

use serde::{Deserialize, Serialize};

/// Canonical status codes, one per RPC-style failure class. `Ok` is the
/// only non-error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CanonicalCode {
    Ok = 0,
    Cancelled = 1,
    Unknown = 2,
    InvalidArgument = 3,
    DeadlineExceeded = 4,
    NotFound = 5,
    AlreadyExists = 6,
    PermissionDenied = 7,
    ResourceExhausted = 8,
    FailedPrecondition = 9,
    Aborted = 10,
    OutOfRange = 11,
    Unimplemented = 12,
    Internal = 13,
    Unavailable = 14,
    DataLoss = 15,
    Unauthenticated = 16,
}

/// Every non-OK code, in wire order. Indexes the error buckets of the
/// sampled span store.
pub const NON_OK_CODES: [CanonicalCode; 16] = [
    CanonicalCode::Cancelled,
    CanonicalCode::Unknown,
    CanonicalCode::InvalidArgument,
    CanonicalCode::DeadlineExceeded,
    CanonicalCode::NotFound,
    CanonicalCode::AlreadyExists,
    CanonicalCode::PermissionDenied,
    CanonicalCode::ResourceExhausted,
    CanonicalCode::FailedPrecondition,
    CanonicalCode::Aborted,
    CanonicalCode::OutOfRange,
    CanonicalCode::Unimplemented,
    CanonicalCode::Internal,
    CanonicalCode::Unavailable,
    CanonicalCode::DataLoss,
    CanonicalCode::Unauthenticated,
];

impl CanonicalCode {
    pub fn value(&self) -> u32 {
        *self as u32
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, CanonicalCode::Ok)
    }
}

/// A span's completion status: a canonical code plus an optional
/// human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub code: CanonicalCode,
    pub message: Option<String>,
}

impl Status {
    pub fn ok() -> Self {
        Status {
            code: CanonicalCode::Ok,
            message: None,
        }
    }

    pub fn new(code: CanonicalCode) -> Self {
        Status {
            code,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn is_ok(&self) -> bool {
        self.code.is_ok()
    }
}
