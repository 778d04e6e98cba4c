// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Span identity: trace/span identifiers, trace options and the span
//! context that travels with a span.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};

/// 16-byte trace identifier. Valid iff any byte is nonzero.
///
/// Ordering compares the high 8-byte half first, then the low half, which is
/// plain lexicographic order over the byte array.
#[derive(
    Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TraceId([u8; 16]);

impl TraceId {
    pub const INVALID: TraceId = TraceId([0; 16]);

    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        TraceId(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    pub fn is_valid(&self) -> bool {
        self.0 != [0; 16]
    }

    /// The low 8-byte half as a big-endian integer; used by probability
    /// samplers so the decision is a pure function of the trace id.
    pub fn lower_u64(&self) -> u64 {
        let mut low = [0u8; 8];
        low.copy_from_slice(&self.0[8..16]);
        u64::from_be_bytes(low)
    }

    pub fn generate<R: Rng>(rng: &mut R) -> Self {
        let mut bytes = [0u8; 16];
        loop {
            rng.fill(&mut bytes);
            if bytes != [0; 16] {
                return TraceId(bytes);
            }
        }
    }
}

impl Debug for TraceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "TraceId({})", hex::encode(self.0))
    }
}

impl Display for TraceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// 8-byte span identifier. Valid iff any byte is nonzero.
#[derive(
    Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SpanId([u8; 8]);

impl SpanId {
    pub const INVALID: SpanId = SpanId([0; 8]);

    pub fn from_bytes(bytes: [u8; 8]) -> Self {
        SpanId(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }

    pub fn is_valid(&self) -> bool {
        self.0 != [0; 8]
    }

    pub fn generate<R: Rng>(rng: &mut R) -> Self {
        let mut bytes = [0u8; 8];
        loop {
            rng.fill(&mut bytes);
            if bytes != [0; 8] {
                return SpanId(bytes);
            }
        }
    }
}

impl Debug for SpanId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SpanId({})", hex::encode(self.0))
    }
}

impl Display for SpanId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Per-trace flags carried alongside the identifiers. Bit 0 is the sampling
/// decision.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub struct TraceOptions(u8);

const SAMPLED_BIT: u8 = 0x01;

impl TraceOptions {
    pub fn new(sampled: bool) -> Self {
        TraceOptions(if sampled { SAMPLED_BIT } else { 0 })
    }

    pub fn is_sampled(&self) -> bool {
        self.0 & SAMPLED_BIT != 0
    }

    pub fn as_byte(&self) -> u8 {
        self.0
    }
}

/// The immutable identity of a span: trace id, span id and trace options.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub struct SpanContext {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    pub trace_options: TraceOptions,
}

impl SpanContext {
    pub fn new(trace_id: TraceId, span_id: SpanId, trace_options: TraceOptions) -> Self {
        SpanContext {
            trace_id,
            span_id,
            trace_options,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.trace_id.is_valid() && self.span_id.is_valid()
    }
}

/// Pluggable source of new span identities.
pub trait IdGenerator: Send + Sync + Debug {
    fn new_trace_id(&self) -> TraceId;
    fn new_span_id(&self) -> SpanId;
}

/// The default generator, backed by the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIdGenerator;

impl IdGenerator for RandomIdGenerator {
    fn new_trace_id(&self) -> TraceId {
        TraceId::generate(&mut rand::thread_rng())
    }

    fn new_span_id(&self) -> SpanId {
        SpanId::generate(&mut rand::thread_rng())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validity_tracks_nonzero_bytes() {
        assert!(!TraceId::INVALID.is_valid());
        assert!(!SpanId::INVALID.is_valid());

        let mut bytes = [0u8; 16];
        bytes[15] = 1;
        assert!(TraceId::from_bytes(bytes).is_valid());

        let mut bytes = [0u8; 8];
        bytes[0] = 1;
        assert!(SpanId::from_bytes(bytes).is_valid());
    }

    #[test]
    fn test_from_bytes_round_trip() {
        let mut bytes = [0u8; 16];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = i as u8;
        }
        let id = TraceId::from_bytes(bytes);
        assert_eq!(TraceId::from_bytes(*id.as_bytes()), id);
    }

    #[test]
    fn test_ordering_compares_high_half_first() {
        let mut high = [0u8; 16];
        high[0] = 1;
        let mut low = [0u8; 16];
        low[15] = 0xff;
        assert!(TraceId::from_bytes(low) < TraceId::from_bytes(high));
    }

    #[test]
    fn test_generated_ids_are_valid() {
        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            assert!(TraceId::generate(&mut rng).is_valid());
            assert!(SpanId::generate(&mut rng).is_valid());
        }
    }

    #[test]
    fn test_hex_display() {
        let mut bytes = [0u8; 8];
        bytes[7] = 0x2a;
        assert_eq!(SpanId::from_bytes(bytes).to_string(), "000000000000002a");
    }

    #[test]
    fn test_trace_options_sampled_bit() {
        assert!(TraceOptions::new(true).is_sampled());
        assert!(!TraceOptions::new(false).is_sampled());
        assert_eq!(TraceOptions::new(true).as_byte(), 1);
    }

    #[test]
    fn test_lower_u64_reads_low_half() {
        let mut bytes = [0u8; 16];
        bytes[15] = 7;
        assert_eq!(TraceId::from_bytes(bytes).lower_u64(), 7);
        bytes[0] = 0xff;
        assert_eq!(TraceId::from_bytes(bytes).lower_u64(), 7);
    }
}
