// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The sampled span store: a small bounded set of completed spans per
//! registered span name, split by latency bucket for OK spans and by
//! canonical error code for failed ones, kept for on-demand debugging.

use crate::span::{EventRing, Span, StartEndHandler};
use crate::span_data::SpanData;
use crate::status::{CanonicalCode, NON_OK_CODES};
use libdd_obs_common::error::ObsError;
use libdd_obs_common::RwLockExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

pub const NUM_LATENCY_BUCKETS: usize = 9;
pub const NUM_ERROR_BUCKETS: usize = NON_OK_CODES.len();

/// Upper bounds of the latency buckets, in nanoseconds. The first bucket
/// starts at zero, the last is unbounded.
pub const LATENCY_BUCKET_BOUNDARIES_NANOS: [i64; NUM_LATENCY_BUCKETS - 1] = [
    10_000,           // 10us
    100_000,          // 100us
    1_000_000,        // 1ms
    10_000_000,       // 10ms
    100_000_000,      // 100ms
    1_000_000_000,    // 1s
    10_000_000_000,   // 10s
    100_000_000_000,  // 100s
];

const MAX_SPANS_PER_LATENCY_BUCKET: usize = 10;
const MAX_SPANS_PER_ERROR_BUCKET: usize = 8;

/// Classify an OK span's latency into its bucket.
fn latency_bucket_index(latency_nanos: i64) -> usize {
    LATENCY_BUCKET_BOUNDARIES_NANOS.partition_point(|bound| *bound <= latency_nanos)
}

/// The `[lower, upper)` nanosecond range covered by a latency bucket.
fn latency_bucket_range(index: usize) -> (i64, i64) {
    let lower = if index == 0 {
        0
    } else {
        LATENCY_BUCKET_BOUNDARIES_NANOS[index - 1]
    };
    let upper = if index == NUM_LATENCY_BUCKETS - 1 {
        i64::MAX
    } else {
        LATENCY_BUCKET_BOUNDARIES_NANOS[index]
    };
    (lower, upper)
}

fn error_bucket_index(code: CanonicalCode) -> usize {
    code.value() as usize - 1
}

/// Selects latency-classified spans of one registered name.
///
/// The latency range is half-open: `lower <= latency < upper`.
#[derive(Debug, Clone)]
pub struct LatencyFilter {
    pub span_name: String,
    pub lower_latency_nanos: i64,
    pub upper_latency_nanos: i64,
    /// 0 means no limit.
    pub max_spans: usize,
}

impl LatencyFilter {
    pub fn new(
        span_name: impl Into<String>,
        lower_latency_nanos: i64,
        upper_latency_nanos: i64,
        max_spans: usize,
    ) -> Result<Self, ObsError> {
        if lower_latency_nanos < 0 || upper_latency_nanos < lower_latency_nanos {
            return Err(ObsError::invalid_argument(format!(
                "invalid latency range [{lower_latency_nanos}, {upper_latency_nanos})"
            )));
        }
        Ok(LatencyFilter {
            span_name: span_name.into(),
            lower_latency_nanos,
            upper_latency_nanos,
            max_spans,
        })
    }
}

/// Selects error-classified spans of one registered name; `code: None`
/// matches every non-OK code.
#[derive(Debug, Clone)]
pub struct ErrorFilter {
    pub span_name: String,
    pub code: Option<CanonicalCode>,
    /// 0 means no limit.
    pub max_spans: usize,
}

impl ErrorFilter {
    pub fn new(
        span_name: impl Into<String>,
        code: Option<CanonicalCode>,
        max_spans: usize,
    ) -> Result<Self, ObsError> {
        if code.is_some_and(|code| code.is_ok()) {
            return Err(ObsError::invalid_argument(
                "error filters cannot select the OK code",
            ));
        }
        Ok(ErrorFilter {
            span_name: span_name.into(),
            code,
            max_spans,
        })
    }
}

/// Per-name counts reported by [`SampledSpanStore::summary`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerSpanNameSummary {
    pub num_active_spans: u64,
    pub latency_bucket_counts: [u64; NUM_LATENCY_BUCKETS],
    /// Indexed in [`NON_OK_CODES`] order.
    pub error_bucket_counts: [u64; NUM_ERROR_BUCKETS],
}

impl PerSpanNameSummary {
    pub fn error_count(&self, code: CanonicalCode) -> u64 {
        self.error_bucket_counts[error_bucket_index(code)]
    }
}

#[derive(Debug)]
struct PerSpanNameSamples {
    num_active_spans: u64,
    latency: Vec<EventRing<Arc<Span>>>,
    errors: Vec<EventRing<Arc<Span>>>,
}

impl PerSpanNameSamples {
    fn new() -> Self {
        PerSpanNameSamples {
            num_active_spans: 0,
            latency: (0..NUM_LATENCY_BUCKETS)
                .map(|_| EventRing::new(MAX_SPANS_PER_LATENCY_BUCKET))
                .collect(),
            errors: (0..NUM_ERROR_BUCKETS)
                .map(|_| EventRing::new(MAX_SPANS_PER_ERROR_BUCKET))
                .collect(),
        }
    }

    fn summary(&self) -> PerSpanNameSummary {
        let mut summary = PerSpanNameSummary {
            num_active_spans: self.num_active_spans,
            ..PerSpanNameSummary::default()
        };
        for (i, ring) in self.latency.iter().enumerate() {
            summary.latency_bucket_counts[i] = ring.len() as u64;
        }
        for (i, ring) in self.errors.iter().enumerate() {
            summary.error_bucket_counts[i] = ring.len() as u64;
        }
        summary
    }
}

/// In-memory debug store of representative completed spans.
///
/// The whole store sits behind one `RwLock`: the end-of-span path takes the
/// write lock for an O(log buckets) classification plus a ring push, queries
/// take the read lock only long enough to copy `Arc`s out and materialize
/// snapshots after releasing it.
#[derive(Debug, Default)]
pub struct SampledSpanStore {
    inner: RwLock<HashMap<String, PerSpanNameSamples>>,
}

impl SampledSpanStore {
    pub fn new() -> Self {
        SampledSpanStore::default()
    }

    /// Registers names for sampling. Idempotent; already-registered names
    /// keep their samples.
    pub fn register_span_names(&self, names: impl IntoIterator<Item = String>) {
        let mut inner = self.inner.write_or_panic();
        for name in names {
            inner.entry(name).or_insert_with(PerSpanNameSamples::new);
        }
    }

    /// Unregisters names and drops their samples. Idempotent.
    pub fn unregister_span_names<S: AsRef<str>>(&self, names: impl IntoIterator<Item = S>) {
        let mut inner = self.inner.write_or_panic();
        for name in names {
            inner.remove(name.as_ref());
        }
    }

    pub fn registered_span_names(&self) -> Vec<String> {
        self.inner.read_or_panic().keys().cloned().collect()
    }

    /// Spans whose latency falls within the filter's half-open range.
    /// Order of the returned snapshots is unspecified.
    pub fn latency_sampled_spans(&self, filter: &LatencyFilter) -> Vec<SpanData> {
        let mut spans = Vec::new();
        {
            let inner = self.inner.read_or_panic();
            let Some(samples) = inner.get(&filter.span_name) else {
                return Vec::new();
            };
            'buckets: for (index, ring) in samples.latency.iter().enumerate() {
                let (bucket_lower, bucket_upper) = latency_bucket_range(index);
                if bucket_upper <= filter.lower_latency_nanos
                    || bucket_lower >= filter.upper_latency_nanos
                {
                    continue;
                }
                for span in ring.iter() {
                    let latency = span.latency_nanos().unwrap_or(0);
                    if latency >= filter.lower_latency_nanos
                        && latency < filter.upper_latency_nanos
                    {
                        spans.push(Arc::clone(span));
                        if filter.max_spans != 0 && spans.len() == filter.max_spans {
                            break 'buckets;
                        }
                    }
                }
            }
        }
        spans
            .iter()
            .filter_map(|span| span.to_span_data().ok())
            .collect()
    }

    /// Spans that ended with the filter's canonical code, or with any
    /// non-OK code when the filter does not name one.
    pub fn error_sampled_spans(&self, filter: &ErrorFilter) -> Vec<SpanData> {
        let mut spans = Vec::new();
        {
            let inner = self.inner.read_or_panic();
            let Some(samples) = inner.get(&filter.span_name) else {
                return Vec::new();
            };
            let buckets: Vec<usize> = match filter.code {
                Some(code) => vec![error_bucket_index(code)],
                None => (0..NUM_ERROR_BUCKETS).collect(),
            };
            'buckets: for index in buckets {
                for span in samples.errors[index].iter() {
                    spans.push(Arc::clone(span));
                    if filter.max_spans != 0 && spans.len() == filter.max_spans {
                        break 'buckets;
                    }
                }
            }
        }
        spans
            .iter()
            .filter_map(|span| span.to_span_data().ok())
            .collect()
    }

    /// Per registered name: active span count and per-bucket sample counts.
    pub fn summary(&self) -> HashMap<String, PerSpanNameSummary> {
        self.inner
            .read_or_panic()
            .iter()
            .map(|(name, samples)| (name.clone(), samples.summary()))
            .collect()
    }

    /// Classifies and stores a completed span if its name is registered.
    fn consider(&self, span: &Arc<Span>) {
        let mut inner = self.inner.write_or_panic();
        let Some(samples) = inner.get_mut(span.name()) else {
            return;
        };
        samples.num_active_spans = samples.num_active_spans.saturating_sub(1);
        match span.status() {
            Some(status) if !status.is_ok() => {
                samples.errors[error_bucket_index(status.code)].push(Arc::clone(span));
            }
            _ => {
                let latency = span.latency_nanos().unwrap_or(0);
                samples.latency[latency_bucket_index(latency)].push(Arc::clone(span));
            }
        }
    }
}

impl StartEndHandler for SampledSpanStore {
    fn on_start(&self, span: &Arc<Span>) {
        let mut inner = self.inner.write_or_panic();
        if let Some(samples) = inner.get_mut(span.name()) {
            samples.num_active_spans += 1;
        }
    }

    fn on_end(&self, span: &Arc<Span>) {
        self.consider(span);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_bucket_classification() {
        assert_eq!(latency_bucket_index(0), 0);
        assert_eq!(latency_bucket_index(9_999), 0);
        assert_eq!(latency_bucket_index(10_000), 1);
        assert_eq!(latency_bucket_index(99_999), 1);
        assert_eq!(latency_bucket_index(1_000_000), 2);
        assert_eq!(latency_bucket_index(999_999_999), 5);
        assert_eq!(latency_bucket_index(100_000_000_000), 8);
        assert_eq!(latency_bucket_index(i64::MAX), 8);
    }

    #[test]
    fn test_latency_bucket_ranges_tile_the_axis() {
        let mut expected_lower = 0;
        for index in 0..NUM_LATENCY_BUCKETS {
            let (lower, upper) = latency_bucket_range(index);
            assert_eq!(lower, expected_lower);
            assert!(upper > lower);
            expected_lower = upper;
        }
        assert_eq!(expected_lower, i64::MAX);
    }

    #[test]
    fn test_error_bucket_index_covers_all_codes() {
        for (i, code) in NON_OK_CODES.iter().enumerate() {
            assert_eq!(error_bucket_index(*code), i);
        }
    }

    #[test]
    fn test_registration_is_idempotent() {
        let store = SampledSpanStore::new();
        store.register_span_names(vec!["op".to_string()]);
        store.register_span_names(vec!["op".to_string()]);
        assert_eq!(store.registered_span_names(), vec!["op".to_string()]);

        store.unregister_span_names(["op"]);
        store.unregister_span_names(["op"]);
        assert!(store.registered_span_names().is_empty());
    }

    #[test]
    fn test_filters_validate_arguments() {
        assert!(LatencyFilter::new("op", -1, 10, 0).is_err());
        assert!(LatencyFilter::new("op", 10, 5, 0).is_err());
        assert!(LatencyFilter::new("op", 5, 5, 0).is_ok());
        assert!(ErrorFilter::new("op", Some(CanonicalCode::Ok), 0).is_err());
        assert!(ErrorFilter::new("op", None, 0).is_ok());
    }

    #[test]
    fn test_queries_on_unregistered_names_are_empty() {
        let store = SampledSpanStore::new();
        let filter = LatencyFilter::new("missing", 0, i64::MAX, 0).unwrap();
        assert!(store.latency_sampled_spans(&filter).is_empty());
        let filter = ErrorFilter::new("missing", None, 0).unwrap();
        assert!(store.error_sampled_spans(&filter).is_empty());
    }
}
