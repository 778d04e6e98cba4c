// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Sliding-window view state: a queue of N+1 grid-aligned time buckets.
//!
//! The newest bucket always contains the current time; the oldest overlaps
//! the left edge of the query window and is blended in fractionally at
//! snapshot time, so the window slides smoothly instead of jumping a whole
//! bucket at a time.

use crate::aggregation::Aggregation;
use crate::rows::{self, RowMap};
use crate::view_data::AggregationData;
use libdd_obs_common::error::ObsError;
use libdd_obs_common::tag::TagValue;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

#[derive(Debug)]
struct IntervalBucket {
    start_nanos: i64,
    rows: RowMap,
}

impl IntervalBucket {
    fn new(start_nanos: i64) -> Self {
        IntervalBucket {
            start_nanos,
            rows: RowMap::default(),
        }
    }
}

/// The bucket queue backing one interval view. Exactly `bucket_count + 1`
/// buckets at all times, each covering `interval / bucket_count`.
#[derive(Debug)]
pub(crate) struct IntervalBucketQueue {
    bucket_duration_nanos: i64,
    aggregations: Vec<Aggregation>,
    buckets: VecDeque<IntervalBucket>,
}

impl IntervalBucketQueue {
    pub(crate) fn new(
        interval: Duration,
        bucket_count: usize,
        now_nanos: i64,
        aggregations: Vec<Aggregation>,
    ) -> Self {
        let bucket_duration_nanos = (interval.as_nanos() / bucket_count as u128)
            .clamp(1, i64::MAX as u128) as i64;
        let mut buckets = VecDeque::with_capacity(bucket_count + 1);
        for offset in (0..=bucket_count as i64).rev() {
            buckets.push_back(IntervalBucket::new(
                now_nanos - offset * bucket_duration_nanos,
            ));
        }
        IntervalBucketQueue {
            bucket_duration_nanos,
            aggregations,
            buckets,
        }
    }

    #[cfg(test)]
    pub(crate) fn bucket_len(&self) -> usize {
        self.buckets.len()
    }

    /// Shifts the bucket grid forward so the newest bucket contains `now`.
    ///
    /// Time moving backwards past the newest bucket's start is rejected
    /// rather than silently re-ordered.
    fn refresh(&mut self, now_nanos: i64) -> Result<(), ObsError> {
        let Some(tail) = self.buckets.back() else {
            return Err(ObsError::illegal_state("interval bucket queue is empty"));
        };
        let newest_start = tail.start_nanos;
        if now_nanos < newest_start {
            return Err(ObsError::invalid_argument(format!(
                "interval time went backwards: {now_nanos} < {newest_start}"
            )));
        }
        let elapsed = now_nanos - newest_start;
        if elapsed < self.bucket_duration_nanos {
            return Ok(());
        }
        let shift = elapsed / self.bucket_duration_nanos;
        let total = self.buckets.len() as i64;
        if shift >= total {
            // Everything expired; rebuild the full complement on the same
            // grid, newest bucket containing now.
            let new_newest = newest_start + shift * self.bucket_duration_nanos;
            let count = self.buckets.len() as i64;
            self.buckets.clear();
            for offset in (0..count).rev() {
                self.buckets.push_back(IntervalBucket::new(
                    new_newest - offset * self.bucket_duration_nanos,
                ));
            }
        } else {
            for step in 1..=shift {
                self.buckets.push_back(IntervalBucket::new(
                    newest_start + step * self.bucket_duration_nanos,
                ));
                self.buckets.pop_front();
            }
        }
        Ok(())
    }

    pub(crate) fn record(
        &mut self,
        projected: &[&TagValue],
        value: f64,
        now_nanos: i64,
    ) -> Result<(), ObsError> {
        self.refresh(now_nanos)?;
        let IntervalBucketQueue {
            aggregations,
            buckets,
            ..
        } = self;
        let Some(tail) = buckets.back_mut() else {
            return Err(ObsError::illegal_state("interval bucket queue is empty"));
        };
        for accumulator in rows::row_mut(&mut tail.rows, projected, aggregations) {
            accumulator.add(value);
        }
        Ok(())
    }

    /// Folds all buckets into one row per tag vector: the head bucket
    /// weighted by its retained fraction, every other bucket whole.
    pub(crate) fn snapshot(
        &mut self,
        now_nanos: i64,
    ) -> Result<HashMap<Vec<TagValue>, Vec<AggregationData>>, ObsError> {
        self.refresh(now_nanos)?;
        let Some(tail) = self.buckets.back() else {
            return Err(ObsError::illegal_state("interval bucket queue is empty"));
        };
        let tail_progress =
            (now_nanos - tail.start_nanos) as f64 / self.bucket_duration_nanos as f64;
        let head_fraction = 1.0 - tail_progress;

        let mut combined: HashMap<Vec<TagValue>, Vec<crate::mutable::MutableAggregation>> =
            HashMap::new();
        for (index, bucket) in self.buckets.iter().enumerate() {
            let fraction = if index == 0 { head_fraction } else { 1.0 };
            for (key, row) in &bucket.rows {
                let accumulators = combined
                    .entry(key.clone())
                    .or_insert_with(|| rows::new_row(&self.aggregations));
                for (accumulator, other) in accumulators.iter_mut().zip(row) {
                    accumulator.combine(other, fraction)?;
                }
            }
        }
        Ok(combined
            .into_iter()
            .map(|(key, row)| {
                (
                    key,
                    row.iter().map(|accumulator| accumulator.snapshot()).collect(),
                )
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use libdd_obs_common::tag_value;

    const SECOND: i64 = 1_000_000_000;

    /// 40s interval over 4 buckets: 10s per bucket, 5 buckets kept.
    fn test_queue() -> IntervalBucketQueue {
        IntervalBucketQueue::new(
            Duration::from_secs(40),
            4,
            0,
            vec![Aggregation::Sum, Aggregation::Count],
        )
    }

    fn sum_of(
        map: &HashMap<Vec<TagValue>, Vec<AggregationData>>,
        key: &[TagValue],
    ) -> Option<f64> {
        map.get(key).map(|row| match row[0] {
            AggregationData::Sum { sum } => sum,
            _ => panic!("wrong kind"),
        })
    }

    fn record_value(queue: &mut IntervalBucketQueue, value: f64, now_nanos: i64) {
        let tag = tag_value!("v");
        queue.record(&[&tag], value, now_nanos).unwrap();
    }

    #[test]
    fn test_queue_always_keeps_bucket_complement() {
        let mut queue = test_queue();
        assert_eq!(queue.bucket_len(), 5);
        record_value(&mut queue, 1.0, 5 * SECOND);
        assert_eq!(queue.bucket_len(), 5);
        queue.snapshot(25 * SECOND).unwrap();
        assert_eq!(queue.bucket_len(), 5);
        queue.snapshot(500 * SECOND).unwrap();
        assert_eq!(queue.bucket_len(), 5);
    }

    #[test]
    fn test_interior_bucket_counts_whole() {
        let mut queue = test_queue();
        record_value(&mut queue, 100.0, 5 * SECOND);
        // At t=25s the value's bucket [0s, 10s) is interior.
        let map = queue.snapshot(25 * SECOND).unwrap();
        assert_eq!(sum_of(&map, &[tag_value!("v")]), Some(100.0));
    }

    #[test]
    fn test_head_bucket_blends_fractionally() {
        let mut queue = test_queue();
        record_value(&mut queue, 100.0, 5 * SECOND);
        // At t=45s the buckets are [0..50)s and the value's bucket [0s, 10s)
        // is the head; the tail [40s, 50s) is half done, so half the head is
        // retained.
        let map = queue.snapshot(45 * SECOND).unwrap();
        assert_eq!(sum_of(&map, &[tag_value!("v")]), Some(50.0));
    }

    #[test]
    fn test_expired_values_fall_off() {
        let mut queue = test_queue();
        record_value(&mut queue, 100.0, 5 * SECOND);
        // At t=55s the value's bucket has been evicted entirely.
        let map = queue.snapshot(55 * SECOND).unwrap();
        assert_eq!(sum_of(&map, &[tag_value!("v")]), None);
    }

    #[test]
    fn test_full_rebuild_stays_on_grid() {
        let mut queue = test_queue();
        record_value(&mut queue, 1.0, 5 * SECOND);
        // Jump far past the whole window; everything expires.
        let map = queue.snapshot(1_234 * SECOND).unwrap();
        assert!(map.is_empty());
        // A fresh record right after still lands in a bucket containing now.
        record_value(&mut queue, 2.0, 1_235 * SECOND);
        let map = queue.snapshot(1_235 * SECOND).unwrap();
        assert_eq!(sum_of(&map, &[tag_value!("v")]), Some(2.0));
    }

    #[test]
    fn test_time_backwards_is_rejected() {
        let mut queue = IntervalBucketQueue::new(
            Duration::from_secs(40),
            4,
            100 * SECOND,
            vec![Aggregation::Sum],
        );
        let tag = tag_value!("v");
        let err = queue.record(&[&tag], 1.0, 50 * SECOND).unwrap_err();
        assert!(matches!(err, ObsError::InvalidArgument(_)));
        let err = queue.snapshot(50 * SECOND).unwrap_err();
        assert!(matches!(err, ObsError::InvalidArgument(_)));
    }

    #[test]
    fn test_snapshot_does_not_consume_state() {
        let mut queue = test_queue();
        record_value(&mut queue, 100.0, 5 * SECOND);
        let first = queue.snapshot(9 * SECOND).unwrap();
        let second = queue.snapshot(9 * SECOND).unwrap();
        assert_eq!(sum_of(&first, &[tag_value!("v")]), Some(100.0));
        assert_eq!(first, second);
    }
}
