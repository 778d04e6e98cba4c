// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Per-kind numeric accumulators. `combine` exists for sliding-window
//! partial buckets: it blends another accumulator's state weighted by a
//! fraction in [0, 1].

use crate::aggregation::Aggregation;
use crate::view_data::AggregationData;
use libdd_obs_common::error::ObsError;

/// Mutable accumulator state, one variant per aggregation kind.
#[derive(Debug, Clone)]
pub(crate) enum MutableAggregation {
    Sum {
        sum: f64,
    },
    Count {
        count: u64,
    },
    Histogram {
        bounds: Vec<f64>,
        counts: Vec<u64>,
    },
    Range {
        min: f64,
        max: f64,
    },
    Mean {
        sum: f64,
        count: u64,
    },
    StdDev {
        count: u64,
        mean: f64,
        m2: f64,
    },
}

/// Bucket index for a histogram value: the first bound strictly greater
/// than the value. The strict-less comparison means a value equal to
/// `bounds[i]` lands in bucket `i + 1`, and NaN (which fails every
/// comparison) lands in the overflow bucket.
fn histogram_bucket_index(bounds: &[f64], value: f64) -> usize {
    bounds
        .iter()
        .position(|bound| value < *bound)
        .unwrap_or(bounds.len())
}

fn round_fraction(fraction: f64, count: u64) -> u64 {
    (fraction * count as f64).round_ties_even() as u64
}

impl MutableAggregation {
    pub(crate) fn new(descriptor: &Aggregation) -> Self {
        match descriptor {
            Aggregation::Sum => MutableAggregation::Sum { sum: 0.0 },
            Aggregation::Count => MutableAggregation::Count { count: 0 },
            Aggregation::Histogram { bounds } => MutableAggregation::Histogram {
                bounds: bounds.clone(),
                counts: vec![0; bounds.len() + 1],
            },
            Aggregation::Range => MutableAggregation::Range {
                min: f64::INFINITY,
                max: f64::NEG_INFINITY,
            },
            Aggregation::Mean => MutableAggregation::Mean { sum: 0.0, count: 0 },
            Aggregation::StdDev => MutableAggregation::StdDev {
                count: 0,
                mean: 0.0,
                m2: 0.0,
            },
        }
    }

    pub(crate) fn add(&mut self, value: f64) {
        match self {
            MutableAggregation::Sum { sum } => *sum += value,
            MutableAggregation::Count { count } => *count += 1,
            MutableAggregation::Histogram { bounds, counts } => {
                counts[histogram_bucket_index(bounds, value)] += 1;
            }
            MutableAggregation::Range { min, max } => {
                if value < *min {
                    *min = value;
                }
                if value > *max {
                    *max = value;
                }
            }
            MutableAggregation::Mean { sum, count } => {
                *sum += value;
                *count += 1;
            }
            MutableAggregation::StdDev { count, mean, m2 } => {
                // Welford's online update.
                *count += 1;
                let delta = value - *mean;
                *mean += delta / *count as f64;
                *m2 += delta * (value - *mean);
            }
        }
    }

    /// Folds `other` into `self`, weighted by `fraction`.
    ///
    /// Count and histogram counts round half-to-even. Range and StdDev have
    /// no meaningful fractional blend; they accept only `fraction == 1.0`
    /// (exact merges) and reject anything else as unsupported.
    pub(crate) fn combine(&mut self, other: &Self, fraction: f64) -> Result<(), ObsError> {
        if !(0.0..=1.0).contains(&fraction) {
            return Err(ObsError::invalid_argument(format!(
                "combine fraction {fraction} is outside [0.0, 1.0]"
            )));
        }
        match (self, other) {
            (MutableAggregation::Sum { sum }, MutableAggregation::Sum { sum: other_sum }) => {
                *sum += fraction * other_sum;
                Ok(())
            }
            (
                MutableAggregation::Count { count },
                MutableAggregation::Count { count: other_count },
            ) => {
                *count += round_fraction(fraction, *other_count);
                Ok(())
            }
            (
                MutableAggregation::Histogram { bounds, counts },
                MutableAggregation::Histogram {
                    bounds: other_bounds,
                    counts: other_counts,
                },
            ) => {
                if bounds != other_bounds {
                    return Err(ObsError::invalid_argument(
                        "cannot combine histograms with different bounds",
                    ));
                }
                for (count, other_count) in counts.iter_mut().zip(other_counts) {
                    *count += round_fraction(fraction, *other_count);
                }
                Ok(())
            }
            (
                MutableAggregation::Range { min, max },
                MutableAggregation::Range {
                    min: other_min,
                    max: other_max,
                },
            ) => {
                if fraction != 1.0 {
                    return Err(ObsError::unsupported(
                        "range does not support fractional combine",
                    ));
                }
                if *other_min < *min {
                    *min = *other_min;
                }
                if *other_max > *max {
                    *max = *other_max;
                }
                Ok(())
            }
            (
                MutableAggregation::Mean { sum, count },
                MutableAggregation::Mean {
                    sum: other_sum,
                    count: other_count,
                },
            ) => {
                *sum += fraction * other_sum;
                *count += round_fraction(fraction, *other_count);
                Ok(())
            }
            (
                MutableAggregation::StdDev { count, mean, m2 },
                MutableAggregation::StdDev {
                    count: other_count,
                    mean: other_mean,
                    m2: other_m2,
                },
            ) => {
                if fraction != 1.0 {
                    return Err(ObsError::unsupported(
                        "stddev does not support fractional combine",
                    ));
                }
                // Parallel Welford merge.
                if *other_count == 0 {
                    return Ok(());
                }
                if *count == 0 {
                    *count = *other_count;
                    *mean = *other_mean;
                    *m2 = *other_m2;
                    return Ok(());
                }
                let total = *count + *other_count;
                let delta = *other_mean - *mean;
                *m2 += other_m2
                    + delta * delta * (*count as f64 * *other_count as f64) / total as f64;
                *mean += delta * *other_count as f64 / total as f64;
                *count = total;
                Ok(())
            }
            _ => Err(ObsError::invalid_argument(
                "cannot combine different aggregation kinds",
            )),
        }
    }

    pub(crate) fn snapshot(&self) -> AggregationData {
        match self {
            MutableAggregation::Sum { sum } => AggregationData::Sum { sum: *sum },
            MutableAggregation::Count { count } => AggregationData::Count { count: *count },
            MutableAggregation::Histogram { counts, .. } => AggregationData::Histogram {
                bucket_counts: counts.clone(),
            },
            MutableAggregation::Range { min, max } => AggregationData::Range {
                min: *min,
                max: *max,
            },
            MutableAggregation::Mean { sum, count } => AggregationData::Mean {
                mean: if *count == 0 { 0.0 } else { sum / *count as f64 },
                count: *count,
            },
            MutableAggregation::StdDev { count, m2, .. } => AggregationData::StdDev {
                stddev: if *count == 0 {
                    0.0
                } else {
                    (m2 / *count as f64).sqrt()
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_approx_eq(a: f64, b: f64) {
        assert!((a - b).abs() < 1.0e-9, "{a} is not approximately {b}");
    }

    #[test]
    fn test_sum() {
        let mut sum = MutableAggregation::new(&Aggregation::Sum);
        for value in [10.0, 20.0, 30.0, 40.0] {
            sum.add(value);
        }
        assert_eq!(sum.snapshot(), AggregationData::Sum { sum: 100.0 });

        let mut blended = MutableAggregation::new(&Aggregation::Sum);
        blended.combine(&sum, 0.25).unwrap();
        assert_eq!(blended.snapshot(), AggregationData::Sum { sum: 25.0 });
    }

    #[test]
    fn test_count_combine_rounds_half_to_even() {
        let mut count = MutableAggregation::new(&Aggregation::Count);
        for _ in 0..5 {
            count.add(0.0);
        }
        // 0.5 * 5 = 2.5 rounds to 2, not 3.
        let mut blended = MutableAggregation::new(&Aggregation::Count);
        blended.combine(&count, 0.5).unwrap();
        assert_eq!(blended.snapshot(), AggregationData::Count { count: 2 });

        // 0.5 * 7 = 3.5 rounds to 4.
        count.add(0.0);
        count.add(0.0);
        let mut blended = MutableAggregation::new(&Aggregation::Count);
        blended.combine(&count, 0.5).unwrap();
        assert_eq!(blended.snapshot(), AggregationData::Count { count: 4 });
    }

    #[test]
    fn test_histogram_bucketing_boundaries() {
        let descriptor = Aggregation::histogram(vec![0.0, 10.0, 100.0]).unwrap();
        let mut histogram = MutableAggregation::new(&descriptor);
        histogram.add(-5.0); // bucket 0
        histogram.add(0.0); // equal to bounds[0] -> bucket 1
        histogram.add(9.9); // bucket 1
        histogram.add(10.0); // equal to bounds[1] -> bucket 2
        histogram.add(1000.0); // overflow bucket
        assert_eq!(
            histogram.snapshot(),
            AggregationData::Histogram {
                bucket_counts: vec![1, 2, 1, 1],
            }
        );
    }

    #[test]
    fn test_histogram_nan_goes_to_overflow_bucket() {
        let descriptor = Aggregation::histogram(vec![0.0, 10.0]).unwrap();
        let mut histogram = MutableAggregation::new(&descriptor);
        histogram.add(f64::NAN);
        assert_eq!(
            histogram.snapshot(),
            AggregationData::Histogram {
                bucket_counts: vec![0, 0, 1],
            }
        );
    }

    #[test]
    fn test_histogram_combine_requires_same_bounds() {
        let a = MutableAggregation::new(&Aggregation::histogram(vec![0.0, 1.0]).unwrap());
        let mut b = MutableAggregation::new(&Aggregation::histogram(vec![0.0, 2.0]).unwrap());
        assert!(b.combine(&a, 1.0).is_err());
    }

    #[test]
    fn test_range() {
        let mut range = MutableAggregation::new(&Aggregation::Range);
        assert_eq!(
            range.snapshot(),
            AggregationData::Range {
                min: f64::INFINITY,
                max: f64::NEG_INFINITY,
            }
        );
        for value in [3.0, -1.0, 7.0] {
            range.add(value);
        }
        assert_eq!(
            range.snapshot(),
            AggregationData::Range {
                min: -1.0,
                max: 7.0
            }
        );

        let mut merged = MutableAggregation::new(&Aggregation::Range);
        merged.add(100.0);
        merged.combine(&range, 1.0).unwrap();
        assert_eq!(
            merged.snapshot(),
            AggregationData::Range {
                min: -1.0,
                max: 100.0
            }
        );
    }

    #[test]
    fn test_range_rejects_fractional_combine() {
        let other = MutableAggregation::new(&Aggregation::Range);
        let mut range = MutableAggregation::new(&Aggregation::Range);
        let err = range.combine(&other, 0.5).unwrap_err();
        assert!(matches!(err, ObsError::Unsupported(_)));
    }

    #[test]
    fn test_mean() {
        let mut mean = MutableAggregation::new(&Aggregation::Mean);
        assert_eq!(
            mean.snapshot(),
            AggregationData::Mean {
                mean: 0.0,
                count: 0
            }
        );
        for value in [10.0, 20.0, 30.0, 40.0] {
            mean.add(value);
        }
        assert_eq!(
            mean.snapshot(),
            AggregationData::Mean {
                mean: 25.0,
                count: 4
            }
        );
    }

    #[test]
    fn test_stddev_welford() {
        let mut stddev = MutableAggregation::new(&Aggregation::StdDev);
        assert_eq!(stddev.snapshot(), AggregationData::StdDev { stddev: 0.0 });
        for value in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            stddev.add(value);
        }
        // Known population stddev of this series is exactly 2.
        let AggregationData::StdDev { stddev } = stddev.snapshot() else {
            panic!("wrong kind");
        };
        assert_approx_eq(stddev, 2.0);
    }

    #[test]
    fn test_stddev_unit_combine_matches_single_stream() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let mut left = MutableAggregation::new(&Aggregation::StdDev);
        let mut right = MutableAggregation::new(&Aggregation::StdDev);
        for value in &values[..3] {
            left.add(*value);
        }
        for value in &values[3..] {
            right.add(*value);
        }
        left.combine(&right, 1.0).unwrap();
        let AggregationData::StdDev { stddev } = left.snapshot() else {
            panic!("wrong kind");
        };
        assert_approx_eq(stddev, 2.0);
    }

    #[test]
    fn test_stddev_rejects_fractional_combine() {
        let other = MutableAggregation::new(&Aggregation::StdDev);
        let mut stddev = MutableAggregation::new(&Aggregation::StdDev);
        let err = stddev.combine(&other, 0.99).unwrap_err();
        assert!(matches!(err, ObsError::Unsupported(_)));
    }

    #[test]
    fn test_nan_propagates_into_sum_mean_stddev() {
        let mut sum = MutableAggregation::new(&Aggregation::Sum);
        sum.add(f64::NAN);
        let AggregationData::Sum { sum } = sum.snapshot() else {
            panic!("wrong kind");
        };
        assert!(sum.is_nan());

        let mut mean = MutableAggregation::new(&Aggregation::Mean);
        mean.add(f64::NAN);
        mean.add(1.0);
        let AggregationData::Mean { mean, .. } = mean.snapshot() else {
            panic!("wrong kind");
        };
        assert!(mean.is_nan());

        let mut stddev = MutableAggregation::new(&Aggregation::StdDev);
        stddev.add(f64::NAN);
        stddev.add(1.0);
        let AggregationData::StdDev { stddev } = stddev.snapshot() else {
            panic!("wrong kind");
        };
        assert!(stddev.is_nan());
    }

    #[test]
    fn test_mismatched_kinds_rejected() {
        let count = MutableAggregation::new(&Aggregation::Count);
        let mut sum = MutableAggregation::new(&Aggregation::Sum);
        assert!(sum.combine(&count, 1.0).is_err());
    }

    #[test]
    fn test_out_of_range_fraction_rejected() {
        let other = MutableAggregation::new(&Aggregation::Sum);
        let mut sum = MutableAggregation::new(&Aggregation::Sum);
        assert!(sum.combine(&other, -0.1).is_err());
        assert!(sum.combine(&other, 1.1).is_err());
        assert!(sum.combine(&other, f64::NAN).is_err());
    }
}
