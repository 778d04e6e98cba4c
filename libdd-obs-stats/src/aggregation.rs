// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Aggregation descriptors: what a view computes per cell.

use libdd_obs_common::error::ObsError;
use serde::{Deserialize, Serialize};

/// Declares one running summary statistic. Histogram bounds are validated
/// at construction so every accumulator built from the descriptor is sound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Aggregation {
    Sum,
    Count,
    Histogram { bounds: Vec<f64> },
    Range,
    Mean,
    StdDev,
}

impl Aggregation {
    /// An explicit-bounds histogram with buckets
    /// `(-inf, bounds[0]), [bounds[0], bounds[1]), ..., [bounds[n-1], +inf)`.
    pub fn histogram(bounds: Vec<f64>) -> Result<Self, ObsError> {
        if bounds.is_empty() {
            return Err(ObsError::invalid_argument("histogram bounds are empty"));
        }
        if bounds.iter().any(|bound| !bound.is_finite()) {
            return Err(ObsError::invalid_argument(
                "histogram bounds must be finite",
            ));
        }
        if bounds.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(ObsError::invalid_argument(
                "histogram bounds must be strictly increasing",
            ));
        }
        Ok(Aggregation::Histogram { bounds })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_histogram_bounds_validation() {
        assert!(Aggregation::histogram(vec![]).is_err());
        assert!(Aggregation::histogram(vec![1.0, 1.0]).is_err());
        assert!(Aggregation::histogram(vec![2.0, 1.0]).is_err());
        assert!(Aggregation::histogram(vec![0.0, f64::INFINITY]).is_err());
        assert!(Aggregation::histogram(vec![f64::NAN]).is_err());
        assert!(Aggregation::histogram(vec![0.0, 10.0, 100.0]).is_ok());
    }
}
