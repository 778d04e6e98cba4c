// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! View snapshots handed to exporters.

use crate::view::View;
use libdd_obs_common::tag::TagValue;
use libdd_obs_common::time::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One aggregation's state, frozen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AggregationData {
    Sum { sum: f64 },
    Count { count: u64 },
    Histogram { bucket_counts: Vec<u64> },
    Range { min: f64, max: f64 },
    Mean { mean: f64, count: u64 },
    StdDev { stddev: f64 },
}

/// The window a snapshot covers. Cumulative windows keep their start across
/// snapshots; interval windows only have a meaningful end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowData {
    Cumulative { start: Timestamp, end: Timestamp },
    Interval { end: Timestamp },
}

/// A snapshot of one view: one row of aggregation data per tag-value vector
/// observed, keyed in the view's column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewData {
    pub view: View,
    pub aggregation_map: HashMap<Vec<TagValue>, Vec<AggregationData>>,
    pub window_data: WindowData,
}

impl ViewData {
    /// Convenience accessor for one cell's row.
    pub fn row(&self, key: &[TagValue]) -> Option<&[AggregationData]> {
        self.aggregation_map.get(key).map(Vec::as_slice)
    }
}
