// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! View declarations: how to aggregate one measure by a set of tag keys
//! over a time window.

use crate::aggregation::Aggregation;
use crate::measure::Measure;
use libdd_obs_common::error::ObsError;
use libdd_obs_common::tag::TagKey;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Longest accepted view name, in bytes.
pub const MAX_VIEW_NAME_LENGTH: usize = 256;

/// The time window a view aggregates over: the whole process lifetime, or a
/// sliding interval of the given length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Window {
    Cumulative,
    Interval { duration: Duration },
}

/// A user declaration of how to aggregate a measure. `columns` names the
/// tag keys whose values define the aggregation cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct View {
    name: String,
    description: String,
    measure: Measure,
    aggregations: Vec<Aggregation>,
    columns: Vec<TagKey>,
    window: Window,
}

impl View {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        measure: Measure,
        aggregations: Vec<Aggregation>,
        columns: Vec<TagKey>,
        window: Window,
    ) -> Result<Self, ObsError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ObsError::invalid_argument("view name is empty"));
        }
        if name.len() > MAX_VIEW_NAME_LENGTH {
            return Err(ObsError::invalid_argument(format!(
                "view name '{name}' is longer than {MAX_VIEW_NAME_LENGTH} bytes"
            )));
        }
        if aggregations.is_empty() {
            return Err(ObsError::invalid_argument(format!(
                "view '{name}' declares no aggregations"
            )));
        }
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column) {
                return Err(ObsError::invalid_argument(format!(
                    "view '{name}' repeats column '{column}'"
                )));
            }
        }
        if let Window::Interval { duration } = window {
            if duration.is_zero() {
                return Err(ObsError::invalid_argument(format!(
                    "view '{name}' declares a zero-length interval"
                )));
            }
        }
        Ok(View {
            name,
            description: description.into(),
            measure,
            aggregations,
            columns,
            window,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn measure(&self) -> &Measure {
        &self.measure
    }

    pub fn aggregations(&self) -> &[Aggregation] {
        &self.aggregations
    }

    pub fn columns(&self) -> &[TagKey] {
        &self.columns
    }

    pub fn window(&self) -> Window {
        self.window
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use libdd_obs_common::tag_key;

    fn test_measure() -> Measure {
        Measure::double("rpc/latency", "round trip time", "ms").unwrap()
    }

    #[test]
    fn test_view_validation() {
        let measure = test_measure();
        assert!(View::new(
            "",
            "",
            measure.clone(),
            vec![Aggregation::Sum],
            vec![],
            Window::Cumulative,
        )
        .is_err());

        assert!(View::new(
            "latency/sum",
            "",
            measure.clone(),
            vec![],
            vec![],
            Window::Cumulative,
        )
        .is_err());

        assert!(View::new(
            "latency/sum",
            "",
            measure.clone(),
            vec![Aggregation::Sum],
            vec![tag_key!("method"), tag_key!("method")],
            Window::Cumulative,
        )
        .is_err());

        assert!(View::new(
            "latency/sum",
            "",
            measure.clone(),
            vec![Aggregation::Sum],
            vec![],
            Window::Interval {
                duration: Duration::ZERO
            },
        )
        .is_err());

        assert!(View::new(
            "latency/sum",
            "",
            measure,
            vec![Aggregation::Sum],
            vec![tag_key!("method")],
            Window::Cumulative,
        )
        .is_ok());
    }
}
