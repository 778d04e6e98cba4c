// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Measure definitions and the measurements recorded against them.

use libdd_obs_common::error::ObsError;
use serde::{Deserialize, Serialize};

/// Longest accepted measure name, in bytes.
pub const MAX_MEASURE_NAME_LENGTH: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MeasureKind {
    Double,
    Int64,
}

/// A typed numeric quantity definition. Names identify measures within the
/// process, so they must be unique; the view manager enforces that at
/// registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Measure {
    name: String,
    description: String,
    unit: String,
    kind: MeasureKind,
}

impl Measure {
    pub fn double(
        name: impl Into<String>,
        description: impl Into<String>,
        unit: impl Into<String>,
    ) -> anyhow::Result<Self> {
        Measure::new(name.into(), description.into(), unit.into(), MeasureKind::Double)
    }

    pub fn int64(
        name: impl Into<String>,
        description: impl Into<String>,
        unit: impl Into<String>,
    ) -> anyhow::Result<Self> {
        Measure::new(name.into(), description.into(), unit.into(), MeasureKind::Int64)
    }

    fn new(
        name: String,
        description: String,
        unit: String,
        kind: MeasureKind,
    ) -> anyhow::Result<Self> {
        anyhow::ensure!(!name.is_empty(), "measure name is empty");
        anyhow::ensure!(
            name.len() <= MAX_MEASURE_NAME_LENGTH,
            "measure name '{name}' is longer than {MAX_MEASURE_NAME_LENGTH} bytes"
        );
        anyhow::ensure!(
            name.bytes().all(|b| (0x20..=0x7e).contains(&b)),
            "measure name '{name}' contains non-printable or non-ASCII characters"
        );
        Ok(Measure {
            name,
            description,
            unit,
            kind,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn kind(&self) -> MeasureKind {
        self.kind
    }
}

/// One recorded value for one measure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    measure: Measure,
    value: MeasurementValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MeasurementValue {
    Double(f64),
    Int64(i64),
}

impl Measurement {
    pub fn double(measure: Measure, value: f64) -> Result<Self, ObsError> {
        if measure.kind() != MeasureKind::Double {
            return Err(ObsError::invalid_argument(format!(
                "measure '{}' does not record double values",
                measure.name()
            )));
        }
        Ok(Measurement {
            measure,
            value: MeasurementValue::Double(value),
        })
    }

    pub fn int64(measure: Measure, value: i64) -> Result<Self, ObsError> {
        if measure.kind() != MeasureKind::Int64 {
            return Err(ObsError::invalid_argument(format!(
                "measure '{}' does not record int64 values",
                measure.name()
            )));
        }
        Ok(Measurement {
            measure,
            value: MeasurementValue::Int64(value),
        })
    }

    pub fn measure(&self) -> &Measure {
        &self.measure
    }

    /// The recorded value as the aggregation-engine numeric type.
    pub fn value_as_f64(&self) -> f64 {
        match self.value {
            MeasurementValue::Double(value) => value,
            MeasurementValue::Int64(value) => value as f64,
        }
    }
}
