// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The view aggregation engine: maps measurements to registered views and
//! maintains per-view cumulative or interval state.
//!
//! Locking: registration takes the engine-wide write lock; the record path
//! takes the read lock to route, then one mutex per affected view.

use crate::aggregation::Aggregation;
use crate::interval::IntervalBucketQueue;
use crate::measure::{Measure, Measurement};
use crate::rows::{self, RowMap};
use crate::view::{View, Window};
use crate::view_data::{AggregationData, ViewData, WindowData};
use libdd_obs_common::error::ObsError;
use libdd_obs_common::tag::{TagContext, TagValue};
use libdd_obs_common::time::{Clock, Timestamp};
use libdd_obs_common::{MutexExt, RwLockExt};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use tracing::debug;

/// Engine knobs. `interval_bucket_count` is the N of the N+1 bucket queue;
/// profiles that cannot afford sliding windows turn
/// `interval_views_enabled` off and interval registration fails with an
/// unsupported error.
#[derive(Debug, Clone, Copy)]
pub struct StatsConfig {
    pub interval_views_enabled: bool,
    pub interval_bucket_count: usize,
}

pub const DEFAULT_INTERVAL_BUCKET_COUNT: usize = 4;
pub const MIN_INTERVAL_BUCKET_COUNT: usize = 2;
pub const MAX_INTERVAL_BUCKET_COUNT: usize = 20;

impl Default for StatsConfig {
    fn default() -> Self {
        StatsConfig {
            interval_views_enabled: true,
            interval_bucket_count: DEFAULT_INTERVAL_BUCKET_COUNT,
        }
    }
}

impl StatsConfig {
    pub fn validate(&self) -> Result<(), ObsError> {
        if !(MIN_INTERVAL_BUCKET_COUNT..=MAX_INTERVAL_BUCKET_COUNT)
            .contains(&self.interval_bucket_count)
        {
            return Err(ObsError::invalid_argument(format!(
                "interval bucket count {} is outside [{MIN_INTERVAL_BUCKET_COUNT}, {MAX_INTERVAL_BUCKET_COUNT}]",
                self.interval_bucket_count
            )));
        }
        Ok(())
    }
}

#[derive(Debug)]
enum ViewState {
    Cumulative { start: Timestamp, rows: RowMap },
    Interval(IntervalBucketQueue),
}

impl ViewState {
    fn record(
        &mut self,
        aggregations: &[Aggregation],
        projected: &[&TagValue],
        value: f64,
        now: Timestamp,
    ) -> Result<(), ObsError> {
        match self {
            ViewState::Cumulative { rows, .. } => {
                for accumulator in rows::row_mut(rows, projected, aggregations) {
                    accumulator.add(value);
                }
                Ok(())
            }
            ViewState::Interval(queue) => queue.record(projected, value, now.as_unix_nanos()),
        }
    }

    fn snapshot(
        &mut self,
        now: Timestamp,
    ) -> Result<(HashMap<Vec<TagValue>, Vec<AggregationData>>, WindowData), ObsError> {
        match self {
            ViewState::Cumulative { start, rows } => {
                let map = rows
                    .iter()
                    .map(|(key, row)| {
                        (
                            key.clone(),
                            row.iter().map(|accumulator| accumulator.snapshot()).collect(),
                        )
                    })
                    .collect();
                Ok((map, WindowData::Cumulative { start: *start, end: now }))
            }
            ViewState::Interval(queue) => Ok((
                queue.snapshot(now.as_unix_nanos())?,
                WindowData::Interval { end: now },
            )),
        }
    }
}

#[derive(Debug)]
struct RegisteredView {
    view: View,
    state: Mutex<ViewState>,
}

#[derive(Debug, Default)]
struct Registry {
    views: HashMap<String, Arc<RegisteredView>>,
    measures: HashMap<String, Measure>,
    by_measure: HashMap<String, Vec<Arc<RegisteredView>>>,
}

/// Owns every registered view and routes recorded measurements to them.
#[derive(Debug)]
pub struct ViewManager {
    clock: Arc<dyn Clock>,
    config: StatsConfig,
    registry: RwLock<Registry>,
}

impl ViewManager {
    pub fn new(clock: Arc<dyn Clock>, config: StatsConfig) -> Result<Self, ObsError> {
        config.validate()?;
        Ok(ViewManager {
            clock,
            config,
            registry: RwLock::new(Registry::default()),
        })
    }

    /// Registers a view. Re-registering an identical view is a no-op;
    /// conflicting registrations fail.
    pub fn register_view(&self, view: View) -> Result<(), ObsError> {
        if let Window::Interval { .. } = view.window() {
            if !self.config.interval_views_enabled {
                return Err(ObsError::unsupported(
                    "interval views are disabled in this profile",
                ));
            }
            // Range and stddev cannot be blended fractionally, which the
            // sliding-window snapshot requires of the head bucket. Rejected
            // here so the failure never happens mid-record.
            if view
                .aggregations()
                .iter()
                .any(|aggregation| {
                    matches!(aggregation, Aggregation::Range | Aggregation::StdDev)
                })
            {
                return Err(ObsError::unsupported(
                    "interval views cannot carry range or stddev aggregations",
                ));
            }
        }

        let mut registry = self.registry.write_or_panic();
        if let Some(existing) = registry.views.get(view.name()) {
            return if existing.view == view {
                Ok(())
            } else {
                Err(ObsError::invalid_argument(format!(
                    "a different view named '{}' is already registered",
                    view.name()
                )))
            };
        }
        if let Some(existing) = registry.measures.get(view.measure().name()) {
            if existing != view.measure() {
                return Err(ObsError::invalid_argument(format!(
                    "measure '{}' is already registered with a different definition",
                    view.measure().name()
                )));
            }
        }

        let now = self.clock.now();
        let state = match view.window() {
            Window::Cumulative => ViewState::Cumulative {
                start: now,
                rows: RowMap::default(),
            },
            Window::Interval { duration } => ViewState::Interval(IntervalBucketQueue::new(
                duration,
                self.config.interval_bucket_count,
                now.as_unix_nanos(),
                view.aggregations().to_vec(),
            )),
        };

        let measure_name = view.measure().name().to_owned();
        let measure = view.measure().clone();
        let registered = Arc::new(RegisteredView {
            view,
            state: Mutex::new(state),
        });
        registry
            .views
            .insert(registered.view.name().to_owned(), Arc::clone(&registered));
        registry.measures.insert(measure_name.clone(), measure);
        registry
            .by_measure
            .entry(measure_name)
            .or_default()
            .push(registered);
        Ok(())
    }

    /// Applies a batch to every view subscribed to each measure.
    /// Measurements against unregistered measures are silently skipped so
    /// instrumented libraries can run without configured views.
    pub(crate) fn record(
        &self,
        tags: &TagContext,
        measurements: &[Measurement],
        now: Timestamp,
    ) {
        let registry = self.registry.read_or_panic();
        for measurement in measurements {
            let measure_name = measurement.measure().name();
            let Some(views) = registry.by_measure.get(measure_name) else {
                debug!(measure = measure_name, "measurement for unregistered measure ignored");
                continue;
            };
            for registered in views {
                let projected = rows::project(tags, registered.view.columns());
                let mut state = registered.state.lock_or_panic();
                if let Err(err) = state.record(
                    registered.view.aggregations(),
                    &projected,
                    measurement.value_as_f64(),
                    now,
                ) {
                    debug!(
                        view = registered.view.name(),
                        error = %err,
                        "dropping measurement"
                    );
                }
            }
        }
    }

    /// A snapshot of the named view. Snapshotting never resets state.
    pub fn view_data(&self, view_name: &str) -> Result<ViewData, ObsError> {
        let registry = self.registry.read_or_panic();
        let Some(registered) = registry.views.get(view_name) else {
            return Err(ObsError::invalid_argument(format!(
                "no view named '{view_name}' is registered"
            )));
        };
        let now = self.clock.now();
        let (aggregation_map, window_data) =
            registered.state.lock_or_panic().snapshot(now)?;
        Ok(ViewData {
            view: registered.view.clone(),
            aggregation_map,
            window_data,
        })
    }

    pub fn all_exported_views(&self) -> Vec<View> {
        self.registry
            .read_or_panic()
            .views
            .values()
            .map(|registered| registered.view.clone())
            .collect()
    }
}
