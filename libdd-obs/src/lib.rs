// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0
#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

//! The process-wide observability runtime.
//!
//! Construction order is fixed: clock, then the shared event queue, then
//! the stats component, then the trace component. A process normally
//! builds one runtime at startup and installs it as the default.

use libdd_obs_common::error::ObsError;
use libdd_obs_common::queue::{
    EventQueue, RingEventQueue, SimpleEventQueue, DEFAULT_CAPACITY,
};
use libdd_obs_common::time::{Clock, SystemClock};
use libdd_obs_stats::recorder::StatsRecorder;
use libdd_obs_stats::view_manager::{StatsConfig, ViewManager};
use libdd_obs_stats::StatsComponent;
use libdd_obs_trace::sampled_store::SampledSpanStore;
use libdd_obs_trace::trace_params::TraceParams;
use libdd_obs_trace::tracer::Tracer;
use libdd_obs_trace::TraceComponent;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::debug;

/// Which event-queue implementation backs the runtime. `Ring` is the
/// production choice; `Simple` is the coarse-locked profile used by tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueueFlavor {
    Simple,
    #[default]
    Ring,
}

/// Builds an [`ObsRuntime`].
#[derive(Debug, Default)]
pub struct ObsRuntimeBuilder {
    clock: Option<Arc<dyn Clock>>,
    queue_flavor: QueueFlavor,
    queue_capacity: Option<usize>,
    trace_params: Option<TraceParams>,
    stats_config: StatsConfig,
}

impl ObsRuntimeBuilder {
    /// Overrides the system clock; tests inject a manual clock here.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn queue_flavor(mut self, flavor: QueueFlavor) -> Self {
        self.queue_flavor = flavor;
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    pub fn trace_params(mut self, trace_params: TraceParams) -> Self {
        self.trace_params = Some(trace_params);
        self
    }

    pub fn interval_views_enabled(mut self, enabled: bool) -> Self {
        self.stats_config.interval_views_enabled = enabled;
        self
    }

    /// The N of the interval views' N+1 bucket queue; accepted range 2..=20.
    pub fn interval_bucket_count(mut self, count: usize) -> Self {
        self.stats_config.interval_bucket_count = count;
        self
    }

    pub fn build(self) -> anyhow::Result<Arc<ObsRuntime>> {
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock::new()) as Arc<dyn Clock>);
        let capacity = self.queue_capacity.unwrap_or(DEFAULT_CAPACITY);
        let event_queue: Arc<dyn EventQueue> = match self.queue_flavor {
            QueueFlavor::Simple => Arc::new(SimpleEventQueue::start(capacity)?),
            QueueFlavor::Ring => Arc::new(RingEventQueue::start(capacity)?),
        };
        let stats = StatsComponent::new(
            Arc::clone(&clock),
            Arc::clone(&event_queue),
            self.stats_config,
        )?;
        let trace = TraceComponent::new(
            Arc::clone(&clock),
            self.trace_params.unwrap_or_default(),
        );
        Ok(Arc::new(ObsRuntime {
            clock,
            event_queue,
            stats,
            trace,
        }))
    }
}

/// The assembled runtime: singletons for the clock, the shared event queue,
/// and the stats and trace components.
#[derive(Debug)]
pub struct ObsRuntime {
    clock: Arc<dyn Clock>,
    event_queue: Arc<dyn EventQueue>,
    stats: StatsComponent,
    trace: TraceComponent,
}

static DEFAULT_RUNTIME: OnceLock<Arc<ObsRuntime>> = OnceLock::new();

impl ObsRuntime {
    pub fn builder() -> ObsRuntimeBuilder {
        ObsRuntimeBuilder::default()
    }

    /// Installs the process-wide default runtime. One-shot; a second call
    /// fails rather than silently replacing live components.
    pub fn set_default(runtime: Arc<ObsRuntime>) -> Result<(), ObsError> {
        DEFAULT_RUNTIME
            .set(runtime)
            .map_err(|_| ObsError::illegal_state("a default runtime is already installed"))
    }

    pub fn default_runtime() -> Option<Arc<ObsRuntime>> {
        DEFAULT_RUNTIME.get().cloned()
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn event_queue(&self) -> &Arc<dyn EventQueue> {
        &self.event_queue
    }

    pub fn tracer(&self) -> &Tracer {
        self.trace.tracer()
    }

    pub fn sampled_span_store(&self) -> &Arc<SampledSpanStore> {
        self.trace.sampled_span_store()
    }

    pub fn view_manager(&self) -> &Arc<ViewManager> {
        self.stats.view_manager()
    }

    pub fn stats_recorder(&self) -> &StatsRecorder {
        self.stats.recorder()
    }

    /// Best-effort teardown: drains whatever is in flight, then stops the
    /// queue worker. Safe to call more than once.
    pub fn shutdown(&self) {
        if !self.event_queue.flush(Duration::from_secs(5)) {
            debug!("event queue did not drain within the shutdown grace period");
        }
        self.event_queue.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_defaults_and_shutdown_idempotence() {
        let runtime = ObsRuntime::builder()
            .queue_flavor(QueueFlavor::Simple)
            .build()
            .unwrap();
        assert_eq!(runtime.event_queue().stats().enqueued, 0);
        runtime.shutdown();
        runtime.shutdown();
    }

    #[test]
    fn test_invalid_stats_config_fails_build() {
        let result = ObsRuntime::builder().interval_bucket_count(1).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_default_runtime_is_one_shot() {
        assert!(ObsRuntime::default_runtime().is_none());
        let runtime = ObsRuntime::builder()
            .queue_flavor(QueueFlavor::Simple)
            .build()
            .unwrap();
        ObsRuntime::set_default(Arc::clone(&runtime)).unwrap();
        assert!(Arc::ptr_eq(
            &ObsRuntime::default_runtime().unwrap(),
            &runtime
        ));

        let second = ObsRuntime::builder()
            .queue_flavor(QueueFlavor::Simple)
            .build()
            .unwrap();
        let err = ObsRuntime::set_default(second).unwrap_err();
        assert!(matches!(err, ObsError::IllegalState(_)));
    }
}
