// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The stats recorder façade: packages a tag context and a measurement
//! batch into an event-queue entry. Recording never blocks on aggregation.

use crate::measure::Measurement;
use crate::view_manager::ViewManager;
use libdd_obs_common::queue::{EventQueue, QueueEvent};
use libdd_obs_common::tag::TagContext;
use libdd_obs_common::time::Clock;
use std::sync::Arc;

/// Hands measurement batches to the aggregation engine through the event
/// queue. Cheap to clone and share with instrumented code.
#[derive(Debug, Clone)]
pub struct StatsRecorder {
    view_manager: Arc<ViewManager>,
    queue: Arc<dyn EventQueue>,
    clock: Arc<dyn Clock>,
}

impl StatsRecorder {
    pub fn new(
        view_manager: Arc<ViewManager>,
        queue: Arc<dyn EventQueue>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        StatsRecorder {
            view_manager,
            queue,
            clock,
        }
    }

    /// Records a batch of measurements against a tag context.
    ///
    /// The context is captured by cheap immutable clone and the batch by
    /// value; the whole batch is applied atomically to every matching view
    /// on the queue worker, in enqueue order.
    pub fn record(&self, tags: TagContext, measurements: Vec<Measurement>) {
        if measurements.is_empty() {
            return;
        }
        self.queue.enqueue(Box::new(StatsEvent {
            view_manager: Arc::clone(&self.view_manager),
            clock: Arc::clone(&self.clock),
            tags,
            measurements,
        }));
    }
}

struct StatsEvent {
    view_manager: Arc<ViewManager>,
    clock: Arc<dyn Clock>,
    tags: TagContext,
    measurements: Vec<Measurement>,
}

impl QueueEvent for StatsEvent {
    fn process(self: Box<Self>) {
        // Stamped with the worker's clock read: batches are applied in
        // queue order, so interval time never runs backwards here.
        let now = self.clock.now();
        self.view_manager.record(&self.tags, &self.measurements, now);
    }
}
