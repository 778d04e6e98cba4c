// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0
#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

//! The stats half of the observability runtime: measures and measurements,
//! user-declared views, per-kind accumulators, and the aggregation engine
//! fed asynchronously through the shared event queue.

use libdd_obs_common::error::ObsError;
use libdd_obs_common::queue::EventQueue;
use libdd_obs_common::time::Clock;
use std::sync::Arc;

pub mod aggregation;
mod interval;
pub mod measure;
mod mutable;
pub mod recorder;
mod rows;
pub mod view;
pub mod view_data;
pub mod view_manager;

use recorder::StatsRecorder;
use view_manager::{StatsConfig, ViewManager};

/// The stats component: the view manager plus the recorder façade wired to
/// the shared event queue.
#[derive(Debug)]
pub struct StatsComponent {
    view_manager: Arc<ViewManager>,
    recorder: StatsRecorder,
}

impl StatsComponent {
    pub fn new(
        clock: Arc<dyn Clock>,
        queue: Arc<dyn EventQueue>,
        config: StatsConfig,
    ) -> Result<Self, ObsError> {
        let view_manager = Arc::new(ViewManager::new(Arc::clone(&clock), config)?);
        let recorder = StatsRecorder::new(Arc::clone(&view_manager), queue, clock);
        Ok(StatsComponent {
            view_manager,
            recorder,
        })
    }

    pub fn view_manager(&self) -> &Arc<ViewManager> {
        &self.view_manager
    }

    pub fn recorder(&self) -> &StatsRecorder {
        &self.recorder
    }
}
