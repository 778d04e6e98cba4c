// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0
#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

//! Span lifecycle and bounded in-memory recording, plus the sampled span
//! store that keeps a representative set of completed spans per registered
//! span name for on-demand debugging.

use libdd_obs_common::time::Clock;
use std::sync::Arc;

pub mod sampled_store;
pub mod sampler;
pub mod span;
pub mod span_context;
pub mod span_data;
pub mod status;
pub mod trace_params;
pub mod tracer;

use sampled_store::SampledSpanStore;
use trace_params::TraceParams;
use tracer::Tracer;

/// The trace half of the runtime: a tracer wired to the sampled span store
/// through the start/end handler callbacks.
#[derive(Debug)]
pub struct TraceComponent {
    tracer: Tracer,
    sampled_span_store: Arc<SampledSpanStore>,
}

impl TraceComponent {
    pub fn new(clock: Arc<dyn Clock>, trace_params: TraceParams) -> Self {
        let sampled_span_store = Arc::new(SampledSpanStore::new());
        let tracer = Tracer::new(
            clock,
            trace_params,
            Arc::clone(&sampled_span_store) as Arc<dyn span::StartEndHandler>,
        );
        TraceComponent {
            tracer,
            sampled_span_store,
        }
    }

    pub fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    pub fn sampled_span_store(&self) -> &Arc<SampledSpanStore> {
        &self.sampled_span_store
    }
}
