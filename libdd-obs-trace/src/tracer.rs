// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Span creation: the tracer owns the active trace params, the id source
//! and the start/end handler, and hands out spans through a builder.

use crate::sampler::Sampler;
use crate::span::{Span, SpanStartArgs, StartEndHandler};
use crate::span_context::{IdGenerator, RandomIdGenerator, SpanContext, TraceOptions};
use crate::trace_params::TraceParams;
use libdd_obs_common::error::ObsError;
use libdd_obs_common::time::{Clock, TimestampConverter};
use libdd_obs_common::MutexExt;
use std::sync::{Arc, Mutex};

/// Creates spans. One per process half of the runtime; cheap to share by
/// reference.
#[derive(Debug)]
pub struct Tracer {
    clock: Arc<dyn Clock>,
    active_trace_params: Mutex<TraceParams>,
    start_end_handler: Arc<dyn StartEndHandler>,
    id_generator: Arc<dyn IdGenerator>,
}

impl Tracer {
    pub fn new(
        clock: Arc<dyn Clock>,
        trace_params: TraceParams,
        start_end_handler: Arc<dyn StartEndHandler>,
    ) -> Self {
        Tracer::with_id_generator(
            clock,
            trace_params,
            start_end_handler,
            Arc::new(RandomIdGenerator),
        )
    }

    pub fn with_id_generator(
        clock: Arc<dyn Clock>,
        trace_params: TraceParams,
        start_end_handler: Arc<dyn StartEndHandler>,
        id_generator: Arc<dyn IdGenerator>,
    ) -> Self {
        Tracer {
            clock,
            active_trace_params: Mutex::new(trace_params),
            start_end_handler,
            id_generator,
        }
    }

    pub fn active_trace_params(&self) -> TraceParams {
        self.active_trace_params.lock_or_panic().clone()
    }

    /// Swaps the params applied to spans started from now on; live spans
    /// keep the caps they were started with.
    pub fn update_active_trace_params(&self, trace_params: TraceParams) {
        *self.active_trace_params.lock_or_panic() = trace_params;
    }

    pub fn span_builder(&self, name: impl Into<String>) -> SpanBuilder<'_> {
        SpanBuilder {
            tracer: self,
            name: name.into(),
            parent: Parent::Root,
            sampler: None,
            record_events: None,
        }
    }
}

enum Parent<'a> {
    Root,
    Local(&'a Arc<Span>),
    Remote(SpanContext),
}

/// Configures and starts one span.
pub struct SpanBuilder<'a> {
    tracer: &'a Tracer,
    name: String,
    parent: Parent<'a>,
    sampler: Option<Arc<dyn Sampler>>,
    record_events: Option<bool>,
}

impl<'a> SpanBuilder<'a> {
    /// Parents the new span under a span of this process. The child joins
    /// the parent's trace and reuses its timestamp converter.
    pub fn with_parent(mut self, parent: &'a Arc<Span>) -> Self {
        self.parent = Parent::Local(parent);
        self
    }

    /// Parents the new span under a context received from another process.
    pub fn with_remote_parent(mut self, parent: SpanContext) -> Self {
        self.parent = Parent::Remote(parent);
        self
    }

    /// Overrides the sampling decision for this span only.
    pub fn with_sampler(mut self, sampler: Arc<dyn Sampler>) -> Self {
        self.sampler = Some(sampler);
        self
    }

    /// Forces event recording on even for unsampled spans (the span still
    /// carries an unsampled context).
    pub fn with_record_events(mut self, record_events: bool) -> Self {
        self.record_events = Some(record_events);
        self
    }

    pub fn start(self) -> Result<Arc<Span>, ObsError> {
        if self.name.is_empty() {
            return Err(ObsError::invalid_argument("span name is empty"));
        }
        let tracer = self.tracer;
        let params = tracer.active_trace_params();

        let (parent_context, parent_converter, has_remote_parent) = match &self.parent {
            Parent::Root => (None, None, None),
            Parent::Local(span) => (Some(*span.context()), Some(span.converter()), Some(false)),
            Parent::Remote(context) => (Some(*context), None, Some(true)),
        };
        let valid_parent = parent_context.filter(SpanContext::is_valid);

        let trace_id = valid_parent
            .map(|context| context.trace_id)
            .unwrap_or_else(|| tracer.id_generator.new_trace_id());
        let span_id = tracer.id_generator.new_span_id();

        let sampled = match &self.sampler {
            Some(sampler) => sampler.should_sample(
                valid_parent.as_ref(),
                &trace_id,
                &span_id,
                &self.name,
                &[],
            ),
            // Children inherit the trace's decision; roots consult the
            // default sampler.
            None => match &valid_parent {
                Some(context) => context.trace_options.is_sampled(),
                None => params.default_sampler().should_sample(
                    None,
                    &trace_id,
                    &span_id,
                    &self.name,
                    &[],
                ),
            },
        };
        let record_events = sampled || self.record_events.unwrap_or(false);

        let converter = parent_converter
            .unwrap_or_else(|| TimestampConverter::new(tracer.clock.as_ref()));

        Ok(Span::start(SpanStartArgs {
            context: SpanContext::new(trace_id, span_id, TraceOptions::new(sampled)),
            parent_span_id: valid_parent.map(|context| context.span_id),
            has_remote_parent,
            name: self.name,
            record_events,
            max_attributes: params.max_attributes(),
            max_annotations: params.max_annotations(),
            max_message_events: params.max_message_events(),
            max_links: params.max_links(),
            converter,
            clock: Arc::clone(&tracer.clock),
            start_end_handler: Arc::clone(&tracer.start_end_handler),
        }))
    }
}
