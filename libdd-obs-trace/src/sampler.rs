// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Sampling predicates consulted when a root span is started.

use crate::span::Link;
use crate::span_context::{SpanContext, SpanId, TraceId};
use libdd_obs_common::error::ObsError;
use std::fmt::Debug;

/// Decides whether a new span should be sampled.
pub trait Sampler: Send + Sync + Debug {
    fn should_sample(
        &self,
        parent: Option<&SpanContext>,
        trace_id: &TraceId,
        span_id: &SpanId,
        name: &str,
        parent_links: &[Link],
    ) -> bool;
}

/// Samples every span.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysSampler;

impl Sampler for AlwaysSampler {
    fn should_sample(
        &self,
        _parent: Option<&SpanContext>,
        _trace_id: &TraceId,
        _span_id: &SpanId,
        _name: &str,
        _parent_links: &[Link],
    ) -> bool {
        true
    }
}

/// Samples no span on its own; sampling can still be forced per span.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverSampler;

impl Sampler for NeverSampler {
    fn should_sample(
        &self,
        _parent: Option<&SpanContext>,
        _trace_id: &TraceId,
        _span_id: &SpanId,
        _name: &str,
        _parent_links: &[Link],
    ) -> bool {
        false
    }
}

/// Samples a fixed fraction of traces.
///
/// The decision is a threshold test on the low half of the trace id, so
/// every span of one trace gets the same answer without coordination. A
/// sampled parent or linked span forces sampling to keep traces whole.
#[derive(Debug, Clone, Copy)]
pub struct ProbabilitySampler {
    probability: f64,
    id_upper_bound: u64,
}

impl ProbabilitySampler {
    pub fn new(probability: f64) -> Result<Self, ObsError> {
        if !(0.0..=1.0).contains(&probability) {
            return Err(ObsError::invalid_argument(format!(
                "sampling probability {probability} is outside [0.0, 1.0]"
            )));
        }
        Ok(ProbabilitySampler {
            probability,
            id_upper_bound: (probability * u64::MAX as f64) as u64,
        })
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }
}

impl Sampler for ProbabilitySampler {
    fn should_sample(
        &self,
        parent: Option<&SpanContext>,
        trace_id: &TraceId,
        _span_id: &SpanId,
        _name: &str,
        parent_links: &[Link],
    ) -> bool {
        if parent.is_some_and(|ctx| ctx.trace_options.is_sampled()) {
            return true;
        }
        if parent_links
            .iter()
            .any(|link| link.context.trace_options.is_sampled())
        {
            return true;
        }
        trace_id.lower_u64() < self.id_upper_bound
    }
}
