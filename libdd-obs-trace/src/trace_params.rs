// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Per-span recording caps and the default sampler.

use crate::sampler::{NeverSampler, Sampler};
use libdd_obs_common::error::ObsError;
use std::sync::Arc;

pub const DEFAULT_MAX_ATTRIBUTES: usize = 32;
pub const DEFAULT_MAX_ANNOTATIONS: usize = 32;
pub const DEFAULT_MAX_MESSAGE_EVENTS: usize = 128;
pub const DEFAULT_MAX_LINKS: usize = 128;

/// Caps on every span's bounded containers plus the sampler consulted when
/// a span is started without an explicit one. All caps are positive.
#[derive(Debug, Clone)]
pub struct TraceParams {
    max_attributes: usize,
    max_annotations: usize,
    max_message_events: usize,
    max_links: usize,
    default_sampler: Arc<dyn Sampler>,
}

impl Default for TraceParams {
    fn default() -> Self {
        TraceParams {
            max_attributes: DEFAULT_MAX_ATTRIBUTES,
            max_annotations: DEFAULT_MAX_ANNOTATIONS,
            max_message_events: DEFAULT_MAX_MESSAGE_EVENTS,
            max_links: DEFAULT_MAX_LINKS,
            default_sampler: Arc::new(NeverSampler),
        }
    }
}

impl TraceParams {
    pub fn builder() -> TraceParamsBuilder {
        TraceParamsBuilder::default()
    }

    /// Start a builder seeded with this instance, for partial updates.
    pub fn to_builder(&self) -> TraceParamsBuilder {
        TraceParamsBuilder {
            params: self.clone(),
        }
    }

    pub fn max_attributes(&self) -> usize {
        self.max_attributes
    }

    pub fn max_annotations(&self) -> usize {
        self.max_annotations
    }

    pub fn max_message_events(&self) -> usize {
        self.max_message_events
    }

    pub fn max_links(&self) -> usize {
        self.max_links
    }

    pub fn default_sampler(&self) -> &Arc<dyn Sampler> {
        &self.default_sampler
    }
}

#[derive(Debug)]
pub struct TraceParamsBuilder {
    params: TraceParams,
}

impl Default for TraceParamsBuilder {
    fn default() -> Self {
        TraceParamsBuilder {
            params: TraceParams::default(),
        }
    }
}

impl TraceParamsBuilder {
    pub fn max_attributes(mut self, max: usize) -> Self {
        self.params.max_attributes = max;
        self
    }

    pub fn max_annotations(mut self, max: usize) -> Self {
        self.params.max_annotations = max;
        self
    }

    pub fn max_message_events(mut self, max: usize) -> Self {
        self.params.max_message_events = max;
        self
    }

    pub fn max_links(mut self, max: usize) -> Self {
        self.params.max_links = max;
        self
    }

    pub fn default_sampler(mut self, sampler: Arc<dyn Sampler>) -> Self {
        self.params.default_sampler = sampler;
        self
    }

    pub fn build(self) -> Result<TraceParams, ObsError> {
        for (name, value) in [
            ("max_attributes", self.params.max_attributes),
            ("max_annotations", self.params.max_annotations),
            ("max_message_events", self.params.max_message_events),
            ("max_links", self.params.max_links),
        ] {
            if value == 0 {
                return Err(ObsError::invalid_argument(format!(
                    "{name} must be positive"
                )));
            }
        }
        Ok(self.params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = TraceParams::default();
        assert_eq!(params.max_attributes(), 32);
        assert_eq!(params.max_annotations(), 32);
        assert_eq!(params.max_message_events(), 128);
        assert_eq!(params.max_links(), 128);
    }

    #[test]
    fn test_zero_caps_rejected() {
        let err = TraceParams::builder().max_attributes(0).build();
        assert!(err.is_err());
        let err = TraceParams::builder().max_links(0).build();
        assert!(err.is_err());
    }

    #[test]
    fn test_to_builder_partial_update() {
        let params = TraceParams::builder()
            .max_attributes(4)
            .build()
            .unwrap()
            .to_builder()
            .max_links(2)
            .build()
            .unwrap();
        assert_eq!(params.max_attributes(), 4);
        assert_eq!(params.max_links(), 2);
        assert_eq!(params.max_annotations(), 32);
    }
}
