// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Immutable span snapshots handed to exporters.

use crate::span::{Annotation, AttributeValue, Link, MessageEvent};
use crate::span_context::{SpanContext, SpanId};
use crate::status::Status;
use libdd_obs_common::time::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Attribute map snapshot plus how many recorded attributes no longer fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributesData {
    pub map: HashMap<String, AttributeValue>,
    pub dropped_count: u64,
}

/// One recorded event with its wall-clock time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedEventData<T> {
    pub time: Timestamp,
    pub event: T,
}

/// Event list snapshot plus the overflow drop count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedEventsData<T> {
    pub events: Vec<TimedEventData<T>>,
    pub dropped_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinksData {
    pub links: Vec<Link>,
    pub dropped_count: u64,
}

/// Everything a span recorded, frozen. `end_time` is `None` when the
/// snapshot was taken while the span was still live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanData {
    pub context: SpanContext,
    pub parent_span_id: Option<SpanId>,
    pub has_remote_parent: Option<bool>,
    pub name: String,
    pub start_time: Timestamp,
    pub attributes: AttributesData,
    pub annotations: TimedEventsData<Annotation>,
    pub message_events: TimedEventsData<MessageEvent>,
    pub links: LinksData,
    pub status: Option<Status>,
    pub end_time: Option<Timestamp>,
}

impl SpanData {
    /// `end - start` in nanoseconds for an ended span snapshot.
    pub fn latency_nanos(&self) -> Option<i64> {
        self.end_time.map(|end| end.nanos_since(&self.start_time))
    }
}
