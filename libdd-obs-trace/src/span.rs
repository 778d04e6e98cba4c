// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The live span: bounded per-span storage of attributes, annotations,
//! message events and links, mutable under a single per-span lock until
//! `end`, frozen afterwards.

use crate::span_context::{SpanContext, SpanId};
use crate::span_data::{
    AttributesData, LinksData, SpanData, TimedEventData, TimedEventsData,
};
use crate::status::Status;
use libdd_obs_common::error::ObsError;
use libdd_obs_common::time::{Clock, TimestampConverter};
use libdd_obs_common::MutexExt;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt::Debug;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// A single attribute value. Exactly one variant per value; empty strings
/// are legal and round-trip through snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeValue {
    String(String),
    Bool(bool),
    Int(i64),
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_owned())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Int(value)
    }
}

/// A text note attached to a span at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub description: String,
    pub attributes: HashMap<String, AttributeValue>,
}

impl Annotation {
    pub fn new(description: impl Into<String>) -> Self {
        Annotation {
            description: description.into(),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attributes(mut self, attributes: HashMap<String, AttributeValue>) -> Self {
        self.attributes = attributes;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageEventType {
    Sent,
    Received,
}

/// A message (or network) event: one message crossing the process boundary
/// within the span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEvent {
    pub event_type: MessageEventType,
    /// Message id local to the span, e.g. a sequence number.
    pub id: u64,
    pub uncompressed_size: u64,
    pub compressed_size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkType {
    ChildLinkedSpan,
    ParentLinkedSpan,
}

/// A pointer from this span to a span in the same or another trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub context: SpanContext,
    pub link_type: LinkType,
    pub attributes: HashMap<String, AttributeValue>,
}

impl Link {
    pub fn new(context: SpanContext, link_type: LinkType) -> Self {
        Link {
            context,
            link_type,
            attributes: HashMap::new(),
        }
    }
}

/// Options applied when ending a span.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EndSpanOptions {
    /// Overrides any status recorded while the span was live.
    pub status: Option<Status>,
}

/// Callbacks fired on span start and end, on the calling thread.
///
/// Implementations sit on the recording hot path and must be both
/// thread-safe and cheap. Only spans with the record-events option fire
/// them.
pub trait StartEndHandler: Send + Sync + Debug {
    fn on_start(&self, span: &Arc<Span>);
    fn on_end(&self, span: &Arc<Span>);
}

/// String -> AttributeValue map bounded to `capacity` entries.
///
/// Eviction is by access recency: reads refresh an entry, so the victim is
/// always the least-recently-touched key. `total_recorded` counts every
/// insert, including ones later evicted.
#[derive(Debug)]
pub(crate) struct BoundedAttributeMap {
    capacity: usize,
    next_stamp: u64,
    total_recorded: u64,
    entries: HashMap<String, AttributeEntry>,
}

#[derive(Debug)]
struct AttributeEntry {
    value: AttributeValue,
    stamp: u64,
}

impl BoundedAttributeMap {
    pub(crate) fn new(capacity: usize) -> Self {
        BoundedAttributeMap {
            capacity,
            next_stamp: 0,
            total_recorded: 0,
            entries: HashMap::with_capacity(capacity),
        }
    }

    pub(crate) fn insert(&mut self, key: String, value: AttributeValue) {
        self.total_recorded += 1;
        let stamp = self.bump_stamp();
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.value = value;
            entry.stamp = stamp;
            return;
        }
        if self.entries.len() == self.capacity {
            self.evict_least_recently_used();
        }
        self.entries.insert(key, AttributeEntry { value, stamp });
    }

    /// Reads refresh recency, which is what keeps a hot key alive across
    /// eviction.
    pub(crate) fn get(&mut self, key: &str) -> Option<&AttributeValue> {
        let stamp = self.bump_stamp();
        self.entries.get_mut(key).map(|entry| {
            entry.stamp = stamp;
            &entry.value
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn dropped_count(&self) -> u64 {
        self.total_recorded - self.entries.len() as u64
    }

    pub(crate) fn snapshot(&self) -> HashMap<String, AttributeValue> {
        self.entries
            .iter()
            .map(|(key, entry)| (key.clone(), entry.value.clone()))
            .collect()
    }

    fn bump_stamp(&mut self) -> u64 {
        let stamp = self.next_stamp;
        self.next_stamp += 1;
        stamp
    }

    fn evict_least_recently_used(&mut self) {
        let victim = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.stamp)
            .map(|(key, _)| key.clone());
        if let Some(victim) = victim {
            self.entries.remove(&victim);
        }
    }
}

/// FIFO of at most `capacity` events; overflowing drops the oldest entry.
#[derive(Debug)]
pub(crate) struct EventRing<T> {
    capacity: usize,
    total_recorded: u64,
    events: VecDeque<T>,
}

impl<T> EventRing<T> {
    pub(crate) fn new(capacity: usize) -> Self {
        EventRing {
            capacity,
            total_recorded: 0,
            events: VecDeque::with_capacity(capacity),
        }
    }

    pub(crate) fn push(&mut self, event: T) {
        self.total_recorded += 1;
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    pub(crate) fn len(&self) -> usize {
        self.events.len()
    }

    pub(crate) fn dropped_count(&self) -> u64 {
        self.total_recorded - self.events.len() as u64
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &T> {
        self.events.iter()
    }
}

#[derive(Debug)]
struct TimedEvent<T> {
    nanos: i64,
    event: T,
}

#[derive(Debug)]
struct SpanState {
    attributes: BoundedAttributeMap,
    annotations: EventRing<TimedEvent<Annotation>>,
    message_events: EventRing<TimedEvent<MessageEvent>>,
    links: EventRing<Link>,
    status: Option<Status>,
    end_nanos: Option<i64>,
    has_been_ended: bool,
}

/// A live span.
///
/// Identity is immutable; recording state is guarded by one per-span lock
/// and exists only for spans started with the record-events option. After
/// `end` every mutator is a debug-logged no-op.
#[derive(Debug)]
pub struct Span {
    context: SpanContext,
    parent_span_id: Option<SpanId>,
    has_remote_parent: Option<bool>,
    name: String,
    start_nanos: i64,
    converter: TimestampConverter,
    clock: Arc<dyn Clock>,
    start_end_handler: Option<Arc<dyn StartEndHandler>>,
    state: Option<Mutex<SpanState>>,
}

pub(crate) struct SpanStartArgs {
    pub context: SpanContext,
    pub parent_span_id: Option<SpanId>,
    pub has_remote_parent: Option<bool>,
    pub name: String,
    pub record_events: bool,
    pub max_attributes: usize,
    pub max_annotations: usize,
    pub max_message_events: usize,
    pub max_links: usize,
    pub converter: TimestampConverter,
    pub clock: Arc<dyn Clock>,
    pub start_end_handler: Arc<dyn StartEndHandler>,
}

impl Span {
    pub(crate) fn start(args: SpanStartArgs) -> Arc<Self> {
        let state = args.record_events.then(|| {
            Mutex::new(SpanState {
                attributes: BoundedAttributeMap::new(args.max_attributes),
                annotations: EventRing::new(args.max_annotations),
                message_events: EventRing::new(args.max_message_events),
                links: EventRing::new(args.max_links),
                status: None,
                end_nanos: None,
                has_been_ended: false,
            })
        });
        let span = Arc::new(Span {
            context: args.context,
            parent_span_id: args.parent_span_id,
            has_remote_parent: args.has_remote_parent,
            name: args.name,
            start_nanos: args.clock.now_nanos(),
            converter: args.converter,
            clock: args.clock,
            start_end_handler: args.record_events.then_some(args.start_end_handler),
            state,
        });
        if let Some(handler) = &span.start_end_handler {
            handler.on_start(&span);
        }
        span
    }

    pub fn context(&self) -> &SpanContext {
        &self.context
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent_span_id(&self) -> Option<SpanId> {
        self.parent_span_id
    }

    pub fn has_remote_parent(&self) -> Option<bool> {
        self.has_remote_parent
    }

    /// True for spans started with the record-events option.
    pub fn is_recording(&self) -> bool {
        self.state.is_some()
    }

    pub(crate) fn converter(&self) -> TimestampConverter {
        self.converter
    }

    pub fn has_ended(&self) -> bool {
        match &self.state {
            Some(state) => state.lock_or_panic().has_been_ended,
            None => false,
        }
    }

    /// Completion status; `None` while the span is live and no status was
    /// recorded.
    pub fn status(&self) -> Option<Status> {
        self.state
            .as_ref()
            .and_then(|state| state.lock_or_panic().status.clone())
    }

    /// `end - start` in nanoseconds, available once the span has ended.
    pub fn latency_nanos(&self) -> Option<i64> {
        let state = self.state.as_ref()?;
        let end_nanos = state.lock_or_panic().end_nanos?;
        Some(end_nanos - self.start_nanos)
    }

    /// Merges the given attributes into the bounded attribute map.
    pub fn add_attributes(&self, attributes: HashMap<String, AttributeValue>) {
        let Some(state) = self.recording_state("add_attributes") else {
            return;
        };
        let mut state = state;
        for (key, value) in attributes {
            state.attributes.insert(key, value);
        }
    }

    pub fn add_attribute(&self, key: impl Into<String>, value: impl Into<AttributeValue>) {
        let Some(mut state) = self.recording_state("add_attribute") else {
            return;
        };
        state.attributes.insert(key.into(), value.into());
    }

    /// Reads an attribute back, refreshing its recency.
    pub fn attribute(&self, key: &str) -> Option<AttributeValue> {
        let state = self.state.as_ref()?;
        state.lock_or_panic().attributes.get(key).cloned()
    }

    pub fn add_annotation(&self, annotation: Annotation) {
        let Some(mut state) = self.recording_state("add_annotation") else {
            return;
        };
        let nanos = self.clock.now_nanos();
        state.annotations.push(TimedEvent {
            nanos,
            event: annotation,
        });
    }

    pub fn add_message_event(&self, event: MessageEvent) {
        let Some(mut state) = self.recording_state("add_message_event") else {
            return;
        };
        let nanos = self.clock.now_nanos();
        state.message_events.push(TimedEvent {
            nanos,
            event,
        });
    }

    pub fn add_link(&self, link: Link) {
        let Some(mut state) = self.recording_state("add_link") else {
            return;
        };
        state.links.push(link);
    }

    /// Records a status; the last write before `end` wins unless the end
    /// options carry their own status.
    pub fn set_status(&self, status: Status) {
        let Some(mut state) = self.recording_state("set_status") else {
            return;
        };
        state.status = Some(status);
    }

    pub fn end(self: &Arc<Self>) {
        self.end_with_options(EndSpanOptions::default());
    }

    /// Freezes the span and fires the end callback exactly once. Later
    /// calls (and any other mutator) are debug-logged no-ops.
    pub fn end_with_options(self: &Arc<Self>, options: EndSpanOptions) {
        let Some(state_lock) = &self.state else {
            return;
        };
        {
            let mut state = state_lock.lock_or_panic();
            if state.has_been_ended {
                debug!(span = %self.name, "calling end() on an ended span");
                return;
            }
            if let Some(status) = options.status {
                state.status = Some(status);
            }
            if state.status.is_none() {
                state.status = Some(Status::ok());
            }
            // The clock is monotonic; the max keeps invariant end >= start
            // even against a broken clock implementation.
            state.end_nanos = Some(self.clock.now_nanos().max(self.start_nanos));
            state.has_been_ended = true;
        }
        if let Some(handler) = &self.start_end_handler {
            handler.on_end(self);
        }
    }

    /// Returns a frozen snapshot of everything recorded so far.
    ///
    /// Monotonic event times are converted to wall-clock timestamps with the
    /// span's converter, so sibling events stay ordered even across wall
    /// clock adjustments. Fails for spans without the record-events option.
    pub fn to_span_data(&self) -> Result<SpanData, ObsError> {
        let Some(state_lock) = &self.state else {
            return Err(ObsError::illegal_state(
                "span does not have the record-events option",
            ));
        };
        let state = state_lock.lock_or_panic();
        Ok(SpanData {
            context: self.context,
            parent_span_id: self.parent_span_id,
            has_remote_parent: self.has_remote_parent,
            name: self.name.clone(),
            start_time: self.converter.to_timestamp(self.start_nanos),
            attributes: AttributesData {
                map: state.attributes.snapshot(),
                dropped_count: state.attributes.dropped_count(),
            },
            annotations: TimedEventsData {
                events: state
                    .annotations
                    .iter()
                    .map(|timed| TimedEventData {
                        time: self.converter.to_timestamp(timed.nanos),
                        event: timed.event.clone(),
                    })
                    .collect(),
                dropped_count: state.annotations.dropped_count(),
            },
            message_events: TimedEventsData {
                events: state
                    .message_events
                    .iter()
                    .map(|timed| TimedEventData {
                        time: self.converter.to_timestamp(timed.nanos),
                        event: timed.event,
                    })
                    .collect(),
                dropped_count: state.message_events.dropped_count(),
            },
            links: LinksData {
                links: state.links.iter().cloned().collect(),
                dropped_count: state.links.dropped_count(),
            },
            status: state.status.clone(),
            end_time: state.end_nanos.map(|nanos| self.converter.to_timestamp(nanos)),
        })
    }

    /// Lock the recording state if this span is live and recording;
    /// otherwise log why the mutation is ignored.
    fn recording_state(&self, operation: &str) -> Option<std::sync::MutexGuard<'_, SpanState>> {
        let state = self.state.as_ref()?;
        let guard = state.lock_or_panic();
        if guard.has_been_ended {
            debug!(span = %self.name, "calling {operation}() on an ended span");
            return None;
        }
        Some(guard)
    }
}
