// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Aggregation rows keyed by projected tag-value vectors.
//!
//! The record path looks rows up with a borrowed key built from references
//! into the tag context, so the common case (row already exists) allocates
//! nothing. Two conditions keep that sound: hashing a borrowed key must
//! equal hashing the owned key it would become, and the `Equivalent` check
//! must agree with `==` on the owned form.

use crate::aggregation::Aggregation;
use crate::mutable::MutableAggregation;
use hashbrown::Equivalent;
use libdd_obs_common::tag::{TagContext, TagKey, TagValue};
use std::hash::{Hash, Hasher};

pub(crate) type Row = Vec<MutableAggregation>;
pub(crate) type RowMap = hashbrown::HashMap<Vec<TagValue>, Row>;

/// A row key borrowed from a tag context projection.
pub(crate) struct BorrowedRowKey<'a>(pub(crate) Vec<&'a TagValue>);

impl Hash for BorrowedRowKey<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Must match Vec<TagValue>'s slice hashing: length prefix, then
        // element-wise.
        self.0.len().hash(state);
        for value in &self.0 {
            value.hash(state);
        }
    }
}

impl Equivalent<Vec<TagValue>> for BorrowedRowKey<'_> {
    fn equivalent(&self, key: &Vec<TagValue>) -> bool {
        self.0.len() == key.len() && self.0.iter().zip(key).all(|(a, b)| **a == *b)
    }
}

impl From<&BorrowedRowKey<'_>> for Vec<TagValue> {
    fn from(key: &BorrowedRowKey<'_>) -> Self {
        key.0.iter().map(|value| (*value).clone()).collect()
    }
}

/// Projects a tag context onto a view's columns. Missing columns become the
/// "unknown/not set" sentinel.
pub(crate) fn project<'t>(tags: &'t TagContext, columns: &[TagKey]) -> Vec<&'t TagValue> {
    columns
        .iter()
        .map(|key| tags.get(key).unwrap_or(&TagValue::UNSET))
        .collect()
}

pub(crate) fn new_row(aggregations: &[Aggregation]) -> Row {
    aggregations.iter().map(MutableAggregation::new).collect()
}

/// The row for a projected key, lazily created with fresh accumulators.
pub(crate) fn row_mut<'m>(
    rows: &'m mut RowMap,
    projected: &[&TagValue],
    aggregations: &[Aggregation],
) -> &'m mut Row {
    let key = BorrowedRowKey(projected.to_vec());
    rows.entry_ref(&key)
        .or_insert_with(|| new_row(aggregations))
}
