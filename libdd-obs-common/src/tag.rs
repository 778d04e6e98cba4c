// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The tag data model: typed keys and values plus the immutable tag context
//! that labels recorded measurements.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

pub use static_assertions::const_assert;

/// Longest accepted tag key or value, in bytes.
pub const MAX_TAG_LENGTH: usize = 255;

/// Used by the `tag_key!`/`tag_value!` macros to const-check literals.
pub const fn is_printable_ascii(s: &str) -> bool {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] < 0x20 || bytes[i] > 0x7e {
            return false;
        }
        i += 1;
    }
    true
}

fn validate(what: &str, chunk: &str, allow_empty: bool) -> anyhow::Result<()> {
    if !allow_empty {
        anyhow::ensure!(!chunk.is_empty(), "{what} is empty");
    }
    anyhow::ensure!(
        chunk.len() <= MAX_TAG_LENGTH,
        "{what} '{chunk}' is longer than {MAX_TAG_LENGTH} bytes"
    );
    anyhow::ensure!(
        is_printable_ascii(chunk),
        "{what} '{chunk}' contains non-printable or non-ASCII characters"
    );
    Ok(())
}

/// The name half of a tag.
///
/// Many keys are literals ("http.status", "frontend"), so borrowing from
/// 'static saves an allocation per context build.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagKey {
    name: Cow<'static, str>,
}

impl TagKey {
    /// Creates a key after validating it: non-empty printable ASCII, at most
    /// [`MAX_TAG_LENGTH`] bytes. Prefer the `tag_key!` macro for literals.
    pub fn new<'a, IntoCow>(name: IntoCow) -> anyhow::Result<Self>
    where
        IntoCow: Into<Cow<'a, str>>,
    {
        let name = name.into();
        validate("tag key", &name, false)?;
        Ok(TagKey {
            name: Cow::Owned(name.into_owned()),
        })
    }

    /// Used by the `tag_key!` macro. Not meant to be used directly.
    /// # Safety
    /// Do not use directly, use through the `tag_key!` macro which enforces
    /// the validation rules at compile time.
    pub const unsafe fn from_static_unchecked(name: &'static str) -> Self {
        TagKey {
            name: Cow::Borrowed(name),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }
}

/// The value half of a tag. Same rules as [`TagKey`], except empty values
/// are allowed.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagValue {
    value: Cow<'static, str>,
}

impl TagValue {
    /// The sentinel stored for a view column the recorded context did not
    /// carry.
    pub const UNSET: TagValue = TagValue {
        value: Cow::Borrowed("unknown/not set"),
    };

    pub fn new<'a, IntoCow>(value: IntoCow) -> anyhow::Result<Self>
    where
        IntoCow: Into<Cow<'a, str>>,
    {
        let value = value.into();
        validate("tag value", &value, true)?;
        Ok(TagValue {
            value: Cow::Owned(value.into_owned()),
        })
    }

    /// Used by the `tag_value!` macro. Not meant to be used directly.
    /// # Safety
    /// Do not use directly, use through the `tag_value!` macro which
    /// enforces the validation rules at compile time.
    pub const unsafe fn from_static_unchecked(value: &'static str) -> Self {
        TagValue {
            value: Cow::Borrowed(value),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

/// Creates a tag key from a literal known at compile time, failing the
/// build if the literal is invalid. For runtime strings use [`TagKey::new`].
#[macro_export]
macro_rules! tag_key {
    ($name:expr) => {{
        $crate::tag::const_assert!(!$name.is_empty());
        $crate::tag::const_assert!($name.len() <= $crate::tag::MAX_TAG_LENGTH);
        $crate::tag::const_assert!($crate::tag::is_printable_ascii($name));
        #[allow(unused_unsafe)]
        let key = unsafe { $crate::tag::TagKey::from_static_unchecked($name) };
        key
    }};
}

/// Creates a tag value from a literal known at compile time, failing the
/// build if the literal is invalid. For runtime strings use
/// [`TagValue::new`].
#[macro_export]
macro_rules! tag_value {
    ($value:expr) => {{
        $crate::tag::const_assert!($value.len() <= $crate::tag::MAX_TAG_LENGTH);
        $crate::tag::const_assert!($crate::tag::is_printable_ascii($value));
        #[allow(unused_unsafe)]
        let value = unsafe { $crate::tag::TagValue::from_static_unchecked($value) };
        value
    }};
}

impl Debug for TagKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TagKey").field("name", &self.name).finish()
    }
}

impl Debug for TagValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TagValue")
            .field("value", &self.value)
            .finish()
    }
}

impl Display for TagKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl Display for TagValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// A single key/value pair.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub key: TagKey,
    pub value: TagValue,
}

impl Tag {
    pub fn new<K, V>(key: K, value: V) -> anyhow::Result<Self>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        Ok(Tag {
            key: TagKey::new(key.as_ref())?,
            value: TagValue::new(value.as_ref())?,
        })
    }
}

/// An immutable set of tags attached to recorded measurements.
///
/// Equality is map equality; iteration order is unspecified. Cloning is
/// cheap, which is what lets the stats recorder capture a context in a
/// queue event without copying the map.
#[derive(Debug, Clone, Default)]
pub struct TagContext {
    tags: Arc<HashMap<TagKey, TagValue>>,
}

impl TagContext {
    pub fn empty() -> Self {
        TagContext::default()
    }

    pub fn builder() -> TagContextBuilder {
        TagContextBuilder::default()
    }

    /// Start a builder seeded with this context's tags (an O(n) copy).
    pub fn to_builder(&self) -> TagContextBuilder {
        TagContextBuilder {
            tags: (*self.tags).clone(),
        }
    }

    pub fn get(&self, key: &TagKey) -> Option<&TagValue> {
        self.tags.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TagKey, &TagValue)> {
        self.tags.iter()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

impl PartialEq for TagContext {
    fn eq(&self, other: &Self) -> bool {
        self.tags == other.tags
    }
}

impl Eq for TagContext {}

thread_local! {
    static CURRENT_CONTEXT: RefCell<TagContext> = RefCell::new(TagContext::empty());
}

impl TagContext {
    /// The ambient context of the current thread. Recording APIs take the
    /// context as an explicit argument; this helper only serves call sites
    /// that cannot thread it through.
    pub fn current() -> TagContext {
        CURRENT_CONTEXT.with(|current| current.borrow().clone())
    }

    /// Installs this context as the thread's ambient one until the returned
    /// guard drops, which restores the previous context.
    #[must_use = "dropping the scope immediately restores the previous context"]
    pub fn attach(self) -> TagScope {
        let previous = CURRENT_CONTEXT.with(|current| current.replace(self));
        TagScope { previous }
    }
}

/// RAII guard for [`TagContext::attach`].
#[derive(Debug)]
pub struct TagScope {
    previous: TagContext,
}

impl Drop for TagScope {
    fn drop(&mut self) {
        let previous = std::mem::take(&mut self.previous);
        CURRENT_CONTEXT.with(|current| {
            *current.borrow_mut() = previous;
        });
    }
}

/// Builds a [`TagContext`]. The built context is immutable.
#[derive(Debug, Default)]
pub struct TagContextBuilder {
    tags: HashMap<TagKey, TagValue>,
}

impl TagContextBuilder {
    /// Insert or replace a tag.
    pub fn put(mut self, key: TagKey, value: TagValue) -> Self {
        self.tags.insert(key, value);
        self
    }

    pub fn remove(mut self, key: &TagKey) -> Self {
        self.tags.remove(key);
        self
    }

    pub fn build(self) -> TagContext {
        TagContext {
            tags: Arc::new(self.tags),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_send() {
        // fails to compile if false
        fn is_send<T: Send>(_t: T) -> bool {
            true
        }
        assert!(is_send(tag_key!("frontend")));
        assert!(is_send(TagContext::empty()));
    }

    #[test]
    fn test_empty_key_rejected() {
        let _ = TagKey::new("").expect_err("empty key is not allowed");
    }

    #[test]
    fn test_empty_value_allowed() {
        let value = TagValue::new("").expect("empty values round-trip");
        assert_eq!(value.as_str(), "");
    }

    #[test]
    fn test_non_printable_rejected() {
        let _ = TagKey::new("with\nnewline").expect_err("control characters are not printable");
        let _ = TagValue::new("caf\u{e9}").expect_err("non-ASCII is rejected");
    }

    #[test]
    fn test_length_limit() {
        let ok = "k".repeat(MAX_TAG_LENGTH);
        assert!(TagKey::new(ok.as_str()).is_ok());
        let too_long = "k".repeat(MAX_TAG_LENGTH + 1);
        let _ = TagKey::new(too_long.as_str()).expect_err("256 bytes is over the limit");
    }

    #[test]
    fn test_context_equality_ignores_build_order() {
        let k1 = tag_key!("method");
        let k2 = tag_key!("status");
        let a = TagContext::builder()
            .put(k1.clone(), tag_value!("GET"))
            .put(k2.clone(), tag_value!("200"))
            .build();
        let b = TagContext::builder()
            .put(k2, tag_value!("200"))
            .put(k1, tag_value!("GET"))
            .build();
        assert_eq!(a, b);
    }

    #[test]
    fn test_to_builder_round_trip() {
        let ctx = TagContext::builder()
            .put(tag_key!("method"), tag_value!("GET"))
            .build();
        assert_eq!(ctx.to_builder().build(), ctx);
    }

    #[test]
    fn test_builder_put_replaces_and_remove_drops() {
        let key = tag_key!("method");
        let ctx = TagContext::builder()
            .put(key.clone(), tag_value!("GET"))
            .put(key.clone(), tag_value!("POST"))
            .build();
        assert_eq!(ctx.get(&key), Some(&tag_value!("POST")));

        let ctx = ctx.to_builder().remove(&key).build();
        assert!(ctx.get(&key).is_none());
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_unset_sentinel_is_printable() {
        assert!(is_printable_ascii(TagValue::UNSET.as_str()));
    }

    #[test]
    fn test_attach_scopes_nest_and_restore() {
        let key = tag_key!("tenant");
        assert!(TagContext::current().is_empty());

        let outer = TagContext::builder()
            .put(key.clone(), tag_value!("a"))
            .build();
        let _outer_scope = outer.clone().attach();
        assert_eq!(TagContext::current(), outer);

        {
            let inner = TagContext::builder()
                .put(key.clone(), tag_value!("b"))
                .build();
            let _inner_scope = inner.clone().attach();
            assert_eq!(TagContext::current(), inner);
        }
        assert_eq!(TagContext::current(), outer);
    }
}
