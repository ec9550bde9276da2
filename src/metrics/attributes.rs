//! Attribute sets, resources and instrumentation scopes.
//!
//! Resources and scopes are grouped by value: two resources built from the
//! same attributes produce the same [`ResourceKey`] no matter where they came
//! from or in which order the attributes were supplied.

use opentelemetry::{Array, KeyValue, Value};
use std::fmt::Write as _;

/// Sorted set of attributes with unique keys
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AttributeSet {
    attributes: Vec<KeyValue>,
}

impl AttributeSet {
    /// Builds a set; on duplicate keys the last value wins.
    pub fn new<I>(attributes: I) -> Self
    where
        I: IntoIterator<Item = KeyValue>,
    {
        let mut attributes: Vec<KeyValue> = attributes.into_iter().collect();
        // Stable sort keeps duplicates in insertion order, so the last one
        // of each run is the most recent.
        attributes.sort_by(|a, b| a.key.as_str().cmp(b.key.as_str()));
        let mut deduped: Vec<KeyValue> = Vec::with_capacity(attributes.len());
        for kv in attributes {
            match deduped.last_mut() {
                Some(last) if last.key == kv.key => *last = kv,
                _ => deduped.push(kv),
            }
        }
        Self {
            attributes: deduped,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, KeyValue> {
        self.attributes.iter()
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes
            .binary_search_by(|kv| kv.key.as_str().cmp(key))
            .ok()
            .map(|idx| &self.attributes[idx].value)
    }

    /// Canonical encoding of the set, equal for equal sets.
    pub fn encoded(&self) -> String {
        let mut out = String::new();
        for (idx, kv) in self.attributes.iter().enumerate() {
            if idx > 0 {
                out.push(',');
            }
            let _ = write!(out, "{:?}=", kv.key.as_str());
            encode_value(&mut out, &kv.value);
        }
        out
    }
}

impl<'a> IntoIterator for &'a AttributeSet {
    type Item = &'a KeyValue;
    type IntoIter = std::slice::Iter<'a, KeyValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl IntoIterator for AttributeSet {
    type Item = KeyValue;
    type IntoIter = std::vec::IntoIter<KeyValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.attributes.into_iter()
    }
}

impl FromIterator<KeyValue> for AttributeSet {
    fn from_iter<I: IntoIterator<Item = KeyValue>>(iter: I) -> Self {
        Self::new(iter)
    }
}

// Every value is prefixed with a type tag so that `1`, `1.0` and `"1"`
// never collide.
fn encode_value(out: &mut String, value: &Value) {
    #[allow(unreachable_patterns)]
    let _ = match value {
        Value::Bool(v) => write!(out, "b:{v}"),
        Value::I64(v) => write!(out, "i:{v}"),
        Value::F64(v) => write!(out, "f:{v:?}"),
        Value::String(v) => write!(out, "s:{:?}", v.as_str()),
        Value::Array(Array::Bool(v)) => write!(out, "[b:{v:?}]"),
        Value::Array(Array::I64(v)) => write!(out, "[i:{v:?}]"),
        Value::Array(Array::F64(v)) => write!(out, "[f:{v:?}]"),
        Value::Array(Array::String(v)) => {
            let items: Vec<&str> = v.iter().map(|s| s.as_str()).collect();
            write!(out, "[s:{items:?}]")
        },
        other => write!(out, "?:{:?}", other.as_str()),
    };
}

/// Equivalence key of a resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey(String);

/// Entity producing telemetry, described by its attributes
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Resource {
    attributes: AttributeSet,
    key: String,
}

impl Resource {
    pub fn new<I>(attributes: I) -> Self
    where
        I: IntoIterator<Item = KeyValue>,
    {
        let attributes = AttributeSet::new(attributes);
        let key = attributes.encoded();
        Self { attributes, key }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn attributes(&self) -> &AttributeSet {
        &self.attributes
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn equivalent(&self) -> ResourceKey {
        ResourceKey(self.key.clone())
    }
}

/// Name and version of the library that registered an instrument
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct InstrumentationScope {
    pub name: String,
    /// Empty when the library is unversioned
    pub version: String,
}

impl InstrumentationScope {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: String::new(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// True for the zero scope, which is not encoded on the wire.
    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.version.is_empty()
    }
}
