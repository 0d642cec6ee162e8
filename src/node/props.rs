//! Component props and their canonical form.
//!
//! Props are an unordered name -> value map. Nested maps are unordered too,
//! sequences are ordered. [`normalize_props`] produces the canonical form
//! used for hashing: keys sorted at every level, floats canonicalized.

use std::sync::Arc;

use compact_str::CompactString;
use rustc_hash::FxHashMap;

use crate::algo::StableHasher;
use crate::algo::hash::canonical_f64_bits;

/// Prop name
pub type PropName = CompactString;

/// Unordered prop map of a node
pub type Props = FxHashMap<PropName, PropValue>;

// =============================================================================
// PropValue
// =============================================================================

/// Value of a single prop.
#[derive(Debug, Clone)]
pub enum PropValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(CompactString),
    /// Ordered sequence
    List(Vec<PropValue>),
    /// Unordered nested map
    Map(FxHashMap<CompactString, PropValue>),
    /// Opaque payload, compared and hashed by content
    Bytes(Arc<[u8]>),
}

impl PropValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

// Floats compare by canonical bits so that NaN == NaN and a prop never
// looks changed against an identical copy of itself.
impl PartialEq for PropValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => canonical_f64_bits(*a) == canonical_f64_bits(*b),
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for PropValue {}

impl From<&str> for PropValue {
    fn from(v: &str) -> Self {
        Self::Str(CompactString::from(v))
    }
}

impl From<String> for PropValue {
    fn from(v: String) -> Self {
        Self::Str(CompactString::from(v))
    }
}

impl From<bool> for PropValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for PropValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for PropValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for PropValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<Vec<PropValue>> for PropValue {
    fn from(v: Vec<PropValue>) -> Self {
        Self::List(v)
    }
}

impl From<Vec<u8>> for PropValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(Arc::from(v))
    }
}

// =============================================================================
// Canonical form
// =============================================================================

/// Canonical prop value: maps become key-sorted sequences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CanonicalValue {
    Null,
    Bool(bool),
    Int(i64),
    /// Canonical bit pattern of the float
    Float(u64),
    Str(CompactString),
    List(Vec<CanonicalValue>),
    Map(Vec<(CompactString, CanonicalValue)>),
    Bytes(Arc<[u8]>),
}

/// Key-sorted, recursively normalized props.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalProps(Vec<(PropName, CanonicalValue)>);

impl CanonicalProps {
    pub fn entries(&self) -> &[(PropName, CanonicalValue)] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Feed the canonical form into a hasher.
    pub fn hash_into(&self, hasher: StableHasher) -> StableHasher {
        let mut hasher = hasher.update_usize(self.0.len());
        for (name, value) in &self.0 {
            hasher = value.hash_into(hasher.update_str(name));
        }
        hasher
    }
}

impl CanonicalValue {
    fn hash_into(&self, hasher: StableHasher) -> StableHasher {
        match self {
            Self::Null => hasher.update_tag(0),
            Self::Bool(v) => hasher.update_tag(1).update_tag(u8::from(*v)),
            Self::Int(v) => hasher.update_tag(2).update_i64(*v),
            Self::Float(bits) => hasher.update_tag(3).update_u64(*bits),
            Self::Str(s) => hasher.update_tag(4).update_str(s),
            Self::List(items) => {
                let mut hasher = hasher.update_tag(5).update_usize(items.len());
                for item in items {
                    hasher = item.hash_into(hasher);
                }
                hasher
            }
            Self::Map(entries) => {
                let mut hasher = hasher.update_tag(6).update_usize(entries.len());
                for (k, v) in entries {
                    hasher = v.hash_into(hasher.update_str(k));
                }
                hasher
            }
            Self::Bytes(bytes) => hasher.update_tag(7).update_usize(bytes.len()).update(bytes),
        }
    }
}

/// Sort keys and normalize nested collections.
///
/// Map order never matters; sequence order always does.
pub fn normalize_props(props: &Props) -> CanonicalProps {
    CanonicalProps(sorted_entries(props))
}

fn sorted_entries(map: &FxHashMap<CompactString, PropValue>) -> Vec<(CompactString, CanonicalValue)> {
    let mut entries: Vec<_> = map
        .iter()
        .map(|(k, v)| (k.clone(), normalize_value(v)))
        .collect();
    entries.sort_unstable_by(|a, b| a.0.cmp(&b.0));
    entries
}

fn normalize_value(value: &PropValue) -> CanonicalValue {
    match value {
        PropValue::Null => CanonicalValue::Null,
        PropValue::Bool(v) => CanonicalValue::Bool(*v),
        PropValue::Int(v) => CanonicalValue::Int(*v),
        PropValue::Float(v) => CanonicalValue::Float(canonical_f64_bits(*v)),
        PropValue::Str(s) => CanonicalValue::Str(s.clone()),
        PropValue::List(items) => CanonicalValue::List(items.iter().map(normalize_value).collect()),
        PropValue::Map(map) => CanonicalValue::Map(sorted_entries(map)),
        PropValue::Bytes(bytes) => CanonicalValue::Bytes(Arc::clone(bytes)),
    }
}
