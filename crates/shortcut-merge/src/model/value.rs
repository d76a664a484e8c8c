//! Value types for decoded property lists.
//!
//! A [`Value`] is one object of the graph. Containers hold [`ObjectRef`]s into the
//! owning [`Plist`](crate::model::Plist) instead of inline children, so a sub-value can
//! be shared by several parents or referenced cyclically.

use indexmap::IndexMap;

/// Index of an object inside a [`Plist`](crate::model::Plist) arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef(usize);

impl ObjectRef {
    /// Creates a reference from a raw arena index.
    pub fn from_index(index: usize) -> Self {
        Self(index)
    }

    /// Returns the raw arena index.
    pub fn index(self) -> usize {
        self.0
    }
}

/// A single object in a property list graph.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Null (also produced for fill bytes).
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer. Wide enough for the 16-byte wire form.
    Integer(i128),
    /// IEEE 754 real.
    Real(f64),
    /// Seconds since 2001-01-01T00:00:00Z.
    Date(f64),
    /// Raw bytes.
    Data(Vec<u8>),
    /// Text, stored as ASCII or UTF-16 on the wire.
    String(String),
    /// Keyed-archiver object UID.
    Uid(u64),
    /// Ordered sequence.
    Array(Vec<ObjectRef>),
    /// Unordered collection, kept in wire order.
    Set(Vec<ObjectRef>),
    /// String-keyed map in insertion order.
    Dict(IndexMap<String, ObjectRef>),
}

impl Value {
    /// Iterates over child references in wire order. For dicts these are the values.
    pub fn child_refs(&self) -> impl Iterator<Item = ObjectRef> + '_ {
        let (items, values) = match self {
            Value::Array(items) | Value::Set(items) => (items.as_slice(), None),
            Value::Dict(map) => (&[][..], Some(map.values())),
            _ => (&[][..], None),
        };
        items.iter().copied().chain(values.into_iter().flatten().copied())
    }

    /// Returns the string content, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the items, if this is an array.
    pub fn as_array(&self) -> Option<&[ObjectRef]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the entries, if this is a dict.
    pub fn as_dict(&self) -> Option<&IndexMap<String, ObjectRef>> {
        match self {
            Value::Dict(map) => Some(map),
            _ => None,
        }
    }

    /// Compares two values ignoring their child references.
    ///
    /// Reals and dates compare bitwise so NaN payloads and signed zeros survive a
    /// round trip. Containers match when they have the same kind, length, and (for
    /// dicts) the same keys in the same order.
    pub(crate) fn shallow_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Real(a), Value::Real(b)) | (Value::Date(a), Value::Date(b)) => {
                a.to_bits() == b.to_bits()
            }
            (Value::Array(a), Value::Array(b)) | (Value::Set(a), Value::Set(b)) => {
                a.len() == b.len()
            }
            (Value::Dict(a), Value::Dict(b)) => {
                a.len() == b.len() && a.keys().zip(b.keys()).all(|(x, y)| x == y)
            }
            _ => self == other,
        }
    }
}
