//! The dynamically-typed model value.
//!
//! [`ModelValue`] is the universal payload of the management layer: resource
//! attributes, operation parameters, and operation results are all model
//! values. It is a tree-shaped tagged union with exclusive ownership of its
//! children, so cloning is a deep copy and no two branches ever alias.

use std::fmt;

use thiserror::Error;

// ---------------------------------------------------------------------------
// ValueKind
// ---------------------------------------------------------------------------

/// Discriminant of a [`ModelValue`], used in kind-mismatch reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Undefined,
    Boolean,
    Integer,
    Decimal,
    String,
    Bytes,
    List,
    Object,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Undefined => "undefined",
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Decimal => "decimal",
            Self::String => "string",
            Self::Bytes => "bytes",
            Self::List => "list",
            Self::Object => "object",
        };
        f.write_str(name)
    }
}

/// A value had the wrong kind for the requested mutation.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("expected {expected} value, found {found}")]
pub struct KindError {
    /// Kind the operation needed.
    pub expected: ValueKind,
    /// Kind actually present.
    pub found: ValueKind,
}

// ---------------------------------------------------------------------------
// ValueMap
// ---------------------------------------------------------------------------

/// Insertion-ordered string-keyed mapping of [`ModelValue`]s.
///
/// Keys are unique; re-inserting a key replaces the value in place without
/// moving it. Iteration order is insertion order, which the wire encoding
/// preserves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValueMap {
    entries: Vec<(String, ModelValue)>,
}

impl ValueMap {
    /// Creates an empty mapping.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the mapping holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks up a key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ModelValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Looks up a key mutably.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut ModelValue> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Whether `key` is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Inserts or replaces a key, returning the previous value if any.
    ///
    /// An existing key keeps its position; a new key appends.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<ModelValue>,
    ) -> Option<ModelValue> {
        let key = key.into();
        let value = value.into();
        if let Some(slot) = self.get_mut(&key) {
            return Some(std::mem::replace(slot, value));
        }
        self.entries.push((key, value));
        None
    }

    /// Removes a key, preserving the order of the remaining entries.
    pub fn remove(&mut self, key: &str) -> Option<ModelValue> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    /// Returns the value for `key`, inserting an undefined value first if
    /// the key is absent.
    pub fn entry(&mut self, key: &str) -> &mut ModelValue {
        let index = match self.entries.iter().position(|(k, _)| k == key) {
            Some(index) => index,
            None => {
                self.entries.push((key.to_string(), ModelValue::Undefined));
                self.entries.len() - 1
            }
        };
        &mut self.entries[index].1
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ModelValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterates keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl FromIterator<(String, ModelValue)> for ValueMap {
    /// Collects pairs, later duplicates replacing earlier ones in place.
    fn from_iter<T: IntoIterator<Item = (String, ModelValue)>>(iter: T) -> Self {
        let mut map = Self::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

impl IntoIterator for ValueMap {
    type Item = (String, ModelValue);
    type IntoIter = std::vec::IntoIter<(String, ModelValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a ValueMap {
    type Item = (&'a String, &'a ModelValue);
    type IntoIter = std::iter::Map<
        std::slice::Iter<'a, (String, ModelValue)>,
        fn(&'a (String, ModelValue)) -> (&'a String, &'a ModelValue),
    >;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter().map(|(k, v)| (k, v))
    }
}

// ---------------------------------------------------------------------------
// ModelValue
// ---------------------------------------------------------------------------

/// A dynamically-typed, tree-shaped management value.
#[derive(Debug, Clone, Default)]
pub enum ModelValue {
    /// No value. Reading an absent attribute yields this.
    #[default]
    Undefined,
    /// True or false.
    Boolean(bool),
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit IEEE-754 number. Compared by bit pattern so that every
    /// value, NaN included, survives a wire round trip as an equal value.
    Decimal(f64),
    /// UTF-8 text.
    String(String),
    /// Raw byte sequence.
    Bytes(Vec<u8>),
    /// Ordered list of values.
    List(Vec<ModelValue>),
    /// Insertion-ordered string-keyed mapping.
    Object(ValueMap),
}

impl ModelValue {
    /// An empty object value.
    #[must_use]
    pub fn object() -> Self {
        Self::Object(ValueMap::new())
    }

    /// An empty list value.
    #[must_use]
    pub fn list() -> Self {
        Self::List(Vec::new())
    }

    /// The value's kind discriminant.
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Undefined => ValueKind::Undefined,
            Self::Boolean(_) => ValueKind::Boolean,
            Self::Integer(_) => ValueKind::Integer,
            Self::Decimal(_) => ValueKind::Decimal,
            Self::String(_) => ValueKind::String,
            Self::Bytes(_) => ValueKind::Bytes,
            Self::List(_) => ValueKind::List,
            Self::Object(_) => ValueKind::Object,
        }
    }

    /// Whether the value is anything other than undefined.
    #[must_use]
    pub fn is_defined(&self) -> bool {
        !matches!(self, Self::Undefined)
    }

    /// The boolean payload, if that is the kind.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// The integer payload, if that is the kind.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// The decimal payload, if that is the kind.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    /// The string payload, if that is the kind.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The byte payload, if that is the kind.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// The list payload, if that is the kind.
    #[must_use]
    pub fn as_list(&self) -> Option<&[ModelValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// The object payload, if that is the kind.
    #[must_use]
    pub fn as_object(&self) -> Option<&ValueMap> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Looks up `key` in an object value; `None` for every other kind.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ModelValue> {
        self.as_object().and_then(|map| map.get(key))
    }

    /// Sets `key` in an object value. An undefined value becomes an object
    /// first.
    ///
    /// # Errors
    ///
    /// [`KindError`] if the value is neither undefined nor an object.
    pub fn set(
        &mut self,
        key: impl Into<String>,
        value: impl Into<ModelValue>,
    ) -> Result<(), KindError> {
        if let Self::Undefined = self {
            *self = Self::object();
        }
        match self {
            Self::Object(map) => {
                map.insert(key, value);
                Ok(())
            }
            other => Err(KindError {
                expected: ValueKind::Object,
                found: other.kind(),
            }),
        }
    }

    /// Removes `key` from an object value, returning it if present.
    pub fn remove(&mut self, key: &str) -> Option<ModelValue> {
        match self {
            Self::Object(map) => map.remove(key),
            _ => None,
        }
    }

    /// Appends to a list value. An undefined value becomes a list first.
    ///
    /// # Errors
    ///
    /// [`KindError`] if the value is neither undefined nor a list.
    pub fn push(&mut self, value: impl Into<ModelValue>) -> Result<(), KindError> {
        if let Self::Undefined = self {
            *self = Self::list();
        }
        match self {
            Self::List(items) => {
                items.push(value.into());
                Ok(())
            }
            other => Err(KindError {
                expected: ValueKind::List,
                found: other.kind(),
            }),
        }
    }

    // -- JSON bridge --------------------------------------------------------

    /// Renders the value as JSON.
    ///
    /// Undefined maps to `null`, bytes to an array of integers, and a
    /// non-finite decimal to `null` (JSON has no representation for it).
    /// Object key order follows this value; whether the JSON library keeps
    /// that order is its own concern. The wire codec, not this bridge, is
    /// the lossless path.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Undefined => serde_json::Value::Null,
            Self::Boolean(b) => serde_json::Value::Bool(*b),
            Self::Integer(i) => serde_json::Value::from(*i),
            Self::Decimal(d) => serde_json::Number::from_f64(*d)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Bytes(bytes) => {
                serde_json::Value::Array(bytes.iter().map(|b| (*b).into()).collect())
            }
            Self::List(items) => {
                serde_json::Value::Array(items.iter().map(ModelValue::to_json).collect())
            }
            Self::Object(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.to_string(), v.to_json())).collect(),
            ),
        }
    }

    /// Builds a value from JSON.
    ///
    /// `null` maps to undefined; a number becomes an integer when it is a
    /// lossless `i64` and a decimal otherwise. There is no way to spell the
    /// bytes kind in JSON; byte payloads only travel over the wire codec.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Undefined,
            serde_json::Value::Bool(b) => Self::Boolean(*b),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map_or_else(|| Self::Decimal(n.as_f64().unwrap_or(f64::NAN)), Self::Integer),
            serde_json::Value::String(s) => Self::String(s.clone()),
            serde_json::Value::Array(items) => {
                Self::List(items.iter().map(ModelValue::from_json).collect())
            }
            serde_json::Value::Object(entries) => Self::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), ModelValue::from_json(v)))
                    .collect(),
            ),
        }
    }
}

impl PartialEq for ModelValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) => true,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            // Bit-pattern comparison: NaN equals NaN, 0.0 differs from -0.0.
            (Self::Decimal(a), Self::Decimal(b)) => a.to_bits() == b.to_bits(),
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ModelValue {}

impl fmt::Display for ModelValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(&self.to_json()) {
            Ok(rendered) => f.write_str(&rendered),
            Err(_) => Err(fmt::Error),
        }
    }
}

impl From<bool> for ModelValue {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<i64> for ModelValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<i32> for ModelValue {
    fn from(i: i32) -> Self {
        Self::Integer(i64::from(i))
    }
}

impl From<f64> for ModelValue {
    fn from(d: f64) -> Self {
        Self::Decimal(d)
    }
}

impl From<&str> for ModelValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for ModelValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Vec<u8>> for ModelValue {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<Vec<ModelValue>> for ModelValue {
    fn from(items: Vec<ModelValue>) -> Self {
        Self::List(items)
    }
}

impl From<ValueMap> for ModelValue {
    fn from(map: ValueMap) -> Self {
        Self::Object(map)
    }
}

impl FromIterator<ModelValue> for ModelValue {
    fn from_iter<T: IntoIterator<Item = ModelValue>>(iter: T) -> Self {
        Self::List(iter.into_iter().collect())
    }
}

impl FromIterator<(String, ModelValue)> for ModelValue {
    fn from_iter<T: IntoIterator<Item = (String, ModelValue)>>(iter: T) -> Self {
        Self::Object(iter.into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
