//! Attribute values and the per-document attribute store.
//!
//! A [`Value`] is either a plain BSON value, a nested document instance (an embedded
//! document that still carries its own rules and behaviours), or a list mixing both.
//! The [`AttributeStore`] keeps the schema-less part of a document in insertion order.

use std::fmt;

use bson::{Bson, Document as BsonDocument};

use crate::document::AnyDocument;

/// A single attribute value.
#[derive(Clone)]
pub enum Value {
    /// A plain stored value.
    Bson(Bson),
    /// A nested document instance.
    Embedded(Box<dyn AnyDocument>),
    /// An ordered list that may hold nested document instances.
    List(Vec<Value>),
}

impl Value {
    /// The BSON null value.
    pub fn null() -> Self {
        Value::Bson(Bson::Null)
    }

    /// Wraps a nested document instance.
    pub fn embedded(document: Box<dyn AnyDocument>) -> Self {
        Value::Embedded(document)
    }

    /// Returns true for null or undefined values.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Bson(Bson::Null) | Value::Bson(Bson::Undefined))
    }

    /// Emptiness as understood by validators: null, an empty list or mapping, an empty
    /// string, or (when `trim` is set) a string made only of whitespace.
    pub fn is_empty(&self, trim: bool) -> bool {
        match self {
            Value::Bson(value) => is_empty_bson(value, trim),
            Value::Embedded(_) => false,
            Value::List(items) => items.is_empty(),
        }
    }

    /// Returns the plain BSON value, if this is one.
    pub fn as_bson(&self) -> Option<&Bson> {
        match self {
            Value::Bson(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the string content of a plain string value.
    pub fn as_str(&self) -> Option<&str> {
        self.as_bson().and_then(Bson::as_str)
    }

    /// Returns the nested document instance, if this is one.
    pub fn as_embedded(&self) -> Option<&dyn AnyDocument> {
        match self {
            Value::Embedded(document) => Some(document.as_ref()),
            _ => None,
        }
    }

    /// Returns the nested document instance mutably, if this is one.
    pub fn as_embedded_mut(&mut self) -> Option<&mut Box<dyn AnyDocument>> {
        match self {
            Value::Embedded(document) => Some(document),
            _ => None,
        }
    }

    /// Flattens nested document instances into their raw payloads, recursively.
    pub fn to_raw(&self) -> Bson {
        match self {
            Value::Bson(value) => value.clone(),
            Value::Embedded(document) => Bson::Document(document.to_raw()),
            Value::List(items) => Bson::Array(items.iter().map(Value::to_raw).collect()),
        }
    }

    /// Consumes the value, flattening nested document instances.
    pub fn into_raw(self) -> Bson {
        match self {
            Value::Bson(value) => value,
            other => other.to_raw(),
        }
    }
}

pub(crate) fn is_empty_bson(value: &Bson, trim: bool) -> bool {
    match value {
        Bson::Null | Bson::Undefined => true,
        Bson::Array(items) => items.is_empty(),
        Bson::Document(map) => map.is_empty(),
        Bson::String(text) => text.is_empty() || (trim && text.trim().is_empty()),
        _ => false,
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bson(value) => f.debug_tuple("Bson").field(value).finish(),
            Value::Embedded(document) => f
                .debug_tuple("Embedded")
                .field(&document.document_type())
                .field(&document.to_raw())
                .finish(),
            Value::List(items) => f.debug_tuple("List").field(items).finish(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Bson(a), Value::Bson(b)) => a == b,
            _ => self.to_raw() == other.to_raw(),
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::null()
    }
}

impl From<Bson> for Value {
    fn from(value: Bson) -> Self {
        Value::Bson(value)
    }
}

impl From<BsonDocument> for Value {
    fn from(value: BsonDocument) -> Self {
        Value::Bson(Bson::Document(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Bson(Bson::String(value.to_string()))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Bson(Bson::String(value))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bson(Bson::Boolean(value))
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Bson(Bson::Int32(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Bson(Bson::Int64(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Bson(Bson::Double(value))
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or_else(Value::null, Into::into)
    }
}

impl From<Box<dyn AnyDocument>> for Value {
    fn from(value: Box<dyn AnyDocument>) -> Self {
        Value::Embedded(value)
    }
}

/// Ordered field-name to [`Value`] mapping backing a document's schema-less attributes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AttributeStore {
    entries: Vec<(String, Value)>,
}

impl AttributeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.entries
            .iter_mut()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// Stores a value, replacing an existing entry in place so the field keeps its position.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();

        match self.get_mut(&name) {
            Some(slot) => *slot = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn unset(&mut self, name: &str) -> Option<Value> {
        let position = self.entries.iter().position(|(key, _)| key == name)?;

        Some(self.entries.remove(position).1)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Returns true when the field is present and not null.
    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some_and(|value| !value.is_null())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Copies every entry of `other` over this store.
    pub fn merge(&mut self, other: AttributeStore) {
        for (key, value) in other {
            self.set(key, value);
        }
    }

    /// The raw payload: nested document instances are flattened recursively.
    pub fn to_raw(&self) -> BsonDocument {
        self.entries
            .iter()
            .map(|(key, value)| (key.clone(), value.to_raw()))
            .collect()
    }
}

impl From<BsonDocument> for AttributeStore {
    fn from(document: BsonDocument) -> Self {
        AttributeStore {
            entries: document
                .into_iter()
                .map(|(key, value)| (key, Value::Bson(value)))
                .collect(),
        }
    }
}

impl IntoIterator for AttributeStore {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl FromIterator<(String, Value)> for AttributeStore {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        let mut store = AttributeStore::new();
        for (key, value) in iter {
            store.set(key, value);
        }
        store
    }
}
