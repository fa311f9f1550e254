//! Objects and their attribute maps

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{AutoDbError, Result};

use super::Value;

/// Attribute name → value map of one object
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    values: BTreeMap<String, Value>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert or replace an attribute, returning the previous value
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Remove an attribute and convert it to `T`
    ///
    /// Used by [`Persist::from_attributes`](super::Persist::from_attributes)
    /// implementations.
    pub fn take<T>(&mut self, name: &str) -> Result<T>
    where
        T: TryFrom<Value, Error = AutoDbError>,
    {
        let value = self.values.remove(name).ok_or_else(|| {
            AutoDbError::ValueConversion(format!("missing attribute '{}'", name))
        })?;
        T::try_from(value).map_err(|e| match e {
            AutoDbError::ValueConversion(msg) => {
                AutoDbError::ValueConversion(format!("attribute '{}': {}", name, msg))
            }
            other => other,
        })
    }

    /// Like [`take`](Self::take), mapping `Null` to `None`
    pub fn take_optional<T>(&mut self, name: &str) -> Result<Option<T>>
    where
        T: TryFrom<Value, Error = AutoDbError>,
    {
        match self.values.get(name) {
            Some(Value::Null) => {
                self.values.remove(name);
                Ok(None)
            }
            _ => self.take(name).map(Some),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Attribute names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn into_inner(self) -> BTreeMap<String, Value> {
        self.values
    }
}

impl From<BTreeMap<String, Value>> for Attributes {
    fn from(values: BTreeMap<String, Value>) -> Self {
        Self { values }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// A stored object: its type identifier plus attribute state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Object {
    type_id: String,
    attributes: Attributes,
}

impl Object {
    pub fn new(type_id: impl Into<String>, attributes: Attributes) -> Self {
        Self {
            type_id: type_id.into(),
            attributes,
        }
    }

    pub fn type_id(&self) -> &str {
        &self.type_id
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn into_attributes(self) -> Attributes {
        self.attributes
    }

    pub fn into_parts(self) -> (String, Attributes) {
        (self.type_id, self.attributes)
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {{", self.type_id)?;
        for (i, (name, value)) in self.attributes.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, " {}: {}", name, value)?;
        }
        write!(f, " }}")
    }
}

