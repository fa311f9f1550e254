//! Attribute filters
//!
//! A filter is a list of `name == value` terms combined with logical AND.
//! Comparison is exact [`Value`] equality; there is no substring or ordering
//! match. A name outside the table schema is an error, not a silent miss.

use crate::error::{AutoDbError, Result};
use crate::model::{Object, Schema, Value};

/// Conjunction of attribute equality terms
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    terms: Vec<(String, Value)>,
}

impl Filter {
    /// The empty filter, matching every live record
    pub fn new() -> Self {
        Self::default()
    }

    /// Alias for [`Filter::new`], reads better at call sites
    pub fn all() -> Self {
        Self::default()
    }

    /// Add an `name == value` term
    pub fn eq(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.terms.push((name.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn terms(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.terms.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// True if every attribute the filter names is in `schema`
    pub fn applies_to(&self, schema: &Schema) -> bool {
        self.terms.iter().all(|(name, _)| schema.contains(name))
    }

    /// Fail with `UnknownAttribute` for the first name not in `schema`
    pub fn validate(&self, schema: &Schema, type_id: &str) -> Result<()> {
        match self.terms.iter().find(|(name, _)| !schema.contains(name)) {
            Some((name, _)) => Err(AutoDbError::UnknownAttribute {
                type_id: type_id.to_string(),
                attribute: name.clone(),
            }),
            None => Ok(()),
        }
    }

    pub fn matches(&self, object: &Object) -> bool {
        self.terms
            .iter()
            .all(|(name, value)| object.get(name) == Some(value))
    }
}

