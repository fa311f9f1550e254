//! Table schemas
//!
//! A schema is the ordered list of attribute names every record in a table
//! carries. The order fixes the encoding order of record payloads.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{AutoDbError, Result};

use super::Attributes;

/// Ordered attribute names shared by all records of one table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    attributes: Vec<String>,
}

impl Schema {
    /// Build a schema, rejecting empty or duplicate names
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let attributes: Vec<String> = names.into_iter().map(Into::into).collect();
        let mut seen = HashSet::with_capacity(attributes.len());
        for name in &attributes {
            if name.is_empty() {
                return Err(AutoDbError::InvalidSchema(
                    "attribute names must not be empty".to_string(),
                ));
            }
            if !seen.insert(name.as_str()) {
                return Err(AutoDbError::InvalidSchema(format!(
                    "duplicate attribute '{}'",
                    name
                )));
            }
        }
        Ok(Self { attributes })
    }

    /// Schema covering exactly the attributes present, in sorted name order
    pub fn from_attributes(attributes: &Attributes) -> Result<Self> {
        Self::new(attributes.names())
    }

    pub fn names(&self) -> &[String] {
        &self.attributes
    }

    pub fn contains(&self, name: &str) -> bool {
        self.attributes.iter().any(|a| a == name)
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Check that `attributes` holds exactly the names of this schema
    pub fn check(&self, attributes: &Attributes) -> Result<()> {
        if let Some(missing) = self.attributes.iter().find(|a| !attributes.contains(a)) {
            return Err(AutoDbError::SchemaMismatch(format!(
                "missing attribute '{}'",
                missing
            )));
        }
        if let Some(extra) = attributes.names().find(|n| !self.contains(n)) {
            return Err(AutoDbError::SchemaMismatch(format!(
                "attribute '{}' is not in the schema",
                extra
            )));
        }
        Ok(())
    }
}

