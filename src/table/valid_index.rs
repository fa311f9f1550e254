//! Valid-index set
//!
//! Tracks which slots of a table are live. Maintained incrementally on every
//! insert and delete so `len()` never rescans records.

use std::collections::BTreeSet;

use super::Record;

/// Ordered set of live slot indexes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidIndexSet {
    slots: BTreeSet<u64>,
}

impl ValidIndexSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the live records of a loaded table
    pub fn from_records(records: &[Record]) -> Self {
        Self {
            slots: records
                .iter()
                .filter(|r| r.is_live())
                .map(|r| r.slot())
                .collect(),
        }
    }

    pub fn insert(&mut self, slot: u64) -> bool {
        self.slots.insert(slot)
    }

    /// Returns true if the slot was live
    pub fn remove(&mut self, slot: u64) -> bool {
        self.slots.remove(&slot)
    }

    pub fn contains(&self, slot: u64) -> bool {
        self.slots.contains(&slot)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Live slots in ascending order
    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.slots.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<u64> {
        self.iter().collect()
    }
}

