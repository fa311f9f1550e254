//! Table records

use crate::codec;
use crate::error::{AutoDbError, Result};
use crate::model::{Object, Schema};

/// Whether a record is visible to reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    Live,
    /// Logically deleted; bytes are kept and the slot is never reused
    Tombstoned,
}

/// One stored object: its slot, encoded payload and state
#[derive(Debug, Clone)]
pub struct Record {
    slot: u64,
    payload: Vec<u8>,
    state: RecordState,
    /// False when the payload failed its checksum on load
    intact: bool,
}

impl Record {
    pub(crate) fn new(slot: u64, payload: Vec<u8>) -> Self {
        Self {
            slot,
            payload,
            state: RecordState::Live,
            intact: true,
        }
    }

    pub(crate) fn damaged(slot: u64, payload: Vec<u8>) -> Self {
        Self {
            slot,
            payload,
            state: RecordState::Live,
            intact: false,
        }
    }

    pub fn slot(&self) -> u64 {
        self.slot
    }

    /// Raw encoded payload (present for tombstoned records too)
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn state(&self) -> RecordState {
        self.state
    }

    pub fn is_live(&self) -> bool {
        self.state == RecordState::Live
    }

    pub fn is_intact(&self) -> bool {
        self.intact
    }

    pub(crate) fn tombstone(&mut self) {
        self.state = RecordState::Tombstoned;
    }

    /// Decode the payload, regardless of state
    pub fn decode(&self, schema: &Schema, type_id: &str) -> Result<Object> {
        if !self.intact {
            return Err(AutoDbError::CorruptRecord {
                slot: self.slot,
                reason: "payload checksum mismatch".to_string(),
            });
        }
        codec::decode(&self.payload, schema, type_id).map_err(|e| e.at_slot(self.slot))
    }
}
