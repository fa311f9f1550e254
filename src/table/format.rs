//! Table file layout
//!
//! Shared constants plus encoders/decoders for the file header and frames
//! (used by writer and recovery).

use bytes::{Buf, BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::{AutoDbError, Result};
use crate::model::Schema;

// =============================================================================
// Shared Constants
// =============================================================================

/// Magic bytes identifying an AutoDB table file
pub(crate) const MAGIC: &[u8; 4] = b"ADBT";

/// Current table format version
pub(crate) const VERSION: u16 = 1;

/// Fixed header prefix: Magic (4) + Version (2) + MetaLen (4) + MetaCRC (4)
pub(crate) const FILE_HEADER_SIZE: usize = 14;

/// Upper bound on the encoded metadata block
pub(crate) const MAX_META_SIZE: usize = 1024 * 1024;

/// Frame header: HeaderCRC (4) + Kind (1) + FirstSlot (8) + Count (4) + BodyLen (4)
pub(crate) const FRAME_HEADER_SIZE: usize = 21;

/// Per-payload prefix inside an APPEND body: PayloadLen (4) + PayloadCRC (4)
pub(crate) const PAYLOAD_PREFIX_SIZE: usize = 8;

pub(crate) const FRAME_APPEND: u8 = 0x01;
pub(crate) const FRAME_TOMBSTONE: u8 = 0x02;

// =============================================================================
// File Header
// =============================================================================

/// Self-describing table metadata stored in the file header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMeta {
    pub type_id: String,
    pub schema: Schema,
}

pub(crate) fn encode_file_header(meta: &TableMeta) -> Result<Vec<u8>> {
    let body = bincode::serialize(meta)?;
    if body.len() > MAX_META_SIZE {
        return Err(AutoDbError::RecordTooLarge {
            size: body.len(),
            max: MAX_META_SIZE,
        });
    }

    let mut buf = BytesMut::with_capacity(FILE_HEADER_SIZE + body.len());
    buf.put_slice(MAGIC);
    buf.put_u16_le(VERSION);
    buf.put_u32_le(body.len() as u32);
    buf.put_u32_le(crc32fast::hash(&body));
    buf.put_slice(&body);
    Ok(buf.to_vec())
}

/// Parse the file header, returning the metadata and header length
///
/// The error string becomes the `reason` of a `CorruptFile` error.
pub(crate) fn decode_file_header(bytes: &[u8]) -> std::result::Result<(TableMeta, usize), String> {
    if bytes.len() < FILE_HEADER_SIZE {
        return Err(format!(
            "file too short for header: {} bytes",
            bytes.len()
        ));
    }

    let mut buf = bytes;
    if &buf[0..4] != MAGIC {
        return Err(format!("invalid magic: expected ADBT, got {:?}", &buf[0..4]));
    }
    buf.advance(4);

    let version = buf.get_u16_le();
    if version != VERSION {
        return Err(format!("unsupported table format version: {}", version));
    }

    let meta_len = buf.get_u32_le() as usize;
    let meta_crc = buf.get_u32_le();
    if meta_len > MAX_META_SIZE || buf.remaining() < meta_len {
        return Err(format!("metadata length {} out of bounds", meta_len));
    }

    let body = &buf[..meta_len];
    if crc32fast::hash(body) != meta_crc {
        return Err("metadata checksum mismatch".to_string());
    }

    let meta: TableMeta =
        bincode::deserialize(body).map_err(|e| format!("unreadable metadata: {}", e))?;
    // Re-validate; the schema was not built through Schema::new
    let schema = Schema::new(meta.schema.names().iter().cloned())
        .map_err(|e| format!("invalid stored schema: {}", e))?;

    Ok((
        TableMeta {
            type_id: meta.type_id,
            schema,
        },
        FILE_HEADER_SIZE + meta_len,
    ))
}

// =============================================================================
// Frames
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FrameKind {
    Append,
    Tombstone,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct FrameHeader {
    pub kind: FrameKind,
    pub first_slot: u64,
    pub count: u32,
    pub body_len: u32,
}

fn put_frame_header(buf: &mut BytesMut, kind: u8, first_slot: u64, count: u32, body_len: u32) {
    let mut fields = [0u8; FRAME_HEADER_SIZE - 4];
    fields[0] = kind;
    fields[1..9].copy_from_slice(&first_slot.to_le_bytes());
    fields[9..13].copy_from_slice(&count.to_le_bytes());
    fields[13..17].copy_from_slice(&body_len.to_le_bytes());

    buf.put_u32_le(crc32fast::hash(&fields));
    buf.put_slice(&fields);
}

/// Build an APPEND frame carrying `payloads` at slots `first_slot..`
pub(crate) fn encode_append_frame(first_slot: u64, payloads: &[Vec<u8>]) -> Result<Vec<u8>> {
    let body_len: usize = payloads
        .iter()
        .map(|p| PAYLOAD_PREFIX_SIZE + p.len())
        .sum();
    let body_len_u32 = u32::try_from(body_len).map_err(|_| AutoDbError::RecordTooLarge {
        size: body_len,
        max: u32::MAX as usize,
    })?;
    let count = u32::try_from(payloads.len()).map_err(|_| AutoDbError::RecordTooLarge {
        size: payloads.len(),
        max: u32::MAX as usize,
    })?;

    let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + body_len);
    put_frame_header(&mut buf, FRAME_APPEND, first_slot, count, body_len_u32);
    for payload in payloads {
        buf.put_u32_le(payload.len() as u32);
        buf.put_u32_le(crc32fast::hash(payload));
        buf.put_slice(payload);
    }
    Ok(buf.to_vec())
}

/// Build a TOMBSTONE frame marking `slots` deleted
pub(crate) fn encode_tombstone_frame(slots: &[u64]) -> Result<Vec<u8>> {
    let count = u32::try_from(slots.len()).map_err(|_| AutoDbError::RecordTooLarge {
        size: slots.len(),
        max: u32::MAX as usize,
    })?;

    let mut slot_bytes = BytesMut::with_capacity(slots.len() * 8);
    for slot in slots {
        slot_bytes.put_u64_le(*slot);
    }
    let body_len = 4 + slot_bytes.len();

    let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + body_len);
    put_frame_header(&mut buf, FRAME_TOMBSTONE, 0, count, body_len as u32);
    buf.put_u32_le(crc32fast::hash(&slot_bytes));
    buf.put_slice(&slot_bytes);
    Ok(buf.to_vec())
}

/// Parse a frame header; `None` if its checksum or kind is invalid
pub(crate) fn decode_frame_header(bytes: &[u8]) -> Option<FrameHeader> {
    if bytes.len() < FRAME_HEADER_SIZE {
        return None;
    }

    let mut buf = &bytes[..FRAME_HEADER_SIZE];
    let crc = buf.get_u32_le();
    if crc32fast::hash(buf) != crc {
        return None;
    }

    let kind = match buf.get_u8() {
        FRAME_APPEND => FrameKind::Append,
        FRAME_TOMBSTONE => FrameKind::Tombstone,
        _ => return None,
    };
    let first_slot = buf.get_u64_le();
    let count = buf.get_u32_le();
    let body_len = buf.get_u32_le();

    Some(FrameHeader {
        kind,
        first_slot,
        count,
        body_len,
    })
}

