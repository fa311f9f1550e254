//! Record codec
//!
//! Encoding and decoding of an object's attribute state to the payload bytes
//! stored in a table file.
//!
//! ## Payload Format
//! ```text
//! ┌──────────────┬──────────────────────────────────────────┐
//! │ AttrCount(4) │ Value × AttrCount (schema order)         │
//! └──────────────┴──────────────────────────────────────────┘
//! ```
//!
//! ### Value Encoding (tag byte + body, little-endian)
//! - 0x00 NULL:   empty
//! - 0x01 BOOL:   u8 (0 | 1)
//! - 0x02 INT:    i64
//! - 0x03 FLOAT:  u64 (IEEE-754 bits, exact round trip)
//! - 0x04 TEXT:   len (4) + UTF-8
//! - 0x05 BYTES:  len (4) + raw bytes
//! - 0x06 LIST:   count (4) + value × count
//! - 0x07 MAP:    count (4) + (key_len (4) + key + value) × count
//! - 0x08 OBJECT: type_len (4) + type_id + count (4) + (name_len (4) + name + value) × count
//!
//! Top-level attribute names are not stored; the table schema supplies them.
//! Nested maps and objects carry their own names.

use std::collections::BTreeMap;

use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;

use crate::error::{AutoDbError, Result};
use crate::model::{Attributes, Object, Schema, Value};

// =============================================================================
// Tags
// =============================================================================

const TAG_NULL: u8 = 0x00;
const TAG_BOOL: u8 = 0x01;
const TAG_INT: u8 = 0x02;
const TAG_FLOAT: u8 = 0x03;
const TAG_TEXT: u8 = 0x04;
const TAG_BYTES: u8 = 0x05;
const TAG_LIST: u8 = 0x06;
const TAG_MAP: u8 = 0x07;
const TAG_OBJECT: u8 = 0x08;

/// Deepest nesting of lists/maps/objects accepted by encoder and decoder
pub const MAX_DEPTH: usize = 64;

/// Payload bytes that do not match the expected schema
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct DecodeError(String);

impl DecodeError {
    fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }

    /// Attach the record's slot, producing the crate-level error
    pub fn at_slot(self, slot: u64) -> AutoDbError {
        AutoDbError::CorruptRecord {
            slot,
            reason: self.0,
        }
    }
}

// =============================================================================
// Encoding
// =============================================================================

/// Encode an object's attributes in schema order
///
/// Fails with `SchemaMismatch` if the attribute names differ from the schema
/// and `NestingTooDeep` for values nested past [`MAX_DEPTH`].
pub fn encode(object: &Object, schema: &Schema) -> Result<Vec<u8>> {
    let attributes = object.attributes();
    schema.check(attributes)?;

    let mut buf = BytesMut::with_capacity(64);
    put_len(&mut buf, schema.len())?;
    for name in schema.names() {
        let value = attributes.get(name).ok_or_else(|| {
            AutoDbError::SchemaMismatch(format!("missing attribute '{}'", name))
        })?;
        encode_value(&mut buf, value, 0)?;
    }

    Ok(buf.to_vec())
}

/// Same depth rule as the decoder, so everything written can be read back
fn encode_value(buf: &mut BytesMut, value: &Value, depth: usize) -> Result<()> {
    if depth > MAX_DEPTH {
        return Err(AutoDbError::NestingTooDeep { max: MAX_DEPTH });
    }

    match value {
        Value::Null => buf.put_u8(TAG_NULL),
        Value::Bool(b) => {
            buf.put_u8(TAG_BOOL);
            buf.put_u8(u8::from(*b));
        }
        Value::Int(i) => {
            buf.put_u8(TAG_INT);
            buf.put_i64_le(*i);
        }
        Value::Float(x) => {
            buf.put_u8(TAG_FLOAT);
            buf.put_u64_le(x.to_bits());
        }
        Value::Text(s) => {
            buf.put_u8(TAG_TEXT);
            put_bytes(buf, s.as_bytes())?;
        }
        Value::Bytes(b) => {
            buf.put_u8(TAG_BYTES);
            put_bytes(buf, b)?;
        }
        Value::List(items) => {
            buf.put_u8(TAG_LIST);
            put_len(buf, items.len())?;
            for item in items {
                encode_value(buf, item, depth + 1)?;
            }
        }
        Value::Map(entries) => {
            buf.put_u8(TAG_MAP);
            put_len(buf, entries.len())?;
            for (key, item) in entries {
                put_bytes(buf, key.as_bytes())?;
                encode_value(buf, item, depth + 1)?;
            }
        }
        Value::Object(object) => {
            buf.put_u8(TAG_OBJECT);
            put_bytes(buf, object.type_id().as_bytes())?;
            put_len(buf, object.attributes().len())?;
            for (name, item) in object.attributes().iter() {
                put_bytes(buf, name.as_bytes())?;
                encode_value(buf, item, depth + 1)?;
            }
        }
    }
    Ok(())
}

fn put_len(buf: &mut BytesMut, len: usize) -> Result<()> {
    let len = u32::try_from(len).map_err(|_| AutoDbError::RecordTooLarge {
        size: len,
        max: u32::MAX as usize,
    })?;
    buf.put_u32_le(len);
    Ok(())
}

fn put_bytes(buf: &mut BytesMut, bytes: &[u8]) -> Result<()> {
    put_len(buf, bytes.len())?;
    buf.put_slice(bytes);
    Ok(())
}

// =============================================================================
// Decoding
// =============================================================================

/// Decode a payload produced by [`encode`] with the same schema
///
/// Exact left inverse of `encode`. Any count, tag, length, UTF-8 or trailing
/// byte mismatch is reported as a [`DecodeError`].
pub fn decode(bytes: &[u8], schema: &Schema, type_id: &str) -> std::result::Result<Object, DecodeError> {
    let mut decoder = Decoder { buf: bytes };

    let count = decoder.len("attribute count")?;
    if count != schema.len() {
        return Err(DecodeError::new(format!(
            "attribute count {} does not match schema of {}",
            count,
            schema.len()
        )));
    }

    let mut attributes = Attributes::new();
    for name in schema.names() {
        let value = decoder.value(0)?;
        attributes.insert(name.clone(), value);
    }

    if decoder.buf.has_remaining() {
        return Err(DecodeError::new(format!(
            "{} trailing bytes after last attribute",
            decoder.buf.remaining()
        )));
    }

    Ok(Object::new(type_id, attributes))
}

struct Decoder<'a> {
    buf: &'a [u8],
}

impl<'a> Decoder<'a> {
    fn need(&self, n: usize, what: &str) -> std::result::Result<(), DecodeError> {
        if self.buf.remaining() < n {
            return Err(DecodeError::new(format!(
                "truncated {}: need {} bytes, have {}",
                what,
                n,
                self.buf.remaining()
            )));
        }
        Ok(())
    }

    fn len(&mut self, what: &str) -> std::result::Result<usize, DecodeError> {
        self.need(4, what)?;
        Ok(self.buf.get_u32_le() as usize)
    }

    fn raw(&mut self, what: &str) -> std::result::Result<&'a [u8], DecodeError> {
        let len = self.len(what)?;
        self.need(len, what)?;
        let buf: &'a [u8] = self.buf;
        let (head, tail) = buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }

    fn text(&mut self, what: &str) -> std::result::Result<String, DecodeError> {
        let raw = self.raw(what)?;
        String::from_utf8(raw.to_vec())
            .map_err(|_| DecodeError::new(format!("{} is not valid UTF-8", what)))
    }

    fn value(&mut self, depth: usize) -> std::result::Result<Value, DecodeError> {
        if depth > MAX_DEPTH {
            return Err(DecodeError::new(format!(
                "nesting deeper than {} levels",
                MAX_DEPTH
            )));
        }

        self.need(1, "value tag")?;
        let tag = self.buf.get_u8();

        match tag {
            TAG_NULL => Ok(Value::Null),
            TAG_BOOL => {
                self.need(1, "bool")?;
                match self.buf.get_u8() {
                    0 => Ok(Value::Bool(false)),
                    1 => Ok(Value::Bool(true)),
                    other => Err(DecodeError::new(format!("invalid bool byte 0x{:02x}", other))),
                }
            }
            TAG_INT => {
                self.need(8, "int")?;
                Ok(Value::Int(self.buf.get_i64_le()))
            }
            TAG_FLOAT => {
                self.need(8, "float")?;
                Ok(Value::Float(f64::from_bits(self.buf.get_u64_le())))
            }
            TAG_TEXT => Ok(Value::Text(self.text("text")?)),
            TAG_BYTES => Ok(Value::Bytes(self.raw("bytes")?.to_vec())),
            TAG_LIST => {
                let count = self.len("list count")?;
                // Every element takes at least its tag byte
                self.need(count, "list elements")?;
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    items.push(self.value(depth + 1)?);
                }
                Ok(Value::List(items))
            }
            TAG_MAP => {
                let count = self.len("map count")?;
                let mut entries = BTreeMap::new();
                for _ in 0..count {
                    let key = self.text("map key")?;
                    let item = self.value(depth + 1)?;
                    if entries.insert(key, item).is_some() {
                        return Err(DecodeError::new("duplicate map key"));
                    }
                }
                Ok(Value::Map(entries))
            }
            TAG_OBJECT => {
                let type_id = self.text("object type")?;
                let count = self.len("object attribute count")?;
                let mut attributes = Attributes::new();
                for _ in 0..count {
                    let name = self.text("object attribute name")?;
                    let item = self.value(depth + 1)?;
                    if attributes.insert(name, item).is_some() {
                        return Err(DecodeError::new("duplicate object attribute"));
                    }
                }
                Ok(Value::Object(Object::new(type_id, attributes)))
            }
            _ => Err(DecodeError::new(format!("unknown value tag 0x{:02x}", tag))),
        }
    }
}
