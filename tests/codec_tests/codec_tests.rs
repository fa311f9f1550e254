//! Codec Tests
//!
//! Tests for record payload encoding/decoding.
//!
//! These tests verify:
//! - Exact round trip of every value kind
//! - Payload layout follows schema order
//! - The same nesting limit on both encode and decode
//! - Malformed payloads are rejected, never misread

use std::collections::BTreeMap;

use autodb::codec::{decode, encode, MAX_DEPTH};
use autodb::{Attributes, AutoDbError, Object, Schema, Value};

// =============================================================================
// Helper Functions
// =============================================================================

fn single(value: impl Into<Value>) -> (Object, Schema) {
    let object = Object::new("Holder", Attributes::new().with("v", value));
    (object, Schema::new(["v"]).unwrap())
}

/// Null wrapped in `levels` lists
fn nested_lists(levels: usize) -> Value {
    (0..levels).fold(Value::Null, |inner, _| Value::List(vec![inner]))
}

fn round_trip(object: &Object, schema: &Schema) -> Object {
    let bytes = encode(object, schema).unwrap();
    decode(&bytes, schema, object.type_id()).unwrap()
}

// =============================================================================
// Round Trip Tests
// =============================================================================

#[test]
fn test_round_trip_every_value_kind() {
    let mut map = BTreeMap::new();
    map.insert("k".to_string(), Value::from(vec![Value::Int(1), Value::Null]));

    let nested = Object::new("Inner", Attributes::new().with("name", "in").with("n", 3));

    let object = Object::new(
        "Everything",
        Attributes::new()
            .with("null", Value::Null)
            .with("flag", true)
            .with("int", i64::MIN)
            .with("float", -0.0)
            .with("nan", f64::NAN)
            .with("text", "héllo ✓")
            .with("bytes", vec![0u8, 255, 7])
            .with("list", vec![Value::from("a"), Value::from(2), Value::from(false)])
            .with("map", map)
            .with("object", nested),
    );
    let schema = Schema::from_attributes(object.attributes()).unwrap();

    assert_eq!(round_trip(&object, &schema), object);
}

#[test]
fn test_round_trip_empty_containers() {
    let object = Object::new(
        "Empty",
        Attributes::new()
            .with("text", "")
            .with("bytes", Vec::<u8>::new())
            .with("list", Vec::<Value>::new())
            .with("map", BTreeMap::<String, Value>::new()),
    );
    let schema = Schema::from_attributes(object.attributes()).unwrap();

    assert_eq!(round_trip(&object, &schema), object);
}

#[test]
fn test_round_trip_deeply_nested_objects() {
    let mut value = Value::Int(0);
    for depth in 0..20 {
        value = Value::Object(Object::new(
            format!("Level{}", depth),
            Attributes::new().with("child", value),
        ));
    }
    let (object, schema) = single(value);

    assert_eq!(round_trip(&object, &schema), object);
}

#[test]
fn test_zero_attribute_schema() {
    let object = Object::new("Unit", Attributes::new());
    let schema = Schema::new(Vec::<String>::new()).unwrap();

    let bytes = encode(&object, &schema).unwrap();
    assert_eq!(bytes, 0u32.to_le_bytes().to_vec());
    assert_eq!(round_trip(&object, &schema), object);
}

#[test]
fn test_layout_follows_schema_order() {
    let object = Object::new("P", Attributes::new().with("x", 1).with("y", 2));
    let schema = Schema::new(["y", "x"]).unwrap();

    let bytes = encode(&object, &schema).unwrap();
    // count + two INT values
    assert_eq!(bytes.len(), 4 + 9 * 2);
    assert_eq!(bytes[4], 0x02);
    assert_eq!(&bytes[5..13], &2i64.to_le_bytes());
    assert_eq!(&bytes[14..22], &1i64.to_le_bytes());
}

#[test]
fn test_decode_is_left_inverse_of_encode() {
    let object = Object::new("P", Attributes::new().with("x", -5).with("y", i64::MAX));
    let schema = Schema::new(["x", "y"]).unwrap();

    let bytes = encode(&object, &schema).unwrap();
    let decoded = decode(&bytes, &schema, "P").unwrap();
    assert_eq!(decoded, object);
    assert_eq!(encode(&decoded, &schema).unwrap(), bytes);
}

#[test]
fn test_nesting_at_limit_round_trips() {
    let (object, schema) = single(nested_lists(MAX_DEPTH));

    assert_eq!(round_trip(&object, &schema), object);
}

// =============================================================================
// Encoding Errors
// =============================================================================

#[test]
fn test_encode_missing_attribute_is_schema_mismatch() {
    let object = Object::new("P", Attributes::new().with("x", 1));
    let schema = Schema::new(["x", "y"]).unwrap();

    let err = encode(&object, &schema).unwrap_err();
    assert!(matches!(err, AutoDbError::SchemaMismatch(_)));
}

#[test]
fn test_encode_past_nesting_limit_is_rejected() {
    let (object, schema) = single(nested_lists(MAX_DEPTH + 1));

    let err = encode(&object, &schema).unwrap_err();
    assert!(matches!(err, AutoDbError::NestingTooDeep { max } if max == MAX_DEPTH));
}

#[test]
fn test_encode_past_nesting_limit_inside_map_is_rejected() {
    let mut map = BTreeMap::new();
    map.insert("deep".to_string(), nested_lists(MAX_DEPTH));
    let (object, schema) = single(Value::Map(map));

    assert!(matches!(
        encode(&object, &schema),
        Err(AutoDbError::NestingTooDeep { .. })
    ));
}

#[test]
fn test_encode_extra_attribute_is_schema_mismatch() {
    let object = Object::new("P", Attributes::new().with("x", 1).with("y", 2));
    let schema = Schema::new(["x"]).unwrap();

    let err = encode(&object, &schema).unwrap_err();
    assert!(matches!(err, AutoDbError::SchemaMismatch(_)));
}

// =============================================================================
// Decoding Errors
// =============================================================================

#[test]
fn test_decode_wrong_schema_length() {
    let (object, schema) = single(5);
    let bytes = encode(&object, &schema).unwrap();

    let wider = Schema::new(["v", "w"]).unwrap();
    let err = decode(&bytes, &wider, "Holder").unwrap_err();
    assert!(err.to_string().contains("does not match schema"));
}

#[test]
fn test_decode_every_truncation_fails() {
    let (object, schema) = single(vec![Value::from("abc"), Value::from(1.5)]);
    let bytes = encode(&object, &schema).unwrap();

    for len in 0..bytes.len() {
        assert!(
            decode(&bytes[..len], &schema, "Holder").is_err(),
            "prefix of {} bytes decoded",
            len
        );
    }
}

#[test]
fn test_decode_invalid_utf8() {
    let schema = Schema::new(["v"]).unwrap();
    let mut bytes = 1u32.to_le_bytes().to_vec();
    bytes.push(0x04); // text
    bytes.extend_from_slice(&2u32.to_le_bytes());
    bytes.extend_from_slice(&[0xff, 0xfe]);

    let err = decode(&bytes, &schema, "Holder").unwrap_err();
    assert!(err.to_string().contains("UTF-8"));
}

#[test]
fn test_decode_invalid_bool() {
    let schema = Schema::new(["v"]).unwrap();
    let mut bytes = 1u32.to_le_bytes().to_vec();
    bytes.extend_from_slice(&[0x01, 0x02]);

    assert!(decode(&bytes, &schema, "Holder").is_err());
}

#[test]
fn test_decode_huge_list_count_does_not_allocate() {
    let schema = Schema::new(["v"]).unwrap();
    let mut bytes = 1u32.to_le_bytes().to_vec();
    bytes.push(0x06); // list
    bytes.extend_from_slice(&u32::MAX.to_le_bytes());

    assert!(decode(&bytes, &schema, "Holder").is_err());
}

#[test]
fn test_decode_trailing_bytes() {
    let (object, schema) = single(5);
    let mut bytes = encode(&object, &schema).unwrap();
    bytes.push(0x00);

    let err = decode(&bytes, &schema, "Holder").unwrap_err();
    assert!(err.to_string().contains("trailing"));
}

#[test]
fn test_decode_unknown_tag() {
    let schema = Schema::new(["v"]).unwrap();
    let mut bytes = 1u32.to_le_bytes().to_vec();
    bytes.push(0x7f);

    let err = decode(&bytes, &schema, "Holder").unwrap_err();
    assert!(err.to_string().contains("unknown value tag"));
}

#[test]
fn test_decode_past_nesting_limit_is_rejected() {
    let schema = Schema::new(["v"]).unwrap();
    let mut bytes = 1u32.to_le_bytes().to_vec();
    for _ in 0..MAX_DEPTH + 1 {
        bytes.push(0x06); // list
        bytes.extend_from_slice(&1u32.to_le_bytes());
    }
    bytes.push(0x00); // null

    let err = decode(&bytes, &schema, "Holder").unwrap_err();
    assert!(err.to_string().contains("nesting"));
}
