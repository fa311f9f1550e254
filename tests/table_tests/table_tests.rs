//! Tests for PersistentTable
//!
//! These tests verify:
//! - Creating and loading table files
//! - Insert / batch insert / retrieve round trips
//! - Filter AND semantics and unknown attributes
//! - Soft delete (tombstones, valid indexes, recoverable bytes)
//! - Batch atomicity and the empty-batch no-op
//! - Persistence across reopen
//! - Record size and nesting limits reject a record before it is written
//! - Filter matching rules and the valid-index set

use std::fs;
use std::path::PathBuf;

use autodb::codec::MAX_DEPTH;
use autodb::table::{RecordState, ValidIndexSet};
use autodb::{
    Attributes, AutoDbError, Filter, Object, PersistentTable, Result, Schema, TableOptions, Value,
};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_table() -> (TempDir, PathBuf, PersistentTable) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("point.adbt");
    let table = PersistentTable::new(&path, "Point", point_schema()).unwrap();
    (temp_dir, path, table)
}

fn point_schema() -> Schema {
    Schema::new(["x", "y"]).unwrap()
}

fn point(x: i64, y: i64) -> Object {
    Object::new("Point", Attributes::new().with("x", x).with("y", y))
}

/// A "Tree" object whose only attribute is Null wrapped in `levels` lists
fn tree(levels: usize) -> Object {
    let value = (0..levels).fold(Value::Null, |inner, _| Value::List(vec![inner]));
    Object::new("Tree", Attributes::new().with("v", value))
}

fn all(table: &PersistentTable) -> Vec<Object> {
    table.retrieve_all().collect::<Result<Vec<_>>>().unwrap()
}

// =============================================================================
// Create / Load Tests
// =============================================================================

#[test]
fn test_new_creates_file_immediately() {
    let (_temp, path, table) = setup_temp_table();

    assert!(path.exists());
    assert_eq!(table.len(), 0);
    assert!(table.is_empty());

    let reopened = PersistentTable::from_file(&path).unwrap();
    assert_eq!(reopened.type_id(), "Point");
    assert_eq!(reopened.schema(), &point_schema());
    assert_eq!(reopened.len(), 0);
}

#[test]
fn test_new_in_missing_directory_is_io_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("no/such/dir/point.adbt");

    let result = PersistentTable::new(&path, "Point", point_schema());
    assert!(matches!(result, Err(AutoDbError::Io(_))));
}

#[test]
fn test_from_file_missing_is_database_not_found() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("missing.adbt");

    let result = PersistentTable::from_file(&path);
    assert!(matches!(result, Err(AutoDbError::DatabaseNotFound { .. })));
}

#[test]
fn test_from_file_garbage_is_corrupt_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("garbage.adbt");
    fs::write(&path, b"definitely not a table file").unwrap();

    let err = PersistentTable::from_file(&path).err().unwrap();
    assert!(matches!(err, AutoDbError::CorruptFile { .. }));
    assert!(err.is_corruption());
}

// =============================================================================
// Insert / Retrieve Tests
// =============================================================================

#[test]
fn test_insert_then_retrieve_all_round_trip() {
    let (_temp, _path, mut table) = setup_temp_table();
    let p = point(3, -4);

    table.insert(&p).unwrap();

    assert_eq!(all(&table), vec![p]);
    assert_eq!(table.len(), 1);
    assert_eq!(table.retrieve_valid_indexes(), vec![0]);
}

#[test]
fn test_retrieve_preserves_insertion_order() {
    let (_temp, _path, mut table) = setup_temp_table();
    let points: Vec<Object> = (0..10).rev().map(|i| point(i, i * 2)).collect();

    for p in &points {
        table.insert(p).unwrap();
    }

    assert_eq!(table.retrieve(&Filter::all()).unwrap(), points);
}

#[test]
fn test_filter_and_semantics() {
    let (_temp, _path, mut table) = setup_temp_table();
    let a = point(1, 2);
    let b = point(1, 3);
    table.insert(&a).unwrap();
    table.insert(&b).unwrap();

    assert_eq!(
        table.retrieve(&Filter::new().eq("x", 1)).unwrap(),
        vec![a.clone(), b.clone()]
    );
    assert_eq!(
        table.retrieve(&Filter::new().eq("x", 1).eq("y", 2)).unwrap(),
        vec![a]
    );

    let deleted = table.delete(&Filter::new().eq("x", 1).eq("y", 2)).unwrap();
    assert_eq!(deleted, 1);
    assert_eq!(table.retrieve(&Filter::new().eq("x", 1)).unwrap(), vec![b]);
    assert_eq!(table.len(), 1);
}

#[test]
fn test_filter_without_matches_is_empty() {
    let (_temp, _path, mut table) = setup_temp_table();
    table.insert(&point(1, 2)).unwrap();

    assert!(table.retrieve(&Filter::new().eq("x", 99)).unwrap().is_empty());
}

#[test]
fn test_unknown_filter_attribute_is_error() {
    let (_temp, _path, mut table) = setup_temp_table();
    table.insert(&point(1, 2)).unwrap();

    let err = table.retrieve(&Filter::new().eq("z", 1)).unwrap_err();
    assert!(matches!(err, AutoDbError::UnknownAttribute { .. }));

    let err = table.delete(&Filter::new().eq("z", 1)).unwrap_err();
    assert!(matches!(err, AutoDbError::UnknownAttribute { .. }));
    assert_eq!(table.len(), 1);
}

#[test]
fn test_insert_schema_mismatch_leaves_table_unchanged() {
    let (_temp, path, mut table) = setup_temp_table();
    let before = fs::read(&path).unwrap();

    let missing_y = Object::new("Point", Attributes::new().with("x", 1));
    assert!(matches!(
        table.insert(&missing_y),
        Err(AutoDbError::SchemaMismatch(_))
    ));

    assert_eq!(fs::read(&path).unwrap(), before);
    assert_eq!(table.slot_count(), 0);
}

#[test]
fn test_insert_rejects_other_type() {
    let (_temp, _path, mut table) = setup_temp_table();

    let other = Object::new("Line", Attributes::new().with("x", 1).with("y", 2));
    assert!(matches!(
        table.insert(&other),
        Err(AutoDbError::SchemaMismatch(_))
    ));
    assert_eq!(table.slot_count(), 0);
}

#[test]
fn test_record_too_large() {
    let temp_dir = TempDir::new().unwrap();
    let options = TableOptions {
        max_record_size: 16,
        ..TableOptions::default()
    };
    let schema = Schema::new(["blob"]).unwrap();
    let path = temp_dir.path().join("blob.adbt");
    let mut table = PersistentTable::new_with_options(&path, "Blob", schema, options).unwrap();
    let before = fs::read(&path).unwrap();

    let blob = Object::new("Blob", Attributes::new().with("blob", vec![0u8; 64]));
    assert!(matches!(
        table.insert(&blob),
        Err(AutoDbError::RecordTooLarge { .. })
    ));
    assert!(table.is_empty());
    assert_eq!(fs::read(&path).unwrap(), before);
}

#[test]
fn test_insert_past_nesting_limit_leaves_table_unchanged() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("tree.adbt");
    let mut table = PersistentTable::new(&path, "Tree", Schema::new(["v"]).unwrap()).unwrap();
    let before = fs::read(&path).unwrap();

    let result = table.insert(&tree(MAX_DEPTH + 1));

    assert!(matches!(result, Err(AutoDbError::NestingTooDeep { .. })));
    assert_eq!(table.slot_count(), 0);
    assert_eq!(fs::read(&path).unwrap(), before);
}

#[test]
fn test_nesting_at_limit_is_readable_after_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("tree.adbt");
    let mut table = PersistentTable::new(&path, "Tree", Schema::new(["v"]).unwrap()).unwrap();

    table.insert(&tree(MAX_DEPTH)).unwrap();
    drop(table);

    let reopened = PersistentTable::from_file(&path).unwrap();
    assert_eq!(all(&reopened), vec![tree(MAX_DEPTH)]);
    assert_eq!(reopened.recovery_report().damaged_records, 0);
}

#[test]
fn test_retrieve_all_is_restartable() {
    let (_temp, _path, mut table) = setup_temp_table();
    table.insert(&point(1, 2)).unwrap();
    table.insert(&point(3, 4)).unwrap();

    let first = all(&table);
    let second = all(&table);
    assert_eq!(first, second);
    assert_eq!(first.len(), 2);
}

// =============================================================================
// Delete Tests
// =============================================================================

#[test]
fn test_delete_is_soft() {
    let (_temp, path, mut table) = setup_temp_table();
    let keep = point(1, 1);
    let gone = point(2, 2);
    table.insert(&keep).unwrap();
    table.insert(&gone).unwrap();
    let len_before = table.len();

    let deleted = table.delete(&Filter::new().eq("x", 2)).unwrap();

    assert_eq!(deleted, 1);
    assert_eq!(table.len(), len_before - 1);
    assert_eq!(all(&table), vec![keep]);
    assert_eq!(table.retrieve_valid_indexes(), vec![0]);

    // Bytes are still there, on disk as well as in memory
    let reopened = PersistentTable::from_file(&path).unwrap();
    let record = &reopened.records()[1];
    assert_eq!(record.state(), RecordState::Tombstoned);
    assert_eq!(
        record.decode(reopened.schema(), reopened.type_id()).unwrap(),
        gone
    );
}

#[test]
fn test_delete_without_matches_is_noop() {
    let (_temp, path, mut table) = setup_temp_table();
    table.insert(&point(1, 1)).unwrap();
    let before = fs::read(&path).unwrap();

    assert_eq!(table.delete(&Filter::new().eq("x", 5)).unwrap(), 0);

    assert_eq!(fs::read(&path).unwrap(), before);
    assert_eq!(table.len(), 1);
}

#[test]
fn test_delete_twice_counts_once() {
    let (_temp, _path, mut table) = setup_temp_table();
    table.insert(&point(1, 1)).unwrap();

    assert_eq!(table.delete(&Filter::all()).unwrap(), 1);
    assert_eq!(table.delete(&Filter::all()).unwrap(), 0);
    assert!(table.is_empty());
}

#[test]
fn test_slots_are_never_reused() {
    let (_temp, _path, mut table) = setup_temp_table();

    table.insert(&point(1, 1)).unwrap();
    table.insert(&point(2, 2)).unwrap();
    table.delete(&Filter::new().eq("x", 2)).unwrap();
    table.insert(&point(3, 3)).unwrap();

    assert_eq!(table.retrieve_valid_indexes(), vec![0, 2]);
    assert_eq!(table.slot_count(), 3);
}

#[test]
fn test_tombstone_frame_size() {
    let (_temp, path, mut table) = setup_temp_table();
    table.insert(&point(1, 1)).unwrap();
    table.insert(&point(2, 2)).unwrap();
    let before = fs::metadata(&path).unwrap().len();

    assert_eq!(table.delete(&Filter::all()).unwrap(), 2);

    // frame header + body checksum + two slots
    let after = fs::metadata(&path).unwrap().len();
    assert_eq!(after - before, 21 + 4 + 2 * 8);
}

// =============================================================================
// Batch Insert Tests
// =============================================================================

#[test]
fn test_batch_insert_assigns_consecutive_slots() {
    let (_temp, _path, mut table) = setup_temp_table();
    table.insert(&point(0, 0)).unwrap();

    let batch: Vec<Object> = (1..=3).map(|i| point(i, i)).collect();
    table.batch_insert(&batch).unwrap();

    assert_eq!(table.retrieve_valid_indexes(), vec![0, 1, 2, 3]);
    assert_eq!(&all(&table)[1..], batch.as_slice());
}

#[test]
fn test_batch_insert_mixed_types_is_atomic() {
    let (_temp, path, mut table) = setup_temp_table();
    table.insert(&point(0, 0)).unwrap();
    let before_bytes = fs::read(&path).unwrap();
    let before_all = all(&table);

    let line = Object::new("Line", Attributes::new().with("x", 1).with("y", 1));
    let result = table.batch_insert(&[point(1, 1), line, point(2, 2)]);

    assert!(matches!(result, Err(AutoDbError::SchemaMismatch(_))));
    assert_eq!(table.len(), 1);
    assert_eq!(all(&table), before_all);
    assert_eq!(fs::read(&path).unwrap(), before_bytes);
}

#[test]
fn test_empty_batch_is_noop() {
    let (_temp, path, mut table) = setup_temp_table();
    table.insert(&point(7, 7)).unwrap();
    let before = fs::read(&path).unwrap();

    table.batch_insert(&[]).unwrap();

    assert_eq!(fs::read(&path).unwrap(), before);
    assert_eq!(table.len(), 1);
    assert_eq!(table.slot_count(), 1);
}

#[test]
fn test_batch_insert_writes_one_frame() {
    let temp_dir = TempDir::new().unwrap();
    let single_path = temp_dir.path().join("single.adbt");
    let batch_path = temp_dir.path().join("batch.adbt");
    let points: Vec<Object> = (0..25).map(|i| point(i, -i)).collect();

    {
        let mut single = PersistentTable::new(&single_path, "Point", point_schema()).unwrap();
        for p in &points {
            single.insert(p).unwrap();
        }
        let mut batch = PersistentTable::new(&batch_path, "Point", point_schema()).unwrap();
        batch.batch_insert(&points).unwrap();
    }

    let single = PersistentTable::from_file(&single_path).unwrap();
    let batch = PersistentTable::from_file(&batch_path).unwrap();

    assert_eq!(single.recovery_report().frames_applied, 25);
    assert_eq!(batch.recovery_report().frames_applied, 1);
    assert_eq!(all(&single), all(&batch));
}

// =============================================================================
// Persistence Tests
// =============================================================================

#[test]
fn test_persistence_across_reopen() {
    let (_temp, path, mut table) = setup_temp_table();
    let points: Vec<Object> = (0..50).map(|i| point(i % 7, i)).collect();
    for p in &points[..20] {
        table.insert(p).unwrap();
    }
    table.batch_insert(&points[20..]).unwrap();
    drop(table);

    let reopened = PersistentTable::from_file(&path).unwrap();

    assert_eq!(all(&reopened), points);
    assert_eq!(reopened.len(), 50);
    assert!(reopened.recovery_report().is_clean());
}

#[test]
fn test_reopened_table_keeps_slot_numbering() {
    let (_temp, path, mut table) = setup_temp_table();
    table.insert(&point(1, 1)).unwrap();
    table.insert(&point(2, 2)).unwrap();
    table.delete(&Filter::new().eq("x", 1)).unwrap();
    drop(table);

    let mut reopened = PersistentTable::from_file(&path).unwrap();
    assert_eq!(reopened.retrieve_valid_indexes(), vec![1]);

    reopened.insert(&point(3, 3)).unwrap();
    assert_eq!(reopened.retrieve_valid_indexes(), vec![1, 2]);
    drop(reopened);

    let again = PersistentTable::from_file(&path).unwrap();
    assert_eq!(again.retrieve_valid_indexes(), vec![1, 2]);
    assert_eq!(all(&again), vec![point(2, 2), point(3, 3)]);
}

// =============================================================================
// Filter Tests
// =============================================================================

#[test]
fn test_empty_filter_matches_everything() {
    assert!(Filter::all().matches(&point(1, 2)));
    assert!(Filter::new().is_empty());
}

#[test]
fn test_filter_terms_are_anded() {
    let filter = Filter::new().eq("x", 1).eq("y", 2);
    assert!(filter.matches(&point(1, 2)));
    assert!(!filter.matches(&point(1, 3)));
}

#[test]
fn test_filter_equality_is_type_strict() {
    assert!(!Filter::new().eq("x", 1.0).matches(&point(1, 2)));
    assert!(!Filter::new().eq("x", "1").matches(&point(1, 2)));
}

#[test]
fn test_filter_validate_unknown_attribute() {
    let schema = point_schema();
    let err = Filter::new().eq("z", 1).validate(&schema, "Point").unwrap_err();
    assert!(matches!(
        err,
        AutoDbError::UnknownAttribute { ref attribute, .. } if attribute == "z"
    ));
    assert!(!Filter::new().eq("z", 1).applies_to(&schema));
    assert!(Filter::new().eq("y", 1).applies_to(&schema));
}

// =============================================================================
// Valid Index Tests
// =============================================================================

#[test]
fn test_valid_index_set_from_records_skips_tombstones() {
    let (_temp, _path, mut table) = setup_temp_table();
    table
        .batch_insert(&[point(0, 0), point(1, 1), point(2, 2), point(3, 3)])
        .unwrap();
    table.delete(&Filter::new().eq("x", 1)).unwrap();
    table.delete(&Filter::new().eq("x", 3)).unwrap();

    let valid = ValidIndexSet::from_records(table.records());
    assert_eq!(valid.to_vec(), vec![0, 2]);
    assert_eq!(valid.len(), 2);
    assert_eq!(valid.to_vec(), table.retrieve_valid_indexes());
}

#[test]
fn test_valid_index_set_remove_reports_membership() {
    let mut valid = ValidIndexSet::new();
    valid.insert(9);
    valid.insert(2);

    assert!(valid.remove(9));
    assert!(!valid.remove(9));
    assert!(!valid.contains(9));
    assert_eq!(valid.to_vec(), vec![2]);
}
