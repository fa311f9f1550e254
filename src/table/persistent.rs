//! Persistent Table
//!
//! The on-disk record store for one type.
//!
//! ## Write Path
//! Every mutation encodes and validates first, appends one frame to the file,
//! and only then updates the in-memory records and valid-index set. A failed
//! write leaves both the file and memory as they were; if the file cannot be
//! cut back, the writer refuses further appends until the table is reopened.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::codec;
use crate::config::TableOptions;
use crate::error::{AutoDbError, Result};
use crate::model::{Object, Schema};

use super::format::TableMeta;
use super::{Filter, Record, RecoveryReport, TableRecovery, TableWriter, ValidIndexSet};

/// One type's table, backed by one file
///
/// ## Concurrency
/// Mutations take `&mut self`; the table holds no locks and must not be
/// opened twice, in one process or several.
pub struct PersistentTable {
    /// Backing file path
    path: PathBuf,

    /// Type identifier, fixed at creation
    type_id: String,

    /// Attribute schema, fixed at creation
    schema: Schema,

    /// All records in slot order (slot == position), tombstoned included
    records: Vec<Record>,

    /// Cached live slots
    valid: ValidIndexSet,

    /// Appends frames to `path`
    writer: TableWriter,

    options: TableOptions,

    /// What the last load found (default for new tables)
    report: RecoveryReport,
}

/// Outcome of a filtered scan: matches plus per-record diagnostics
#[derive(Debug, Default)]
pub struct Scan {
    /// Matching live objects in slot order
    pub objects: Vec<Object>,
    /// `CorruptRecord` errors for live records that could not be decoded
    pub corrupt: Vec<AutoDbError>,
}

impl PersistentTable {
    /// Create an empty table file for `type_id` at `path`
    ///
    /// The file exists on disk when this returns. An existing file at `path`
    /// is replaced.
    pub fn new(path: &Path, type_id: impl Into<String>, schema: Schema) -> Result<Self> {
        Self::new_with_options(path, type_id, schema, TableOptions::default())
    }

    pub fn new_with_options(
        path: &Path,
        type_id: impl Into<String>,
        schema: Schema,
        options: TableOptions,
    ) -> Result<Self> {
        let meta = TableMeta {
            type_id: type_id.into(),
            schema,
        };
        if meta.type_id.is_empty() {
            return Err(AutoDbError::InvalidSchema(
                "type identifier must not be empty".to_string(),
            ));
        }

        let writer = TableWriter::create(path, &meta, options)?;
        info!("Created table '{}' at {}", meta.type_id, path.display());

        Ok(Self {
            path: path.to_path_buf(),
            type_id: meta.type_id,
            schema: meta.schema,
            records: Vec::new(),
            valid: ValidIndexSet::new(),
            writer,
            options,
            report: RecoveryReport::default(),
        })
    }

    /// Load a table from an existing file
    ///
    /// Fails with `DatabaseNotFound` if the file is missing and `CorruptFile`
    /// if its header is unreadable. A torn tail is truncated.
    pub fn from_file(path: &Path) -> Result<Self> {
        Self::from_file_with_options(path, TableOptions::default())
    }

    pub fn from_file_with_options(path: &Path, options: TableOptions) -> Result<Self> {
        let loaded = TableRecovery::recover(path, options.max_record_size)?;
        let writer = TableWriter::open(path, loaded.valid_len, options)?;
        let valid = ValidIndexSet::from_records(&loaded.records);

        info!(
            "Loaded table '{}' from {}: {} live of {} records",
            loaded.meta.type_id,
            path.display(),
            valid.len(),
            loaded.records.len()
        );

        Ok(Self {
            path: path.to_path_buf(),
            type_id: loaded.meta.type_id,
            schema: loaded.meta.schema,
            records: loaded.records,
            valid,
            writer,
            options,
            report: loaded.report,
        })
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Append one object as a new live record
    pub fn insert(&mut self, object: &Object) -> Result<()> {
        let payload = self.encode(object)?;
        let slot = self.next_slot();

        self.writer.append_records(slot, std::slice::from_ref(&payload))?;
        self.push_record(slot, payload);

        debug!("Inserted '{}' record at slot {}", self.type_id, slot);
        Ok(())
    }

    /// Append objects as consecutive records with a single frame
    ///
    /// All objects are validated and encoded before anything is written: on
    /// `SchemaMismatch` (or any encode error) the table is unchanged. An empty
    /// batch is a no-op.
    pub fn batch_insert(&mut self, objects: &[Object]) -> Result<()> {
        if objects.is_empty() {
            return Ok(());
        }

        if let Some(other) = objects.iter().find(|o| o.type_id() != self.type_id) {
            return Err(AutoDbError::SchemaMismatch(format!(
                "batch for table '{}' contains an object of type '{}'",
                self.type_id,
                other.type_id()
            )));
        }

        let payloads = objects
            .iter()
            .map(|o| self.encode(o))
            .collect::<Result<Vec<_>>>()?;

        let first_slot = self.next_slot();
        self.writer.append_records(first_slot, &payloads)?;
        for (offset, payload) in payloads.into_iter().enumerate() {
            self.push_record(first_slot + offset as u64, payload);
        }

        debug!(
            "Batch inserted {} '{}' records at slots {}..{}",
            objects.len(),
            self.type_id,
            first_slot,
            self.next_slot()
        );
        Ok(())
    }

    /// Tombstone every live record matching `filter`
    ///
    /// Returns the number of records deleted. No matches is not an error.
    pub fn delete(&mut self, filter: &Filter) -> Result<usize> {
        filter.validate(&self.schema, &self.type_id)?;

        let slots: Vec<u64> = self
            .live_matches(filter, &mut Vec::new())
            .into_iter()
            .map(|(slot, _)| slot)
            .collect();
        if slots.is_empty() {
            return Ok(0);
        }

        self.writer.append_tombstones(&slots)?;
        for &slot in &slots {
            if let Some(record) = self.records.get_mut(slot as usize) {
                record.tombstone();
            }
            self.valid.remove(slot);
        }

        debug!("Deleted {} '{}' records", slots.len(), self.type_id);
        Ok(slots.len())
    }

    /// Force all appended frames to disk
    pub fn sync(&mut self) -> Result<()> {
        self.writer.sync()
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Live objects matching `filter`, in slot (insertion) order
    ///
    /// Fails with `UnknownAttribute` if the filter names an attribute outside
    /// the schema. Records that cannot be decoded are skipped and logged; use
    /// [`scan`](Self::scan) to collect them.
    pub fn retrieve(&self, filter: &Filter) -> Result<Vec<Object>> {
        Ok(self.scan(filter)?.objects)
    }

    /// Like [`retrieve`](Self::retrieve), also returning decode failures
    pub fn scan(&self, filter: &Filter) -> Result<Scan> {
        filter.validate(&self.schema, &self.type_id)?;

        let mut corrupt = Vec::new();
        let objects = self
            .live_matches(filter, &mut corrupt)
            .into_iter()
            .map(|(_, object)| object)
            .collect();

        Ok(Scan { objects, corrupt })
    }

    /// Lazy iterator over all live objects in slot order
    ///
    /// A record that cannot be decoded yields its `CorruptRecord` error and
    /// iteration continues. Call again to restart.
    pub fn retrieve_all(&self) -> RetrieveAll<'_> {
        RetrieveAll {
            records: self.records.iter(),
            schema: &self.schema,
            type_id: &self.type_id,
        }
    }

    /// Live slot indexes in ascending order
    pub fn retrieve_valid_indexes(&self) -> Vec<u64> {
        self.valid.to_vec()
    }

    /// Number of live records
    pub fn len(&self) -> usize {
        self.valid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.valid.is_empty()
    }

    /// Every record ever inserted, tombstoned ones included
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Total slots assigned so far
    pub fn slot_count(&self) -> u64 {
        self.records.len() as u64
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn type_id(&self) -> &str {
        &self.type_id
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// What recovery found when this table was loaded
    pub fn recovery_report(&self) -> &RecoveryReport {
        &self.report
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn next_slot(&self) -> u64 {
        self.records.len() as u64
    }

    fn push_record(&mut self, slot: u64, payload: Vec<u8>) {
        self.records.push(Record::new(slot, payload));
        self.valid.insert(slot);
    }

    fn encode(&self, object: &Object) -> Result<Vec<u8>> {
        if object.type_id() != self.type_id {
            return Err(AutoDbError::SchemaMismatch(format!(
                "table '{}' cannot store an object of type '{}'",
                self.type_id,
                object.type_id()
            )));
        }

        let payload = codec::encode(object, &self.schema)?;
        if payload.len() > self.options.max_record_size {
            return Err(AutoDbError::RecordTooLarge {
                size: payload.len(),
                max: self.options.max_record_size,
            });
        }
        Ok(payload)
    }

    /// Decode live records and keep those matching `filter`
    fn live_matches(&self, filter: &Filter, corrupt: &mut Vec<AutoDbError>) -> Vec<(u64, Object)> {
        let mut matches = Vec::new();
        for slot in self.valid.iter() {
            let Some(record) = self.records.get(slot as usize) else {
                continue;
            };
            match record.decode(&self.schema, &self.type_id) {
                Ok(object) if filter.matches(&object) => matches.push((slot, object)),
                Ok(_) => {}
                Err(e) => {
                    warn!("Skipping unreadable '{}' record: {}", self.type_id, e);
                    corrupt.push(e);
                }
            }
        }
        matches
    }
}

/// Iterator returned by [`PersistentTable::retrieve_all`]
#[derive(Clone)]
pub struct RetrieveAll<'a> {
    records: std::slice::Iter<'a, Record>,
    schema: &'a Schema,
    type_id: &'a str,
}

impl<'a> Iterator for RetrieveAll<'a> {
    type Item = Result<Object>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.records.by_ref().find(|r| r.is_live())?;
        Some(record.decode(self.schema, self.type_id))
    }
}

