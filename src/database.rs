//! Database Module
//!
//! The type directory: routes each operation to the table of its type.
//!
//! ## Responsibilities
//! - Discover table files on startup, loading each one independently
//! - Create a table on the first insert of a new type
//! - Keep a record of files that failed to load, so lookups can tell
//!   "never stored" apart from "stored but unreadable"
//!
//! ## Directory Layout
//! ```text
//! {data_dir}/
//!   ├── 506f696e74.adbt     (type "Point": hex of the type id)
//!   └── 506572736f6e.adbt   (type "Person")
//! ```
//! The name is only a hint. Each file's header carries its type id and
//! schema, and the header is what routing uses. When the default name is
//! already taken (say a file was renamed by hand), a new table gets
//! `{hex}.{n}.adbt` instead; existing files are never replaced.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{AutoDbError, Result};
use crate::model::{Object, Persist, Schema};
use crate::table::{is_table_file, is_temp_table_file, Filter, PersistentTable, TABLE_EXTENSION};

/// A table file that could not be loaded during [`Database::open`]
#[derive(Debug)]
pub struct LoadFailure {
    /// Path of the table file
    pub path: PathBuf,

    /// Type id decoded from the file name, if the name is well-formed
    pub type_hint: Option<String>,

    /// Why the load failed
    pub error: AutoDbError,
}

/// A directory of persistent tables, one per stored type
pub struct Database {
    /// Database configuration
    config: Config,

    /// Loaded tables keyed by type id
    tables: BTreeMap<String, PersistentTable>,

    /// Files found on startup that could not be loaded
    failures: Vec<LoadFailure>,
}

impl Database {
    /// Open or create a database with the given config
    ///
    /// On startup:
    /// 1. Create the data directory if it doesn't exist
    /// 2. Remove leftover `*.adbt.tmp` files from interrupted table creation
    ///    (other files in the directory are left alone)
    /// 3. Load every table file; a file that fails is recorded in
    ///    [`load_failures`](Self::load_failures) and never affects the others
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&config.data_dir)?;

        let mut table_files = Vec::new();
        for entry in fs::read_dir(&config.data_dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            if is_table_file(&path) {
                table_files.push(path);
            } else if is_temp_table_file(&path) {
                warn!("Removing stale temp file {}", path.display());
                if let Err(e) = fs::remove_file(&path) {
                    warn!("Failed to remove {}: {}", path.display(), e);
                }
            } else {
                debug!("Ignoring non-table file {}", path.display());
            }
        }
        table_files.sort();

        let mut db = Self {
            config,
            tables: BTreeMap::new(),
            failures: Vec::new(),
        };
        for path in table_files {
            db.load_table(path);
        }

        info!(
            "Opened database at {}: {} tables loaded, {} failed",
            db.config.data_dir.display(),
            db.tables.len(),
            db.failures.len()
        );

        Ok(db)
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).build())
    }

    // =========================================================================
    // Inserts
    // =========================================================================

    /// Insert a typed item, creating its table on first use
    pub fn insert<T: Persist>(&mut self, item: &T) -> Result<()> {
        let object = item.to_object();
        self.table_or_create(T::TYPE_ID, T::schema)?.insert(&object)
    }

    /// Insert a dynamic object
    ///
    /// A new table takes its schema from the object's attribute names.
    pub fn insert_object(&mut self, object: &Object) -> Result<()> {
        self.table_or_create(object.type_id(), || {
            Schema::from_attributes(object.attributes())
        })?
        .insert(object)
    }

    /// Insert typed items with one write
    pub fn batch_insert<T: Persist>(&mut self, items: &[T]) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        let objects: Vec<Object> = items.iter().map(T::to_object).collect();
        self.table_or_create(T::TYPE_ID, T::schema)?
            .batch_insert(&objects)
    }

    /// Insert dynamic objects with one write
    ///
    /// All objects must share one type, otherwise `SchemaMismatch` is returned
    /// and nothing is written (no table is created either).
    pub fn batch_insert_objects(&mut self, objects: &[Object]) -> Result<()> {
        let Some(first) = objects.first() else {
            return Ok(());
        };
        if let Some(other) = objects.iter().find(|o| o.type_id() != first.type_id()) {
            return Err(AutoDbError::SchemaMismatch(format!(
                "batch mixes types '{}' and '{}'",
                first.type_id(),
                other.type_id()
            )));
        }

        self.table_or_create(first.type_id(), || {
            Schema::from_attributes(first.attributes())
        })?
        .batch_insert(objects)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Live items of type `T` matching `filter`
    ///
    /// `DatabaseNotFound` if nothing of this type was ever stored,
    /// `CorruptFile` if its table file could not be loaded.
    pub fn retrieve<T: Persist>(&self, filter: &Filter) -> Result<Vec<T>> {
        self.select(T::TYPE_ID)?
            .retrieve(filter)?
            .into_iter()
            .map(T::from_object)
            .collect()
    }

    /// Live objects of `type_id` matching `filter`
    pub fn retrieve_objects(&self, type_id: &str, filter: &Filter) -> Result<Vec<Object>> {
        self.select(type_id)?.retrieve(filter)
    }

    /// Live objects of every type whose schema has all the filter's attributes
    ///
    /// Tables are visited in type id order.
    pub fn retrieve_any(&self, filter: &Filter) -> Result<Vec<Object>> {
        let mut results = Vec::new();
        for table in self.tables.values() {
            if filter.applies_to(table.schema()) {
                results.extend(table.retrieve(filter)?);
            }
        }
        Ok(results)
    }

    /// The table storing `type_id`
    pub fn select(&self, type_id: &str) -> Result<&PersistentTable> {
        self.tables
            .get(type_id)
            .ok_or_else(|| self.missing_table(type_id))
    }

    // =========================================================================
    // Deletes
    // =========================================================================

    /// Tombstone live items of type `T` matching `filter`, returning the count
    pub fn delete<T: Persist>(&mut self, filter: &Filter) -> Result<usize> {
        self.delete_objects(T::TYPE_ID, filter)
    }

    pub fn delete_objects(&mut self, type_id: &str, filter: &Filter) -> Result<usize> {
        if let Some(table) = self.tables.get_mut(type_id) {
            return table.delete(filter);
        }
        Err(self.missing_table(type_id))
    }

    /// Remove every table file and forget all tables
    pub fn clear(&mut self) -> Result<()> {
        // Drop writers before their files go away
        self.tables.clear();
        self.failures.clear();

        for entry in fs::read_dir(&self.config.data_dir)? {
            let path = entry?.path();
            if path.is_file() && (is_table_file(&path) || is_temp_table_file(&path)) {
                fs::remove_file(&path)?;
            }
        }

        info!("Cleared database at {}", self.config.data_dir.display());
        Ok(())
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Force every table's appended frames to disk
    pub fn sync(&mut self) -> Result<()> {
        for table in self.tables.values_mut() {
            table.sync()?;
        }
        Ok(())
    }

    /// Sync and close the database
    pub fn close(mut self) -> Result<()> {
        self.sync()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Type ids of all loaded tables, in order
    pub fn table_types(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(|k| k.as_str())
    }

    pub fn tables(&self) -> impl Iterator<Item = &PersistentTable> {
        self.tables.values()
    }

    /// Number of live objects across all tables
    pub fn len(&self) -> usize {
        self.tables.values().map(PersistentTable::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Files that failed to load on open
    pub fn load_failures(&self) -> &[LoadFailure] {
        &self.failures
    }

    pub fn directory(&self) -> &Path {
        &self.config.data_dir
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Where the table file for `type_id` lives (or would be created)
    pub fn table_path(&self, type_id: &str) -> PathBuf {
        match self.tables.get(type_id) {
            Some(table) => table.path().to_path_buf(),
            None => table_path_in(&self.config.data_dir, type_id),
        }
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn load_table(&mut self, path: PathBuf) {
        let type_hint = type_id_from_path(&path);

        let table = match PersistentTable::from_file_with_options(&path, self.config.table_options()) {
            Ok(table) => table,
            Err(error) => {
                warn!("Failed to load table file {}: {}", path.display(), error);
                self.failures.push(LoadFailure {
                    path,
                    type_hint,
                    error,
                });
                return;
            }
        };

        let type_id = table.type_id().to_string();
        if type_hint.as_deref() != Some(type_id.as_str()) {
            warn!(
                "Table file {} holds type '{}' but is not named for it",
                path.display(),
                type_id
            );
        }

        if self.tables.contains_key(&type_id) {
            self.failures.push(LoadFailure {
                path,
                type_hint: Some(type_id.clone()),
                error: AutoDbError::SchemaMismatch(format!(
                    "type '{}' is already loaded from another file",
                    type_id
                )),
            });
            return;
        }

        self.tables.insert(type_id, table);
    }

    /// Get the table for `type_id`, creating an empty one if needed
    ///
    /// Refuses to create a table over a file that failed to load.
    fn table_or_create<F>(&mut self, type_id: &str, schema: F) -> Result<&mut PersistentTable>
    where
        F: FnOnce() -> Result<Schema>,
    {
        if !self.tables.contains_key(type_id) {
            if self.failure_for(type_id).is_some() {
                return Err(self.missing_table(type_id));
            }

            let table = PersistentTable::new_with_options(
                &self.free_table_path(type_id),
                type_id,
                schema()?,
                self.config.table_options(),
            )?;
            self.tables.insert(type_id.to_string(), table);
        }

        let path = self.table_path(type_id);
        self.tables
            .get_mut(type_id)
            .ok_or(AutoDbError::DatabaseNotFound { path })
    }

    /// A path for a new `type_id` table that no file or table already uses
    fn free_table_path(&self, type_id: &str) -> PathBuf {
        let dir = &self.config.data_dir;
        let mut path = table_path_in(dir, type_id);
        let mut n = 0u32;
        while self.path_taken(&path) {
            n += 1;
            path = numbered_table_path_in(dir, type_id, n);
        }
        if n > 0 {
            warn!(
                "Default file for type '{}' is taken, using {}",
                type_id,
                path.display()
            );
        }
        path
    }

    fn path_taken(&self, path: &Path) -> bool {
        path.exists()
            || self.tables.values().any(|t| t.path() == path)
            || self.failures.iter().any(|f| f.path == path)
    }

    fn failure_for(&self, type_id: &str) -> Option<&LoadFailure> {
        self.failures
            .iter()
            .find(|f| f.type_hint.as_deref() == Some(type_id))
    }

    /// Error for a type with no loaded table
    fn missing_table(&self, type_id: &str) -> AutoDbError {
        match self.failure_for(type_id) {
            Some(failure) => AutoDbError::CorruptFile {
                path: failure.path.clone(),
                reason: failure.error.to_string(),
            },
            None => AutoDbError::DatabaseNotFound {
                path: self.table_path(type_id),
            },
        }
    }
}

// =============================================================================
// File Naming
// =============================================================================

/// `{dir}/{hex(type_id)}.adbt`
fn table_path_in(dir: &Path, type_id: &str) -> PathBuf {
    let hex: String = type_id.bytes().map(|b| format!("{:02x}", b)).collect();
    dir.join(format!("{}.{}", hex, TABLE_EXTENSION))
}

/// `{dir}/{hex(type_id)}.{n}.adbt`, used when the default name is taken
fn numbered_table_path_in(dir: &Path, type_id: &str, n: u32) -> PathBuf {
    let hex: String = type_id.bytes().map(|b| format!("{:02x}", b)).collect();
    dir.join(format!("{}.{}.{}", hex, n, TABLE_EXTENSION))
}

/// Invert [`table_path_in`]: "506f696e74.adbt" (or "506f696e74.1.adbt") → Some("Point")
fn type_id_from_path(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let stem = stem.split('.').next()?;
    if stem.is_empty() || stem.len() % 2 != 0 {
        return None;
    }
    let bytes = (0..stem.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(stem.get(i..i + 2)?, 16).ok())
        .collect::<Option<Vec<u8>>>()?;
    String::from_utf8(bytes).ok()
}

