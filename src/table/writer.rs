//! Table Writer
//!
//! Appends frames to a table file and applies the sync strategy.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::{SyncStrategy, TableOptions};
use crate::error::Result;

use super::format::{encode_append_frame, encode_file_header, encode_tombstone_frame, TableMeta};
use super::TEMP_EXTENSION;

/// Appends frames to one table file
///
/// Every append is all-or-nothing from the file's point of view: if the write
/// or its fsync fails, the file is cut back to its previous length. If even
/// that fails the writer refuses further appends, since the file may hold a
/// frame the caller never saw succeed.
pub struct TableWriter {
    /// Table file path
    path: PathBuf,
    /// File handle opened for append
    file: File,
    /// Length of the file up to the last complete frame
    len: u64,
    sync_strategy: SyncStrategy,
    /// Frames written since the last fsync
    unsynced: usize,
    /// Set when a failed frame could not be rolled back
    poisoned: bool,
}

impl TableWriter {
    /// Create a new table file containing only the header
    ///
    /// The header is written to `<path>.tmp`, synced, then renamed over
    /// `path`, so a crash never leaves a half-written header behind.
    pub fn create(path: &Path, meta: &TableMeta, options: TableOptions) -> Result<Self> {
        let header = encode_file_header(meta)?;
        let temp_path = temp_path_for(path);

        {
            let mut temp = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&temp_path)?;
            temp.write_all(&header)?;
            temp.sync_all()?;
        }

        if let Err(e) = fs::rename(&temp_path, path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }
        sync_parent_dir(path);

        debug!("Created table file {} for type '{}'", path.display(), meta.type_id);
        Self::open(path, header.len() as u64, options)
    }

    /// Open an existing table file for appending after `len` valid bytes
    ///
    /// Anything past `len` (a torn frame found by recovery) is truncated.
    pub fn open(path: &Path, len: u64, options: TableOptions) -> Result<Self> {
        let file = OpenOptions::new().append(true).open(path)?;

        let on_disk = file.metadata()?.len();
        if on_disk > len {
            warn!(
                "Truncating {} torn bytes from {}",
                on_disk - len,
                path.display()
            );
            file.set_len(len)?;
            file.sync_all()?;
        }

        Ok(Self {
            path: path.to_path_buf(),
            file,
            len,
            sync_strategy: options.sync_strategy,
            unsynced: 0,
            poisoned: false,
        })
    }

    /// Append one frame holding `payloads` at consecutive slots from `first_slot`
    pub fn append_records(&mut self, first_slot: u64, payloads: &[Vec<u8>]) -> Result<()> {
        let frame = encode_append_frame(first_slot, payloads)?;
        self.write_frame(&frame)
    }

    /// Append one frame tombstoning `slots`
    pub fn append_tombstones(&mut self, slots: &[u64]) -> Result<()> {
        let frame = encode_tombstone_frame(slots)?;
        self.write_frame(&frame)
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_data()?;
        self.unsynced = 0;
        Ok(())
    }

    /// Length of the file up to the last complete frame
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        if self.poisoned {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!(
                    "{} has an unrecoverable partial frame; reopen the table",
                    self.path.display()
                ),
            )
            .into());
        }

        if let Err(e) = self.file.write_all(frame).and_then(|_| self.file.flush()) {
            self.roll_back();
            return Err(e.into());
        }

        let should_sync = match self.sync_strategy {
            SyncStrategy::EveryWrite => true,
            SyncStrategy::EveryNEntries { count } => self.unsynced + 1 >= count,
        };
        if should_sync {
            if let Err(e) = self.file.sync_data() {
                self.roll_back();
                return Err(e.into());
            }
            self.unsynced = 0;
        } else {
            self.unsynced += 1;
        }

        self.len += frame.len() as u64;
        Ok(())
    }

    /// Cut the file back to the last committed frame
    fn roll_back(&mut self) {
        if let Err(e) = self.file.set_len(self.len) {
            warn!(
                "Failed to roll back partial frame in {}: {}",
                self.path.display(),
                e
            );
            self.poisoned = true;
        }
    }
}

impl Drop for TableWriter {
    fn drop(&mut self) {
        if self.unsynced > 0 {
            if let Err(e) = self.file.sync_data() {
                warn!("Failed to sync {} on drop: {}", self.path.display(), e);
            }
        }
    }
}

/// `<path>.tmp`, keeping the original extension in the name
fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(TEMP_EXTENSION);
    PathBuf::from(name)
}

fn sync_parent_dir(path: &Path) {
    // Directory fsync makes the rename durable; not supported everywhere
    if let Some(parent) = path.parent() {
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }
}
