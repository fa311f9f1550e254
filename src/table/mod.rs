//! Table Module
//!
//! The persistent table engine: one append-only file per stored type.
//!
//! ## Responsibilities
//! - Create table files atomically (temp file + rename)
//! - Append inserted records and tombstones as checksummed frames
//! - Rebuild records and the valid-index set on load
//! - Recover from torn writes by truncating the damaged tail
//! - Filtered retrieval and logical deletion
//!
//! ## File Format
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │ File Header (14 bytes + meta)                                  │
//! │   Magic: "ADBT" (4) | Version: u16 (2) | MetaLen: u32 (4)      │
//! │   MetaCRC: u32 (4)  | Meta: bincode(type_id, schema)           │
//! ├────────────────────────────────────────────────────────────────┤
//! │ Frame (repeated, append-only)                                  │
//! │   HeaderCRC: u32 (4) | Kind: u8 (1) | FirstSlot: u64 (8)       │
//! │   Count: u32 (4)     | BodyLen: u32 (4)                        │
//! │   Body:                                                        │
//! │     APPEND    [PayloadLen: u32][PayloadCRC: u32][Payload] × N  │
//! │     TOMBSTONE [BodyCRC: u32][Slot: u64] × N                    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A single insert is an APPEND frame with one payload; a batch insert is one
//! APPEND frame for the whole batch. Tombstoned records keep their bytes.

mod filter;
mod format;
mod persistent;
mod record;
mod recovery;
mod valid_index;
mod writer;

pub use filter::Filter;
pub use format::TableMeta;
pub use persistent::{PersistentTable, RetrieveAll, Scan};
pub use record::{Record, RecordState};
pub use recovery::{LoadedTable, RecoveryReport, TableRecovery};
pub use valid_index::ValidIndexSet;
pub use writer::TableWriter;

use std::path::Path;

/// File extension of table files
pub const TABLE_EXTENSION: &str = "adbt";

/// Extension of in-progress table files awaiting an atomic rename
pub const TEMP_EXTENSION: &str = "tmp";

/// True for `*.adbt` files
pub fn is_table_file(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(TABLE_EXTENSION)
}

/// True for `*.adbt.tmp` files left by an interrupted table creation
pub fn is_temp_table_file(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(TEMP_EXTENSION)
        && path.file_stem().map_or(false, |stem| is_table_file(Path::new(stem)))
}
