//! Table Recovery
//!
//! Rebuilds a table's records from its file and detects damage.
//!
//! ## Recovery Rules
//! - Unreadable file header: the whole table is unusable (`CorruptFile`)
//! - Torn or unreadable frame header, short body, out-of-order slots: the file
//!   ends at the previous frame; the rest is the damaged tail
//! - Bad payload checksum inside an APPEND frame: only that record is damaged;
//!   it keeps its slot and reads fail with `CorruptRecord`
//! - Bad TOMBSTONE body checksum: the frame is skipped

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use bytes::Buf;
use tracing::{debug, warn};

use crate::error::{AutoDbError, Result};

use super::format::{
    decode_file_header, decode_frame_header, FrameKind, TableMeta, FRAME_HEADER_SIZE,
    PAYLOAD_PREFIX_SIZE,
};
use super::{is_table_file, Record};

/// Everything recovered from a table file
#[derive(Debug)]
pub struct LoadedTable {
    pub meta: TableMeta,
    /// All records, tombstoned ones included, in slot order
    pub records: Vec<Record>,
    /// File length up to the end of the last good frame
    pub valid_len: u64,
    pub report: RecoveryReport,
}

/// Result of a recovery scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Frames applied to the table state
    pub frames_applied: u64,

    /// Records recovered (live or tombstoned, damaged included)
    pub records_recovered: u64,

    /// Records whose payload failed its checksum
    pub damaged_records: u64,

    /// Frames skipped because their body was unreadable
    pub frames_skipped: u64,

    /// Bytes after the last good frame (torn write or damaged tail)
    pub bytes_truncated: u64,
}

impl RecoveryReport {
    pub fn was_truncated(&self) -> bool {
        self.bytes_truncated > 0
    }

    pub fn is_clean(&self) -> bool {
        self.bytes_truncated == 0 && self.damaged_records == 0 && self.frames_skipped == 0
    }
}

/// Handles table file recovery
pub struct TableRecovery;

impl TableRecovery {
    /// Recover a table from its file
    ///
    /// Does not modify the file; the caller truncates to `valid_len` when it
    /// opens the file for writing.
    pub fn recover(path: &Path, max_record_size: usize) -> Result<LoadedTable> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(AutoDbError::DatabaseNotFound {
                    path: path.to_path_buf(),
                })
            }
            Err(e) => return Err(e.into()),
        };

        let loaded = Self::scan(path, &bytes, max_record_size)?;

        if loaded.report.is_clean() {
            debug!(
                "Recovered {} records ({} frames) from {}",
                loaded.report.records_recovered,
                loaded.report.frames_applied,
                path.display()
            );
        } else {
            warn!(
                "Recovered {} from damaged file: {} records, {} damaged, {} frames skipped, {} bytes truncated",
                path.display(),
                loaded.report.records_recovered,
                loaded.report.damaged_records,
                loaded.report.frames_skipped,
                loaded.report.bytes_truncated
            );
        }

        Ok(loaded)
    }

    /// Verify integrity of a table file without modifying it
    pub fn verify(path: &Path, max_record_size: usize) -> Result<RecoveryReport> {
        Self::recover(path, max_record_size).map(|loaded| loaded.report)
    }

    /// Recover every `*.adbt` file in `dir`, in file name order
    ///
    /// Read-only: torn tails and stale temp files are reported, never removed.
    /// Each file gets its own result, so one unreadable file does not hide
    /// the others.
    pub fn recover_dir(
        dir: &Path,
        max_record_size: usize,
    ) -> Result<Vec<(PathBuf, Result<LoadedTable>)>> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && is_table_file(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        Ok(paths
            .into_iter()
            .map(|path| {
                let loaded = Self::recover(&path, max_record_size);
                (path, loaded)
            })
            .collect())
    }

    /// Parse table file bytes
    fn scan(path: &Path, bytes: &[u8], max_record_size: usize) -> Result<LoadedTable> {
        let (meta, header_len) =
            decode_file_header(bytes).map_err(|reason| AutoDbError::CorruptFile {
                path: path.to_path_buf(),
                reason,
            })?;

        let mut records: Vec<Record> = Vec::new();
        let mut report = RecoveryReport::default();
        let mut pos = header_len;

        while pos < bytes.len() {
            let Some(header) = decode_frame_header(&bytes[pos..]) else {
                debug!("Unreadable frame header at offset {} in {}", pos, path.display());
                break;
            };

            let body_start = pos + FRAME_HEADER_SIZE;
            let body_end = body_start + header.body_len as usize;
            if body_end > bytes.len() {
                debug!("Short frame body at offset {} in {}", pos, path.display());
                break;
            }
            let body = &bytes[body_start..body_end];

            match header.kind {
                FrameKind::Append => {
                    if header.first_slot != records.len() as u64 {
                        warn!(
                            "Frame at offset {} starts at slot {}, expected {}",
                            pos,
                            header.first_slot,
                            records.len()
                        );
                        break;
                    }
                    if header.count as usize * PAYLOAD_PREFIX_SIZE > body.len() {
                        warn!("Malformed append frame at offset {}", pos);
                        break;
                    }
                    let appended =
                        parse_append_body(body, header.first_slot, header.count, max_record_size);
                    report.damaged_records +=
                        appended.iter().filter(|r| !r.is_intact()).count() as u64;
                    report.records_recovered += appended.len() as u64;
                    records.extend(appended);
                }
                FrameKind::Tombstone => {
                    if header.body_len as usize != 4 + 8 * header.count as usize {
                        warn!("Malformed tombstone frame at offset {}", pos);
                        break;
                    }
                    match parse_tombstone_body(body) {
                        Some(slots) => {
                            for slot in slots {
                                match records.get_mut(slot as usize) {
                                    Some(record) => record.tombstone(),
                                    None => warn!(
                                        "Tombstone for unknown slot {} in {}",
                                        slot,
                                        path.display()
                                    ),
                                }
                            }
                        }
                        None => {
                            warn!(
                                "Skipping tombstone frame with bad checksum at offset {} in {}",
                                pos,
                                path.display()
                            );
                            report.frames_skipped += 1;
                            pos = body_end;
                            continue;
                        }
                    }
                }
            }

            report.frames_applied += 1;
            pos = body_end;
        }

        report.bytes_truncated = (bytes.len() - pos) as u64;

        Ok(LoadedTable {
            meta,
            records,
            valid_len: pos as u64,
            report,
        })
    }
}

/// Split an APPEND body into records, checking each payload's checksum
///
/// A length that overruns the body marks the remaining records of the frame
/// as damaged; their slots still exist. A payload over `max_record_size` is
/// skipped and only its own record is damaged.
fn parse_append_body(
    body: &[u8],
    first_slot: u64,
    count: u32,
    max_record_size: usize,
) -> Vec<Record> {
    let mut records =
        Vec::with_capacity((count as usize).min(body.len() / PAYLOAD_PREFIX_SIZE + 1));
    let mut buf = body;

    for i in 0..count as u64 {
        let slot = first_slot + i;

        if buf.remaining() < PAYLOAD_PREFIX_SIZE {
            records.push(Record::damaged(slot, Vec::new()));
            continue;
        }
        let len = buf.get_u32_le() as usize;
        let crc = buf.get_u32_le();

        if len > buf.remaining() {
            // Framing inside this body is lost from here on
            buf = &[];
            records.push(Record::damaged(slot, Vec::new()));
            continue;
        }

        let (payload, rest) = buf.split_at(len);
        buf = rest;

        if len > max_record_size {
            records.push(Record::damaged(slot, Vec::new()));
            continue;
        }

        if crc32fast::hash(payload) == crc {
            records.push(Record::new(slot, payload.to_vec()));
        } else {
            records.push(Record::damaged(slot, payload.to_vec()));
        }
    }

    records
}

/// Slots of a TOMBSTONE body, or `None` on checksum mismatch
fn parse_tombstone_body(body: &[u8]) -> Option<Vec<u64>> {
    let mut buf = body;
    let crc = buf.get_u32_le();
    if crc32fast::hash(buf) != crc {
        return None;
    }

    let mut slots = Vec::with_capacity(buf.len() / 8);
    while buf.remaining() >= 8 {
        slots.push(buf.get_u64_le());
    }
    Some(slots)
}
