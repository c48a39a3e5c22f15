//! Index build: one sequential, header-only pass over the log.
//!
//! The scan never decodes payloads. It records one [`IndexEntry`] per
//! record and stops at the first undecodable header (`CorruptLog`, the partial
//! index is dropped) or at a final record cut short by the end of the file
//! (tolerated, reported in [`ScanStats::truncated_tail_bytes`]).

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use memmap2::Mmap;

use crate::error::{LsfError, Result};
use crate::index::entry::IndexEntry;
use crate::index::names::NameTable;
use crate::index::{LogIndex, DEFAULT_SEEK_SCAN_LIMIT};
use crate::schema::catalog::TypeSystemCatalog;
use crate::schema::types::MessageKind;
use crate::wire::decoder::decode_header;
use crate::wire::header::HEADER_SIZE;

// ── Log Bytes ──────────────────────────────────────────────────────

/// Read-only bytes of the log: memory-mapped from disk or owned.
pub(crate) enum LogData {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl LogData {
    /// Map the log at `path`. Empty files are not mapped.
    pub(crate) fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        if len == 0 {
            return Ok(LogData::Owned(Vec::new()));
        }
        advise_sequential(&file, len);
        let mmap = unsafe { Mmap::map(&file) }?;
        Ok(LogData::Mapped(mmap))
    }

    #[inline]
    pub(crate) fn bytes(&self) -> &[u8] {
        match self {
            LogData::Mapped(mmap) => mmap,
            LogData::Owned(bytes) => bytes,
        }
    }
}

#[cfg(target_os = "linux")]
fn advise_sequential(file: &File, len: u64) {
    use std::os::unix::io::AsRawFd;

    let rc = unsafe {
        libc::posix_fadvise(
            file.as_raw_fd(),
            0,
            len as libc::off_t,
            libc::POSIX_FADV_SEQUENTIAL,
        )
    };
    if rc != 0 {
        tracing::debug!("posix_fadvise(SEQUENTIAL) failed: {}", rc);
    }
}

#[cfg(not(target_os = "linux"))]
fn advise_sequential(_file: &File, _len: u64) {}

// ── Scan Statistics ────────────────────────────────────────────────

/// Summary of what the index build saw.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanStats {
    /// Records indexed, including those of unknown type.
    pub records: usize,
    /// Records whose type id has no definition in the catalog.
    pub unknown_type_records: usize,
    /// Distinct unknown type ids with their record counts.
    pub unknown_type_ids: BTreeMap<u16, usize>,
    /// Records whose timestamp is earlier than the previous record of the
    /// same type.
    pub out_of_order_records: usize,
    /// Bytes after the last complete record.
    pub truncated_tail_bytes: u64,
    pub log_len: u64,
}

// ── Scan ───────────────────────────────────────────────────────────

/// Header-only scan of `bytes`.
pub fn scan(bytes: &[u8]) -> Result<Vec<IndexEntry>> {
    let mut entries = Vec::new();
    let mut offset = 0usize;

    while offset < bytes.len() {
        let remaining = bytes.len() - offset;
        if remaining < HEADER_SIZE {
            tracing::warn!(
                "log ends inside a record header at byte {} ({} bytes dropped)",
                offset,
                remaining
            );
            break;
        }

        let header = decode_header(bytes, offset)?;
        let len = header.record_len();
        if len > remaining {
            tracing::warn!(
                "final record at byte {} is truncated ({} of {} bytes present), dropping it",
                offset,
                remaining,
                len
            );
            break;
        }

        entries.push(IndexEntry::from_header(offset, &header));
        offset += len;
    }

    if entries.len() > u32::MAX as usize {
        return Err(LsfError::corrupt(
            offset,
            format!("{} records exceed the index limit", entries.len()),
        ));
    }
    Ok(entries)
}

// ── Construction ───────────────────────────────────────────────────

impl LogIndex {
    /// Build the index of the log file at `path`.
    pub fn build(path: &Path, catalog: Arc<TypeSystemCatalog>) -> Result<Self> {
        let start = Instant::now();
        let data = LogData::open(path)?;
        let entries = scan(data.bytes())?;
        let index = Self::assemble(data, entries, catalog)?;
        tracing::info!(
            "indexed {} records ({} types) from {} in {:?}",
            index.len(),
            index.type_count(),
            path.display(),
            start.elapsed()
        );
        Ok(index)
    }

    /// Build the index of an in-memory log.
    pub fn from_bytes(bytes: Vec<u8>, catalog: Arc<TypeSystemCatalog>) -> Result<Self> {
        let entries = scan(&bytes)?;
        Self::assemble(LogData::Owned(bytes), entries, catalog)
    }

    /// Override how many entries a hinted seek scans before switching to
    /// binary search.
    pub fn with_seek_scan_limit(mut self, limit: usize) -> Self {
        self.seek_scan_limit = limit;
        self
    }

    /// Derive the per-type lists, names and statistics from scanned entries.
    pub(crate) fn assemble(
        data: LogData,
        entries: Vec<IndexEntry>,
        catalog: Arc<TypeSystemCatalog>,
    ) -> Result<Self> {
        let mut by_type: HashMap<u16, Vec<u32>> = HashMap::new();
        let mut by_type_entity: HashMap<(u16, u8), Vec<u32>> = HashMap::new();
        let mut last_time: HashMap<u16, f64> = HashMap::new();
        let mut stats = ScanStats {
            records: entries.len(),
            log_len: data.bytes().len() as u64,
            ..ScanStats::default()
        };

        for (i, entry) in entries.iter().enumerate() {
            if catalog.schema_for(entry.type_id).is_none() {
                stats.unknown_type_records += 1;
                *stats.unknown_type_ids.entry(entry.type_id).or_default() += 1;
                continue;
            }
            if let Some(prev) = last_time.insert(entry.type_id, entry.timestamp) {
                if entry.timestamp < prev {
                    stats.out_of_order_records += 1;
                }
            }
            let record = i as u32;
            by_type.entry(entry.type_id).or_default().push(record);
            by_type_entity
                .entry((entry.type_id, entry.src_ent))
                .or_default()
                .push(record);
        }

        for (type_id, count) in &stats.unknown_type_ids {
            tracing::warn!(
                "{} records of unknown type id {} left out of the type lists",
                count,
                type_id
            );
        }
        if stats.out_of_order_records > 0 {
            tracing::warn!(
                "{} records are earlier than their predecessor of the same type",
                stats.out_of_order_records
            );
        }

        let end = entries.last().map(IndexEntry::end).unwrap_or(0);
        stats.truncated_tail_bytes = stats.log_len.saturating_sub(end);

        let mut name_records: Vec<u32> = [MessageKind::EntityInfo, MessageKind::Announce]
            .into_iter()
            .filter_map(|kind| catalog.id_of_kind(kind))
            .filter_map(|id| by_type.get(&id))
            .flatten()
            .copied()
            .collect();
        name_records.sort_unstable();
        let names = NameTable::learn(data.bytes(), &entries, name_records, &catalog);

        Ok(Self {
            data,
            entries,
            by_type: by_type
                .into_iter()
                .map(|(k, v)| (k, Arc::from(v)))
                .collect(),
            by_type_entity: by_type_entity
                .into_iter()
                .map(|(k, v)| (k, Arc::from(v)))
                .collect(),
            names,
            stats,
            catalog,
            seek_scan_limit: DEFAULT_SEEK_SCAN_LIMIT,
        })
    }
}
