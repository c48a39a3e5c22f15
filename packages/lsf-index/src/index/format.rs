//! Persisted index cache.
//!
//! Rebuilding the index means reading the whole log, so the entries of a
//! built index are saved next to it and reused while the log is unchanged.
//! Per-type lists, names and statistics are derived again on load.
//!
//! # File Layout
//!
//! ```text
//! [IndexFileHeader]          48 bytes
//! [IndexEntry] * entry_count 24 bytes each
//! ```

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Instant, UNIX_EPOCH};

use crate::error::{LsfError, Result};
use crate::index::builder::LogData;
use crate::index::entry::{IndexEntry, ENTRY_SIZE};
use crate::index::LogIndex;
use crate::schema::catalog::TypeSystemCatalog;
use crate::wire::decoder::decode_header;

// ── Index File Header ─────────────────────────────────────────────

/// Magic bytes for index files.
pub const INDEX_MAGIC: [u8; 4] = *b"LSFX";

/// Index file format version.
pub const INDEX_VERSION: u32 = 1;

/// Header size in bytes.
pub const INDEX_HEADER_SIZE: usize = 48;

/// Index file header -- exactly 48 bytes.
///
/// ```text
/// Offset  Size  Field
/// 0       4     magic: b"LSFX"
/// 4       4     version: u32 = 1
/// 8       8     entry_count: u64
/// 16      8     log_len: u64 (bytes of the indexed log)
/// 24      8     log_mtime_ns: u64 (modification time of the indexed log)
/// 32      16    _reserved
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexFileHeader {
    pub magic: [u8; 4],
    pub version: u32,
    pub entry_count: u64,
    pub log_len: u64,
    pub log_mtime_ns: u64,
}

impl IndexFileHeader {
    pub fn new(entry_count: u64, log_len: u64, log_mtime_ns: u64) -> Self {
        Self {
            magic: INDEX_MAGIC,
            version: INDEX_VERSION,
            entry_count,
            log_len,
            log_mtime_ns,
        }
    }

    /// Write header to writer (48 bytes, little-endian).
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(&self.magic)?;
        w.write_all(&self.version.to_le_bytes())?;
        w.write_all(&self.entry_count.to_le_bytes())?;
        w.write_all(&self.log_len.to_le_bytes())?;
        w.write_all(&self.log_mtime_ns.to_le_bytes())?;
        w.write_all(&[0u8; 16])?;
        Ok(())
    }

    /// Read header from reader (48 bytes, little-endian).
    pub fn read_from<R: Read>(r: &mut R) -> Result<Self> {
        let mut buf = [0u8; INDEX_HEADER_SIZE];
        r.read_exact(&mut buf).map_err(|e| {
            LsfError::InvalidIndexFile(format!("Failed to read index header: {}", e))
        })?;

        let u64_at = |at: usize| {
            let mut word = [0u8; 8];
            word.copy_from_slice(&buf[at..at + 8]);
            u64::from_le_bytes(word)
        };
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&buf[0..4]);
        let version = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);

        if magic != INDEX_MAGIC {
            return Err(LsfError::InvalidIndexFile(format!(
                "Not an index file: expected LSFX, got {:?}",
                magic
            )));
        }
        if version != INDEX_VERSION {
            return Err(LsfError::InvalidIndexFile(format!(
                "Unsupported index version: {}",
                version
            )));
        }

        Ok(Self {
            magic,
            version,
            entry_count: u64_at(8),
            log_len: u64_at(16),
            log_mtime_ns: u64_at(24),
        })
    }
}

// ── Read / Write ───────────────────────────────────────────────────

/// Save the entries of `index` to `path`. The file is written beside its
/// target and renamed into place, so readers never see a partial index.
pub fn write_index(index: &LogIndex, path: &Path, log_mtime_ns: u64) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let part = part_path(path);

    {
        let mut w = BufWriter::new(File::create(&part)?);
        IndexFileHeader::new(index.len() as u64, index.stats().log_len, log_mtime_ns)
            .write_to(&mut w)?;
        for entry in index.entries() {
            entry.write_to(&mut w)?;
        }
        w.flush()?;
    }

    fs::rename(&part, path)?;
    Ok(())
}

/// Read a saved index file.
pub fn read_index(path: &Path) -> Result<(IndexFileHeader, Vec<IndexEntry>)> {
    let file = File::open(path)?;
    let file_len = file.metadata()?.len();
    let mut r = BufReader::new(file);
    let header = IndexFileHeader::read_from(&mut r)?;

    let expected = header
        .entry_count
        .saturating_mul(ENTRY_SIZE as u64)
        .saturating_add(INDEX_HEADER_SIZE as u64);
    if file_len != expected {
        return Err(LsfError::InvalidIndexFile(format!(
            "expected {} bytes for {} entries, file has {}",
            expected, header.entry_count, file_len
        )));
    }

    let mut entries = Vec::with_capacity(header.entry_count as usize);
    for _ in 0..header.entry_count {
        entries.push(IndexEntry::read_from(&mut r)?);
    }
    Ok((header, entries))
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Modification time of a file in nanoseconds since the epoch, 0 if the
/// platform does not report one.
pub fn modified_ns(meta: &fs::Metadata) -> u64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |d| d.as_nanos() as u64)
}

// ── Load Or Build ──────────────────────────────────────────────────

/// Open the index of `log_path`, reusing the cache at `cache_path` when it
/// matches the log's size and modification time. Otherwise the log is
/// scanned and the cache rewritten. Cache failures never fail the open.
pub fn load_or_build(
    log_path: &Path,
    cache_path: Option<&Path>,
    catalog: Arc<TypeSystemCatalog>,
) -> Result<LogIndex> {
    let meta = fs::metadata(log_path)?;
    let log_len = meta.len();
    let mtime = modified_ns(&meta);

    if let Some(cache) = cache_path.filter(|p| p.exists()) {
        let start = Instant::now();
        match load_cached(log_path, cache, log_len, mtime, Arc::clone(&catalog)) {
            Ok(index) => {
                tracing::info!(
                    "loaded index of {} records from {} in {:?}",
                    index.len(),
                    cache.display(),
                    start.elapsed()
                );
                return Ok(index);
            }
            Err(e) => tracing::warn!("rebuilding index, cache {} unusable: {}", cache.display(), e),
        }
    }

    let index = LogIndex::build(log_path, catalog)?;
    if let Some(cache) = cache_path {
        match write_index(&index, cache, mtime) {
            Ok(()) => tracing::debug!("wrote index cache {}", cache.display()),
            Err(e) => tracing::warn!("could not write index cache {}: {}", cache.display(), e),
        }
    }
    Ok(index)
}

fn load_cached(
    log_path: &Path,
    cache: &Path,
    log_len: u64,
    mtime: u64,
    catalog: Arc<TypeSystemCatalog>,
) -> Result<LogIndex> {
    let (header, entries) = read_index(cache)?;
    if header.log_len != log_len || header.log_mtime_ns != mtime {
        return Err(LsfError::InvalidIndexFile(format!(
            "stale: indexed {} bytes at mtime {}, log has {} bytes at mtime {}",
            header.log_len, header.log_mtime_ns, log_len, mtime
        )));
    }

    let data = LogData::open(log_path)?;
    validate_entries(data.bytes(), &entries)?;
    LogIndex::assemble(data, entries, catalog)
}

/// Entries must tile the log from byte 0 and agree with the headers at their
/// ends of the log.
fn validate_entries(bytes: &[u8], entries: &[IndexEntry]) -> Result<()> {
    let mut expected = 0u64;
    for entry in entries {
        if entry.offset != expected {
            return Err(LsfError::InvalidIndexFile(format!(
                "entry at byte {} does not follow the previous record (expected {})",
                entry.offset, expected
            )));
        }
        expected = entry.end();
    }
    if expected > bytes.len() as u64 {
        return Err(LsfError::InvalidIndexFile(format!(
            "entries cover {} bytes, log has {}",
            expected,
            bytes.len()
        )));
    }

    for entry in [entries.first(), entries.last()].into_iter().flatten() {
        let header = decode_header(bytes, entry.offset as usize)?;
        if IndexEntry::from_header(entry.offset as usize, &header) != *entry {
            return Err(LsfError::InvalidIndexFile(format!(
                "entry at byte {} does not match the log",
                entry.offset
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{FieldValue, MessageBody};
    use crate::wire::header::RecordHeader;
    use crate::wire::writer::LogWriter;

    fn write_log(path: &Path, times: &[f64]) {
        let catalog = TypeSystemCatalog::bundled();
        let def = Arc::clone(catalog.schema_for(251).unwrap());
        let mut writer = LogWriter::new(Vec::new());
        for &t in times {
            let body = MessageBody::new(Arc::clone(&def), vec![FieldValue::Float(24.0)]);
            writer
                .append_body(&RecordHeader::new(251, t, 1, 1), &body)
                .unwrap();
        }
        fs::write(path, writer.finish().unwrap()).unwrap();
    }

    #[test]
    fn test_header_size_exact() {
        let mut buf = Vec::new();
        IndexFileHeader::new(3, 100, 7).write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), INDEX_HEADER_SIZE);
        let back = IndexFileHeader::read_from(&mut buf.as_slice()).unwrap();
        assert_eq!(back, IndexFileHeader::new(3, 100, 7));
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mut buf = Vec::new();
        IndexFileHeader::new(0, 0, 0).write_to(&mut buf).unwrap();
        buf[0] = b'X';
        let err = IndexFileHeader::read_from(&mut buf.as_slice()).unwrap_err();
        assert_eq!(err.code(), "INVALID_INDEX_FILE");
    }

    #[test]
    fn test_write_then_read_entries() {
        let dir = tempfile::TempDir::new().unwrap();
        let log = dir.path().join("Data.lsf");
        write_log(&log, &[1.0, 2.0, 3.0]);
        let index = LogIndex::build(&log, Arc::new(TypeSystemCatalog::bundled())).unwrap();

        let cache = dir.path().join("mra").join("lsf.index");
        write_index(&index, &cache, 42).unwrap();
        assert!(!part_path(&cache).exists());

        let (header, entries) = read_index(&cache).unwrap();
        assert_eq!(header.entry_count, 3);
        assert_eq!(header.log_mtime_ns, 42);
        assert_eq!(entries.as_slice(), index.entries());
    }

    #[test]
    fn test_truncated_cache_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let log = dir.path().join("Data.lsf");
        write_log(&log, &[1.0, 2.0]);
        let index = LogIndex::build(&log, Arc::new(TypeSystemCatalog::bundled())).unwrap();

        let cache = dir.path().join("lsf.index");
        write_index(&index, &cache, 0).unwrap();
        let bytes = fs::read(&cache).unwrap();
        fs::write(&cache, &bytes[..bytes.len() - 4]).unwrap();
        assert!(read_index(&cache).is_err());
    }

    #[test]
    fn test_load_or_build_reuses_cache() {
        let dir = tempfile::TempDir::new().unwrap();
        let log = dir.path().join("Data.lsf");
        write_log(&log, &[1.0, 2.0, 3.0]);
        let cache = dir.path().join("mra").join("lsf.index");
        let catalog = Arc::new(TypeSystemCatalog::bundled());

        let built = load_or_build(&log, Some(cache.as_path()), Arc::clone(&catalog)).unwrap();
        assert!(cache.exists());
        let loaded = load_or_build(&log, Some(cache.as_path()), catalog).unwrap();
        assert_eq!(loaded.entries(), built.entries());
        assert_eq!(loaded.stats(), built.stats());
    }

    #[test]
    fn test_validate_rejects_gap() {
        let dir = tempfile::TempDir::new().unwrap();
        let log = dir.path().join("Data.lsf");
        write_log(&log, &[1.0, 2.0]);
        let bytes = fs::read(&log).unwrap();
        let mut entries = crate::index::builder::scan(&bytes).unwrap();
        entries.remove(0);
        assert!(validate_entries(&bytes, &entries).is_err());
    }
}
