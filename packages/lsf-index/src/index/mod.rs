//! Log index: random access by record number and timestamp seek per type.
//!
//! A [`LogIndex`] is built once by a header-only scan and is read-only
//! afterwards, so it is shared between threads as `Arc<LogIndex>` without
//! locking. Full payload decode happens only at point of use
//! ([`LogIndex::message_at`]).
//!
//! ```text
//! entries          [e0 e1 e2 e3 e4 e5 ...]       file order = record index
//! by_type          350 -> [0, 3, 5]              strictly increasing
//! by_type_entity   (350, 4) -> [0, 5]
//! ```

pub mod builder;
pub mod entry;
pub mod format;
pub mod names;
pub mod query;

use std::collections::HashMap;
use std::sync::Arc;

use crate::schema::catalog::TypeSystemCatalog;

pub use builder::{scan, ScanStats};
pub use entry::{IndexEntry, ENTRY_SIZE};
pub use format::{load_or_build, read_index, write_index};
pub use names::NameTable;

use builder::LogData;

/// Entries a hinted seek scans forward before falling back to binary search.
pub const DEFAULT_SEEK_SCAN_LIMIT: usize = 64;

pub struct LogIndex {
    data: LogData,
    entries: Vec<IndexEntry>,
    by_type: HashMap<u16, Arc<[u32]>>,
    by_type_entity: HashMap<(u16, u8), Arc<[u32]>>,
    names: NameTable,
    stats: ScanStats,
    catalog: Arc<TypeSystemCatalog>,
    seek_scan_limit: usize,
}

impl std::fmt::Debug for LogIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogIndex")
            .field("records", &self.entries.len())
            .field("types", &self.by_type.len())
            .field("log_len", &self.stats.log_len)
            .field("seek_scan_limit", &self.seek_scan_limit)
            .finish()
    }
}
