//! Read-only queries over a built [`LogIndex`].

use std::sync::Arc;

use crate::error::{LsfError, Result};
use crate::index::entry::IndexEntry;
use crate::index::names::NameTable;
use crate::index::{LogIndex, ScanStats};
use crate::message::LogMessage;
use crate::schema::catalog::TypeSystemCatalog;
use crate::wire::decoder::decode;
use crate::wire::header::ANY_ENTITY;

impl LogIndex {
    // ── Positional Access ──────────────────────────────────────────

    /// Number of records, including records of unknown type.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn entry(&self, record: usize) -> Option<&IndexEntry> {
        self.entries.get(record)
    }

    fn checked_entry(&self, record: usize) -> Result<&IndexEntry> {
        self.entries
            .get(record)
            .ok_or(LsfError::RecordOutOfRange(record))
    }

    /// Fully decode record `record`.
    pub fn message_at(&self, record: usize) -> Result<LogMessage> {
        let entry = self.checked_entry(record)?;
        let (msg, _) = decode(self.data.bytes(), entry.offset as usize, &self.catalog)?;
        Ok(msg)
    }

    /// Undecoded bytes of record `record` (header, payload and CRC).
    pub fn raw_record(&self, record: usize) -> Result<&[u8]> {
        let entry = self.checked_entry(record)?;
        let start = entry.offset as usize;
        Ok(&self.data.bytes()[start..start + entry.record_len()])
    }

    pub fn type_of(&self, record: usize) -> Option<u16> {
        self.entry(record).map(|e| e.type_id)
    }

    /// Type name of `record`, `None` for records of unknown type.
    pub fn type_name_of(&self, record: usize) -> Option<&str> {
        self.type_of(record)
            .and_then(|type_id| self.catalog.name_of(type_id))
    }

    pub fn source_of(&self, record: usize) -> Option<u16> {
        self.entry(record).map(|e| e.src)
    }

    pub fn entity_id_of(&self, record: usize) -> Option<u8> {
        self.entry(record).map(|e| e.src_ent)
    }

    pub fn time_of(&self, record: usize) -> Option<f64> {
        self.entry(record).map(|e| e.timestamp)
    }

    // ── Per-Type Lists ─────────────────────────────────────────────

    /// Record list of one type, optionally narrowed to one entity.
    pub(crate) fn type_list(&self, type_id: u16, entity: u8) -> Option<&Arc<[u32]>> {
        if entity == ANY_ENTITY {
            self.by_type.get(&type_id)
        } else {
            self.by_type_entity.get(&(type_id, entity))
        }
    }

    /// Record indices of one type (and entity, unless `ANY_ENTITY`), in
    /// increasing order.
    pub fn records_of(&self, type_id: u16, entity: u8) -> Option<Arc<[u32]>> {
        self.type_list(type_id, entity).cloned()
    }

    pub fn contains_type(&self, type_id: u16) -> bool {
        self.by_type.contains_key(&type_id)
    }

    pub fn count_of_type(&self, type_id: u16) -> usize {
        self.by_type.get(&type_id).map_or(0, |list| list.len())
    }

    /// Known type ids present in the log, ascending.
    pub fn types(&self) -> Vec<u16> {
        let mut types: Vec<u16> = self.by_type.keys().copied().collect();
        types.sort_unstable();
        types
    }

    pub(crate) fn type_count(&self) -> usize {
        self.by_type.len()
    }

    pub fn first_of_type(&self, type_id: u16) -> Option<usize> {
        self.by_type
            .get(&type_id)
            .and_then(|list| list.first())
            .map(|&r| r as usize)
    }

    pub fn last_of_type(&self, type_id: u16) -> Option<usize> {
        self.by_type
            .get(&type_id)
            .and_then(|list| list.last())
            .map(|&r| r as usize)
    }

    /// First record of `type_id` after record `after`.
    pub fn next_of_type(&self, type_id: u16, after: usize) -> Option<usize> {
        let list = self.by_type.get(&type_id)?;
        let pos = list.partition_point(|&r| r as usize <= after);
        list.get(pos).map(|&r| r as usize)
    }

    /// Last record of `type_id` before record `before`.
    pub fn previous_of_type(&self, type_id: u16, before: usize) -> Option<usize> {
        let list = self.by_type.get(&type_id)?;
        let pos = list.partition_point(|&r| (r as usize) < before);
        pos.checked_sub(1).map(|p| list[p] as usize)
    }

    // ── Timestamp Seek ─────────────────────────────────────────────

    /// First record of `type_id` (from `entity`, or any entity for
    /// `ANY_ENTITY`) with timestamp `>= t`.
    ///
    /// `hint` is a record index the caller knows to be at or before the
    /// answer, typically the previous result during playback. Up to
    /// `seek_scan_limit` entries from the hint are scanned linearly; past
    /// that, and always when `hint == 0`, the remainder is binary searched. A NaN `t` matches nothing.
    pub fn nearest_at_or_after(
        &self,
        type_id: u16,
        entity: u8,
        hint: usize,
        t: f64,
    ) -> Option<usize> {
        if t.is_nan() {
            return None;
        }
        let list = self.type_list(type_id, entity)?;
        let time = |r: u32| self.entries[r as usize].timestamp;

        let mut start = 0;
        if hint != 0 {
            start = list.partition_point(|&r| (r as usize) < hint);
            let end = (start + self.seek_scan_limit).min(list.len());
            if let Some(&r) = list[start..end].iter().find(|&&r| time(r) >= t) {
                return Some(r as usize);
            }
            start = end;
        }

        let rest = &list[start..];
        let pos = rest.partition_point(|&r| time(r) < t);
        rest.get(pos).map(|&r| r as usize)
    }

    pub fn seek_scan_limit(&self) -> usize {
        self.seek_scan_limit
    }

    // ── Time Range ─────────────────────────────────────────────────

    pub fn start_time(&self) -> Option<f64> {
        self.entries.first().map(|e| e.timestamp)
    }

    pub fn end_time(&self) -> Option<f64> {
        self.entries.last().map(|e| e.timestamp)
    }

    // ── Names ──────────────────────────────────────────────────────

    /// Name of a system, from its `Announce` records or the schema.
    pub fn system_name(&self, system: u16) -> Option<&str> {
        self.names
            .system_name(system)
            .or_else(|| self.catalog.system_name(system))
    }

    /// Name of an entity, from `EntityInfo` records or the schema.
    pub fn entity_name(&self, system: u16, entity: u8) -> Option<&str> {
        self.names
            .entity_name(system, entity)
            .or_else(|| self.catalog.entity_name(system, entity))
    }

    /// Entity id carrying `label`, on any system.
    pub fn entity_id(&self, label: &str) -> Option<u8> {
        self.names.entity_id(label)
    }

    pub fn names(&self) -> &NameTable {
        &self.names
    }

    // ── Metadata ───────────────────────────────────────────────────

    pub fn stats(&self) -> &ScanStats {
        &self.stats
    }

    pub fn catalog(&self) -> &Arc<TypeSystemCatalog> {
        &self.catalog
    }

    /// Raw log bytes.
    pub fn bytes(&self) -> &[u8] {
        self.data.bytes()
    }
}
