//! System and entity names learned from the log itself.
//!
//! Vehicles announce their name (`Announce.sys_name`) and describe their
//! entities (`EntityInfo.id` / `label`). These records are rare, so they are
//! fully decoded once when the index is assembled.

use std::collections::HashMap;

use crate::index::entry::IndexEntry;
use crate::message::LogMessage;
use crate::schema::catalog::TypeSystemCatalog;
use crate::schema::types::MessageKind;
use crate::wire::decoder::decode;

#[derive(Debug, Clone, Default)]
pub struct NameTable {
    systems: HashMap<u16, String>,
    entities: HashMap<(u16, u8), String>,
}

impl NameTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Learn names from every `EntityInfo` and `Announce` record listed in
    /// `records`. Records that fail to decode are skipped.
    pub fn learn(
        data: &[u8],
        entries: &[IndexEntry],
        records: impl IntoIterator<Item = u32>,
        catalog: &TypeSystemCatalog,
    ) -> Self {
        let mut table = Self::new();
        for record in records {
            let entry = &entries[record as usize];
            match decode(data, entry.offset as usize, catalog) {
                Ok((msg, _)) => table.observe(&msg),
                Err(e) => tracing::warn!(
                    "skipping name record {} at byte {}: {}",
                    record,
                    entry.offset,
                    e
                ),
            }
        }
        table
    }

    /// Record the names carried by one message, if any. Later records
    /// override earlier ones.
    pub fn observe(&mut self, msg: &LogMessage) {
        match msg.body.kind() {
            MessageKind::EntityInfo => {
                if let (Some(id), Some(label)) = (msg.get_i64("id"), msg.get_str("label")) {
                    self.entities
                        .insert((msg.src(), id as u8), label.to_string());
                }
            }
            MessageKind::Announce => {
                if let Some(name) = msg.get_str("sys_name") {
                    self.systems.insert(msg.src(), name.to_string());
                }
            }
            _ => {}
        }
    }

    pub fn system_name(&self, system: u16) -> Option<&str> {
        self.systems.get(&system).map(String::as_str)
    }

    pub fn entity_name(&self, system: u16, entity: u8) -> Option<&str> {
        self.entities.get(&(system, entity)).map(String::as_str)
    }

    /// Entity id carrying `label` on any system. When several systems use the
    /// label, the lowest (system, entity) pair wins.
    pub fn entity_id(&self, label: &str) -> Option<u8> {
        self.entities
            .iter()
            .filter(|(_, name)| name.as_str() == label)
            .map(|(key, _)| *key)
            .min()
            .map(|(_, entity)| entity)
    }

    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }
}
