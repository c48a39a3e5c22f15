//! Per-directory log source configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::index::DEFAULT_SEEK_SCAN_LIMIT;

/// Name of the optional configuration file inside a log directory.
pub const CONFIG_FILE_NAME: &str = "lsf_config.json";

/// Options for opening a log directory.
///
/// Every field has a default, so a config file only needs the fields it
/// changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LogSourceConfig {
    /// Preferred log file; the first `*.lsf` is used when it is absent.
    pub log_file_name: String,
    pub schema_file_name: String,
    /// Entries a hinted seek scans before switching to binary search.
    pub seek_scan_limit: usize,
    /// Decoded messages kept per cursor. 0 disables the cache.
    pub decode_cache_capacity: usize,
    /// Save the index under `mra/` and reuse it on the next open.
    pub persist_index: bool,
}

impl Default for LogSourceConfig {
    fn default() -> Self {
        Self {
            log_file_name: "Data.lsf".to_string(),
            schema_file_name: "IMC.xml".to_string(),
            seek_scan_limit: DEFAULT_SEEK_SCAN_LIMIT,
            decode_cache_capacity: 32,
            persist_index: true,
        }
    }
}

impl LogSourceConfig {
    /// Read config from a log directory. Returns None if file doesn't exist.
    pub fn read_from(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(CONFIG_FILE_NAME);
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)?;
        let config: Self = serde_json::from_str(&contents)?;
        Ok(Some(config))
    }

    /// Write config to a log directory.
    pub fn write_to(&self, dir: &Path) -> Result<()> {
        let path = dir.join(CONFIG_FILE_NAME);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;
        Ok(())
    }
}
