//! Log source: one log directory opened for random access.
//!
//! ```text
//! <dir>/
//! +-- Data.lsf            # the log (or Data.lsf.gz, expanded on open)
//! +-- IMC.xml             # schema (optional, IMC.json also read, bundled otherwise)
//! +-- lsf_config.json     # LogSourceConfig (optional)
//! +-- mra/lsf.index       # saved index
//! +-- ...                 # auxiliary files (photos, other logs)
//! ```
//!
//! A named log is a view of one message type over the shared index. Views
//! are created on first request and cached.

use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use crate::config::LogSourceConfig;
use crate::cursor::LogCursor;
use crate::decompress::{decompress_to_sibling, GZ_SUFFIX};
use crate::error::{LsfError, Result};
use crate::index::{load_or_build, LogIndex};
use crate::message::LogMessage;
use crate::schema::catalog::{CatalogCache, TypeSystemCatalog};
use crate::wire::header::ANY_ENTITY;

/// Directory holding derived files.
pub const INDEX_CACHE_DIR: &str = "mra";

/// Saved index file name inside [`INDEX_CACHE_DIR`].
pub const INDEX_CACHE_FILE: &str = "lsf.index";

const LOG_EXTENSION: &str = "lsf";

// ── Log Source ─────────────────────────────────────────────────────

pub struct LogSource {
    dir: PathBuf,
    log_path: PathBuf,
    config: LogSourceConfig,
    index: Arc<LogIndex>,
    views: Mutex<HashMap<u16, Arc<LogView>>>,
    listing: OnceLock<Vec<String>>,
}

impl LogSource {
    /// Open a log directory with its own config (or the defaults) and a
    /// private catalog cache.
    pub fn open(dir: &Path) -> Result<Self> {
        let config = LogSourceConfig::read_from(dir)?.unwrap_or_default();
        Self::open_with(dir, config, &CatalogCache::new())
    }

    /// Open a log directory, sharing schemas through `catalogs`.
    pub fn open_with(dir: &Path, config: LogSourceConfig, catalogs: &CatalogCache) -> Result<Self> {
        let log_path = locate_log(dir, &config)?;
        let catalog = load_catalog(dir, &config, catalogs);
        let cache_path = config
            .persist_index
            .then(|| dir.join(INDEX_CACHE_DIR).join(INDEX_CACHE_FILE));

        let index = load_or_build(&log_path, cache_path.as_deref(), catalog)?
            .with_seek_scan_limit(config.seek_scan_limit);

        Ok(Self {
            dir: dir.to_path_buf(),
            log_path,
            config,
            index: Arc::new(index),
            views: Mutex::new(HashMap::new()),
            listing: OnceLock::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The (expanded) log file the index was built from.
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn config(&self) -> &LogSourceConfig {
        &self.config
    }

    pub fn index(&self) -> &Arc<LogIndex> {
        &self.index
    }

    pub fn catalog(&self) -> &Arc<TypeSystemCatalog> {
        self.index.catalog()
    }

    /// View of the log of type `name`. `None` when no such record was
    /// logged (or the type is unknown).
    pub fn get_log(&self, name: &str) -> Option<Arc<LogView>> {
        let type_id = self.catalog().id_of(name)?;
        if !self.index.contains_type(type_id) {
            return None;
        }

        let mut views = self.views.lock().unwrap();
        let view = views.entry(type_id).or_insert_with(|| {
            Arc::new(LogView {
                name: name.to_string(),
                type_id,
                index: Arc::clone(&self.index),
                decode_cache_capacity: self.config.decode_cache_capacity,
            })
        });
        Some(Arc::clone(view))
    }

    /// Names of every known message type present in the log, sorted.
    pub fn list_logs(&self) -> &[String] {
        self.listing.get_or_init(|| {
            let catalog = self.catalog();
            let mut names: Vec<String> = self
                .index
                .types()
                .into_iter()
                .filter_map(|id| catalog.name_of(id).map(str::to_string))
                .collect();
            names.sort();
            names
        })
    }

    /// Auxiliary file `name` inside the log directory. Names that would
    /// leave the directory are rejected.
    pub fn get_file(&self, name: &str) -> Option<PathBuf> {
        let relative = Path::new(name);
        let inside = relative.components().count() > 0
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !inside {
            return None;
        }
        let path = self.dir.join(relative);
        path.exists().then_some(path)
    }

    pub fn entity_name(&self, system: u16, entity: u8) -> Option<&str> {
        self.index.entity_name(system, entity)
    }

    pub fn system_name(&self, system: u16) -> Option<&str> {
        self.index.system_name(system)
    }

    pub fn entity_id(&self, label: &str) -> Option<u8> {
        self.index.entity_id(label)
    }

    pub fn start_time(&self) -> Option<f64> {
        self.index.start_time()
    }

    pub fn end_time(&self) -> Option<f64> {
        self.index.end_time()
    }
}

impl std::fmt::Debug for LogSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogSource")
            .field("dir", &self.dir)
            .field("log_path", &self.log_path)
            .field("index", &self.index)
            .finish()
    }
}

// ── Directory Resolution ───────────────────────────────────────────

/// The configured log file, its `.gz`, or else the first `*.lsf` /
/// `*.lsf.gz` by name.
fn locate_log(dir: &Path, config: &LogSourceConfig) -> Result<PathBuf> {
    let preferred = dir.join(&config.log_file_name);
    if preferred.is_file() {
        return Ok(preferred);
    }
    let preferred_gz = dir.join(format!("{}{}", config.log_file_name, GZ_SUFFIX));
    if preferred_gz.is_file() {
        return decompress_to_sibling(&preferred_gz);
    }

    let mut names: Vec<String> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect();
    names.sort();

    let plain = format!(".{}", LOG_EXTENSION);
    let gz = format!(".{}{}", LOG_EXTENSION, GZ_SUFFIX);
    if let Some(name) = names.iter().find(|n| n.ends_with(&plain)) {
        return Ok(dir.join(name));
    }
    if let Some(name) = names.iter().find(|n| n.ends_with(&gz)) {
        return decompress_to_sibling(&dir.join(name));
    }
    Err(LsfError::NoLogFile(dir.to_path_buf()))
}

/// The directory's schema, or the bundled one when it is missing or broken.
/// The configured file is tried first, then the same name in the other
/// schema format (`IMC.xml` and `IMC.json`), each also as `.gz`.
fn load_catalog(
    dir: &Path,
    config: &LogSourceConfig,
    catalogs: &CatalogCache,
) -> Arc<TypeSystemCatalog> {
    let Some(path) = schema_candidates(dir, &config.schema_file_name)
        .into_iter()
        .find(|path| expand_schema(path))
    else {
        tracing::debug!("no schema in {}, using bundled schema", dir.display());
        return catalogs.bundled();
    };

    match catalogs.get_or_load(&path) {
        Ok(catalog) => catalog,
        Err(e) => {
            tracing::warn!("{}; falling back to bundled schema", e);
            catalogs.bundled()
        }
    }
}

fn schema_candidates(dir: &Path, name: &str) -> Vec<PathBuf> {
    let primary = dir.join(name);
    let alternate = match primary.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("xml") => Some(primary.with_extension("json")),
        Some(ext) if ext.eq_ignore_ascii_case("json") => Some(primary.with_extension("xml")),
        _ => None,
    };
    std::iter::once(primary).chain(alternate).collect()
}

/// Whether `path` exists, expanding `<path>.gz` next to it first if needed.
fn expand_schema(path: &Path) -> bool {
    if path.exists() {
        return true;
    }
    let mut gz = path.as_os_str().to_owned();
    gz.push(GZ_SUFFIX);
    let gz = PathBuf::from(gz);
    if gz.is_file() {
        if let Err(e) = decompress_to_sibling(&gz) {
            tracing::warn!("could not expand {}: {}", gz.display(), e);
        }
    }
    path.exists()
}

// ── Log View ───────────────────────────────────────────────────────

/// All records of one message type in a log source.
#[derive(Debug)]
pub struct LogView {
    name: String,
    type_id: u16,
    index: Arc<LogIndex>,
    decode_cache_capacity: usize,
}

impl LogView {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_id(&self) -> u16 {
        self.type_id
    }

    pub fn len(&self) -> usize {
        self.index.count_of_type(self.type_id)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn first(&self) -> Result<Option<LogMessage>> {
        self.index
            .first_of_type(self.type_id)
            .map(|r| self.index.message_at(r))
            .transpose()
    }

    pub fn last(&self) -> Result<Option<LogMessage>> {
        self.index
            .last_of_type(self.type_id)
            .map(|r| self.index.message_at(r))
            .transpose()
    }

    /// First message with timestamp `>= t`.
    pub fn entry_at_or_after(&self, t: f64) -> Result<Option<LogMessage>> {
        self.index
            .nearest_at_or_after(self.type_id, ANY_ENTITY, 0, t)
            .map(|r| self.index.message_at(r))
            .transpose()
    }

    /// First message with timestamp `>= t` from the entity labelled
    /// `entity`. `None` if no entity carries that label.
    pub fn entry_at_or_after_entity(&self, t: f64, entity: &str) -> Result<Option<LogMessage>> {
        let Some(entity_id) = self.index.entity_id(entity) else {
            return Ok(None);
        };
        self.index
            .nearest_at_or_after(self.type_id, entity_id, 0, t)
            .map(|r| self.index.message_at(r))
            .transpose()
    }

    /// Independent cursor over this log.
    pub fn cursor(&self) -> LogCursor {
        LogCursor::open(Arc::clone(&self.index), self.type_id)
            .with_cache(self.decode_cache_capacity)
    }

    /// Independent cursor over the records of one entity.
    pub fn cursor_for_entity(&self, entity: u8) -> LogCursor {
        LogCursor::open_entity(Arc::clone(&self.index), self.type_id, entity)
            .with_cache(self.decode_cache_capacity)
    }
}
