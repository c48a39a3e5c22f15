//! Type system catalog: message definitions plus system/entity names.
//!
//! A catalog is loaded once per schema resource and never mutated after
//! that. Logs that share a schema file share one `Arc<TypeSystemCatalog>`
//! through a [`CatalogCache`] owned by whoever opens the logs.
//!
//! Schema files are either the IMC.xml definition shipped with the logs
//! (see `imc_xml`) or JSON:
//! ```text
//! {
//!   "version": "5.4.30",
//!   "systems":  [{ "id": 8193, "name": "lauv-xplore-1" }],
//!   "entities": [{ "system": 8193, "id": 4, "name": "Navigation" }],
//!   "messages": [{ "id": 350, "name": "EstimatedState",
//!                  "fields": [{ "name": "lat", "type": "fp64" }, ...] }]
//! }
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use serde::Deserialize;

use crate::error::{LsfError, Result};
use crate::schema::imc_xml;
use crate::schema::types::{MessageDef, MessageKind};

/// Schema compiled into the crate, used when a log ships no schema of its own.
const BUNDLED_SCHEMA: &str = include_str!("default_schema.json");

#[derive(Debug, Deserialize)]
struct SchemaFile {
    version: String,
    #[serde(default)]
    systems: Vec<SystemName>,
    #[serde(default)]
    entities: Vec<EntityName>,
    messages: Vec<MessageDef>,
}

#[derive(Debug, Deserialize)]
struct SystemName {
    id: u16,
    name: String,
}

#[derive(Debug, Deserialize)]
struct EntityName {
    system: u16,
    id: u8,
    name: String,
}

/// Read-only message type catalog.
#[derive(Debug)]
pub struct TypeSystemCatalog {
    version: String,
    by_id: HashMap<u16, Arc<MessageDef>>,
    by_name: HashMap<String, u16>,
    systems: HashMap<u16, String>,
    entities: HashMap<(u16, u8), String>,
}

impl TypeSystemCatalog {
    /// Load a catalog from a schema file. `.xml` files are read as IMC.xml,
    /// anything else as JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| LsfError::SchemaLoad(format!("{}: {}", path.display(), e)))?;
        let is_xml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"));
        let catalog = if is_xml {
            Self::from_xml_str(&text)
        } else {
            Self::from_json_str(&text)
        };
        catalog.map_err(|e| LsfError::SchemaLoad(format!("{}: {}", path.display(), e)))
    }

    /// Parse a catalog from IMC.xml text. The XML carries no address table,
    /// so system and entity names come only from the log itself.
    pub fn from_xml_str(text: &str) -> Result<Self> {
        let (version, messages) = imc_xml::read_messages(text)?;
        Self::from_schema(SchemaFile {
            version,
            systems: Vec::new(),
            entities: Vec::new(),
            messages,
        })
    }

    /// Parse a catalog from schema JSON text.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let file: SchemaFile = serde_json::from_str(text)
            .map_err(|e| LsfError::SchemaLoad(format!("invalid schema JSON: {}", e)))?;
        Self::from_schema(file)
    }

    /// The schema compiled into the crate.
    pub fn bundled() -> Self {
        Self::from_json_str(BUNDLED_SCHEMA).expect("bundled schema must be valid")
    }

    fn from_schema(file: SchemaFile) -> Result<Self> {
        let mut by_id = HashMap::with_capacity(file.messages.len());
        let mut by_name = HashMap::with_capacity(file.messages.len());

        for mut def in file.messages {
            def.kind = MessageKind::from_name(&def.name);
            for field in &def.fields {
                if field.is_bitfield() && !field.field_type.is_unsigned_integer() {
                    return Err(LsfError::SchemaLoad(format!(
                        "{}.{}: bit definitions on a non-integer field",
                        def.name, field.name
                    )));
                }
            }
            if by_name.insert(def.name.clone(), def.id).is_some() {
                return Err(LsfError::SchemaLoad(format!(
                    "duplicate message name: {}",
                    def.name
                )));
            }
            let id = def.id;
            if by_id.insert(id, Arc::new(def)).is_some() {
                return Err(LsfError::SchemaLoad(format!("duplicate message id: {}", id)));
            }
        }

        let systems = file.systems.into_iter().map(|s| (s.id, s.name)).collect();
        let entities = file
            .entities
            .into_iter()
            .map(|e| ((e.system, e.id), e.name))
            .collect();

        Ok(Self {
            version: file.version,
            by_id,
            by_name,
            systems,
            entities,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Definition for a type id.
    pub fn schema_for(&self, type_id: u16) -> Option<&Arc<MessageDef>> {
        self.by_id.get(&type_id)
    }

    pub fn name_of(&self, type_id: u16) -> Option<&str> {
        self.by_id.get(&type_id).map(|def| def.name.as_str())
    }

    pub fn id_of(&self, type_name: &str) -> Option<u16> {
        self.by_name.get(type_name).copied()
    }

    /// Id of the first definition of the given kind.
    pub fn id_of_kind(&self, kind: MessageKind) -> Option<u16> {
        self.by_id
            .values()
            .filter(|def| def.kind == kind)
            .map(|def| def.id)
            .min()
    }

    /// Static system name from the schema address table.
    pub fn system_name(&self, system_id: u16) -> Option<&str> {
        self.systems.get(&system_id).map(String::as_str)
    }

    /// Static entity name from the schema address table.
    pub fn entity_name(&self, system_id: u16, entity_id: u8) -> Option<&str> {
        self.entities.get(&(system_id, entity_id)).map(String::as_str)
    }

    /// Number of message definitions.
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

// ── Catalog Cache ──────────────────────────────────────────────────

/// Shares catalogs between logs, one instance per schema path.
#[derive(Debug, Default)]
pub struct CatalogCache {
    loaded: Mutex<HashMap<PathBuf, Arc<TypeSystemCatalog>>>,
    bundled: OnceLock<Arc<TypeSystemCatalog>>,
}

impl CatalogCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the schema at `path`, or return the instance already loaded from it.
    pub fn get_or_load(&self, path: &Path) -> Result<Arc<TypeSystemCatalog>> {
        let key = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

        let mut loaded = self.loaded.lock().unwrap();
        if let Some(catalog) = loaded.get(&key) {
            return Ok(Arc::clone(catalog));
        }

        let catalog = Arc::new(TypeSystemCatalog::load(path)?);
        tracing::debug!(
            "loaded schema {} (version {}, {} messages)",
            path.display(),
            catalog.version(),
            catalog.len()
        );
        loaded.insert(key, Arc::clone(&catalog));
        Ok(catalog)
    }

    /// The bundled catalog, shared by every log opened through this cache.
    pub fn bundled(&self) -> Arc<TypeSystemCatalog> {
        Arc::clone(
            self.bundled
                .get_or_init(|| Arc::new(TypeSystemCatalog::bundled())),
        )
    }

    /// Number of schema files loaded so far (the bundled catalog excluded).
    pub fn loaded_count(&self) -> usize {
        self.loaded.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::FieldType;

    const SMALL_SCHEMA: &str = r#"{
        "version": "test-1",
        "systems": [{ "id": 30, "name": "lauv-noptilus-1" }],
        "entities": [{ "system": 30, "id": 4, "name": "Navigation" }],
        "messages": [
            { "id": 350, "name": "EstimatedState",
              "fields": [{ "name": "lat", "type": "fp64" }, { "name": "lon", "type": "fp64" }] },
            { "id": 263, "name": "Temperature", "fields": [{ "name": "value", "type": "fp32" }] }
        ]
    }"#;

    #[test]
    fn test_bundled_schema_loads() {
        let catalog = TypeSystemCatalog::bundled();
        assert!(!catalog.is_empty());
        assert_eq!(catalog.id_of("EstimatedState"), Some(350));
        assert_eq!(catalog.name_of(3), Some("EntityInfo"));
        assert_eq!(catalog.id_of_kind(MessageKind::Announce), Some(151));

        let gps = catalog.schema_for(253).unwrap();
        let validity = &gps.fields[0];
        assert!(validity.is_bitfield());
        assert_eq!(validity.field_type, FieldType::U16);
    }

    #[test]
    fn test_lookup_roundtrip() {
        let catalog = TypeSystemCatalog::from_json_str(SMALL_SCHEMA).unwrap();
        assert_eq!(catalog.version(), "test-1");
        assert_eq!(catalog.len(), 2);

        let id = catalog.id_of("Temperature").unwrap();
        assert_eq!(catalog.name_of(id), Some("Temperature"));
        assert_eq!(catalog.schema_for(id).unwrap().fields.len(), 1);

        assert_eq!(catalog.id_of("Nope"), None);
        assert_eq!(catalog.name_of(9999), None);
        assert!(catalog.schema_for(9999).is_none());
    }

    #[test]
    fn test_static_names() {
        let catalog = TypeSystemCatalog::from_json_str(SMALL_SCHEMA).unwrap();
        assert_eq!(catalog.system_name(30), Some("lauv-noptilus-1"));
        assert_eq!(catalog.entity_name(30, 4), Some("Navigation"));
        assert_eq!(catalog.entity_name(30, 5), None);
        assert_eq!(catalog.system_name(31), None);
    }

    #[test]
    fn test_kind_resolved_on_load() {
        let catalog = TypeSystemCatalog::from_json_str(SMALL_SCHEMA).unwrap();
        assert_eq!(catalog.schema_for(350).unwrap().kind, MessageKind::EstimatedState);
        assert_eq!(catalog.schema_for(263).unwrap().kind, MessageKind::Generic);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let text = r#"{ "version": "x", "messages": [
            { "id": 1, "name": "A" }, { "id": 1, "name": "B" } ] }"#;
        let err = TypeSystemCatalog::from_json_str(text).unwrap_err();
        assert_eq!(err.code(), "SCHEMA_LOAD");
    }

    #[test]
    fn test_bits_on_float_rejected() {
        let text = r#"{ "version": "x", "messages": [
            { "id": 1, "name": "A", "fields": [
                { "name": "f", "type": "fp32", "bits": [{ "name": "X", "value": 1 }] } ] } ] }"#;
        assert!(TypeSystemCatalog::from_json_str(text).is_err());
    }

    #[test]
    fn test_corrupt_schema_is_schema_load_error() {
        let err = TypeSystemCatalog::from_json_str("<imc></imc>").unwrap_err();
        assert!(matches!(err, LsfError::SchemaLoad(_)));
    }

    #[test]
    fn test_missing_schema_file() {
        let err = TypeSystemCatalog::load(Path::new("/definitely/not/here/IMC.json")).unwrap_err();
        assert!(matches!(err, LsfError::SchemaLoad(_)));
    }

    const SMALL_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<messages version="xml-1">
  <message id="350" name="Estimated State" abbrev="EstimatedState">
    <field name="Latitude" abbrev="lat" type="fp64_t" unit="rad"/>
    <field name="Longitude" abbrev="lon" type="fp64_t" unit="rad"/>
  </message>
  <message id="263" name="Temperature" abbrev="Temperature">
    <field name="Measured Temperature" abbrev="value" type="fp32_t" unit="°C"/>
  </message>
</messages>
"#;

    #[test]
    fn test_load_dispatches_on_extension() {
        let dir = tempfile::TempDir::new().unwrap();
        let xml = dir.path().join("IMC.xml");
        let json = dir.path().join("IMC.json");
        std::fs::write(&xml, SMALL_XML).unwrap();
        std::fs::write(&json, SMALL_SCHEMA).unwrap();

        let catalog = TypeSystemCatalog::load(&xml).unwrap();
        assert_eq!(catalog.version(), "xml-1");
        assert_eq!(catalog.id_of("Temperature"), Some(263));
        assert_eq!(catalog.schema_for(350).unwrap().kind, MessageKind::EstimatedState);
        assert_eq!(catalog.system_name(30), None);

        let catalog = TypeSystemCatalog::load(&json).unwrap();
        assert_eq!(catalog.version(), "test-1");

        // JSON text behind an .xml name is not accepted.
        std::fs::write(&xml, SMALL_SCHEMA).unwrap();
        let err = TypeSystemCatalog::load(&xml).unwrap_err();
        assert!(matches!(err, LsfError::SchemaLoad(_)));
    }

    #[test]
    fn test_xml_duplicate_id_rejected() {
        let text = r#"<messages version="x">
            <message id="1" name="A" abbrev="A"/>
            <message id="1" name="B" abbrev="B"/>
        </messages>"#;
        let err = TypeSystemCatalog::from_xml_str(text).unwrap_err();
        assert_eq!(err.code(), "SCHEMA_LOAD");
    }

    #[test]
    fn test_cache_shares_instances() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("IMC.json");
        std::fs::write(&path, SMALL_SCHEMA).unwrap();

        let cache = CatalogCache::new();
        let a = cache.get_or_load(&path).unwrap();
        let b = cache.get_or_load(&path).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.loaded_count(), 1);

        let c = cache.bundled();
        let d = cache.bundled();
        assert!(Arc::ptr_eq(&c, &d));
        assert_eq!(cache.loaded_count(), 1);
    }
}
