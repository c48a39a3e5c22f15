//! Message type schema and the catalog that serves it.

pub mod catalog;
mod imc_xml;
pub mod types;

pub use catalog::{CatalogCache, TypeSystemCatalog};
pub use types::{BitDef, FieldDef, FieldType, MessageDef, MessageKind};
