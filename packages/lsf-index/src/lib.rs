//! LSF vehicle log index.
//!
//! Scans a binary LSF log once, reading only record headers, and serves
//! random access by record number, nearest-at-or-after timestamp seeks per
//! message type and entity, independent replay cursors, and system/entity
//! name resolution. Payloads are decoded only when a message is requested.

pub mod config;
pub mod cursor;
pub mod decompress;
pub mod error;
pub mod index;
pub mod message;
pub mod messages;
pub mod replay;
pub mod sampling;
pub mod schema;
pub mod source;
pub mod wire;

pub use config::LogSourceConfig;
pub use cursor::LogCursor;
pub use error::{LsfError, Result};
pub use index::{IndexEntry, LogIndex, ScanStats};
pub use message::{Bitfield, FieldValue, LogMessage, MessageBody};
pub use messages::Message;
pub use replay::LogReplay;
pub use sampling::{sample_values, Sample, SampleOptions};
pub use schema::{CatalogCache, MessageKind, TypeSystemCatalog};
pub use source::{LogSource, LogView};
pub use wire::{ByteOrder, LogWriter, RecordHeader, ANY_ENTITY};
