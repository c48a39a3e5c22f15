//! LSF wire format: record framing, payload codec and CRC.

pub mod crc;
pub mod decoder;
pub mod encoder;
pub mod header;
pub mod writer;

pub use decoder::{decode, decode_header};
pub use encoder::{encode, encode_record};
pub use header::{ByteOrder, RecordHeader, ANY_ENTITY, FOOTER_SIZE, HEADER_SIZE};
pub use writer::LogWriter;
