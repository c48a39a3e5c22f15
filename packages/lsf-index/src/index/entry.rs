//! One index entry per record in the log.

use std::io::{Read, Write};

use crate::error::{LsfError, Result};
use crate::wire::header::{RecordHeader, FOOTER_SIZE, HEADER_SIZE};

/// Persisted entry size in bytes.
pub const ENTRY_SIZE: usize = 24;

/// Header summary of one record.
///
/// ```text
/// Offset  Size  Field
/// 0       8     offset: u64
/// 8       8     timestamp: f64
/// 16      2     type_id: u16
/// 18      2     src: u16
/// 20      2     size: u16 (payload bytes)
/// 22      1     src_ent: u8
/// 23      1     _padding
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexEntry {
    /// Byte offset of the record in the log.
    pub offset: u64,
    pub timestamp: f64,
    pub type_id: u16,
    pub src: u16,
    pub size: u16,
    pub src_ent: u8,
}

impl IndexEntry {
    pub fn from_header(offset: usize, header: &RecordHeader) -> Self {
        Self {
            offset: offset as u64,
            timestamp: header.timestamp,
            type_id: header.type_id,
            src: header.src,
            size: header.size,
            src_ent: header.src_ent,
        }
    }

    /// Bytes taken by the record on disk.
    #[inline]
    pub fn record_len(&self) -> usize {
        HEADER_SIZE + self.size as usize + FOOTER_SIZE
    }

    /// Offset one past the end of the record.
    #[inline]
    pub fn end(&self) -> u64 {
        self.offset + self.record_len() as u64
    }

    /// Write entry to writer (24 bytes, little-endian).
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        let mut buf = [0u8; ENTRY_SIZE];
        buf[0..8].copy_from_slice(&self.offset.to_le_bytes());
        buf[8..16].copy_from_slice(&self.timestamp.to_bits().to_le_bytes());
        buf[16..18].copy_from_slice(&self.type_id.to_le_bytes());
        buf[18..20].copy_from_slice(&self.src.to_le_bytes());
        buf[20..22].copy_from_slice(&self.size.to_le_bytes());
        buf[22] = self.src_ent;
        w.write_all(&buf)?;
        Ok(())
    }

    /// Read entry from reader (24 bytes, little-endian).
    pub fn read_from<R: Read>(r: &mut R) -> Result<Self> {
        let mut buf = [0u8; ENTRY_SIZE];
        r.read_exact(&mut buf)
            .map_err(|e| LsfError::InvalidIndexFile(format!("Failed to read index entry: {}", e)))?;

        let u16_at = |at: usize| u16::from_le_bytes([buf[at], buf[at + 1]]);
        let mut word = [0u8; 8];
        word.copy_from_slice(&buf[0..8]);
        let offset = u64::from_le_bytes(word);
        word.copy_from_slice(&buf[8..16]);
        let timestamp = f64::from_bits(u64::from_le_bytes(word));

        Ok(Self {
            offset,
            timestamp,
            type_id: u16_at(16),
            src: u16_at(18),
            size: u16_at(20),
            src_ent: buf[22],
        })
    }
}
