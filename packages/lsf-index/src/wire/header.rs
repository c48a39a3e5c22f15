//! LSF record framing.
//!
//! Every record is a fixed 20-byte header, `size` payload bytes and a 2-byte
//! CRC footer. The producer writes in its native byte order; readers detect it
//! from the sync number.
//!
//! ```text
//! Offset  Size  Field
//! 0       2     sync: u16 = 0xFE54
//! 2       2     type_id: u16
//! 4       2     size: u16 (payload bytes)
//! 6       8     timestamp: f64 (seconds since epoch)
//! 14      2     src: u16
//! 16      1     src_ent: u8
//! 17      2     dst: u16
//! 19      1     dst_ent: u8
//! 20      size  payload
//! 20+size 2     crc16 (CRC-16/IBM over header + payload)
//! ```

use crate::error::{LsfError, Result};

// ── Constants ──────────────────────────────────────────────────────

/// Sync number as read in the producer's byte order.
pub const SYNC: u16 = 0xFE54;

/// Sync number of a record written in the opposite byte order.
pub const SYNC_SWAPPED: u16 = 0x54FE;

/// Header size in bytes.
pub const HEADER_SIZE: usize = 20;

/// CRC footer size in bytes.
pub const FOOTER_SIZE: usize = 2;

/// Type id of a null inline message.
pub const NULL_MESSAGE_ID: u16 = 0xFFFF;

/// Entity id meaning "any entity" in lookups.
pub const ANY_ENTITY: u8 = 0xFF;

/// Header field defaults used by producers for "no destination".
pub const BROADCAST_ID: u16 = 0xFFFF;

// ── Byte Order ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ByteOrder {
    #[default]
    Little,
    Big,
}

impl ByteOrder {
    #[inline]
    pub fn read_u16(self, b: &[u8]) -> u16 {
        let b = [b[0], b[1]];
        match self {
            ByteOrder::Little => u16::from_le_bytes(b),
            ByteOrder::Big => u16::from_be_bytes(b),
        }
    }

    #[inline]
    pub fn read_u32(self, b: &[u8]) -> u32 {
        let b = [b[0], b[1], b[2], b[3]];
        match self {
            ByteOrder::Little => u32::from_le_bytes(b),
            ByteOrder::Big => u32::from_be_bytes(b),
        }
    }

    #[inline]
    pub fn read_u64(self, b: &[u8]) -> u64 {
        let b = [b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]];
        match self {
            ByteOrder::Little => u64::from_le_bytes(b),
            ByteOrder::Big => u64::from_be_bytes(b),
        }
    }

    #[inline]
    pub fn write_u16(self, out: &mut Vec<u8>, v: u16) {
        match self {
            ByteOrder::Little => out.extend_from_slice(&v.to_le_bytes()),
            ByteOrder::Big => out.extend_from_slice(&v.to_be_bytes()),
        }
    }

    #[inline]
    pub fn write_u32(self, out: &mut Vec<u8>, v: u32) {
        match self {
            ByteOrder::Little => out.extend_from_slice(&v.to_le_bytes()),
            ByteOrder::Big => out.extend_from_slice(&v.to_be_bytes()),
        }
    }

    #[inline]
    pub fn write_u64(self, out: &mut Vec<u8>, v: u64) {
        match self {
            ByteOrder::Little => out.extend_from_slice(&v.to_le_bytes()),
            ByteOrder::Big => out.extend_from_slice(&v.to_be_bytes()),
        }
    }
}

// ── Header ─────────────────────────────────────────────────────────

/// Decoded record header.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordHeader {
    pub byte_order: ByteOrder,
    pub type_id: u16,
    /// Payload size in bytes.
    pub size: u16,
    pub timestamp: f64,
    pub src: u16,
    pub src_ent: u8,
    pub dst: u16,
    pub dst_ent: u8,
}

impl RecordHeader {
    /// Header for a new little-endian broadcast record. `size` is filled in
    /// when the record is encoded.
    pub fn new(type_id: u16, timestamp: f64, src: u16, src_ent: u8) -> Self {
        Self {
            byte_order: ByteOrder::Little,
            type_id,
            size: 0,
            timestamp,
            src,
            src_ent,
            dst: BROADCAST_ID,
            dst_ent: ANY_ENTITY,
        }
    }

    /// Total bytes taken by the record on disk.
    #[inline]
    pub fn record_len(&self) -> usize {
        HEADER_SIZE + self.size as usize + FOOTER_SIZE
    }

    /// Parse the header at `offset`. A missing or bad sync number means the
    /// framing is lost and is reported as `CorruptLog`.
    pub fn read_at(buf: &[u8], offset: usize) -> Result<Self> {
        let bytes = buf
            .get(offset..offset + HEADER_SIZE)
            .ok_or_else(|| LsfError::corrupt(offset, "truncated record header"))?;

        let byte_order = match u16::from_le_bytes([bytes[0], bytes[1]]) {
            SYNC => ByteOrder::Little,
            SYNC_SWAPPED => ByteOrder::Big,
            other => {
                return Err(LsfError::corrupt(
                    offset,
                    format!("bad sync number 0x{:04X}", other),
                ))
            }
        };

        Ok(Self {
            byte_order,
            type_id: byte_order.read_u16(&bytes[2..4]),
            size: byte_order.read_u16(&bytes[4..6]),
            timestamp: f64::from_bits(byte_order.read_u64(&bytes[6..14])),
            src: byte_order.read_u16(&bytes[14..16]),
            src_ent: bytes[16],
            dst: byte_order.read_u16(&bytes[17..19]),
            dst_ent: bytes[19],
        })
    }

    /// Append the header (exactly HEADER_SIZE bytes) in its own byte order.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        let order = self.byte_order;
        order.write_u16(out, SYNC);
        order.write_u16(out, self.type_id);
        order.write_u16(out, self.size);
        order.write_u64(out, self.timestamp.to_bits());
        order.write_u16(out, self.src);
        out.push(self.src_ent);
        order.write_u16(out, self.dst);
        out.push(self.dst_ent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(order: ByteOrder) -> RecordHeader {
        RecordHeader {
            byte_order: order,
            type_id: 350,
            size: 88,
            timestamp: 1_400_000_000.25,
            src: 0x1C0A,
            src_ent: 4,
            dst: BROADCAST_ID,
            dst_ent: ANY_ENTITY,
        }
    }

    #[test]
    fn test_header_size_exact() {
        let mut out = Vec::new();
        sample(ByteOrder::Little).write_to(&mut out);
        assert_eq!(out.len(), HEADER_SIZE);
        assert_eq!(&out[0..2], &[0x54, 0xFE]);
    }

    #[test]
    fn test_both_byte_orders_detected() {
        for order in [ByteOrder::Little, ByteOrder::Big] {
            let header = sample(order);
            let mut out = Vec::new();
            header.write_to(&mut out);
            let parsed = RecordHeader::read_at(&out, 0).unwrap();
            assert_eq!(parsed, header);
            assert_eq!(parsed.record_len(), HEADER_SIZE + 88 + FOOTER_SIZE);
        }
    }

    #[test]
    fn test_read_at_offset() {
        let mut out = vec![0xAA; 7];
        sample(ByteOrder::Big).write_to(&mut out);
        let parsed = RecordHeader::read_at(&out, 7).unwrap();
        assert_eq!(parsed.type_id, 350);
        assert_eq!(parsed.src, 0x1C0A);
    }

    #[test]
    fn test_bad_sync_is_corrupt() {
        let mut out = Vec::new();
        sample(ByteOrder::Little).write_to(&mut out);
        out[0] = 0x00;
        let err = RecordHeader::read_at(&out, 0).unwrap_err();
        assert_eq!(err.code(), "CORRUPT_LOG");
    }

    #[test]
    fn test_truncated_header_is_corrupt() {
        let mut out = Vec::new();
        sample(ByteOrder::Little).write_to(&mut out);
        let err = RecordHeader::read_at(&out[..HEADER_SIZE - 1], 0).unwrap_err();
        assert!(matches!(err, LsfError::CorruptLog { offset: 0, .. }));
    }
}
