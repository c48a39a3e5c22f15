//! Record decoder.
//!
//! `decode_header` is the hot path of the index scan and touches only the
//! 20-byte header. `decode` does the full payload parse for one record and is
//! only called at point of use.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{LsfError, Result};
use crate::message::{Bitfield, FieldValue, LogMessage, MessageBody};
use crate::schema::catalog::TypeSystemCatalog;
use crate::schema::types::{FieldDef, FieldType, MessageDef};
use crate::wire::crc::crc16;
use crate::wire::header::{ByteOrder, RecordHeader, FOOTER_SIZE, HEADER_SIZE, NULL_MESSAGE_ID};

/// Inline messages nested deeper than this are rejected as malformed.
pub const MAX_NESTING: usize = 16;

/// Decode only the header at `offset`.
#[inline]
pub fn decode_header(buf: &[u8], offset: usize) -> Result<RecordHeader> {
    RecordHeader::read_at(buf, offset)
}

/// Fully decode the record at `offset`.
///
/// Returns the message and the offset of the next record. Errors:
/// - `CorruptLog` if the header is undecodable (framing lost)
/// - `MalformedRecord` if the record runs past the buffer, fails its CRC or
///   does not match its definition
/// - `UnknownType` if the catalog has no definition for the type id
pub fn decode(
    buf: &[u8],
    offset: usize,
    catalog: &TypeSystemCatalog,
) -> Result<(LogMessage, usize)> {
    let header = decode_header(buf, offset)?;
    let end = offset + header.record_len();
    if end > buf.len() {
        return Err(LsfError::malformed(
            offset,
            format!(
                "record of {} bytes runs past end of buffer ({} bytes left)",
                header.record_len(),
                buf.len() - offset
            ),
        ));
    }

    let def = catalog
        .schema_for(header.type_id)
        .ok_or(LsfError::UnknownType(header.type_id))?;

    let crc_offset = end - FOOTER_SIZE;
    let stored = header.byte_order.read_u16(&buf[crc_offset..end]);
    let computed = crc16(&buf[offset..crc_offset]);
    if stored != computed {
        return Err(LsfError::malformed(
            offset,
            format!("CRC mismatch: stored 0x{:04X}, computed 0x{:04X}", stored, computed),
        ));
    }

    if let Some(expected) = def.fixed_payload_size() {
        if expected != header.size as usize {
            return Err(LsfError::malformed(
                offset,
                format!(
                    "{} payload is {} bytes, definition needs {}",
                    def.name, header.size, expected
                ),
            ));
        }
    }

    let payload_offset = offset + HEADER_SIZE;
    let mut reader = PayloadReader {
        buf: &buf[payload_offset..crc_offset],
        pos: 0,
        base: payload_offset,
        order: header.byte_order,
        catalog,
    };
    let body = reader.read_body(def, 0)?;
    if reader.remaining() != 0 {
        return Err(LsfError::malformed(
            offset,
            format!(
                "{} trailing payload bytes after {}",
                reader.remaining(),
                def.name
            ),
        ));
    }

    Ok((LogMessage { header, body }, end))
}

// ── Payload Reader ─────────────────────────────────────────────────

struct PayloadReader<'a> {
    buf: &'a [u8],
    pos: usize,
    /// Absolute offset of `buf[0]` in the log, for error reporting.
    base: usize,
    order: ByteOrder,
    catalog: &'a TypeSystemCatalog,
}

impl<'a> PayloadReader<'a> {
    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(LsfError::malformed(
                self.base + self.pos,
                format!("payload truncated: need {} bytes, have {}", n, self.remaining()),
            ));
        }
        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        let order = self.order;
        Ok(order.read_u16(self.take(2)?))
    }

    fn u32(&mut self) -> Result<u32> {
        let order = self.order;
        Ok(order.read_u32(self.take(4)?))
    }

    fn u64(&mut self) -> Result<u64> {
        let order = self.order;
        Ok(order.read_u64(self.take(8)?))
    }

    fn read_body(&mut self, def: &Arc<MessageDef>, depth: usize) -> Result<MessageBody> {
        if depth > MAX_NESTING {
            return Err(LsfError::malformed(
                self.base + self.pos,
                format!("inline messages nested deeper than {}", MAX_NESTING),
            ));
        }

        let mut values = Vec::with_capacity(def.fields.len());
        for field in &def.fields {
            values.push(self.read_field(field, depth)?);
        }
        Ok(MessageBody::new(Arc::clone(def), values))
    }

    fn read_inline(&mut self, type_id: u16, depth: usize) -> Result<MessageBody> {
        let def = self
            .catalog
            .schema_for(type_id)
            .ok_or(LsfError::UnknownType(type_id))?;
        self.read_body(def, depth + 1)
    }

    fn read_field(&mut self, field: &FieldDef, depth: usize) -> Result<FieldValue> {
        let value = match field.field_type {
            FieldType::U8 => FieldValue::Int(self.u8()? as i64),
            FieldType::U16 => FieldValue::Int(self.u16()? as i64),
            FieldType::U32 => FieldValue::Int(self.u32()? as i64),
            FieldType::I8 => FieldValue::Int(self.u8()? as i8 as i64),
            FieldType::I16 => FieldValue::Int(self.u16()? as i16 as i64),
            FieldType::I32 => FieldValue::Int(self.u32()? as i32 as i64),
            FieldType::I64 => FieldValue::Int(self.u64()? as i64),
            FieldType::Fp32 => FieldValue::Float(f32::from_bits(self.u32()?) as f64),
            FieldType::Fp64 => FieldValue::Float(f64::from_bits(self.u64()?)),
            FieldType::RawData => {
                let len = self.u16()? as usize;
                FieldValue::Bytes(self.take(len)?.to_vec())
            }
            FieldType::PlainText => {
                let at = self.base + self.pos;
                let len = self.u16()? as usize;
                let bytes = self.take(len)?;
                let text = std::str::from_utf8(bytes).map_err(|_| {
                    LsfError::malformed(at, format!("field {} is not valid UTF-8", field.name))
                })?;
                FieldValue::Text(text.to_string())
            }
            FieldType::Message => match self.u16()? {
                NULL_MESSAGE_ID => FieldValue::Message(None),
                type_id => FieldValue::Message(Some(Box::new(self.read_inline(type_id, depth)?))),
            },
            FieldType::MessageList => {
                let count = self.u16()? as usize;
                let mut items = Vec::with_capacity(count.min(self.remaining() / 2));
                for _ in 0..count {
                    let type_id = self.u16()?;
                    items.push(self.read_inline(type_id, depth)?);
                }
                FieldValue::List(items)
            }
        };

        if field.is_bitfield() {
            if let FieldValue::Int(raw) = value {
                let raw = raw as u64;
                let flags: BTreeMap<String, bool> = field
                    .bits
                    .iter()
                    .map(|bit| (bit.name.clone(), raw & bit.value != 0))
                    .collect();
                return Ok(FieldValue::Bits(Bitfield { raw, flags }));
            }
        }

        Ok(value)
    }
}
