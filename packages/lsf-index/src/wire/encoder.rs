//! Record encoder, the inverse of [`decode`](crate::wire::decoder::decode).
//!
//! The header's byte order is preserved and the size and CRC are recomputed,
//! so encoding a decoded message reproduces the original record bytes.

use crate::error::{LsfError, Result};
use crate::message::{FieldValue, LogMessage, MessageBody};
use crate::schema::types::{FieldDef, FieldType};
use crate::wire::crc::crc16;
use crate::wire::header::{ByteOrder, RecordHeader, HEADER_SIZE, NULL_MESSAGE_ID};

/// Encode a decoded message back to its record bytes.
pub fn encode(message: &LogMessage) -> Result<Vec<u8>> {
    encode_record(&message.header, &message.body)
}

/// Encode `body` under `header`. The header's `size` is ignored and replaced
/// by the encoded payload length.
pub fn encode_record(header: &RecordHeader, body: &MessageBody) -> Result<Vec<u8>> {
    if header.type_id != body.type_id() {
        return Err(LsfError::Encode(format!(
            "header type id {} does not match body type {} ({})",
            header.type_id,
            body.type_id(),
            body.type_name()
        )));
    }

    let order = header.byte_order;
    let mut payload = Vec::new();
    write_body(&mut payload, order, body)?;

    let size = u16::try_from(payload.len()).map_err(|_| {
        LsfError::Encode(format!(
            "{} payload of {} bytes exceeds the 65535 byte record limit",
            body.type_name(),
            payload.len()
        ))
    })?;

    let mut out = Vec::with_capacity(HEADER_SIZE + payload.len() + 2);
    RecordHeader { size, ..*header }.write_to(&mut out);
    out.extend_from_slice(&payload);
    let crc = crc16(&out);
    order.write_u16(&mut out, crc);
    Ok(out)
}

fn write_body(out: &mut Vec<u8>, order: ByteOrder, body: &MessageBody) -> Result<()> {
    let def = body.def();
    if def.fields.len() != body.values().len() {
        return Err(LsfError::Encode(format!(
            "{} has {} fields but {} values",
            def.name,
            def.fields.len(),
            body.values().len()
        )));
    }
    for (field, value) in def.fields.iter().zip(body.values()) {
        write_field(out, order, &def.name, field, value)?;
    }
    Ok(())
}

fn write_field(
    out: &mut Vec<u8>,
    order: ByteOrder,
    message: &str,
    field: &FieldDef,
    value: &FieldValue,
) -> Result<()> {
    let mismatch = || {
        LsfError::Encode(format!(
            "{}.{}: value {:?} does not fit type {:?}",
            message, field.name, value, field.field_type
        ))
    };

    match field.field_type {
        FieldType::U8 | FieldType::I8 => {
            let v = value.as_i64().ok_or_else(mismatch)?;
            out.push(v as u8);
        }
        FieldType::U16 | FieldType::I16 => {
            let v = value.as_i64().ok_or_else(mismatch)?;
            order.write_u16(out, v as u16);
        }
        FieldType::U32 | FieldType::I32 => {
            let v = value.as_i64().ok_or_else(mismatch)?;
            order.write_u32(out, v as u32);
        }
        FieldType::I64 => {
            let v = value.as_i64().ok_or_else(mismatch)?;
            order.write_u64(out, v as u64);
        }
        FieldType::Fp32 => {
            let v = value.as_f64().ok_or_else(mismatch)?;
            order.write_u32(out, (v as f32).to_bits());
        }
        FieldType::Fp64 => {
            let v = value.as_f64().ok_or_else(mismatch)?;
            order.write_u64(out, v.to_bits());
        }
        FieldType::RawData => {
            let bytes = value.as_bytes().ok_or_else(mismatch)?;
            write_prefixed(out, order, bytes).map_err(|_| mismatch())?;
        }
        FieldType::PlainText => {
            let text = value.as_str().ok_or_else(mismatch)?;
            write_prefixed(out, order, text.as_bytes()).map_err(|_| mismatch())?;
        }
        FieldType::Message => match value {
            FieldValue::Message(None) => order.write_u16(out, NULL_MESSAGE_ID),
            FieldValue::Message(Some(inner)) => {
                order.write_u16(out, inner.type_id());
                write_body(out, order, inner)?;
            }
            _ => return Err(mismatch()),
        },
        FieldType::MessageList => match value {
            FieldValue::List(items) => {
                let count = u16::try_from(items.len()).map_err(|_| mismatch())?;
                order.write_u16(out, count);
                for item in items {
                    order.write_u16(out, item.type_id());
                    write_body(out, order, item)?;
                }
            }
            _ => return Err(mismatch()),
        },
    }
    Ok(())
}

fn write_prefixed(out: &mut Vec<u8>, order: ByteOrder, bytes: &[u8]) -> std::result::Result<(), ()> {
    let len = u16::try_from(bytes.len()).map_err(|_| ())?;
    order.write_u16(out, len);
    out.extend_from_slice(bytes);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::catalog::TypeSystemCatalog;
    use crate::wire::decoder::decode;
    use std::sync::Arc;

    fn announce(catalog: &TypeSystemCatalog, name: &str) -> MessageBody {
        let def = catalog.schema_for(151).unwrap();
        MessageBody::new(
            Arc::clone(def),
            vec![
                FieldValue::Text(name.to_string()),
                FieldValue::Int(2),
                FieldValue::Int(0xFFFF),
                FieldValue::Float(0.7223),
                FieldValue::Float(-0.1527),
                FieldValue::Float(0.0),
                FieldValue::Text("imc+udp://10.0.10.60:6002/".to_string()),
            ],
        )
    }

    #[test]
    fn test_decode_then_encode_is_byte_exact() {
        let catalog = TypeSystemCatalog::bundled();
        for order in [ByteOrder::Little, ByteOrder::Big] {
            let mut header = RecordHeader::new(151, 1_400_000_123.5, 0x1C0A, 0);
            header.byte_order = order;
            let bytes = encode_record(&header, &announce(&catalog, "lauv-xplore-1")).unwrap();

            let (msg, _) = decode(&bytes, 0, &catalog).unwrap();
            assert_eq!(encode(&msg).unwrap(), bytes);
        }
    }

    #[test]
    fn test_size_recomputed() {
        let catalog = TypeSystemCatalog::bundled();
        let mut header = RecordHeader::new(151, 1.0, 1, 0);
        header.size = 9999;
        let bytes = encode_record(&header, &announce(&catalog, "x")).unwrap();
        let parsed = RecordHeader::read_at(&bytes, 0).unwrap();
        assert_eq!(parsed.record_len(), bytes.len());
    }

    #[test]
    fn test_null_inline_message() {
        let catalog = TypeSystemCatalog::from_json_str(
            r#"{ "version": "t", "messages": [
                { "id": 10, "name": "Wrapper", "fields": [{ "name": "inner", "type": "message" }] },
                { "id": 11, "name": "Leaf", "fields": [{ "name": "v", "type": "int16" }] } ] }"#,
        )
        .unwrap();
        let wrapper = Arc::clone(catalog.schema_for(10).unwrap());
        let leaf = Arc::clone(catalog.schema_for(11).unwrap());

        for inner in [
            None,
            Some(Box::new(MessageBody::new(leaf, vec![FieldValue::Int(-5)]))),
        ] {
            let body = MessageBody::new(Arc::clone(&wrapper), vec![FieldValue::Message(inner)]);
            let bytes = encode_record(&RecordHeader::new(10, 0.0, 1, 1), &body).unwrap();
            let (msg, _) = decode(&bytes, 0, &catalog).unwrap();
            assert_eq!(msg.body, body);
        }
    }

    #[test]
    fn test_type_mismatch_rejected() {
        let catalog = TypeSystemCatalog::bundled();
        let def = catalog.schema_for(263).unwrap();
        let body = MessageBody::new(Arc::clone(def), vec![FieldValue::Text("warm".into())]);
        let err = encode_record(&RecordHeader::new(263, 0.0, 1, 1), &body).unwrap_err();
        assert_eq!(err.code(), "ENCODE");
    }

    #[test]
    fn test_header_body_type_mismatch_rejected() {
        let catalog = TypeSystemCatalog::bundled();
        let err =
            encode_record(&RecordHeader::new(350, 0.0, 1, 1), &announce(&catalog, "x")).unwrap_err();
        assert!(matches!(err, LsfError::Encode(_)));
    }
}
