//! Message definition types.
//!
//! A schema is a list of message definitions, each an ordered list of typed
//! fields. Definitions are immutable once the catalog is loaded and are shared
//! by every decoded message through `Arc<MessageDef>`.

use serde::{Deserialize, Serialize};

// ── Field Types ────────────────────────────────────────────────────

/// Wire type of a single payload field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    #[serde(rename = "uint8")]
    U8,
    #[serde(rename = "uint16")]
    U16,
    #[serde(rename = "uint32")]
    U32,
    #[serde(rename = "int8")]
    I8,
    #[serde(rename = "int16")]
    I16,
    #[serde(rename = "int32")]
    I32,
    #[serde(rename = "int64")]
    I64,
    #[serde(rename = "fp32")]
    Fp32,
    #[serde(rename = "fp64")]
    Fp64,
    /// u16 length prefix + bytes
    #[serde(rename = "rawdata")]
    RawData,
    /// u16 length prefix + UTF-8 text
    #[serde(rename = "plaintext")]
    PlainText,
    /// u16 type id (0xFFFF = null) + inline body
    #[serde(rename = "message")]
    Message,
    /// u16 count + inline messages
    #[serde(rename = "message-list")]
    MessageList,
}

impl FieldType {
    /// Encoded size for fixed-width types, `None` for variable-length ones.
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            FieldType::U8 | FieldType::I8 => Some(1),
            FieldType::U16 | FieldType::I16 => Some(2),
            FieldType::U32 | FieldType::I32 | FieldType::Fp32 => Some(4),
            FieldType::I64 | FieldType::Fp64 => Some(8),
            _ => None,
        }
    }

    /// Whether values of this type may carry a bit definition list.
    pub fn is_unsigned_integer(self) -> bool {
        matches!(self, FieldType::U8 | FieldType::U16 | FieldType::U32)
    }
}

/// One named flag of a bitfield.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitDef {
    pub name: String,
    pub value: u64,
}

/// One payload field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Flag definitions for bitfield-valued integers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bits: Vec<BitDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl FieldDef {
    pub fn new(name: &str, field_type: FieldType) -> Self {
        Self {
            name: name.to_string(),
            field_type,
            bits: Vec::new(),
            unit: None,
        }
    }

    pub fn is_bitfield(&self) -> bool {
        !self.bits.is_empty()
    }
}

// ── Message Kinds ──────────────────────────────────────────────────

/// Message kinds the crate gives typed access to. Resolved once per
/// definition when the catalog loads, so nothing downstream compares type
/// names again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MessageKind {
    EntityInfo,
    Announce,
    EstimatedState,
    GpsFix,
    Distance,
    #[default]
    Generic,
}

impl MessageKind {
    pub fn from_name(name: &str) -> Self {
        match name {
            "EntityInfo" => MessageKind::EntityInfo,
            "Announce" => MessageKind::Announce,
            "EstimatedState" => MessageKind::EstimatedState,
            "GpsFix" => MessageKind::GpsFix,
            "Distance" => MessageKind::Distance,
            _ => MessageKind::Generic,
        }
    }
}

// ── Message Definition ─────────────────────────────────────────────

/// Definition of one message type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageDef {
    pub id: u16,
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    #[serde(skip)]
    pub kind: MessageKind,
}

impl MessageDef {
    pub fn new(id: u16, name: &str, fields: Vec<FieldDef>) -> Self {
        Self {
            id,
            name: name.to_string(),
            fields,
            kind: MessageKind::from_name(name),
        }
    }

    /// Position of a field in the definition order.
    pub fn field_position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Payload size when every field is fixed-width.
    pub fn fixed_payload_size(&self) -> Option<usize> {
        self.fields
            .iter()
            .map(|f| f.field_type.fixed_size())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_type_serde_names() {
        let t: FieldType = serde_json::from_str("\"message-list\"").unwrap();
        assert_eq!(t, FieldType::MessageList);
        let t: FieldType = serde_json::from_str("\"fp32\"").unwrap();
        assert_eq!(t, FieldType::Fp32);
        assert!(serde_json::from_str::<FieldType>("\"float\"").is_err());
    }

    #[test]
    fn test_fixed_payload_size() {
        let def = MessageDef::new(
            1,
            "Pair",
            vec![FieldDef::new("a", FieldType::U8), FieldDef::new("b", FieldType::Fp64)],
        );
        assert_eq!(def.fixed_payload_size(), Some(9));

        let def = MessageDef::new(2, "Text", vec![FieldDef::new("t", FieldType::PlainText)]);
        assert_eq!(def.fixed_payload_size(), None);
    }

    #[test]
    fn test_kind_resolution() {
        assert_eq!(MessageKind::from_name("EstimatedState"), MessageKind::EstimatedState);
        assert_eq!(MessageKind::from_name("Temperature"), MessageKind::Generic);
        let def = MessageDef::new(3, "EntityInfo", vec![]);
        assert_eq!(def.kind, MessageKind::EntityInfo);
    }
}
