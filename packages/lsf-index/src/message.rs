//! Decoded message model.
//!
//! A `LogMessage` is one fully decoded record: its header plus a body whose
//! values are stored in the order of the message definition. Field names are
//! not copied per message; they are read from the shared `MessageDef`.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::schema::types::{MessageDef, MessageKind};
use crate::wire::header::RecordHeader;

/// Decoded bitfield: raw value plus the state of every defined flag.
#[derive(Debug, Clone, PartialEq)]
pub struct Bitfield {
    pub raw: u64,
    pub flags: BTreeMap<String, bool>,
}

impl Bitfield {
    pub fn is_set(&self, flag: &str) -> bool {
        self.flags.get(flag).copied().unwrap_or(false)
    }
}

/// Value of one payload field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Bits(Bitfield),
    /// Inline message; `None` encodes the null message.
    Message(Option<Box<MessageBody>>),
    List(Vec<MessageBody>),
}

impl FieldValue {
    /// Numeric view of the value (integers, floats and bitfield raw values).
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Int(v) => Some(*v as f64),
            FieldValue::Float(v) => Some(*v),
            FieldValue::Bits(b) => Some(b.raw as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Int(v) => Some(*v),
            FieldValue::Bits(b) => Some(b.raw as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            FieldValue::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

/// Message payload: definition plus values in definition order.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageBody {
    def: Arc<MessageDef>,
    values: Vec<FieldValue>,
}

impl MessageBody {
    /// Build a body. `values` must follow the definition's field order.
    pub fn new(def: Arc<MessageDef>, values: Vec<FieldValue>) -> Self {
        debug_assert_eq!(
            def.fields.len(),
            values.len(),
            "value count must match the definition of {}",
            def.name
        );
        Self { def, values }
    }

    pub fn def(&self) -> &Arc<MessageDef> {
        &self.def
    }

    pub fn type_id(&self) -> u16 {
        self.def.id
    }

    pub fn type_name(&self) -> &str {
        &self.def.name
    }

    pub fn kind(&self) -> MessageKind {
        self.def.kind
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.def.field_position(field).map(|i| &self.values[i])
    }

    pub fn get_f64(&self, field: &str) -> Option<f64> {
        self.get(field).and_then(FieldValue::as_f64)
    }

    pub fn get_i64(&self, field: &str) -> Option<i64> {
        self.get(field).and_then(FieldValue::as_i64)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(FieldValue::as_str)
    }

    pub fn values(&self) -> &[FieldValue] {
        &self.values
    }

    /// (field name, value) pairs in definition order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> + '_ {
        self.def
            .fields
            .iter()
            .map(|f| f.name.as_str())
            .zip(self.values.iter())
    }
}

/// One decoded log record.
#[derive(Debug, Clone, PartialEq)]
pub struct LogMessage {
    pub header: RecordHeader,
    pub body: MessageBody,
}

impl LogMessage {
    pub fn type_id(&self) -> u16 {
        self.header.type_id
    }

    pub fn type_name(&self) -> &str {
        self.body.type_name()
    }

    pub fn timestamp(&self) -> f64 {
        self.header.timestamp
    }

    pub fn timestamp_millis(&self) -> i64 {
        (self.header.timestamp * 1000.0) as i64
    }

    pub fn src(&self) -> u16 {
        self.header.src
    }

    pub fn src_ent(&self) -> u8 {
        self.header.src_ent
    }

    pub fn dst(&self) -> u16 {
        self.header.dst
    }

    pub fn dst_ent(&self) -> u8 {
        self.header.dst_ent
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.body.get(field)
    }

    pub fn get_f64(&self, field: &str) -> Option<f64> {
        self.body.get_f64(field)
    }

    pub fn get_i64(&self, field: &str) -> Option<i64> {
        self.body.get_i64(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.body.get_str(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::{FieldDef, FieldType};

    fn temperature(value: f64) -> MessageBody {
        let def = Arc::new(MessageDef::new(
            263,
            "Temperature",
            vec![FieldDef::new("value", FieldType::Fp32)],
        ));
        MessageBody::new(def, vec![FieldValue::Float(value)])
    }

    #[test]
    fn test_body_accessors() {
        let body = temperature(14.5);
        assert_eq!(body.type_id(), 263);
        assert_eq!(body.type_name(), "Temperature");
        assert_eq!(body.get_f64("value"), Some(14.5));
        assert_eq!(body.get_i64("value"), None);
        assert!(body.get("missing").is_none());

        let names: Vec<&str> = body.fields().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["value"]);
    }

    #[test]
    fn test_bitfield_flags() {
        let mut flags = BTreeMap::new();
        flags.insert("VALID_POS".to_string(), true);
        flags.insert("VALID_TIME".to_string(), false);
        let bits = Bitfield { raw: 4, flags };
        assert!(bits.is_set("VALID_POS"));
        assert!(!bits.is_set("VALID_TIME"));
        assert!(!bits.is_set("UNDEFINED"));
        assert_eq!(FieldValue::Bits(bits).as_i64(), Some(4));
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(FieldValue::Int(-3).as_f64(), Some(-3.0));
        assert_eq!(FieldValue::Text("x".into()).as_str(), Some("x"));
        assert_eq!(FieldValue::Bytes(vec![1, 2]).as_bytes(), Some(&[1u8, 2][..]));
        assert_eq!(FieldValue::Message(None).as_f64(), None);
    }
}
