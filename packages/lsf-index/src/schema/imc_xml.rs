//! IMC.xml schema reader.
//!
//! Reads the `<messages>` document shipped with IMC logs into the same
//! message definitions the JSON schema produces. Names come from the
//! `abbrev` attributes. Bit definitions come from a global `<bitfields>`
//! definition named by `bitfield-def`, or from the inline `<value>` children
//! of a `unit="Bitfield"` field.
//!
//! ```text
//! <messages version="5.4.30">
//!   <bitfields>
//!     <def abbrev="CL"><value abbrev="NAVIGATION" id="0x01"/></def>
//!   </bitfields>
//!   <message id="350" name="Estimated State" abbrev="EstimatedState">
//!     <field abbrev="lat" type="fp64_t" unit="rad"/>
//!   </message>
//! </messages>
//! ```

use std::collections::HashMap;

use roxmltree::{Document, Node, ParsingOptions};

use crate::error::{LsfError, Result};
use crate::schema::types::{BitDef, FieldDef, FieldType, MessageDef};

/// Version string and message definitions of an IMC.xml document.
pub(crate) fn read_messages(text: &str) -> Result<(String, Vec<MessageDef>)> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..Default::default()
    };
    let doc = Document::parse_with_options(text, options)
        .map_err(|e| LsfError::SchemaLoad(format!("invalid schema XML: {}", e)))?;

    let root = doc.root_element();
    if !root.has_tag_name("messages") {
        return Err(LsfError::SchemaLoad(format!(
            "expected <messages> root, found <{}>",
            root.tag_name().name()
        )));
    }
    let version = root.attribute("version").unwrap_or_default().to_string();

    let global_bits = global_bitfields(root)?;
    let mut messages = Vec::new();
    for node in root.children().filter(|n| n.has_tag_name("message")) {
        messages.push(read_message(node, &global_bits)?);
    }
    Ok((version, messages))
}

fn global_bitfields(root: Node) -> Result<HashMap<String, Vec<BitDef>>> {
    let mut defs = HashMap::new();
    for group in root.children().filter(|n| n.has_tag_name("bitfields")) {
        for def in group.children().filter(|n| n.has_tag_name("def")) {
            let abbrev = required(def, "abbrev")?;
            defs.insert(abbrev.to_string(), read_values(def)?);
        }
    }
    Ok(defs)
}

fn read_message(node: Node, global_bits: &HashMap<String, Vec<BitDef>>) -> Result<MessageDef> {
    let name = required(node, "abbrev")?;
    let id = parse_number(required(node, "id")?)
        .and_then(|id| u16::try_from(id).ok())
        .ok_or_else(|| LsfError::SchemaLoad(format!("{}: invalid message id", name)))?;

    let mut fields = Vec::new();
    for field in node.children().filter(|n| n.has_tag_name("field")) {
        fields.push(read_field(field, name, global_bits)?);
    }
    Ok(MessageDef::new(id, name, fields))
}

fn read_field(
    node: Node,
    message: &str,
    global_bits: &HashMap<String, Vec<BitDef>>,
) -> Result<FieldDef> {
    let name = required(node, "abbrev")?;
    let type_name = required(node, "type")?;
    let field_type = field_type(type_name).ok_or_else(|| {
        LsfError::SchemaLoad(format!(
            "{}.{}: unknown field type {}",
            message, name, type_name
        ))
    })?;

    let mut field = FieldDef::new(name, field_type);
    if let Some(def) = node.attribute("bitfield-def") {
        field.bits = global_bits.get(def).cloned().ok_or_else(|| {
            LsfError::SchemaLoad(format!(
                "{}.{}: unknown bitfield definition {}",
                message, name, def
            ))
        })?;
    }
    match node.attribute("unit") {
        Some("Bitfield") if field.bits.is_empty() => field.bits = read_values(node)?,
        Some("Bitfield") | Some("Enumerated") | None => {}
        Some(unit) => field.unit = Some(unit.to_string()),
    }
    Ok(field)
}

fn read_values(node: Node) -> Result<Vec<BitDef>> {
    node.children()
        .filter(|n| n.has_tag_name("value"))
        .map(|value| -> Result<BitDef> {
            let name = required(value, "abbrev")?;
            let id = required(value, "id")?;
            let value = parse_number(id).ok_or_else(|| {
                LsfError::SchemaLoad(format!("{}: invalid value id {}", name, id))
            })?;
            Ok(BitDef {
                name: name.to_string(),
                value,
            })
        })
        .collect()
}

fn field_type(name: &str) -> Option<FieldType> {
    let t = match name {
        "uint8_t" => FieldType::U8,
        "uint16_t" => FieldType::U16,
        "uint32_t" => FieldType::U32,
        "int8_t" => FieldType::I8,
        "int16_t" => FieldType::I16,
        "int32_t" => FieldType::I32,
        "int64_t" => FieldType::I64,
        "fp32_t" => FieldType::Fp32,
        "fp64_t" => FieldType::Fp64,
        "rawdata" => FieldType::RawData,
        "plaintext" => FieldType::PlainText,
        "message" => FieldType::Message,
        "message-list" => FieldType::MessageList,
        _ => return None,
    };
    Some(t)
}

/// Decimal or `0x` hex.
fn parse_number(text: &str) -> Option<u64> {
    let text = text.trim();
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}

fn required<'a>(node: Node<'a, '_>, attribute: &str) -> Result<&'a str> {
    node.attribute(attribute).ok_or_else(|| {
        LsfError::SchemaLoad(format!(
            "<{}> without {} attribute",
            node.tag_name().name(),
            attribute
        ))
    })
}
