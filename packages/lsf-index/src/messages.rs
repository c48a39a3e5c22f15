//! Typed access to the message kinds the index and replay logic rely on.
//!
//! [`Message::from_log`] dispatches on the [`MessageKind`] resolved when the
//! catalog was loaded. Anything else, or a known kind whose definition lacks
//! an expected field, stays available as [`Message::Other`].

use crate::message::{FieldValue, LogMessage};
use crate::schema::types::MessageKind;

#[derive(Debug, Clone, PartialEq)]
pub struct EntityInfo {
    pub id: u8,
    pub label: String,
    pub component: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Announce {
    pub sys_name: String,
    pub sys_type: u8,
    /// Radians.
    pub lat: f64,
    /// Radians.
    pub lon: f64,
    pub height: f64,
}

/// Vehicle navigation state: a reference position plus a local offset.
#[derive(Debug, Clone, PartialEq)]
pub struct EstimatedState {
    /// Reference latitude, radians.
    pub lat: f64,
    /// Reference longitude, radians.
    pub lon: f64,
    pub height: f64,
    /// North offset from the reference, meters.
    pub x: f64,
    /// East offset from the reference, meters.
    pub y: f64,
    /// Down offset from the reference, meters.
    pub z: f64,
    pub phi: f64,
    pub theta: f64,
    pub psi: f64,
    pub depth: f64,
    pub alt: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GpsFix {
    pub validity: u64,
    pub lat: f64,
    pub lon: f64,
    pub height: f64,
    pub satellites: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Distance {
    pub validity: u64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    EntityInfo(EntityInfo),
    Announce(Announce),
    EstimatedState(EstimatedState),
    GpsFix(GpsFix),
    Distance(Distance),
    Other(LogMessage),
}

impl Message {
    pub fn from_log(msg: LogMessage) -> Self {
        let typed = match msg.body.kind() {
            MessageKind::EntityInfo => entity_info(&msg).map(Message::EntityInfo),
            MessageKind::Announce => announce(&msg).map(Message::Announce),
            MessageKind::EstimatedState => estimated_state(&msg).map(Message::EstimatedState),
            MessageKind::GpsFix => gps_fix(&msg).map(Message::GpsFix),
            MessageKind::Distance => distance(&msg).map(Message::Distance),
            MessageKind::Generic => None,
        };
        typed.unwrap_or(Message::Other(msg))
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            Message::EntityInfo(_) => MessageKind::EntityInfo,
            Message::Announce(_) => MessageKind::Announce,
            Message::EstimatedState(_) => MessageKind::EstimatedState,
            Message::GpsFix(_) => MessageKind::GpsFix,
            Message::Distance(_) => MessageKind::Distance,
            Message::Other(_) => MessageKind::Generic,
        }
    }
}

impl From<LogMessage> for Message {
    fn from(msg: LogMessage) -> Self {
        Message::from_log(msg)
    }
}

fn entity_info(msg: &LogMessage) -> Option<EntityInfo> {
    Some(EntityInfo {
        id: msg.get_i64("id")? as u8,
        label: msg.get_str("label")?.to_string(),
        component: msg.get_str("component").unwrap_or_default().to_string(),
    })
}

fn announce(msg: &LogMessage) -> Option<Announce> {
    Some(Announce {
        sys_name: msg.get_str("sys_name")?.to_string(),
        sys_type: msg.get_i64("sys_type").unwrap_or(0) as u8,
        lat: msg.get_f64("lat")?,
        lon: msg.get_f64("lon")?,
        height: msg.get_f64("height").unwrap_or(0.0),
    })
}

impl EstimatedState {
    pub fn from_log(msg: &LogMessage) -> Option<Self> {
        estimated_state(msg)
    }
}

fn estimated_state(msg: &LogMessage) -> Option<EstimatedState> {
    let f = |name: &str| msg.get_f64(name);
    Some(EstimatedState {
        lat: f("lat")?,
        lon: f("lon")?,
        height: f("height").unwrap_or(0.0),
        x: f("x")?,
        y: f("y")?,
        z: f("z")?,
        phi: f("phi").unwrap_or(0.0),
        theta: f("theta").unwrap_or(0.0),
        psi: f("psi").unwrap_or(0.0),
        depth: f("depth")?,
        alt: f("alt")?,
    })
}

fn bits(msg: &LogMessage, field: &str) -> Option<u64> {
    match msg.get(field)? {
        FieldValue::Bits(b) => Some(b.raw),
        FieldValue::Int(v) => Some(*v as u64),
        _ => None,
    }
}

fn gps_fix(msg: &LogMessage) -> Option<GpsFix> {
    Some(GpsFix {
        validity: bits(msg, "validity")?,
        lat: msg.get_f64("lat")?,
        lon: msg.get_f64("lon")?,
        height: msg.get_f64("height").unwrap_or(0.0),
        satellites: msg.get_i64("satellites").unwrap_or(0) as u8,
    })
}

fn distance(msg: &LogMessage) -> Option<Distance> {
    Some(Distance {
        validity: bits(msg, "validity")?,
        value: msg.get_f64("value")?,
    })
}
