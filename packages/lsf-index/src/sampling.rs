//! Value/position correlation.
//!
//! Pairs every record of a value type (depth soundings, temperature,
//! salinity, ...) with the vehicle's `EstimatedState` at or after the
//! record's timestamp. The state lookup reuses the previous answer as the
//! seek hint, so a whole log is sampled in close to one pass.

use crate::error::Result;
use crate::message::LogMessage;
use crate::messages::EstimatedState;
use crate::schema::types::MessageKind;
use crate::source::LogSource;
use crate::wire::header::ANY_ENTITY;

#[derive(Debug, Clone, Default)]
pub struct SampleOptions {
    /// Only records from the entity with this label.
    pub entity: Option<String>,
    /// Drop records closer than this (seconds) to the previous sample.
    /// 0 keeps every record.
    pub min_time_step: f64,
}

/// One value with the vehicle state it was measured at.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub timestamp: f64,
    /// Reference latitude of the state, radians.
    pub lat: f64,
    /// Reference longitude of the state, radians.
    pub lon: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub depth: f64,
    pub altitude: f64,
    pub value: f64,
    /// Record index of the value message.
    pub record: usize,
    /// Record index of the state message.
    pub state_record: usize,
}

/// Sample `field` of every `value_type` record. Records with no state at or
/// after them, or whose payload does not decode, are skipped. Unknown types,
/// entities or fields yield no samples.
pub fn sample_values(
    source: &LogSource,
    value_type: &str,
    field: &str,
    options: &SampleOptions,
) -> Result<Vec<Sample>> {
    let index = source.index();
    let catalog = index.catalog();

    let Some(value_id) = catalog.id_of(value_type) else {
        return Ok(Vec::new());
    };
    let has_field = catalog
        .schema_for(value_id)
        .is_some_and(|def| def.field_position(field).is_some());
    if !has_field {
        tracing::warn!("{} has no field {}, nothing to sample", value_type, field);
        return Ok(Vec::new());
    }
    let Some(state_id) = catalog.id_of_kind(MessageKind::EstimatedState) else {
        return Ok(Vec::new());
    };

    let entity = match &options.entity {
        Some(label) => match index.entity_id(label) {
            Some(id) => id,
            None => return Ok(Vec::new()),
        },
        None => ANY_ENTITY,
    };
    let Some(records) = index.records_of(value_id, entity) else {
        return Ok(Vec::new());
    };

    let mut samples = Vec::new();
    let mut hint = 0usize;
    let mut last_time = f64::NEG_INFINITY;

    for &record in records.iter() {
        let record = record as usize;
        let Some(t) = index.time_of(record) else {
            continue;
        };
        if options.min_time_step > 0.0 && t - last_time < options.min_time_step {
            continue;
        }
        // The previous state only bounds the answer while time moves forward.
        if index.time_of(hint).map_or(true, |ts| ts >= t) {
            hint = 0;
        }
        let Some(state_record) = index.nearest_at_or_after(state_id, ANY_ENTITY, hint, t) else {
            continue;
        };
        hint = state_record;

        let Some(value_msg) = decode_or_skip(source, record)? else {
            continue;
        };
        let Some(value) = value_msg.get_f64(field) else {
            continue;
        };
        let Some(state_msg) = decode_or_skip(source, state_record)? else {
            continue;
        };
        let Some(state) = EstimatedState::from_log(&state_msg) else {
            continue;
        };

        last_time = t;
        samples.push(Sample {
            timestamp: t,
            lat: state.lat,
            lon: state.lon,
            x: state.x,
            y: state.y,
            z: state.z,
            depth: state.depth,
            altitude: state.alt,
            value,
            record,
            state_record,
        });
    }

    Ok(samples)
}

/// `Ok(None)` for a record whose payload does not decode.
fn decode_or_skip(source: &LogSource, record: usize) -> Result<Option<LogMessage>> {
    match source.index().message_at(record) {
        Ok(msg) => Ok(Some(msg)),
        Err(e) if e.is_record_local() => {
            tracing::warn!("sampling skipping record {}: {}", record, e);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
