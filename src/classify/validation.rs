//! Strict schema for the semantic service's reply.
//!
//! Closed intent set, confidence in [0, 1], entity fields restricted to the
//! known set. Unknown fields anywhere fail the whole reply. Absolute dates
//! the service volunteers (`date`, `start`, `end`) are accepted by the
//! schema and then dropped: only the relative label survives, to be resolved
//! locally.

use chrono::NaiveTime;
use serde::Deserialize;

use super::FallbackError;
use crate::models::{
    AppointmentIdentifier, DateRange, EntitySet, Intent, NoteCategory, ScheduledDatetime,
};

const MAX_FIELD_CHARS: usize = 500;

/// A reply that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedReply {
    pub intent: Intent,
    pub confidence: f32,
    pub entities: EntitySet,
    pub rationale: Option<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct WireReply {
    intent: String,
    confidence: f64,
    #[serde(default)]
    entities: Option<WireEntities>,
    #[serde(default)]
    rationale: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct WireEntities {
    person_name: Option<String>,
    record_id: Option<String>,
    category: Option<String>,
    #[serde(alias = "content")]
    free_text: Option<String>,
    date_range: Option<WireDateRange>,
    datetime: Option<WireDatetime>,
    appointment_type: Option<String>,
    location: Option<String>,
    identifier: Option<WireIdentifier>,
    new_datetime: Option<WireDatetime>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct WireDateRange {
    label: String,
    #[serde(default)]
    start: Option<serde_json::Value>,
    #[serde(default)]
    end: Option<serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct WireDatetime {
    date_label: Option<String>,
    time: Option<String>,
    #[serde(default)]
    date: Option<serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct WireIdentifier {
    person_name: Option<String>,
    date_label: Option<String>,
    time: Option<String>,
}

/// Parse and validate a raw reply body.
pub fn validate_reply(raw: &str) -> Result<ValidatedReply, FallbackError> {
    let json = extract_json_object(raw)?;
    let wire: WireReply =
        serde_json::from_str(json).map_err(|e| FallbackError::Validation(e.to_string()))?;

    let intent: Intent = wire
        .intent
        .trim()
        .parse()
        .map_err(|e: crate::models::InvalidEnum| FallbackError::Validation(e.to_string()))?;

    if !wire.confidence.is_finite() || !(0.0..=1.0).contains(&wire.confidence) {
        return Err(FallbackError::Validation(format!(
            "confidence {} outside [0, 1]",
            wire.confidence
        )));
    }

    let entities = match wire.entities {
        Some(e) => convert_entities(e)?,
        None => EntitySet::default(),
    };

    Ok(ValidatedReply {
        intent,
        confidence: wire.confidence as f32,
        entities,
        rationale: clean_text("rationale", wire.rationale)?,
    })
}

/// Strip code fences / chatter around the JSON object.
fn extract_json_object(raw: &str) -> Result<&str, FallbackError> {
    let start = raw
        .find('{')
        .ok_or_else(|| FallbackError::Validation("no JSON object in reply".into()))?;
    let end = raw
        .rfind('}')
        .ok_or_else(|| FallbackError::Validation("unclosed JSON object".into()))?;
    if end < start {
        return Err(FallbackError::Validation("unclosed JSON object".into()));
    }
    Ok(&raw[start..=end])
}

fn convert_entities(wire: WireEntities) -> Result<EntitySet, FallbackError> {
    let category = match clean_text("category", wire.category)? {
        Some(raw) => Some(NoteCategory::from_alias(&raw).ok_or_else(|| {
            FallbackError::Validation(format!("unknown category: {raw}"))
        })?),
        None => None,
    };

    let date_range = match wire.date_range {
        Some(range) => {
            if range.start.is_some() || range.end.is_some() {
                tracing::debug!("Ignoring absolute range bounds from semantic service");
            }
            clean_text("dateRange.label", Some(range.label))?.map(|l| DateRange::unresolved(l.to_lowercase()))
        }
        None => None,
    };

    let identifier = match wire.identifier {
        Some(id) => {
            let at = convert_datetime(WireDatetime {
                date_label: id.date_label,
                time: id.time,
                date: None,
            })?;
            Some(AppointmentIdentifier {
                person_name: clean_text("identifier.personName", id.person_name)?,
                at,
            })
        }
        None => None,
    };

    Ok(EntitySet {
        person_name: clean_text("personName", wire.person_name)?,
        record_id: clean_text("recordId", wire.record_id)?,
        category,
        free_text: clean_text("freeText", wire.free_text)?,
        date_range,
        datetime: wire.datetime.map(convert_datetime).transpose()?.flatten(),
        appointment_type: clean_text("appointmentType", wire.appointment_type)?
            .map(|t| t.to_lowercase()),
        location: clean_text("location", wire.location)?,
        identifier,
        new_datetime: wire.new_datetime.map(convert_datetime).transpose()?.flatten(),
    })
}

fn convert_datetime(wire: WireDatetime) -> Result<Option<ScheduledDatetime>, FallbackError> {
    if wire.date.is_some() {
        tracing::debug!("Ignoring absolute date from semantic service");
    }
    let label = clean_text("dateLabel", wire.date_label)?.map(|l| l.to_lowercase());
    let time = match clean_text("time", wire.time)? {
        Some(raw) => Some(parse_wire_time(&raw)?),
        None => None,
    };
    let dt = ScheduledDatetime::new(label, time);
    Ok(if dt.is_empty() { None } else { Some(dt) })
}

fn parse_wire_time(raw: &str) -> Result<NaiveTime, FallbackError> {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|_| FallbackError::Validation(format!("time not HH:MM: {raw}")))
}

fn clean_text(field: &str, value: Option<String>) -> Result<Option<String>, FallbackError> {
    let Some(value) = value else {
        return Ok(None);
    };
    let trimmed = value.trim();
    if trimmed.chars().count() > MAX_FIELD_CHARS {
        return Err(FallbackError::Validation(format!("{field} too long")));
    }
    Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
}
