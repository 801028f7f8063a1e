//! Typed fields pulled out of an utterance.
//!
//! Concrete dates (`DateRange::start/end`, `ScheduledDatetime::date`) are
//! crate-private: only the local resolver in `extraction::temporal` writes
//! them. These types are deliberately `Serialize`-only so nothing can smuggle
//! a computed date in from outside.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

use super::enums::NoteCategory;

/// A span of days, e.g. "tomorrow" or "next week", for calendar queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub label: String,
    pub(crate) start: Option<NaiveDateTime>,
    pub(crate) end: Option<NaiveDateTime>,
}

impl DateRange {
    /// A range known only by its relative label.
    pub fn unresolved(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            start: None,
            end: None,
        }
    }

    pub fn start(&self) -> Option<NaiveDateTime> {
        self.start
    }

    pub fn end(&self) -> Option<NaiveDateTime> {
        self.end
    }

    pub fn is_resolved(&self) -> bool {
        self.start.is_some() && self.end.is_some()
    }
}

/// A single moment for scheduling: relative day label plus clock time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledDatetime {
    pub date_label: Option<String>,
    pub time: Option<NaiveTime>,
    pub(crate) date: Option<NaiveDate>,
}

impl ScheduledDatetime {
    pub fn new(date_label: Option<String>, time: Option<NaiveTime>) -> Self {
        Self {
            date_label,
            time,
            date: None,
        }
    }

    /// Concrete date computed by the local resolver, if any.
    pub fn resolved_date(&self) -> Option<NaiveDate> {
        self.date
    }

    /// Date and time both known: enough to book a slot.
    pub fn is_complete(&self) -> bool {
        self.date.is_some() && self.time.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.date_label.is_none() && self.time.is_none()
    }

}

/// Field-wise merge for the nested entity types.
trait FillFrom {
    fn fill_from(&mut self, other: &Self);
}

impl FillFrom for ScheduledDatetime {
    /// Fill missing label/time from another reading of the same moment.
    fn fill_from(&mut self, other: &Self) {
        if self.date_label.is_none() {
            self.date_label = other.date_label.clone();
            self.date = None;
        }
        fill(&mut self.time, &other.time);
    }
}

/// Reference to an existing appointment, by person and/or time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentIdentifier {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub person_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub at: Option<ScheduledDatetime>,
}

impl AppointmentIdentifier {
    /// Enough to match a record: a name, or a time of day.
    pub fn is_usable(&self) -> bool {
        self.person_name.is_some() || self.at.as_ref().is_some_and(|at| at.time.is_some())
    }
}

impl FillFrom for AppointmentIdentifier {
    fn fill_from(&mut self, other: &Self) {
        fill(&mut self.person_name, &other.person_name);
        fill_nested(&mut self.at, &other.at);
    }
}

/// All fields any intent may carry. Everything is optional; the gate
/// decides which ones an intent actually needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub person_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<NoteCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub free_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datetime: Option<ScheduledDatetime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appointment_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<AppointmentIdentifier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_datetime: Option<ScheduledDatetime>,
}

impl EntitySet {
    pub fn is_empty(&self) -> bool {
        *self == EntitySet::default()
    }

    /// Fill absent fields from `other`. Fields already present win.
    ///
    /// Used to layer lower-trust entities (fallback service, nudge
    /// follow-ups) underneath the ones extracted locally.
    pub fn merge_missing(mut self, other: &EntitySet) -> EntitySet {
        fill(&mut self.person_name, &other.person_name);
        fill(&mut self.record_id, &other.record_id);
        fill(&mut self.category, &other.category);
        fill(&mut self.free_text, &other.free_text);
        fill(&mut self.date_range, &other.date_range);
        fill(&mut self.appointment_type, &other.appointment_type);
        fill(&mut self.location, &other.location);
        fill_nested(&mut self.datetime, &other.datetime);
        fill_nested(&mut self.new_datetime, &other.new_datetime);
        fill_nested(&mut self.identifier, &other.identifier);
        self
    }

    /// Overwrite fields with every field `other` carries.
    ///
    /// Used when the user answers a question explicitly: the answer wins.
    pub fn overlay(self, other: &EntitySet) -> EntitySet {
        other.clone().merge_missing(&self)
    }
}

fn fill<T: Clone>(slot: &mut Option<T>, other: &Option<T>) {
    if slot.is_none() {
        slot.clone_from(other);
    }
}

fn fill_nested<T: FillFrom + Clone>(slot: &mut Option<T>, other: &Option<T>) {
    if slot.is_none() {
        slot.clone_from(other);
    } else if let (Some(mine), Some(theirs)) = (slot.as_mut(), other) {
        mine.fill_from(theirs);
    }
}
