//! Confidence gate and action resolver.
//!
//! Turns a final classification plus merged entities into a decision:
//! dispatch, dispatch after confirmation, ask, redirect to search, or reject.
//! Completeness is checked by building the typed payload for the intent;
//! a payload that cannot be built routes to clarification whatever the
//! confidence.

use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;

use crate::config::GateThresholds;
use crate::models::{
    AppointmentIdentifier, ClassificationResult, DateRange, EntitySet, Intent, NoteCategory,
};

/// Shown whenever the pipeline gives up on an utterance.
pub const GENERIC_REJECTION: &str = "Dat heb ik niet begrepen. Probeer het anders te formuleren.";

// ═══════════════════════════════════════════════════════════
// Missing fields
// ═══════════════════════════════════════════════════════════

/// A slot the gate needs before it can dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MissingField {
    /// Which action the user means.
    Intent,
    PersonName,
    SearchTerm,
    Period,
    Date,
    Time,
    Identifier,
    NewDate,
    NewTime,
}

impl MissingField {
    /// Canonical question for this slot.
    pub fn question(&self) -> &'static str {
        match self {
            Self::Intent => "Wat wil je doen?",
            Self::PersonName => "Voor welke cliënt?",
            Self::SearchTerm => "Wie of wat wil je zoeken?",
            Self::Period => "Over welke periode?",
            Self::Date => "Op welke dag?",
            Self::Time => "Hoe laat?",
            Self::Identifier => "Welke afspraak bedoel je?",
            Self::NewDate => "Naar welke dag?",
            Self::NewTime => "Naar hoe laat?",
        }
    }
}

/// Canonical prompt built from the missing slots, in order.
pub fn clarification_prompt(missing: &[MissingField]) -> String {
    if missing.is_empty() {
        return MissingField::Intent.question().to_string();
    }
    missing
        .iter()
        .map(MissingField::question)
        .collect::<Vec<_>>()
        .join(" ")
}

// ═══════════════════════════════════════════════════════════
// Typed payloads
// ═══════════════════════════════════════════════════════════

/// Complete, typed input for one action. Only constructible when every
/// required field of its intent is present.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ActionPayload {
    CreateNote {
        person_name: String,
        category: Option<NoteCategory>,
        content: Option<String>,
    },
    SearchPatient {
        person_name: Option<String>,
        record_id: Option<String>,
        query: Option<String>,
    },
    HandoverSummary {
        person_name: Option<String>,
        range: DateRange,
    },
    QueryCalendar {
        person_name: Option<String>,
        range: DateRange,
    },
    CreateAppointment {
        person_name: String,
        date: NaiveDate,
        time: NaiveTime,
        appointment_type: Option<String>,
        location: Option<String>,
    },
    CancelAppointment {
        identifier: AppointmentIdentifier,
    },
    RescheduleAppointment {
        identifier: AppointmentIdentifier,
        new_date: NaiveDate,
        new_time: NaiveTime,
    },
}

impl ActionPayload {
    /// Build the payload for `intent`, or list what is missing.
    pub fn from_entities(intent: Intent, e: &EntitySet) -> Result<Self, Vec<MissingField>> {
        let mut missing = Vec::new();

        let payload = match intent {
            Intent::Unknown => return Err(vec![MissingField::Intent]),

            Intent::CreateNote => match &e.person_name {
                Some(name) => Self::CreateNote {
                    person_name: name.clone(),
                    category: e.category,
                    content: e.free_text.clone(),
                },
                None => return Err(vec![MissingField::PersonName]),
            },

            Intent::SearchPatient => {
                if e.person_name.is_none() && e.record_id.is_none() && e.free_text.is_none() {
                    return Err(vec![MissingField::SearchTerm]);
                }
                Self::SearchPatient {
                    person_name: e.person_name.clone(),
                    record_id: e.record_id.clone(),
                    query: e.free_text.clone(),
                }
            }

            Intent::HandoverSummary | Intent::QueryCalendar => {
                let range = match &e.date_range {
                    Some(r) if r.is_resolved() => r.clone(),
                    _ => return Err(vec![MissingField::Period]),
                };
                let person_name = e.person_name.clone();
                if intent == Intent::HandoverSummary {
                    Self::HandoverSummary { person_name, range }
                } else {
                    Self::QueryCalendar { person_name, range }
                }
            }

            Intent::CreateAppointment => {
                if e.person_name.is_none() {
                    missing.push(MissingField::PersonName);
                }
                let date = e.datetime.as_ref().and_then(|d| d.resolved_date());
                let time = e.datetime.as_ref().and_then(|d| d.time);
                if date.is_none() {
                    missing.push(MissingField::Date);
                }
                if time.is_none() {
                    missing.push(MissingField::Time);
                }
                match (&e.person_name, date, time) {
                    (Some(name), Some(date), Some(time)) => Self::CreateAppointment {
                        person_name: name.clone(),
                        date,
                        time,
                        appointment_type: e.appointment_type.clone(),
                        location: e.location.clone(),
                    },
                    _ => return Err(missing),
                }
            }

            Intent::CancelAppointment => match &e.identifier {
                Some(id) if id.is_usable() => Self::CancelAppointment {
                    identifier: id.clone(),
                },
                _ => return Err(vec![MissingField::Identifier]),
            },

            Intent::RescheduleAppointment => {
                let identifier = e.identifier.as_ref().filter(|id| id.is_usable());
                if identifier.is_none() {
                    missing.push(MissingField::Identifier);
                }
                let new_date = e.new_datetime.as_ref().and_then(|d| d.resolved_date());
                let new_time = e.new_datetime.as_ref().and_then(|d| d.time);
                if new_date.is_none() {
                    missing.push(MissingField::NewDate);
                }
                if new_time.is_none() {
                    missing.push(MissingField::NewTime);
                }
                match (identifier, new_date, new_time) {
                    (Some(id), Some(new_date), Some(new_time)) => Self::RescheduleAppointment {
                        identifier: id.clone(),
                        new_date,
                        new_time,
                    },
                    _ => return Err(missing),
                }
            }
        };

        Ok(payload)
    }

    pub fn intent(&self) -> Intent {
        match self {
            Self::CreateNote { .. } => Intent::CreateNote,
            Self::SearchPatient { .. } => Intent::SearchPatient,
            Self::HandoverSummary { .. } => Intent::HandoverSummary,
            Self::QueryCalendar { .. } => Intent::QueryCalendar,
            Self::CreateAppointment { .. } => Intent::CreateAppointment,
            Self::CancelAppointment { .. } => Intent::CancelAppointment,
            Self::RescheduleAppointment { .. } => Intent::RescheduleAppointment,
        }
    }

    /// The person this action concerns, when there is one.
    pub fn person_name(&self) -> Option<&str> {
        match self {
            Self::CreateNote { person_name, .. } | Self::CreateAppointment { person_name, .. } => {
                Some(person_name.as_str())
            }
            Self::SearchPatient { person_name, .. }
            | Self::HandoverSummary { person_name, .. }
            | Self::QueryCalendar { person_name, .. } => person_name.as_deref(),
            Self::CancelAppointment { identifier } | Self::RescheduleAppointment { identifier, .. } => {
                identifier.person_name.as_deref()
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Decision
// ═══════════════════════════════════════════════════════════

/// What to do with a classified utterance.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GateDecision {
    AutoDispatch { payload: ActionPayload },
    /// Open the action, but run nothing until the user confirms.
    ConfirmThenDispatch { payload: ActionPayload },
    Clarify { missing: Vec<MissingField> },
    /// Only the person is missing: suspend and let the user search.
    RedirectToSearch,
    Reject,
    Help,
}

impl GateDecision {
    /// Short stable tag for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AutoDispatch { .. } => "auto_dispatch",
            Self::ConfirmThenDispatch { .. } => "confirm",
            Self::Clarify { .. } => "clarify",
            Self::RedirectToSearch => "redirect_to_search",
            Self::Reject => "reject",
            Self::Help => "help",
        }
    }

    pub fn is_dispatch(&self) -> bool {
        matches!(self, Self::AutoDispatch { .. } | Self::ConfirmThenDispatch { .. })
    }
}

/// Threshold bands over confidence, with completeness taking precedence.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfidenceGate {
    thresholds: GateThresholds,
}

impl ConfidenceGate {
    pub fn new(thresholds: GateThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> GateThresholds {
        self.thresholds
    }

    /// Decide on a classification with its merged entities.
    pub fn evaluate(&self, result: &ClassificationResult, entities: &EntitySet) -> GateDecision {
        if result.help {
            tracing::info!(decision = "help", "Gate decision");
            return GateDecision::Help;
        }
        self.decide(result.intent, result.confidence, entities)
    }

    /// Decide on an explicit intent and confidence.
    pub fn decide(&self, intent: Intent, confidence: f32, entities: &EntitySet) -> GateDecision {
        let decision = self.band(intent, confidence, entities);
        tracing::info!(
            intent = %intent,
            confidence,
            decision = decision.kind(),
            "Gate decision"
        );
        decision
    }

    fn band(&self, intent: Intent, confidence: f32, entities: &EntitySet) -> GateDecision {
        let t = &self.thresholds;
        if intent == Intent::Unknown || confidence < t.clarify {
            return GateDecision::Reject;
        }

        let built = ActionPayload::from_entities(intent, entities);

        if confidence < t.confirm {
            let mut missing = vec![MissingField::Intent];
            if let Err(fields) = built {
                missing.extend(fields);
            }
            return GateDecision::Clarify { missing };
        }

        match built {
            Err(missing) if missing == [MissingField::PersonName] => GateDecision::RedirectToSearch,
            Err(missing) => GateDecision::Clarify { missing },
            Ok(payload) if confidence >= t.auto_dispatch => GateDecision::AutoDispatch { payload },
            Ok(payload) => GateDecision::ConfirmThenDispatch { payload },
        }
    }
}
