//! Advisory follow-up suggestions.
//!
//! Raised after an action completes. They never gate dispatch: accepting one
//! hands its follow-up back to the gate, dismissing one does nothing.

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::extraction::RelativeDay;
use crate::gate::ActionPayload;
use crate::models::{DateRange, EntitySet, Intent, NudgeStatus};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NudgeError {
    #[error("Nudge not found: {0}")]
    NotFound(Uuid),
}

/// Action proposed by a nudge, before the gate has seen it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUp {
    pub intent: Intent,
    pub entities: EntitySet,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NudgeSuggestion {
    pub id: Uuid,
    pub message: String,
    pub status: NudgeStatus,
    pub follow_up: FollowUp,
}

impl NudgeSuggestion {
    pub fn new(message: impl Into<String>, intent: Intent, entities: EntitySet) -> Self {
        Self {
            id: Uuid::new_v4(),
            message: message.into(),
            status: NudgeStatus::Proposed,
            follow_up: FollowUp { intent, entities },
        }
    }
}

/// Suggestion worth making after `payload` has run successfully.
pub fn suggest_after(payload: &ActionPayload) -> Option<NudgeSuggestion> {
    match payload {
        ActionPayload::CreateNote { person_name, .. } => Some(NudgeSuggestion::new(
            format!("Notitie over {person_name} meenemen in de overdracht?"),
            Intent::HandoverSummary,
            EntitySet {
                person_name: Some(person_name.clone()),
                date_range: Some(DateRange::unresolved(RelativeDay::Today.canonical())),
                ..Default::default()
            },
        )),
        ActionPayload::CreateAppointment {
            person_name,
            appointment_type,
            ..
        } => {
            let what = appointment_type.as_deref().unwrap_or("afspraak");
            Some(NudgeSuggestion::new(
                format!("Voorbereidingsnotitie maken voor {person_name}?"),
                Intent::CreateNote,
                EntitySet {
                    person_name: Some(person_name.clone()),
                    free_text: Some(format!("voorbereiding {what}")),
                    ..Default::default()
                },
            ))
        }
        ActionPayload::CancelAppointment { identifier } => {
            let name = identifier.person_name.as_ref()?;
            Some(NudgeSuggestion::new(
                format!("Nieuwe afspraak plannen met {name}?"),
                Intent::CreateAppointment,
                EntitySet {
                    person_name: Some(name.clone()),
                    ..Default::default()
                },
            ))
        }
        _ => None,
    }
}

/// Open suggestions in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NudgeList {
    items: Vec<NudgeSuggestion>,
}

impl NudgeList {
    pub fn propose(&mut self, nudge: NudgeSuggestion) {
        tracing::debug!(nudge_id = %nudge.id, intent = %nudge.follow_up.intent, "Nudge proposed");
        self.items.push(nudge);
    }

    /// Remove and return the nudge, marked accepted.
    pub fn accept(&mut self, id: Uuid) -> Result<NudgeSuggestion, NudgeError> {
        let mut nudge = self.remove(id)?;
        nudge.status = NudgeStatus::Accepted;
        Ok(nudge)
    }

    /// Remove the nudge with no further effect.
    pub fn dismiss(&mut self, id: Uuid) -> Result<NudgeSuggestion, NudgeError> {
        let mut nudge = self.remove(id)?;
        nudge.status = NudgeStatus::Dismissed;
        Ok(nudge)
    }

    fn remove(&mut self, id: Uuid) -> Result<NudgeSuggestion, NudgeError> {
        let index = self
            .items
            .iter()
            .position(|n| n.id == id)
            .ok_or(NudgeError::NotFound(id))?;
        Ok(self.items.remove(index))
    }

    pub fn iter(&self) -> impl Iterator<Item = &NudgeSuggestion> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
