//! Single-slot clarification.
//!
//! At most one question is outstanding. Asking a new one replaces the old
//! one; there is no queue. The answer is merged back into the originating
//! action and re-evaluated by the gate, never classified afresh.

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::gate::{clarification_prompt, MissingField};
use crate::models::{ClassificationResult, EntitySet, Intent};

/// Most intent options offered for an ambiguous utterance.
const MAX_INTENT_OPTIONS: usize = 3;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClarificationError {
    #[error("No clarification pending")]
    NonePending,

    #[error("Unknown clarification option: {0}")]
    UnknownOption(String),

    #[error("Clarification {0} is no longer pending")]
    Mismatch(Uuid),
}

/// What picking an option means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OptionValue {
    Intent { intent: Intent },
    /// Drop the question and the action behind it.
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClarificationOption {
    pub id: String,
    pub label: String,
    pub value: OptionValue,
}

/// User reply to a pending question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClarificationAnswer {
    /// One of the offered option ids.
    Choose(String),
    /// Free text supplying the missing fields.
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClarificationRequest {
    pub id: Uuid,
    pub prompt: String,
    pub missing: Vec<MissingField>,
    pub options: Vec<ClarificationOption>,
    /// Classification that raised the question.
    pub origin: ClassificationResult,
    /// Trimmed utterance the question is about.
    pub text: String,
    /// Entities gathered so far, already merged.
    pub entities: EntitySet,
}

impl ClarificationRequest {
    pub fn new(
        origin: ClassificationResult,
        text: impl Into<String>,
        entities: EntitySet,
        missing: Vec<MissingField>,
    ) -> Self {
        let mut options = Vec::new();
        if missing.contains(&MissingField::Intent) {
            options.extend(
                intent_choices(&origin)
                    .into_iter()
                    .map(|intent| OptionValue::Intent { intent }),
            );
        }
        options.push(OptionValue::Cancel);

        let options = options
            .into_iter()
            .enumerate()
            .map(|(i, value)| ClarificationOption {
                id: (i + 1).to_string(),
                label: match value {
                    OptionValue::Intent { intent } => intent.label().to_string(),
                    OptionValue::Cancel => "Annuleren".to_string(),
                },
                value,
            })
            .collect();

        Self {
            id: Uuid::new_v4(),
            prompt: clarification_prompt(&missing),
            missing,
            options,
            origin,
            text: text.into(),
            entities,
        }
    }

    pub fn option(&self, id: &str) -> Result<&ClarificationOption, ClarificationError> {
        self.options
            .iter()
            .find(|o| o.id == id.trim())
            .ok_or_else(|| ClarificationError::UnknownOption(id.to_string()))
    }

    /// Whether the answer still has to settle which action is meant.
    pub fn asks_for_intent(&self) -> bool {
        self.missing.contains(&MissingField::Intent)
    }
}

/// The classified intent first, then the strongest other candidates.
fn intent_choices(origin: &ClassificationResult) -> Vec<Intent> {
    let mut intents = Vec::new();
    if origin.intent != Intent::Unknown {
        intents.push(origin.intent);
    }
    for c in &origin.candidates {
        if intents.len() >= MAX_INTENT_OPTIONS {
            break;
        }
        if c.intent != Intent::Unknown && !intents.contains(&c.intent) {
            intents.push(c.intent);
        }
    }
    intents
}

/// Holds the one outstanding question.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClarificationSlot {
    pending: Option<ClarificationRequest>,
}

impl ClarificationSlot {
    /// Set the outstanding question, returning the one it replaces.
    pub fn issue(&mut self, request: ClarificationRequest) -> Option<ClarificationRequest> {
        let replaced = self.pending.replace(request);
        if let Some(old) = &replaced {
            tracing::debug!(clarification_id = %old.id, "Replaced pending clarification");
        }
        replaced
    }

    pub fn pending(&self) -> Option<&ClarificationRequest> {
        self.pending.as_ref()
    }

    /// Remove the pending question if it is `id`.
    pub fn take(&mut self, id: Uuid) -> Result<ClarificationRequest, ClarificationError> {
        match &self.pending {
            None => Err(ClarificationError::NonePending),
            Some(p) if p.id != id => Err(ClarificationError::Mismatch(id)),
            Some(_) => self.pending.take().ok_or(ClarificationError::NonePending),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}
