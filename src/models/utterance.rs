use chrono::{DateTime, Local};
use serde::Serialize;
use uuid::Uuid;

use super::enums::UtteranceSource;

/// One finalized unit of user input. Created per input, consumed once.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Utterance {
    pub id: Uuid,
    pub text: String,
    pub source: UtteranceSource,
    pub received_at: DateTime<Local>,
}

impl Utterance {
    pub fn new(text: impl Into<String>, source: UtteranceSource) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            source,
            received_at: Local::now(),
        }
    }

    pub fn typed(text: impl Into<String>) -> Self {
        Self::new(text, UtteranceSource::Typed)
    }

    pub fn spoken(text: impl Into<String>) -> Self {
        Self::new(text, UtteranceSource::Spoken)
    }

    /// Text with surrounding whitespace removed.
    pub fn trimmed(&self) -> &str {
        self.text.trim()
    }

    pub fn is_blank(&self) -> bool {
        self.trimmed().is_empty()
    }
}
