use std::time::Duration;

use serde::Serialize;

use super::entities::EntitySet;
use super::enums::{ClassificationSource, Intent};

/// An intent's best weight from the lexical rule table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IntentCandidate {
    pub intent: Intent,
    pub weight: f32,
}

/// Output of either classifier tier.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    pub intent: Intent,
    /// Always within [0, 1].
    pub confidence: f32,
    pub source: ClassificationSource,
    /// Matched rule pattern (local) or rationale (semantic).
    pub matched: Option<String>,
    pub entities: EntitySet,
    /// The utterance asked for help rather than an action.
    pub help: bool,
    /// Ranked per-intent best matches from the lexical table.
    pub candidates: Vec<IntentCandidate>,
    #[serde(serialize_with = "serialize_micros")]
    pub elapsed: Duration,
}

impl ClassificationResult {
    pub fn new(intent: Intent, confidence: f32, source: ClassificationSource) -> Self {
        Self {
            intent,
            confidence: clamp_confidence(confidence),
            source,
            matched: None,
            entities: EntitySet::default(),
            help: false,
            candidates: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    /// Nothing understood: unknown intent at zero confidence.
    pub fn unknown(source: ClassificationSource) -> Self {
        Self::new(Intent::Unknown, 0.0, source)
    }

    pub fn with_matched(mut self, matched: impl Into<String>) -> Self {
        self.matched = Some(matched.into());
        self
    }

    pub fn with_entities(mut self, entities: EntitySet) -> Self {
        self.entities = entities;
        self
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }
}

/// Clamp into [0, 1]; NaN counts as no confidence at all.
pub fn clamp_confidence(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

fn serialize_micros<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_micros() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_is_clamped() {
        assert_eq!(ClassificationResult::new(Intent::CreateNote, 1.7, ClassificationSource::Local).confidence, 1.0);
        assert_eq!(ClassificationResult::new(Intent::CreateNote, -0.2, ClassificationSource::Local).confidence, 0.0);
        assert_eq!(ClassificationResult::new(Intent::CreateNote, f32::NAN, ClassificationSource::Local).confidence, 0.0);
    }

    #[test]
    fn unknown_has_zero_confidence() {
        let result = ClassificationResult::unknown(ClassificationSource::Semantic);
        assert_eq!(result.intent, Intent::Unknown);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.source, ClassificationSource::Semantic);
        assert!(!result.help);
    }
}
