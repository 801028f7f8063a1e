//! Semantic fallback classifier.
//!
//! Only consulted when the lexical tier is unsure. The external service gets
//! the utterance and a fixed instruction; whatever comes back is validated
//! strictly. Transport errors, timeouts, cancellation and schema violations
//! all fail closed to unknown / 0.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::validation::{validate_reply, ValidatedReply};
use super::FallbackError;
use crate::models::{ClassificationResult, ClassificationSource};

/// Fixed instruction sent with every fallback request.
pub const INTENT_INSTRUCTION: &str = r#"You classify short commands from nurses in a clinical documentation assistant.
Choose exactly one intent from this closed list:
create-note, search-patient, handover-summary, query-calendar, create-appointment, cancel-appointment, reschedule-appointment, unknown.
Reply with a single JSON object and nothing else:
{"intent": "<intent>", "confidence": <number between 0 and 1>, "entities": {...}, "rationale": "<short reason>"}
Allowed entity keys: personName, recordId, category, freeText, dateRange {label}, datetime {dateLabel, time}, appointmentType, location, identifier {personName, dateLabel, time}, newDatetime {dateLabel, time}.
Times are HH:MM. Dates must stay relative labels such as "today", "tomorrow", "next week", "friday". Never compute calendar dates.
If unsure, answer {"intent": "unknown", "confidence": 0}."#;

/// What the semantic service is asked.
#[derive(Debug, Clone, Copy)]
pub struct FallbackRequest<'a> {
    pub utterance: &'a str,
    pub instruction: &'a str,
}

/// Text-understanding service behind the fallback tier.
#[async_trait]
pub trait SemanticProvider: Send + Sync {
    /// Return the raw reply body. Validation happens in the caller.
    async fn complete(&self, request: &FallbackRequest<'_>) -> Result<String, FallbackError>;
}

/// Tier-two classifier.
#[derive(Clone)]
pub struct SemanticClassifier {
    provider: Option<Arc<dyn SemanticProvider>>,
    timeout: Duration,
}

impl SemanticClassifier {
    pub fn new(provider: Arc<dyn SemanticProvider>, timeout: Duration) -> Self {
        Self {
            provider: Some(provider),
            timeout,
        }
    }

    /// No provider configured: every call fails closed.
    pub fn disabled() -> Self {
        Self {
            provider: None,
            timeout: Duration::ZERO,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.provider.is_some()
    }

    /// Classify, never failing: any error yields unknown / 0 from `Semantic`.
    pub async fn classify(&self, utterance: &str, cancel: &CancellationToken) -> ClassificationResult {
        let start = Instant::now();
        match self.try_classify(utterance, cancel).await {
            Ok(reply) => {
                let elapsed = start.elapsed();
                tracing::info!(
                    intent = %reply.intent,
                    confidence = reply.confidence,
                    latency_ms = elapsed.as_millis() as u64,
                    "Semantic fallback classified utterance"
                );
                let matched = reply.rationale.unwrap_or_else(|| "semantic".to_string());
                ClassificationResult::new(reply.intent, reply.confidence, ClassificationSource::Semantic)
                    .with_matched(matched)
                    .with_entities(reply.entities)
                    .with_elapsed(elapsed)
            }
            Err(e) => {
                let elapsed = start.elapsed();
                tracing::warn!(
                    kind = e.kind(),
                    error = %e,
                    latency_ms = elapsed.as_millis() as u64,
                    "Semantic fallback failed closed"
                );
                ClassificationResult::unknown(ClassificationSource::Semantic).with_elapsed(elapsed)
            }
        }
    }

    async fn try_classify(
        &self,
        utterance: &str,
        cancel: &CancellationToken,
    ) -> Result<ValidatedReply, FallbackError> {
        let provider = self.provider.as_ref().ok_or(FallbackError::NoProvider)?;
        let request = FallbackRequest {
            utterance,
            instruction: INTENT_INSTRUCTION,
        };
        let timeout_ms = self.timeout.as_millis() as u64;

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FallbackError::Cancelled),
            res = tokio::time::timeout(self.timeout, provider.complete(&request)) => match res {
                Ok(inner) => inner,
                Err(_) => Err(FallbackError::Timeout(timeout_ms)),
            },
        };

        validate_reply(&outcome?)
    }
}

// ═══════════════════════════════════════════════════════════
// MockProvider: scripted replies for tests and offline runs
// ═══════════════════════════════════════════════════════════

/// Provider returning a fixed reply (or error), optionally after a delay.
pub struct MockProvider {
    reply: Result<String, FallbackError>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockProvider {
    pub fn replying(body: &str) -> Self {
        Self {
            reply: Ok(body.to_string()),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(error: FallbackError) -> Self {
        Self {
            reply: Err(error),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// How many times `complete` was invoked.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SemanticProvider for MockProvider {
    async fn complete(&self, _request: &FallbackRequest<'_>) -> Result<String, FallbackError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.reply.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Intent;

    fn classifier(provider: MockProvider) -> SemanticClassifier {
        SemanticClassifier::new(Arc::new(provider), Duration::from_millis(200))
    }

    #[tokio::test]
    async fn valid_reply_is_trusted() {
        let c = classifier(MockProvider::replying(
            r#"{"intent": "handover-summary", "confidence": 0.75, "rationale": "shift end"}"#,
        ));
        let result = c.classify("kun je alles samenvatten", &CancellationToken::new()).await;
        assert_eq!(result.intent, Intent::HandoverSummary);
        assert!((result.confidence - 0.75).abs() < 1e-6);
        assert_eq!(result.source, ClassificationSource::Semantic);
        assert_eq!(result.matched.as_deref(), Some("shift end"));
    }

    #[tokio::test]
    async fn malformed_reply_fails_closed() {
        for body in [
            r#"{"intent": "create-note", "confidence": 2}"#,
            r#"{"confidence": 0.9}"#,
            "not json at all",
        ] {
            let result = classifier(MockProvider::replying(body))
                .classify("x", &CancellationToken::new())
                .await;
            assert_eq!(result.intent, Intent::Unknown, "{body}");
            assert_eq!(result.confidence, 0.0, "{body}");
            assert_eq!(result.source, ClassificationSource::Semantic);
        }
    }

    #[tokio::test]
    async fn transport_error_fails_closed() {
        let c = classifier(MockProvider::failing(FallbackError::Connection(
            "http://localhost:11434".into(),
        )));
        let result = c.classify("x", &CancellationToken::new()).await;
        assert_eq!(result.intent, Intent::Unknown);
        assert_eq!(result.confidence, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_fails_closed() {
        let provider = MockProvider::replying(r#"{"intent": "create-note", "confidence": 0.99}"#)
            .with_delay(Duration::from_secs(30));
        let result = classifier(provider).classify("x", &CancellationToken::new()).await;
        assert_eq!(result.intent, Intent::Unknown);
        assert_eq!(result.confidence, 0.0);
    }

    #[tokio::test]
    async fn cancellation_fails_closed() {
        let provider = MockProvider::replying(r#"{"intent": "create-note", "confidence": 0.99}"#)
            .with_delay(Duration::from_secs(30));
        let c = SemanticClassifier::new(Arc::new(provider), Duration::from_secs(60));
        let token = CancellationToken::new();
        token.cancel();
        let result = c.classify("x", &token).await;
        assert_eq!(result.intent, Intent::Unknown);
        assert_eq!(result.confidence, 0.0);
    }

    #[tokio::test]
    async fn disabled_classifier_fails_closed() {
        let c = SemanticClassifier::disabled();
        assert!(!c.is_enabled());
        let result = c.classify("x", &CancellationToken::new()).await;
        assert_eq!(result.intent, Intent::Unknown);
        assert_eq!(result.source, ClassificationSource::Semantic);
    }

    #[tokio::test]
    async fn mock_counts_calls() {
        let provider = Arc::new(MockProvider::replying(r#"{"intent": "unknown", "confidence": 0}"#));
        let c = SemanticClassifier::new(provider.clone(), Duration::from_millis(100));
        c.classify("a", &CancellationToken::new()).await;
        c.classify("b", &CancellationToken::new()).await;
        assert_eq!(provider.call_count(), 2);
    }

    #[test]
    fn instruction_lists_every_intent() {
        for intent in Intent::ALL {
            assert!(INTENT_INSTRUCTION.contains(intent.as_str()), "{intent}");
        }
    }
}
