//! Command session: the explicit context object the pipeline runs against.
//!
//! Holds the classifiers, extractor, gate and executors, plus the shared
//! state (open artifacts, clarification slot, suspended and unconfirmed
//! actions, chain history, nudges, recent actions). State is an immutable
//! snapshot behind an `Arc`; every change builds a new snapshot and swaps
//! it in whole. All mutating methods take `&mut self`, so submissions are
//! serialized and applied strictly in order.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::artifacts::{Artifact, ArtifactError, ArtifactSet};
use crate::chain::{run_chain, ActionChain, ChainHistory, ExecutorRegistry};
use crate::classify::{LexicalClassifier, SemanticClassifier, HELP_EXAMPLES};
use crate::clarification::{
    ClarificationAnswer, ClarificationError, ClarificationRequest, ClarificationSlot, OptionValue,
};
use crate::config::PipelineConfig;
use crate::extraction::{DateResolver, EntityExtractor};
use crate::gate::{ActionPayload, ConfidenceGate, GateDecision, GENERIC_REJECTION};
use crate::history::{RecentAction, RecentActions};
use crate::models::{
    ChainStatus, ClassificationResult, ClassificationSource, EntitySet, Intent, Utterance,
};
use crate::nudges::{suggest_after, NudgeError, NudgeList, NudgeSuggestion};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Clarification(#[from] ClarificationError),

    #[error(transparent)]
    Nudge(#[from] NudgeError),

    #[error("No action is waiting for a person")]
    NothingSuspended,

    #[error("No action is waiting for confirmation")]
    NothingToConfirm,
}

// ═══════════════════════════════════════════════════════════
// State
// ═══════════════════════════════════════════════════════════

/// Action parked while the user looks up the person it needs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuspendedAction {
    pub origin: ClassificationResult,
    pub text: String,
    pub entities: EntitySet,
    /// Search panel opened for the lookup.
    pub search_artifact: Uuid,
}

/// Dispatched action whose steps wait for the user's go-ahead.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingConfirmation {
    pub artifact_id: Uuid,
    pub payload: ActionPayload,
}

/// One immutable snapshot of everything the session tracks.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub artifacts: ArtifactSet,
    pub clarification: ClarificationSlot,
    pub suspended: Option<SuspendedAction>,
    pub confirmation: Option<PendingConfirmation>,
    pub chains: ChainHistory,
    pub nudges: NudgeList,
    pub recent: RecentActions,
}

impl SessionState {
    /// Open an artifact. If eviction drops the one awaiting confirmation,
    /// the confirmation goes with it.
    fn open_artifact(&mut self, artifact: Artifact) {
        if let Some(evicted) = self.artifacts.open(artifact) {
            if self.confirmation.as_ref().is_some_and(|c| c.artifact_id == evicted.id) {
                tracing::info!(artifact_id = %evicted.id, "Unconfirmed action evicted");
                self.confirmation = None;
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Outcomes
// ═══════════════════════════════════════════════════════════

/// What the caller (rendering layer, transcript loop, CLI) gets back.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PipelineOutcome {
    Dispatched {
        artifact: Artifact,
        chain: ActionChain,
        nudge: Option<NudgeSuggestion>,
    },
    AwaitingConfirmation {
        artifact: Artifact,
    },
    Clarification {
        request: ClarificationRequest,
    },
    SearchRedirect {
        suspended: Intent,
        artifact: Artifact,
    },
    Help {
        examples: Vec<String>,
    },
    Rejected {
        message: String,
    },
    /// The user called the action off.
    Dismissed,
}

impl PipelineOutcome {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Dispatched { .. } => "dispatched",
            Self::AwaitingConfirmation { .. } => "awaiting_confirmation",
            Self::Clarification { .. } => "clarification",
            Self::SearchRedirect { .. } => "search_redirect",
            Self::Help { .. } => "help",
            Self::Rejected { .. } => "rejected",
            Self::Dismissed => "dismissed",
        }
    }

    fn rejected() -> Self {
        Self::Rejected {
            message: GENERIC_REJECTION.to_string(),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Session
// ═══════════════════════════════════════════════════════════

pub struct Session {
    config: PipelineConfig,
    lexical: LexicalClassifier,
    semantic: SemanticClassifier,
    extractor: EntityExtractor,
    gate: ConfidenceGate,
    executors: ExecutorRegistry,
    cancel: CancellationToken,
    state: Arc<SessionState>,
}

impl Session {
    pub fn new(config: PipelineConfig, semantic: SemanticClassifier, executors: ExecutorRegistry) -> Self {
        let extractor = EntityExtractor::new(&config.known_names, DateResolver::system());
        Self {
            gate: ConfidenceGate::new(config.gate),
            config,
            lexical: LexicalClassifier::new(),
            semantic,
            extractor,
            executors,
            cancel: CancellationToken::new(),
            state: Arc::new(SessionState::default()),
        }
    }

    /// Replace the date resolver (and with it the clock).
    pub fn with_resolver(mut self, resolver: DateResolver) -> Self {
        self.extractor = EntityExtractor::new(&self.config.known_names, resolver);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Current state. Later changes never touch a snapshot already handed out.
    pub fn snapshot(&self) -> Arc<SessionState> {
        Arc::clone(&self.state)
    }

    /// Cancelling this token fails the in-flight (or next) fallback call
    /// closed. The session then arms a fresh token, so fetch it per call.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run one utterance through the whole pipeline.
    pub async fn submit(&mut self, utterance: Utterance) -> PipelineOutcome {
        let text = utterance.trimmed().to_string();
        tracing::info!(
            utterance_id = %utterance.id,
            source = %utterance.source,
            chars = text.chars().count(),
            "Utterance received"
        );
        if text.is_empty() {
            return PipelineOutcome::rejected();
        }

        let result = self.classify(&text).await;
        if self.cancel.is_cancelled() {
            tracing::debug!("Fallback cancelled, arming a fresh token");
            self.cancel = CancellationToken::new();
        }
        let lower = text.to_lowercase();
        let local = self.extractor.extract(&text, &lower, result.intent);
        let entities = self
            .extractor
            .finalize(result.intent, local.merge_missing(&result.entities));

        let decision = self.gate.evaluate(&result, &entities);
        self.apply(decision, result, &text, entities).await
    }

    /// Lexical first; the fallback only below the threshold. Once invoked,
    /// the fallback's answer is final.
    async fn classify(&self, text: &str) -> ClassificationResult {
        let local = self.lexical.classify(text);
        if local.help || local.confidence >= self.config.fallback_threshold {
            return local;
        }
        if !self.semantic.is_enabled() {
            tracing::debug!(confidence = local.confidence, "No semantic provider, keeping lexical result");
            return local;
        }

        let mut result = self.semantic.classify(text, &self.cancel.child_token()).await;
        result.candidates = local.candidates;
        result
    }

    async fn apply(
        &mut self,
        decision: GateDecision,
        origin: ClassificationResult,
        text: &str,
        entities: EntitySet,
    ) -> PipelineOutcome {
        match decision {
            GateDecision::Help => PipelineOutcome::Help {
                examples: HELP_EXAMPLES.iter().map(|e| e.to_string()).collect(),
            },
            GateDecision::Reject => {
                tracing::info!(intent = %Intent::Unknown, "Utterance not understood");
                PipelineOutcome::rejected()
            }
            GateDecision::Clarify { missing } => {
                let request = ClarificationRequest::new(origin, text, entities, missing);
                self.update(|s| {
                    s.clarification.issue(request.clone());
                });
                PipelineOutcome::Clarification { request }
            }
            GateDecision::RedirectToSearch => {
                let suspended = origin.intent;
                let artifact = Artifact::new(Intent::SearchPatient, EntitySet::default());
                let search_artifact = artifact.id;
                self.update(|s| {
                    s.open_artifact(artifact.clone());
                    s.suspended = Some(SuspendedAction {
                        origin,
                        text: text.to_string(),
                        entities,
                        search_artifact,
                    });
                });
                tracing::info!(intent = %suspended, "Action suspended until a person is chosen");
                PipelineOutcome::SearchRedirect { suspended, artifact }
            }
            GateDecision::ConfirmThenDispatch { payload } => {
                let artifact = Artifact::new(payload.intent(), entities).awaiting_confirmation();
                self.update(|s| {
                    s.open_artifact(artifact.clone());
                    s.confirmation = Some(PendingConfirmation {
                        artifact_id: artifact.id,
                        payload,
                    });
                });
                PipelineOutcome::AwaitingConfirmation { artifact }
            }
            GateDecision::AutoDispatch { payload } => {
                let artifact = Artifact::new(payload.intent(), entities);
                self.update(|s| s.open_artifact(artifact.clone()));
                self.execute(artifact, payload).await
            }
        }
    }

    async fn execute(&mut self, artifact: Artifact, payload: ActionPayload) -> PipelineOutcome {
        let chain = run_chain(&self.executors, &payload).await;
        let nudge = if chain.status == ChainStatus::Completed {
            suggest_after(&payload)
        } else {
            None
        };

        let recent = RecentAction::new(
            payload.intent(),
            payload.person_name().map(String::from),
            chain.status,
        );
        self.update(|s| {
            s.chains.record(chain.clone());
            s.recent.push(recent);
            if let Some(n) = &nudge {
                s.nudges.propose(n.clone());
            }
        });

        PipelineOutcome::Dispatched {
            artifact,
            chain,
            nudge,
        }
    }

    // ── clarification ───────────────────────────────────────

    /// Answer the pending question. The answer is merged into the pending
    /// action and re-evaluated by the gate; nothing is re-classified.
    ///
    /// Picking an action, or answering "what do you want to do" in words,
    /// counts as an explicit confirmation of that action.
    pub async fn resolve_clarification(
        &mut self,
        id: Uuid,
        answer: ClarificationAnswer,
    ) -> Result<PipelineOutcome, SessionError> {
        let request = match self.state.clarification.pending() {
            Some(p) if p.id == id => p.clone(),
            Some(_) => return Err(ClarificationError::Mismatch(id).into()),
            None => return Err(ClarificationError::NonePending.into()),
        };
        let choice = match &answer {
            ClarificationAnswer::Choose(option) => Some(request.option(option)?.value),
            ClarificationAnswer::Text(_) => None,
        };
        self.try_update(|s| s.clarification.take(id))?;

        let asks_for_intent = request.asks_for_intent();
        let ClarificationRequest {
            origin, text, entities, ..
        } = request;

        let (intent, confidence, entities) = match (choice, answer) {
            (Some(OptionValue::Cancel), _) => {
                tracing::info!(clarification_id = %id, "Clarification cancelled");
                return Ok(PipelineOutcome::Dismissed);
            }
            (Some(OptionValue::Intent { intent }), _) => {
                // Fields were extracted for the classified intent; read the
                // utterance again for the chosen one.
                let reread = self.extractor.extract(&text, &text.to_lowercase(), intent);
                (intent, 1.0, entities.merge_missing(&reread))
            }
            (None, ClarificationAnswer::Text(answer)) => {
                let answered = self.extractor.extract_answer(&answer, origin.intent);
                let confidence = if asks_for_intent { 1.0 } else { origin.confidence };
                (origin.intent, confidence, entities.overlay(&answered))
            }
            (None, ClarificationAnswer::Choose(_)) => return Ok(PipelineOutcome::rejected()),
        };

        Ok(self.reevaluate(origin, &text, intent, confidence, entities).await)
    }

    // ── suspended action ────────────────────────────────────

    /// Resume the suspended action with the person the user picked.
    pub async fn resolve_person(&mut self, person_name: &str) -> Result<PipelineOutcome, SessionError> {
        let suspended = self.try_update(|s| s.suspended.take().ok_or(SessionError::NothingSuspended))?;
        let search_artifact = suspended.search_artifact;
        if self.state.artifacts.get(search_artifact).is_some() {
            self.try_update(|s| s.artifacts.close(search_artifact))?;
        }

        let person = EntitySet {
            person_name: Some(person_name.trim().to_string()),
            ..Default::default()
        };
        let entities = suspended.entities.overlay(&person);
        let intent = suspended.origin.intent;
        let confidence = suspended.origin.confidence;
        Ok(self
            .reevaluate(suspended.origin, &suspended.text, intent, confidence, entities)
            .await)
    }

    // ── confirmation ────────────────────────────────────────

    /// Run the action waiting for confirmation.
    pub async fn confirm_pending(&mut self) -> Result<PipelineOutcome, SessionError> {
        let pending = self.try_update(|s| {
            let pending = s.confirmation.take().ok_or(SessionError::NothingToConfirm)?;
            s.artifacts.mark_confirmed(pending.artifact_id)?;
            Ok::<_, SessionError>(pending)
        })?;
        let artifact = self
            .state
            .artifacts
            .get(pending.artifact_id)
            .cloned()
            .ok_or(ArtifactError::NotFound(pending.artifact_id))?;
        Ok(self.execute(artifact, pending.payload).await)
    }

    /// Drop the action waiting for confirmation and close its artifact.
    pub fn decline_pending(&mut self) -> Result<PipelineOutcome, SessionError> {
        self.try_update(|s| {
            let pending = s.confirmation.take().ok_or(SessionError::NothingToConfirm)?;
            s.artifacts.close(pending.artifact_id)?;
            Ok::<_, SessionError>(())
        })?;
        Ok(PipelineOutcome::Dismissed)
    }

    // ── artifacts ───────────────────────────────────────────

    pub fn close_artifact(&mut self, id: Uuid) -> Result<Artifact, SessionError> {
        self.try_update(|s| {
            let closed = s.artifacts.close(id)?;
            if s.confirmation.as_ref().is_some_and(|c| c.artifact_id == id) {
                s.confirmation = None;
            }
            Ok(closed)
        })
    }

    pub fn activate_artifact(&mut self, id: Uuid) -> Result<(), SessionError> {
        self.try_update(|s| s.artifacts.activate(id).map_err(SessionError::from))
    }

    // ── nudges ──────────────────────────────────────────────

    /// Accept a nudge: its follow-up goes through the gate as a
    /// user-confirmed action. Completeness still applies.
    pub async fn accept_nudge(&mut self, id: Uuid) -> Result<PipelineOutcome, SessionError> {
        let nudge = self.try_update(|s| s.nudges.accept(id))?;
        let intent = nudge.follow_up.intent;
        let origin = ClassificationResult::new(intent, 1.0, ClassificationSource::Local).with_matched("nudge");
        Ok(self
            .reevaluate(origin, &nudge.message, intent, 1.0, nudge.follow_up.entities)
            .await)
    }

    pub fn dismiss_nudge(&mut self, id: Uuid) -> Result<(), SessionError> {
        self.try_update(|s| s.nudges.dismiss(id))?;
        Ok(())
    }

    // ── internals ───────────────────────────────────────────

    async fn reevaluate(
        &mut self,
        mut origin: ClassificationResult,
        text: &str,
        intent: Intent,
        confidence: f32,
        entities: EntitySet,
    ) -> PipelineOutcome {
        let entities = self.extractor.finalize(intent, entities);
        origin.intent = intent;
        origin.confidence = confidence;
        let decision = self.gate.decide(intent, confidence, &entities);
        self.apply(decision, origin, text, entities).await
    }

    fn update<R>(&mut self, f: impl FnOnce(&mut SessionState) -> R) -> R {
        let mut next = SessionState::clone(&self.state);
        let out = f(&mut next);
        self.state = Arc::new(next);
        out
    }

    /// Like `update`, but the new snapshot is only installed on success.
    fn try_update<R, E>(&mut self, f: impl FnOnce(&mut SessionState) -> Result<R, E>) -> Result<R, E> {
        let mut next = SessionState::clone(&self.state);
        let out = f(&mut next)?;
        self.state = Arc::new(next);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{NaiveDate, NaiveTime};

    use super::*;
    use crate::chain::{ActionStepError, RecordingExecutor};
    use crate::classify::MockProvider;
    use crate::extraction::FixedClock;
    use crate::gate::MissingField;
    use crate::models::{NoteCategory, StepStatus};

    /// Friday 16 October 2026, 09:30.
    fn clock() -> DateResolver {
        let now = NaiveDate::from_ymd_opt(2026, 10, 16)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        DateResolver::new(Arc::new(FixedClock(now)))
    }

    fn session_with(semantic: SemanticClassifier, exec: Arc<RecordingExecutor>) -> Session {
        Session::new(PipelineConfig::default(), semantic, ExecutorRegistry::with_all(exec))
            .with_resolver(clock())
    }

    fn local_session() -> (Session, Arc<RecordingExecutor>) {
        let exec = Arc::new(RecordingExecutor::accepting());
        (session_with(SemanticClassifier::disabled(), exec.clone()), exec)
    }

    fn fallback(reply: &str) -> (SemanticClassifier, Arc<MockProvider>) {
        let provider = Arc::new(MockProvider::replying(reply));
        (
            SemanticClassifier::new(provider.clone(), Duration::from_millis(500)),
            provider,
        )
    }

    #[tokio::test]
    async fn note_with_person_dispatches_immediately() {
        let (mut session, exec) = local_session();
        let outcome = session.submit(Utterance::typed("notitie jan medicatie gegeven")).await;

        let PipelineOutcome::Dispatched { artifact, chain, nudge } = outcome else {
            panic!("expected dispatch, got {outcome:?}");
        };
        assert_eq!(artifact.kind, Intent::CreateNote);
        assert_eq!(artifact.prefill.person_name.as_deref(), Some("Jan"));
        assert_eq!(artifact.prefill.category, Some(NoteCategory::Medication));
        assert_eq!(artifact.prefill.free_text.as_deref(), Some("gegeven"));
        assert_eq!(chain.status, ChainStatus::Completed);
        assert_eq!(exec.calls(), vec!["prepare-note", "save-note"]);
        assert!(nudge.is_some());

        let state = session.snapshot();
        assert_eq!(state.artifacts.active_id(), Some(artifact.id));
        assert_eq!(state.recent.len(), 1);
        assert_eq!(state.chains.len(), 1);
        assert_eq!(state.nudges.len(), 1);
    }

    #[tokio::test]
    async fn weak_fallback_rejects_without_artifact() {
        let (semantic, provider) = fallback(r#"{"intent": "create-note", "confidence": 0.4}"#);
        let exec = Arc::new(RecordingExecutor::accepting());
        let mut session = session_with(semantic, exec.clone());

        let outcome = session.submit(Utterance::spoken("ik heb een gesprek gehad")).await;
        assert_eq!(
            outcome,
            PipelineOutcome::Rejected {
                message: GENERIC_REJECTION.to_string()
            }
        );
        assert_eq!(provider.call_count(), 1);
        assert!(session.snapshot().artifacts.is_empty());
        assert!(exec.calls().is_empty());
    }

    #[tokio::test]
    async fn strong_local_match_skips_fallback() {
        let (semantic, provider) = fallback(r#"{"intent": "unknown", "confidence": 0}"#);
        let mut session = session_with(semantic, Arc::new(RecordingExecutor::accepting()));
        session.submit(Utterance::typed("agenda morgen")).await;
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn fallback_date_is_replaced_by_local_resolution() {
        let (semantic, _) = fallback(
            r#"{"intent": "create-appointment", "confidence": 0.95,
                "entities": {"personName": "Piet",
                             "datetime": {"dateLabel": "tomorrow", "time": "14:00", "date": "1999-01-01"}}}"#,
        );
        let mut session = session_with(semantic, Arc::new(RecordingExecutor::accepting()));

        let outcome = session.submit(Utterance::typed("zet iets klaar voor piet")).await;
        let PipelineOutcome::Dispatched { artifact, .. } = outcome else {
            panic!("expected dispatch, got {outcome:?}");
        };
        let dt = artifact.prefill.datetime.unwrap();
        assert_eq!(dt.resolved_date(), NaiveDate::from_ymd_opt(2026, 10, 17));
    }

    #[tokio::test]
    async fn local_tomorrow_resolves_the_same_way() {
        let (mut session, _) = local_session();
        let outcome = session
            .submit(Utterance::typed("plan afspraak met piet morgen om 14:00"))
            .await;
        let PipelineOutcome::Dispatched { artifact, .. } = outcome else {
            panic!("expected dispatch, got {outcome:?}");
        };
        assert_eq!(
            artifact.prefill.datetime.unwrap().resolved_date(),
            NaiveDate::from_ymd_opt(2026, 10, 17)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn fallback_timeout_rejects() {
        let provider = MockProvider::replying(r#"{"intent": "create-note", "confidence": 0.99}"#)
            .with_delay(Duration::from_secs(30));
        let semantic = SemanticClassifier::new(Arc::new(provider), Duration::from_secs(4));
        let mut session = session_with(semantic, Arc::new(RecordingExecutor::accepting()));

        let outcome = session.submit(Utterance::typed("iets onduidelijks")).await;
        assert_eq!(outcome.kind(), "rejected");
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_fails_one_fallback_call_closed() {
        let provider = MockProvider::replying(r#"{"intent": "create-note", "confidence": 0.99}"#)
            .with_delay(Duration::from_secs(30));
        let semantic = SemanticClassifier::new(Arc::new(provider), Duration::from_secs(60));
        let mut session = session_with(semantic, Arc::new(RecordingExecutor::accepting()));
        let token = session.cancellation_token();
        token.cancel();

        let outcome = session.submit(Utterance::typed("iets onduidelijks")).await;
        assert_eq!(outcome.kind(), "rejected");

        // The next call gets a fresh token and reaches the provider.
        assert!(!session.cancellation_token().is_cancelled());
        let outcome = session.submit(Utterance::typed("iets onduidelijks")).await;
        let PipelineOutcome::SearchRedirect { suspended, .. } = outcome else {
            panic!("expected redirect, got {outcome:?}");
        };
        assert_eq!(suspended, Intent::CreateNote);
    }

    #[tokio::test]
    async fn missing_datetime_clarifies_then_resumes() {
        let (mut session, _) = local_session();
        let outcome = session.submit(Utterance::typed("plan afspraak met piet")).await;
        let PipelineOutcome::Clarification { request } = outcome else {
            panic!("expected clarification, got {outcome:?}");
        };
        assert_eq!(request.missing, vec![MissingField::Date, MissingField::Time]);
        assert!(session.snapshot().artifacts.is_empty());

        let outcome = session
            .resolve_clarification(request.id, ClarificationAnswer::Text("morgen om 10".into()))
            .await
            .unwrap();
        let PipelineOutcome::Dispatched { artifact, .. } = outcome else {
            panic!("expected dispatch, got {outcome:?}");
        };
        assert_eq!(artifact.prefill.person_name.as_deref(), Some("Piet"));
        assert!(artifact.prefill.datetime.unwrap().is_complete());
        assert!(session.snapshot().clarification.pending().is_none());
    }

    #[tokio::test]
    async fn ambiguous_match_offers_intents() {
        let (mut session, _) = local_session();
        let outcome = session.submit(Utterance::typed("afspraak piet")).await;
        let PipelineOutcome::Clarification { request } = outcome else {
            panic!("expected clarification, got {outcome:?}");
        };
        assert!(request.asks_for_intent());
        assert_eq!(request.options[0].value, OptionValue::Intent {
            intent: Intent::CreateAppointment
        });

        // Choosing the action settles the intent; the time is still missing.
        let outcome = session
            .resolve_clarification(request.id, ClarificationAnswer::Choose("1".into()))
            .await
            .unwrap();
        let PipelineOutcome::Clarification { request: follow } = outcome else {
            panic!("expected clarification, got {outcome:?}");
        };
        assert_eq!(follow.missing, vec![MissingField::Date, MissingField::Time]);
        assert_eq!(session.snapshot().clarification.pending().map(|p| p.id), Some(follow.id));
    }

    #[tokio::test]
    async fn chosen_intent_rereads_the_utterance() {
        let (mut session, _) = local_session();
        let PipelineOutcome::Clarification { request } = session
            .submit(Utterance::typed("kun je de afspraak met piet morgen om 10 zoeken"))
            .await
        else {
            panic!("expected clarification");
        };
        let book = request
            .options
            .iter()
            .find(|o| o.value == OptionValue::Intent { intent: Intent::CreateAppointment })
            .expect("booking offered")
            .id
            .clone();

        let outcome = session
            .resolve_clarification(request.id, ClarificationAnswer::Choose(book))
            .await
            .unwrap();
        let PipelineOutcome::Dispatched { artifact, .. } = outcome else {
            panic!("expected dispatch, got {outcome:?}");
        };
        assert_eq!(artifact.kind, Intent::CreateAppointment);
        assert_eq!(artifact.prefill.person_name.as_deref(), Some("Piet"));
        let dt = artifact.prefill.datetime.unwrap();
        assert_eq!(dt.resolved_date(), NaiveDate::from_ymd_opt(2026, 10, 17));
        assert_eq!(dt.time, NaiveTime::from_hms_opt(10, 0, 0));
    }

    #[tokio::test]
    async fn typed_answer_to_intent_question_confirms_it() {
        let (mut session, _) = local_session();
        let PipelineOutcome::Clarification { request } =
            session.submit(Utterance::typed("afspraak piet")).await
        else {
            panic!("expected clarification");
        };
        assert!(request.asks_for_intent());

        let outcome = session
            .resolve_clarification(
                request.id,
                ClarificationAnswer::Text("plan afspraak met piet morgen om 10".into()),
            )
            .await
            .unwrap();
        let PipelineOutcome::Dispatched { artifact, .. } = outcome else {
            panic!("expected dispatch, got {outcome:?}");
        };
        assert_eq!(artifact.kind, Intent::CreateAppointment);
        assert!(artifact.prefill.datetime.unwrap().is_complete());
        assert!(!session.snapshot().clarification.is_pending());
    }

    #[tokio::test]
    async fn cancel_option_dismisses() {
        let (mut session, _) = local_session();
        let PipelineOutcome::Clarification { request } =
            session.submit(Utterance::typed("afspraak piet")).await
        else {
            panic!("expected clarification");
        };
        let cancel = request
            .options
            .iter()
            .find(|o| o.value == OptionValue::Cancel)
            .unwrap()
            .id
            .clone();
        let outcome = session
            .resolve_clarification(request.id, ClarificationAnswer::Choose(cancel))
            .await
            .unwrap();
        assert_eq!(outcome, PipelineOutcome::Dismissed);
        assert!(!session.snapshot().clarification.is_pending());
    }

    #[tokio::test]
    async fn unknown_option_keeps_question_pending() {
        let (mut session, _) = local_session();
        let PipelineOutcome::Clarification { request } =
            session.submit(Utterance::typed("afspraak piet")).await
        else {
            panic!("expected clarification");
        };
        let err = session
            .resolve_clarification(request.id, ClarificationAnswer::Choose("42".into()))
            .await
            .unwrap_err();
        assert_eq!(err, SessionError::Clarification(ClarificationError::UnknownOption("42".into())));
        assert!(session.snapshot().clarification.is_pending());
    }

    #[tokio::test]
    async fn second_clarification_replaces_first() {
        let (mut session, _) = local_session();
        session.submit(Utterance::typed("afspraak piet")).await;
        let PipelineOutcome::Clarification { request } =
            session.submit(Utterance::typed("plan afspraak met jan")).await
        else {
            panic!("expected clarification");
        };
        assert_eq!(session.snapshot().clarification.pending().map(|p| p.id), Some(request.id));
    }

    #[tokio::test]
    async fn missing_person_redirects_and_resumes() {
        let (mut session, _) = local_session();
        let outcome = session.submit(Utterance::typed("notitie medicatie gegeven")).await;
        let PipelineOutcome::SearchRedirect { suspended, artifact } = outcome else {
            panic!("expected redirect, got {outcome:?}");
        };
        assert_eq!(suspended, Intent::CreateNote);
        assert_eq!(artifact.kind, Intent::SearchPatient);
        assert!(session.snapshot().suspended.is_some());

        let outcome = session.resolve_person("Jan").await.unwrap();
        let PipelineOutcome::Dispatched { artifact: note, .. } = outcome else {
            panic!("expected dispatch, got {outcome:?}");
        };
        assert_eq!(note.prefill.person_name.as_deref(), Some("Jan"));
        assert_eq!(note.prefill.category, Some(NoteCategory::Medication));

        let state = session.snapshot();
        assert!(state.suspended.is_none());
        assert!(state.artifacts.get(artifact.id).is_none());
        assert_eq!(session.resolve_person("Jan").await.unwrap_err(), SessionError::NothingSuspended);
    }

    #[tokio::test]
    async fn middle_band_waits_for_confirmation() {
        let (mut session, exec) = local_session();
        let outcome = session.submit(Utterance::typed("noteer jan medicatie gegeven")).await;
        let PipelineOutcome::AwaitingConfirmation { artifact } = outcome else {
            panic!("expected confirmation, got {outcome:?}");
        };
        assert!(artifact.needs_confirmation);
        assert!(exec.calls().is_empty(), "nothing runs before confirmation");

        let outcome = session.confirm_pending().await.unwrap();
        let PipelineOutcome::Dispatched { artifact: confirmed, chain, .. } = outcome else {
            panic!("expected dispatch, got {outcome:?}");
        };
        assert_eq!(confirmed.id, artifact.id);
        assert!(!confirmed.needs_confirmation);
        assert_eq!(chain.status, ChainStatus::Completed);
        assert_eq!(session.confirm_pending().await.unwrap_err(), SessionError::NothingToConfirm);
    }

    #[tokio::test]
    async fn declining_closes_the_artifact() {
        let (mut session, exec) = local_session();
        session.submit(Utterance::typed("noteer jan medicatie gegeven")).await;
        assert_eq!(session.decline_pending().unwrap(), PipelineOutcome::Dismissed);

        let state = session.snapshot();
        assert!(state.artifacts.is_empty());
        assert!(state.confirmation.is_none());
        assert!(exec.calls().is_empty());
    }

    #[tokio::test]
    async fn failed_step_is_recorded_in_history() {
        let exec = Arc::new(RecordingExecutor::failing_at(
            "save-note",
            ActionStepError::new("storage", "disk full"),
        ));
        let mut session = session_with(SemanticClassifier::disabled(), exec);
        let PipelineOutcome::Dispatched { chain, nudge, .. } =
            session.submit(Utterance::typed("notitie jan medicatie gegeven")).await
        else {
            panic!("expected dispatch");
        };
        assert_eq!(chain.status, ChainStatus::Failed);
        assert_eq!(chain.steps[0].status, StepStatus::Success);
        assert!(nudge.is_none());

        let state = session.snapshot();
        assert_eq!(state.chains.latest().map(|c| c.id), Some(chain.id));
        let recent = state.recent.latest().unwrap();
        assert_eq!(recent.intent, Intent::CreateNote);
        assert_eq!(recent.status, ChainStatus::Failed);
    }

    #[tokio::test]
    async fn fourth_artifact_evicts_first() {
        let (mut session, _) = local_session();
        let mut ids = Vec::new();
        for name in ["jan", "piet", "kees", "anna"] {
            let PipelineOutcome::Dispatched { artifact, .. } = session
                .submit(Utterance::typed(format!("notitie {name} medicatie gegeven")))
                .await
            else {
                panic!("expected dispatch");
            };
            ids.push(artifact.id);
        }
        let state = session.snapshot();
        assert_eq!(state.artifacts.len(), 3);
        assert!(state.artifacts.get(ids[0]).is_none());
        assert_eq!(state.artifacts.active_id(), Some(ids[3]));
    }

    #[tokio::test]
    async fn accepted_nudge_runs_through_gate() {
        let (mut session, _) = local_session();
        let PipelineOutcome::Dispatched { nudge: Some(nudge), .. } =
            session.submit(Utterance::typed("notitie jan medicatie gegeven")).await
        else {
            panic!("expected dispatch with nudge");
        };

        let outcome = session.accept_nudge(nudge.id).await.unwrap();
        let PipelineOutcome::Dispatched { artifact, .. } = outcome else {
            panic!("expected dispatch, got {outcome:?}");
        };
        assert_eq!(artifact.kind, Intent::HandoverSummary);
        assert!(artifact.prefill.date_range.unwrap().is_resolved());
        assert_eq!(
            session.accept_nudge(nudge.id).await.unwrap_err(),
            SessionError::Nudge(NudgeError::NotFound(nudge.id))
        );
    }

    #[tokio::test]
    async fn dismissed_nudge_is_gone() {
        let (mut session, _) = local_session();
        let PipelineOutcome::Dispatched { nudge: Some(nudge), .. } =
            session.submit(Utterance::typed("notitie jan medicatie gegeven")).await
        else {
            panic!("expected dispatch with nudge");
        };
        session.dismiss_nudge(nudge.id).unwrap();
        assert!(session.snapshot().nudges.is_empty());
    }

    #[tokio::test]
    async fn help_and_blank_input() {
        let (mut session, _) = local_session();
        let PipelineOutcome::Help { examples } = session.submit(Utterance::typed("help")).await else {
            panic!("expected help");
        };
        assert!(!examples.is_empty());
        assert_eq!(session.submit(Utterance::typed("   ")).await.kind(), "rejected");
    }

    #[tokio::test]
    async fn snapshots_are_immutable() {
        let (mut session, _) = local_session();
        let before = session.snapshot();
        session.submit(Utterance::typed("notitie jan medicatie gegeven")).await;
        assert!(before.artifacts.is_empty());
        assert_eq!(session.snapshot().artifacts.len(), 1);
    }

    #[tokio::test]
    async fn closing_unconfirmed_artifact_drops_confirmation() {
        let (mut session, _) = local_session();
        let PipelineOutcome::AwaitingConfirmation { artifact } =
            session.submit(Utterance::typed("noteer jan medicatie gegeven")).await
        else {
            panic!("expected confirmation");
        };
        session.close_artifact(artifact.id).unwrap();
        assert!(session.snapshot().confirmation.is_none());
        assert_eq!(
            session.close_artifact(artifact.id).unwrap_err(),
            SessionError::Artifact(ArtifactError::NotFound(artifact.id))
        );
    }
}
