//! Action chain executor.
//!
//! An action runs as 1..k ordered steps. A failed step halts the chain and
//! leaves later steps pending. Steps that already succeeded stay succeeded:
//! each one is durable on its own and nothing is compensated.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::gate::ActionPayload;
use crate::models::{ChainStatus, Intent, StepStatus};

/// Finished chains kept for inspection.
pub const CHAIN_HISTORY_CAPACITY: usize = 10;

/// Structured failure reported by an executor.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{category}: {message}")]
pub struct ActionStepError {
    pub category: String,
    pub message: String,
}

impl ActionStepError {
    pub fn new(category: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            message: message.into(),
        }
    }

    /// No executor registered for the intent.
    pub fn unavailable(intent: Intent) -> Self {
        Self::new("unavailable", format!("No executor registered for {intent}"))
    }
}

/// Ordered step names per intent.
pub fn step_plan(intent: Intent) -> &'static [&'static str] {
    match intent {
        Intent::CreateNote => &["prepare-note", "save-note"],
        Intent::SearchPatient => &["search-records"],
        Intent::HandoverSummary => &["collect-notes", "compose-summary"],
        Intent::QueryCalendar => &["load-calendar"],
        Intent::CreateAppointment => &["check-availability", "book-slot"],
        Intent::CancelAppointment => &["locate-appointment", "release-slot"],
        Intent::RescheduleAppointment => &["locate-appointment", "release-slot", "book-slot"],
        Intent::Unknown => &[],
    }
}

// ═══════════════════════════════════════════════════════════
// Steps and chains
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionStep {
    pub id: Uuid,
    pub name: String,
    pub status: StepStatus,
    pub started_at: Option<DateTime<Local>>,
    pub completed_at: Option<DateTime<Local>>,
    pub error: Option<ActionStepError>,
}

impl ActionStep {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            status: StepStatus::Pending,
            started_at: None,
            completed_at: None,
            error: None,
        }
    }

    /// Move forward to `next`. Backward or skipping moves are refused.
    fn advance(&mut self, next: StepStatus) -> bool {
        if !self.status.can_transition_to(next) {
            tracing::warn!(step = %self.name, from = %self.status, to = %next, "Refused step transition");
            return false;
        }
        let now = Local::now();
        match next {
            StepStatus::Executing => self.started_at = Some(now),
            s if s.is_terminal() => self.completed_at = Some(now),
            _ => {}
        }
        self.status = next;
        true
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionChain {
    pub id: Uuid,
    pub intent: Intent,
    pub steps: Vec<ActionStep>,
    pub status: ChainStatus,
    pub created_at: DateTime<Local>,
}

impl ActionChain {
    /// A pending chain with the intent's step plan.
    pub fn plan(intent: Intent) -> Self {
        Self {
            id: Uuid::new_v4(),
            intent,
            steps: step_plan(intent).iter().map(|s| ActionStep::new(*s)).collect(),
            status: ChainStatus::Pending,
            created_at: Local::now(),
        }
    }

    pub fn failed_step(&self) -> Option<&ActionStep> {
        self.steps.iter().find(|s| s.status == StepStatus::Failed)
    }
}

// ═══════════════════════════════════════════════════════════
// Executors
// ═══════════════════════════════════════════════════════════

/// Performs the steps of one kind of action. Opaque to the pipeline.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute_step(&self, step: &str, payload: &ActionPayload) -> Result<(), ActionStepError>;
}

/// Intent → executor.
#[derive(Clone, Default)]
pub struct ExecutorRegistry {
    executors: HashMap<Intent, Arc<dyn ActionExecutor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, intent: Intent, executor: Arc<dyn ActionExecutor>) -> Self {
        self.register(intent, executor);
        self
    }

    pub fn register(&mut self, intent: Intent, executor: Arc<dyn ActionExecutor>) {
        self.executors.insert(intent, executor);
    }

    /// Same executor for every action intent.
    pub fn with_all(executor: Arc<dyn ActionExecutor>) -> Self {
        let mut registry = Self::new();
        for intent in Intent::ALL.iter().filter(|i| **i != Intent::Unknown) {
            registry.register(*intent, executor.clone());
        }
        registry
    }

    pub fn get(&self, intent: Intent) -> Option<&Arc<dyn ActionExecutor>> {
        self.executors.get(&intent)
    }
}

/// Run the payload's step plan to completion or first failure.
pub async fn run_chain(registry: &ExecutorRegistry, payload: &ActionPayload) -> ActionChain {
    let intent = payload.intent();
    let mut chain = ActionChain::plan(intent);
    chain.status = ChainStatus::Running;
    let executor = registry.get(intent);

    for step in chain.steps.iter_mut() {
        step.advance(StepStatus::Executing);
        let outcome = match executor {
            Some(exec) => exec.execute_step(&step.name, payload).await,
            None => Err(ActionStepError::unavailable(intent)),
        };
        match outcome {
            Ok(()) => {
                step.advance(StepStatus::Success);
            }
            Err(e) => {
                tracing::warn!(
                    chain_id = %chain.id,
                    step = %step.name,
                    category = %e.category,
                    "Action step failed, halting chain"
                );
                step.advance(StepStatus::Failed);
                step.error = Some(e);
                chain.status = ChainStatus::Failed;
                break;
            }
        }
    }

    if chain.status != ChainStatus::Failed {
        chain.status = ChainStatus::Completed;
    }
    tracing::info!(chain_id = %chain.id, intent = %intent, status = %chain.status, "Action chain finished");
    chain
}

// ═══════════════════════════════════════════════════════════
// History
// ═══════════════════════════════════════════════════════════

/// Finished chains, newest first, bounded.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChainHistory {
    chains: VecDeque<ActionChain>,
}

impl ChainHistory {
    pub fn record(&mut self, chain: ActionChain) {
        self.chains.push_front(chain);
        self.chains.truncate(CHAIN_HISTORY_CAPACITY);
    }

    pub fn latest(&self) -> Option<&ActionChain> {
        self.chains.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActionChain> {
        self.chains.iter()
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════
// RecordingExecutor: accepts every step, optionally failing one
// ═══════════════════════════════════════════════════════════

/// Executor that performs nothing and logs which steps it was asked to run.
/// Used for dry runs and tests.
#[derive(Default)]
pub struct RecordingExecutor {
    fail_at: Option<(String, ActionStepError)>,
    calls: Mutex<Vec<String>>,
}

impl RecordingExecutor {
    pub fn accepting() -> Self {
        Self::default()
    }

    pub fn failing_at(step: &str, error: ActionStepError) -> Self {
        Self {
            fail_at: Some((step.to_string(), error)),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Steps invoked so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ActionExecutor for RecordingExecutor {
    async fn execute_step(&self, step: &str, payload: &ActionPayload) -> Result<(), ActionStepError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(step.to_string());
        }
        tracing::debug!(step, intent = %payload.intent(), "Recorded action step");
        match &self.fail_at {
            Some((name, error)) if name == step => Err(error.clone()),
            _ => Ok(()),
        }
    }
}
