//! Finalized-transcript event loop.
//!
//! The speech-to-text side is just a producer of events. Interim segments
//! are for live preview only and never reach the pipeline; final segments
//! are submitted one at a time, in arrival order.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::models::{Utterance, UtteranceSource};
use crate::session::{PipelineOutcome, Session};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEvent {
    pub text: String,
    pub is_final: bool,
    pub source: UtteranceSource,
}

impl TranscriptEvent {
    pub fn interim(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: false,
            source: UtteranceSource::Spoken,
        }
    }

    pub fn final_spoken(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: true,
            source: UtteranceSource::Spoken,
        }
    }

    pub fn typed(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: true,
            source: UtteranceSource::Typed,
        }
    }
}

/// Drive `session` from `events` until the channel closes, the outcome
/// receiver goes away, or `cancel` fires. Returns how many utterances were
/// processed.
pub async fn run_transcript_loop(
    session: &mut Session,
    mut events: mpsc::Receiver<TranscriptEvent>,
    outcomes: mpsc::Sender<PipelineOutcome>,
    cancel: CancellationToken,
) -> usize {
    let mut processed = 0;

    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!(processed, "Transcript loop cancelled");
                break;
            }
            event = events.recv() => match event {
                Some(event) => event,
                None => {
                    tracing::debug!(processed, "Transcript channel closed");
                    break;
                }
            },
        };

        if !event.is_final {
            continue;
        }

        let outcome = session.submit(Utterance::new(event.text, event.source)).await;
        processed += 1;
        if outcomes.send(outcome).await.is_err() {
            tracing::warn!(processed, "Outcome receiver dropped, stopping transcript loop");
            break;
        }
    }

    processed
}
