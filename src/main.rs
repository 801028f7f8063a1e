//! Line-oriented front end: one utterance per stdin line, one JSON outcome
//! per stdout line.
//!
//! Lines starting with `:` drive the session instead of being classified:
//! `:confirm`, `:decline`, `:pick <option>`, `:answer <text>`,
//! `:person <name>`, `:accept`, `:dismiss`, `:state`.

use std::process::ExitCode;
use std::sync::Arc;

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};

use coheara_intent::chain::{ExecutorRegistry, RecordingExecutor};
use coheara_intent::clarification::ClarificationAnswer;
use coheara_intent::classify::{OllamaProvider, SemanticClassifier};
use coheara_intent::config::{self, PipelineConfig};
use coheara_intent::models::Utterance;
use coheara_intent::{init_tracing, Session, SessionError};

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    tracing::info!("{} intent CLI v{}", config::APP_NAME, config::APP_VERSION);

    let config = match PipelineConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let semantic = if std::env::var_os("COHEARA_OLLAMA_URL").is_some() {
        match OllamaProvider::from_config(&config) {
            Ok(provider) => {
                tracing::info!(url = provider.base_url(), model = provider.model(), "Semantic fallback enabled");
                SemanticClassifier::new(Arc::new(provider), config.fallback_timeout)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Semantic fallback unavailable, running local-only");
                SemanticClassifier::disabled()
            }
        }
    } else {
        SemanticClassifier::disabled()
    };

    // Dry run: steps are recorded, nothing is written anywhere.
    let executors = ExecutorRegistry::with_all(Arc::new(RecordingExecutor::accepting()));
    let mut session = Session::new(config, semantic, executors);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read stdin");
                return ExitCode::FAILURE;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line.strip_prefix(':') {
            Some(command) => run_command(&mut session, command).await,
            None => emit(&session.submit(Utterance::typed(line)).await),
        }
    }

    ExitCode::SUCCESS
}

async fn run_command(session: &mut Session, command: &str) {
    let (name, arg) = command.split_once(' ').unwrap_or((command, ""));
    let arg = arg.trim();

    let result = match name {
        "confirm" => session.confirm_pending().await,
        "decline" => session.decline_pending(),
        "pick" | "answer" => {
            let Some(id) = session.snapshot().clarification.pending().map(|p| p.id) else {
                return emit_error("No clarification pending");
            };
            let answer = if name == "pick" {
                ClarificationAnswer::Choose(arg.to_string())
            } else {
                ClarificationAnswer::Text(arg.to_string())
            };
            session.resolve_clarification(id, answer).await
        }
        "person" => session.resolve_person(arg).await,
        "accept" | "dismiss" => {
            let Some(id) = session.snapshot().nudges.iter().last().map(|n| n.id) else {
                return emit_error("No nudge open");
            };
            if name == "accept" {
                session.accept_nudge(id).await
            } else {
                session.dismiss_nudge(id).map(|()| coheara_intent::PipelineOutcome::Dismissed)
            }
        }
        "state" => return emit(&*session.snapshot()),
        other => return emit_error(&format!("Unknown command: {other}")),
    };

    match result {
        Ok(outcome) => emit(&outcome),
        Err(e) => emit_session_error(&e),
    }
}

fn emit<T: Serialize>(value: &T) {
    match serde_json::to_string(value) {
        Ok(json) => println!("{json}"),
        Err(e) => tracing::error!(error = %e, "Failed to serialize output"),
    }
}

fn emit_session_error(error: &SessionError) {
    emit_error(&error.to_string());
}

fn emit_error(message: &str) {
    emit(&serde_json::json!({ "error": message }));
}
