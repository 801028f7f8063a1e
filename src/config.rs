use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "Coheara";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tracing filter when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "coheara_intent=info,warn"
}

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_INTENT_MODEL: &str = "medgemma:4b";
const DEFAULT_FALLBACK_TIMEOUT_MS: u64 = 4_000;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Thresholds must satisfy 0 <= clarify <= confirm <= auto <= 1 (got {clarify}, {confirm}, {auto})")]
    InvalidThresholds { clarify: f32, confirm: f32, auto: f32 },

    #[error("Fallback threshold must be within [0, 1] (got {0})")]
    InvalidFallbackThreshold(f32),

    #[error("Invalid number for {var}: {value}")]
    InvalidNumber { var: &'static str, value: String },
}

/// Confidence bands of the dispatch gate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GateThresholds {
    /// At or above: dispatch without asking.
    pub auto_dispatch: f32,
    /// At or above (below auto): dispatch, confirm before any write.
    pub confirm: f32,
    /// At or above (below confirm): ask a clarifying question.
    pub clarify: f32,
}

impl Default for GateThresholds {
    fn default() -> Self {
        Self {
            auto_dispatch: 0.9,
            confirm: 0.7,
            clarify: 0.5,
        }
    }
}

/// Everything tunable about the command pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineConfig {
    /// Local confidence below this calls the semantic fallback.
    pub fallback_threshold: f32,
    pub gate: GateThresholds,
    /// Hard bound on the fallback round-trip.
    pub fallback_timeout: Duration,
    pub ollama_url: String,
    pub intent_model: String,
    /// Reference patient names used by the person-name heuristic.
    pub known_names: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fallback_threshold: 0.8,
            gate: GateThresholds::default(),
            fallback_timeout: Duration::from_millis(DEFAULT_FALLBACK_TIMEOUT_MS),
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            intent_model: DEFAULT_INTENT_MODEL.to_string(),
            known_names: Vec::new(),
        }
    }
}

impl PipelineConfig {
    /// Defaults overridden by `COHEARA_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("COHEARA_OLLAMA_URL") {
            config.ollama_url = url.trim_end_matches('/').to_string();
        }
        if let Ok(model) = std::env::var("COHEARA_INTENT_MODEL") {
            config.intent_model = model;
        }
        if let Ok(raw) = std::env::var("COHEARA_FALLBACK_TIMEOUT_MS") {
            let ms = raw.trim().parse::<u64>().map_err(|_| ConfigError::InvalidNumber {
                var: "COHEARA_FALLBACK_TIMEOUT_MS",
                value: raw.clone(),
            })?;
            config.fallback_timeout = Duration::from_millis(ms);
        }
        if let Ok(names) = std::env::var("COHEARA_KNOWN_NAMES") {
            config.known_names = parse_name_list(&names);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_known_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let g = &self.gate;
        let ordered = 0.0 <= g.clarify
            && g.clarify <= g.confirm
            && g.confirm <= g.auto_dispatch
            && g.auto_dispatch <= 1.0;
        if !ordered {
            return Err(ConfigError::InvalidThresholds {
                clarify: g.clarify,
                confirm: g.confirm,
                auto: g.auto_dispatch,
            });
        }
        if !(0.0..=1.0).contains(&self.fallback_threshold) {
            return Err(ConfigError::InvalidFallbackThreshold(self.fallback_threshold));
        }
        Ok(())
    }
}

fn parse_name_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(String::from)
        .collect()
}
