//! Two-tier intent classification: lexical rules first, semantic fallback
//! when local confidence is low.

pub mod lexical;
pub mod ollama;
pub mod rules;
pub mod semantic;
pub mod validation;

pub use lexical::*;
pub use ollama::*;
pub use rules::{Rule, HELP_EXAMPLES};
pub use semantic::*;
pub use validation::*;

use thiserror::Error;

/// Why the semantic fallback produced nothing usable.
///
/// Never surfaced to the user: every variant degrades the classification
/// to unknown / 0.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FallbackError {
    #[error("Semantic service unreachable at {0}")]
    Connection(String),

    #[error("Semantic service returned error (status {status}): {body}")]
    Http { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Semantic call timed out after {0}ms")]
    Timeout(u64),

    #[error("Semantic call cancelled")]
    Cancelled,

    #[error("Reply failed validation: {0}")]
    Validation(String),

    #[error("No semantic provider configured")]
    NoProvider,
}

impl FallbackError {
    /// Short stable tag for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connection(_) | Self::Http { .. } | Self::Transport(_) => "transport",
            Self::Timeout(_) => "timeout",
            Self::Cancelled => "cancelled",
            Self::Validation(_) => "validation",
            Self::NoProvider => "no_provider",
        }
    }
}
