pub mod artifacts; // open action panels, FIFO-bounded
pub mod chain; // multi-step action executor
pub mod clarification;
pub mod classify; // lexical rules + semantic fallback
pub mod config;
pub mod extraction; // entities + relative date resolver
pub mod gate;
pub mod history;
pub mod models;
pub mod nudges;
pub mod session;
pub mod transcript; // finalized speech segments → session

pub use session::{PipelineOutcome, Session, SessionError, SessionState};

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber. `RUST_LOG` wins over the default
/// filter. Safe to call more than once; later calls are ignored.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .try_init();
}
