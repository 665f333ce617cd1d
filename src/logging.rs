//! Tracing initialisation for the binary.

use tracing_subscriber::{fmt, EnvFilter};

/// Installs a stdout subscriber. `RUST_LOG` wins over `level` when set.
pub fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("interview_scheduler={level},warn")));

    // A second call (e.g. from tests) keeps the first subscriber.
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
