//! Tracing subscriber setup for services embedding Turnstile.

use tracing_subscriber::EnvFilter;

use crate::error::{Result, TurnstileError};

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

/// Install a global `fmt` subscriber.
///
/// The filter comes from `RUST_LOG` and defaults to `info`. Only one
/// subscriber can be installed per process; later calls return
/// [`TurnstileError::Telemetry`].
pub fn init_tracing(format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true);

    let installed = match format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|e| TurnstileError::Telemetry(e.to_string()))
}
