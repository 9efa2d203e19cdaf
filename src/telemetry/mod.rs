//! Telemetry module
//!
//! Structured logging for the recorder process. Stream ingestion also
//! keeps per-kind event counters, but those live with the ingestor and
//! surface through these logs.

use crate::config::TelemetrySection;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize logging from the telemetry configuration
///
/// Precedence, highest first: the RUST_LOG environment variable, the
/// `--verbose` flag (forces debug), then the configured level.
pub fn init_telemetry(config: &TelemetrySection, verbose: bool) -> anyhow::Result<()> {
    let level = if verbose { "debug" } else { &config.log_level };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to init logging: {}", e))?;

    Ok(())
}
