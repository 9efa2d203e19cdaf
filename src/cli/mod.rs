//! CLI interface for poly-snap
//!
//! Provides subcommands for:
//! - `record`: Periodic snapshot recording (one cycle or continuous)
//! - `stream`: Recording loop plus real-time market stream ingestion
//! - `book`: Fetch and persist a single order book snapshot
//! - `query`: Inspect stored market snapshots
//! - `config`: Show effective configuration

mod book;
mod query;
mod record;
mod stream;

pub use book::BookArgs;
pub use query::QueryArgs;
pub use record::RecordArgs;
pub use stream::StreamArgs;

use crate::clob::{ClobClient, ClobConfig};
use crate::config::Config;
use crate::market::{GammaClient, GammaConfig};
use crate::recorder::{Recorder, RecorderConfig};
use crate::store::SnapshotStore;
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "poly-snap")]
#[command(about = "Market data snapshot recorder for Polymarket")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml", global = true)]
    pub config: String,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Record market snapshots periodically
    Record(RecordArgs),
    /// Record snapshots while ingesting the real-time market stream
    Stream(StreamArgs),
    /// Fetch and persist one order book snapshot
    Book(BookArgs),
    /// Query stored market snapshots
    Query(QueryArgs),
    /// Show effective configuration
    Config,
}

/// Recording knobs shared by the capture subcommands; every flag
/// overrides the corresponding configuration value
#[derive(Args, Debug, Clone, Default)]
pub struct RecorderOpts {
    /// Path to the SQLite snapshot database
    #[arg(long)]
    pub db_path: Option<PathBuf>,

    /// Recording interval in seconds
    #[arg(long)]
    pub interval: Option<u64>,

    /// Minimum 24h volume filter
    #[arg(long)]
    pub min_volume: Option<f64>,

    /// Minimum liquidity filter
    #[arg(long)]
    pub min_liquidity: Option<f64>,
}

/// Cancel the token on Ctrl-C so both loops can exit cooperatively
pub(crate) fn spawn_shutdown_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received shutdown signal, stopping");
            cancel.cancel();
        }
    });
}

pub(crate) fn build_gamma(config: &Config) -> GammaClient {
    GammaClient::with_config(GammaConfig {
        base_url: config.gamma.base_url.clone(),
        timeout: Duration::from_secs(config.gamma.request_timeout_secs),
        rate_limit_per_second: config.gamma.rate_limit_per_second,
    })
}

pub(crate) fn build_clob(config: &Config) -> ClobClient {
    ClobClient::with_config(ClobConfig {
        base_url: config.clob.base_url.clone(),
        timeout: Duration::from_secs(config.clob.request_timeout_secs),
    })
}

pub(crate) fn build_store(
    config: &Config,
    db_path: Option<&PathBuf>,
) -> anyhow::Result<Arc<SnapshotStore>> {
    let path = db_path.cloned().unwrap_or_else(|| config.recorder.db_path.clone());
    let store = SnapshotStore::new(path);
    store.init()?;
    Ok(Arc::new(store))
}

pub(crate) fn effective_recorder_config(config: &Config, opts: &RecorderOpts) -> RecorderConfig {
    RecorderConfig {
        interval: Duration::from_secs(opts.interval.unwrap_or(config.recorder.interval_secs)),
        min_volume: opts
            .min_volume
            .and_then(|v| Decimal::try_from(v).ok())
            .unwrap_or(config.recorder.min_volume),
        min_liquidity: opts
            .min_liquidity
            .and_then(|v| Decimal::try_from(v).ok())
            .unwrap_or(config.recorder.min_liquidity),
        book_depth: config.recorder.book_depth,
        page_limit: config.gamma.page_limit,
    }
}

pub(crate) fn build_recorder(
    config: &Config,
    opts: &RecorderOpts,
    cancel: CancellationToken,
) -> anyhow::Result<Recorder> {
    let store = build_store(config, opts.db_path.as_ref())?;
    Ok(Recorder::new(
        build_gamma(config),
        build_clob(config),
        store,
        effective_recorder_config(config, opts),
        cancel,
    ))
}
