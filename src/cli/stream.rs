//! Stream command implementation
//!
//! Runs the periodic recording loop and the WebSocket ingestor
//! concurrently; the two share only the snapshot store and the
//! cancellation token.

use super::RecorderOpts;
use crate::config::Config;
use crate::stream::{StreamConfig, StreamIngestor};
use clap::Args;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Args, Debug)]
pub struct StreamArgs {
    #[command(flatten)]
    pub opts: RecorderOpts,
}

impl StreamArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let cancel = CancellationToken::new();
        super::spawn_shutdown_listener(cancel.clone());

        let recorder = super::build_recorder(config, &self.opts, cancel.clone())?;

        // Subscribe to every token of the filtered catalog
        let markets = recorder.fetch_markets().await;
        let token_ids: Vec<String> = markets
            .iter()
            .flat_map(|m| m.tokens.iter())
            .filter(|t| !t.token_id.is_empty())
            .map(|t| t.token_id.clone())
            .collect();

        tracing::info!(tokens = token_ids.len(), "Starting stream mode");

        let ingestor = StreamIngestor::new(
            StreamConfig {
                ws_url: config.clob.ws_url.clone(),
                reconnect_backoff: Duration::from_secs(config.stream.reconnect_backoff_secs),
            },
            recorder.store().clone(),
            cancel,
        );

        tokio::try_join!(recorder.run(), ingestor.run(&token_ids))?;

        recorder.store().close();
        Ok(())
    }
}
