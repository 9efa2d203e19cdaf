//! Record command implementation

use super::RecorderOpts;
use crate::config::Config;
use clap::Args;
use tokio_util::sync::CancellationToken;

#[derive(Args, Debug)]
pub struct RecordArgs {
    /// Run a single recording cycle and exit
    #[arg(long)]
    pub once: bool,

    #[command(flatten)]
    pub opts: RecorderOpts,
}

impl RecordArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let cancel = CancellationToken::new();
        super::spawn_shutdown_listener(cancel.clone());

        let recorder = super::build_recorder(config, &self.opts, cancel)?;

        if self.once {
            let count = recorder.record_once().await?;
            tracing::info!(count, "Recorded market snapshots");
        } else {
            recorder.run().await?;
        }

        recorder.store().close();
        Ok(())
    }
}
