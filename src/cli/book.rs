//! Book command implementation

use super::RecorderOpts;
use crate::config::Config;
use clap::Args;
use tokio_util::sync::CancellationToken;

#[derive(Args, Debug)]
pub struct BookArgs {
    /// Market (condition) identifier to record the book under
    #[arg(long)]
    pub market_id: String,

    /// Token identifier to fetch the book for
    #[arg(long)]
    pub token_id: String,

    #[command(flatten)]
    pub opts: RecorderOpts,
}

impl BookArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let recorder = super::build_recorder(config, &self.opts, CancellationToken::new())?;

        let levels = recorder
            .record_order_book(&self.market_id, &self.token_id)
            .await?;
        println!(
            "Recorded {} book levels for token {}",
            levels, self.token_id
        );

        recorder.store().close();
        Ok(())
    }
}
