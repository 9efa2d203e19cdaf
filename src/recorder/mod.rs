//! Periodic snapshot recording
//!
//! Orchestrates the polling path: fetch and filter the market catalog,
//! build snapshot batches, and persist them. Runs as a long-lived loop
//! that absorbs per-cycle failures; an empty cycle is normal, not an
//! error. Designed to execute concurrently with the stream ingestor,
//! sharing only the store and the cancellation token.

use crate::clob::ClobClient;
use crate::market::{self, GammaClient, Market};
use crate::snapshot::builder;
use crate::store::SnapshotStore;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Configuration for the recording loop
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Delay between recording cycles
    pub interval: Duration,
    /// Minimum 24h volume for a market to be recorded
    pub min_volume: Decimal,
    /// Minimum liquidity for a market to be recorded
    pub min_liquidity: Decimal,
    /// Order book depth per side when snapshotting books (0 = unlimited)
    pub book_depth: usize,
    /// Markets requested per catalog page
    pub page_limit: u32,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            min_volume: Decimal::new(1000, 0),
            min_liquidity: Decimal::new(500, 0),
            book_depth: 5,
            page_limit: 100,
        }
    }
}

/// Records market snapshots on a timer
pub struct Recorder {
    gamma: GammaClient,
    clob: ClobClient,
    store: Arc<SnapshotStore>,
    config: RecorderConfig,
    cancel: CancellationToken,
}

impl Recorder {
    pub fn new(
        gamma: GammaClient,
        clob: ClobClient,
        store: Arc<SnapshotStore>,
        config: RecorderConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            gamma,
            clob,
            store,
            config,
            cancel,
        }
    }

    /// Shared store handle
    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    /// Fetch the active market catalog and apply the volume and
    /// liquidity filters
    pub async fn fetch_markets(&self) -> Vec<Market> {
        let markets = self.gamma.fetch_markets(self.config.page_limit, 0, true).await;
        let fetched = markets.len();

        let filtered = market::filter_by_liquidity(
            market::filter_by_volume(markets, self.config.min_volume),
            self.config.min_liquidity,
        );

        tracing::debug!(fetched, kept = filtered.len(), "Fetched and filtered markets");
        filtered
    }

    /// One recording cycle; returns the number of market snapshots saved
    pub async fn record_once(&self) -> anyhow::Result<usize> {
        let markets = self.fetch_markets().await;
        self.record_markets(&markets)
    }

    /// Build and persist all snapshot batches for the given markets
    ///
    /// Empty batches skip persistence entirely.
    pub fn record_markets(&self, markets: &[Market]) -> anyhow::Result<usize> {
        let market_snapshots = builder::build_market_snapshots(markets);
        if !market_snapshots.is_empty() {
            self.store.save_market_snapshots(&market_snapshots)?;
        }

        let outcome_snapshots = builder::build_outcome_snapshots(markets);
        if !outcome_snapshots.is_empty() {
            self.store.save_outcome_snapshots(&outcome_snapshots)?;
        }

        let resolution_snapshots = builder::build_resolution_snapshots(markets);
        if !resolution_snapshots.is_empty() {
            self.store.save_resolution_snapshots(&resolution_snapshots)?;
        }

        tracing::info!(
            markets = market_snapshots.len(),
            outcomes = outcome_snapshots.len(),
            resolutions = resolution_snapshots.len(),
            "Recorded snapshot batch"
        );

        Ok(market_snapshots.len())
    }

    /// Fetch one token's order book and persist a depth-truncated
    /// snapshot of it; returns the number of levels saved
    pub async fn record_order_book(
        &self,
        market_id: &str,
        token_id: &str,
    ) -> anyhow::Result<usize> {
        let book = self.clob.fetch_book(token_id).await?;
        let snapshots =
            builder::build_orderbook_snapshots(market_id, token_id, &book, self.config.book_depth);

        if !snapshots.is_empty() {
            self.store.save_orderbook_snapshots(&snapshots)?;
        }

        tracing::info!(
            market_id = %market_id,
            token_id = %token_id,
            levels = snapshots.len(),
            "Recorded order book snapshot"
        );
        Ok(snapshots.len())
    }

    /// Run the continuous recording loop until cancelled
    ///
    /// Cycle errors are logged and the loop continues; nothing short of
    /// cancellation stops it.
    pub async fn run(&self) -> anyhow::Result<()> {
        tracing::info!(
            interval = ?self.config.interval,
            min_volume = %self.config.min_volume,
            min_liquidity = %self.config.min_liquidity,
            "Starting recording loop"
        );

        while !self.cancel.is_cancelled() {
            if let Err(e) = self.record_once().await {
                tracing::error!(error = %e, "Recording cycle failed");
            }

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = sleep(self.config.interval) => {}
            }
        }

        tracing::info!("Recording loop stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clob::ClobConfig;
    use crate::market::{test_market, GammaConfig, Token};
    use crate::store::SnapshotQuery;
    use rust_decimal_macros::dec;

    fn test_recorder(config: RecorderConfig) -> Recorder {
        let store = Arc::new(SnapshotStore::open_memory().unwrap());
        Recorder::new(
            GammaClient::with_config(GammaConfig {
                base_url: "http://127.0.0.1:1".to_string(),
                timeout: Duration::from_millis(250),
                rate_limit_per_second: 100,
            }),
            ClobClient::with_config(ClobConfig {
                base_url: "http://127.0.0.1:1".to_string(),
                timeout: Duration::from_millis(250),
            }),
            store,
            config,
            CancellationToken::new(),
        )
    }

    fn token(outcome: &str, price: Decimal) -> Token {
        Token {
            token_id: format!("tok-{}", outcome.to_lowercase()),
            outcome: outcome.to_string(),
            price,
        }
    }

    #[test]
    fn test_record_markets_persists_all_batches() {
        let recorder = test_recorder(RecorderConfig::default());

        let binary = test_market("bin", vec![token("Yes", dec!(0.6)), token("No", dec!(0.4))]);
        let multi = test_market(
            "multi",
            vec![
                token("A", dec!(0.5)),
                token("B", dec!(0.3)),
                token("C", dec!(0.2)),
            ],
        );
        let mut resolved = test_market("done", vec![token("Yes", dec!(1)), token("No", dec!(0))]);
        resolved.resolved = Some(true);

        let count = recorder.record_markets(&[binary, multi, resolved]).unwrap();
        // The resolved market still has yes > 0 and two tokens, so it
        // snapshots alongside the open one
        assert_eq!(count, 2);

        let counts = recorder.store().table_counts().unwrap();
        let by_name: std::collections::HashMap<_, _> = counts.into_iter().collect();
        assert_eq!(by_name["market_snapshots"], 2);
        assert_eq!(by_name["outcome_snapshots"], 3);
        assert_eq!(by_name["resolution_snapshots"], 1);
    }

    #[test]
    fn test_record_markets_empty_catalog_is_a_noop() {
        let recorder = test_recorder(RecorderConfig::default());
        let count = recorder.record_markets(&[]).unwrap();
        assert_eq!(count, 0);

        let counts = recorder.store().table_counts().unwrap();
        assert!(counts.iter().all(|(_, count)| *count == 0));
    }

    #[tokio::test]
    async fn test_record_once_with_unreachable_api_records_nothing() {
        let recorder = test_recorder(RecorderConfig::default());
        let count = recorder.record_once().await.unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_record_order_book_unreachable_api_errors() {
        let recorder = test_recorder(RecorderConfig::default());
        let result = recorder.record_order_book("m1", "tok-1").await;
        assert!(result.is_err());
    }

    #[test]
    fn test_recorded_snapshots_are_queryable() {
        let recorder = test_recorder(RecorderConfig::default());
        let mut market = test_market("bin", vec![token("Yes", dec!(0.7)), token("No", dec!(0.28))]);
        market.best_bid = Some(dec!(0.69));
        market.best_ask = Some(dec!(0.71));

        recorder.record_markets(&[market]).unwrap();

        let rows = recorder
            .store()
            .query_market_snapshots(&SnapshotQuery {
                market_id: Some("bin".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].parity_gap, dec!(0.02));
        assert_eq!(rows[0].spread, Some(dec!(0.02)));
    }

    #[tokio::test]
    async fn test_run_stops_on_cancellation() {
        let store = Arc::new(SnapshotStore::open_memory().unwrap());
        let cancel = CancellationToken::new();
        let recorder = Arc::new(Recorder::new(
            GammaClient::with_config(GammaConfig {
                base_url: "http://127.0.0.1:1".to_string(),
                timeout: Duration::from_millis(100),
                rate_limit_per_second: 100,
            }),
            ClobClient::new(),
            store,
            RecorderConfig {
                interval: Duration::from_millis(20),
                ..Default::default()
            },
            cancel.clone(),
        ));

        let runner = recorder.clone();
        let handle = tokio::spawn(async move { runner.run().await });

        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();

        let result = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("recording loop did not stop after cancellation")
            .unwrap();
        assert!(result.is_ok());
    }
}
