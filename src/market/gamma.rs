//! Gamma API client for the market catalog
//!
//! Pulls the paginated market listing from Polymarket's Gamma API. The
//! recording loop has to tolerate empty cycles, so transport failures and
//! non-success responses are logged and degrade to an empty result rather
//! than propagating; a single malformed item is skipped without aborting
//! the batch it arrived in.

use super::normalize;
use super::Market;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;

/// Gamma API base URL
pub const GAMMA_API_URL: &str = "https://gamma-api.polymarket.com";

/// Configuration for the Gamma client
#[derive(Debug, Clone)]
pub struct GammaConfig {
    /// Base URL for the Gamma API
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Requests-per-second ceiling
    pub rate_limit_per_second: u32,
}

impl Default for GammaConfig {
    fn default() -> Self {
        Self {
            base_url: GAMMA_API_URL.to_string(),
            timeout: Duration::from_secs(30),
            rate_limit_per_second: 5,
        }
    }
}

/// Client for Polymarket's Gamma API
pub struct GammaClient {
    config: GammaConfig,
    client: Client,
}

impl GammaClient {
    /// Create a new Gamma API client with default configuration
    pub fn new() -> Self {
        Self::with_config(GammaConfig::default())
    }

    /// Create a new client with custom configuration
    pub fn with_config(config: GammaConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    /// Fixed inter-request delay derived from the rate ceiling
    fn rate_limit_delay(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.config.rate_limit_per_second.max(1)))
    }

    /// Fetch one page of the market catalog
    ///
    /// Returns an empty list on any transport or API failure; the caller
    /// never needs to handle an error from this path.
    pub async fn fetch_markets(&self, limit: u32, offset: u32, active_only: bool) -> Vec<Market> {
        match self.try_fetch_markets(limit, offset, active_only).await {
            Ok(markets) => markets,
            Err(e) => {
                tracing::error!(error = %e, "Failed to fetch markets");
                Vec::new()
            }
        }
    }

    async fn try_fetch_markets(
        &self,
        limit: u32,
        offset: u32,
        active_only: bool,
    ) -> anyhow::Result<Vec<Market>> {
        let url = format!("{}/markets", self.config.base_url);

        let mut query = vec![
            ("limit", limit.to_string()),
            ("offset", offset.to_string()),
        ];
        if active_only {
            query.push(("closed", "false".to_string()));
        }

        tracing::debug!(url = %url, limit, offset, "Fetching market catalog page");

        let response = self.client.get(&url).query(&query).send().await?;

        // Rate limiting: one fixed delay per request
        sleep(self.rate_limit_delay()).await;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Gamma API error: {} - {}", status, body);
        }

        let items: Vec<Value> = response.json().await?;

        let mut markets = Vec::with_capacity(items.len());
        for item in &items {
            match normalize::market_from_value(item) {
                Ok(market) => markets.push(market),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping malformed market payload");
                }
            }
        }

        tracing::debug!(
            received = items.len(),
            parsed = markets.len(),
            "Parsed market catalog page"
        );

        Ok(markets)
    }
}

impl Default for GammaClient {
    fn default() -> Self {
        Self::new()
    }
}
