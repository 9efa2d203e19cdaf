//! CLOB REST API client
//!
//! Fetches order books for individual tokens. Unlike the catalog fetch,
//! errors here propagate to the caller; there is no degrade-to-empty path.

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// CLOB API base URL
pub const CLOB_API_URL: &str = "https://clob.polymarket.com";

/// Configuration for the CLOB client
#[derive(Debug, Clone)]
pub struct ClobConfig {
    /// Base URL for the CLOB REST API
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for ClobConfig {
    fn default() -> Self {
        Self {
            base_url: CLOB_API_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// One price level as delivered on the wire, prices and sizes as strings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookLevel {
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub size: String,
}

/// Order book response from `GET /book`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookLevels {
    #[serde(default)]
    pub bids: Vec<BookLevel>,
    #[serde(default)]
    pub asks: Vec<BookLevel>,
}

/// One raw trade entry from a trades listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTrade {
    #[serde(default)]
    pub price: Option<Value>,
    #[serde(default)]
    pub size: Option<Value>,
    #[serde(default)]
    pub side: Option<String>,
}

/// Client for the CLOB REST API
pub struct ClobClient {
    config: ClobConfig,
    client: Client,
}

impl ClobClient {
    /// Create a new client with default configuration
    pub fn new() -> Self {
        Self::with_config(ClobConfig::default())
    }

    /// Create a new client with custom configuration
    pub fn with_config(config: ClobConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    /// Fetch the full order book for a token
    pub async fn fetch_book(&self, token_id: &str) -> anyhow::Result<BookLevels> {
        let url = format!("{}/book", self.config.base_url);

        tracing::debug!(url = %url, token_id = %token_id, "Fetching order book");

        let response = self
            .client
            .get(&url)
            .query(&[("token_id", token_id)])
            .send()
            .await?
            .error_for_status()?;

        let book: BookLevels = response.json().await?;
        Ok(book)
    }
}

impl Default for ClobClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clob_config_default() {
        let config = ClobConfig::default();
        assert_eq!(config.base_url, CLOB_API_URL);
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_book_levels_deserialize() {
        let json = r#"{
            "bids": [{"price": "0.50", "size": "100"}],
            "asks": [{"price": "0.52", "size": "150"}, {"price": "0.53", "size": "80"}]
        }"#;

        let book: BookLevels = serde_json::from_str(json).unwrap();
        assert_eq!(book.bids.len(), 1);
        assert_eq!(book.asks.len(), 2);
        assert_eq!(book.bids[0].price, "0.50");
        assert_eq!(book.asks[1].size, "80");
    }

    #[test]
    fn test_book_levels_missing_sides_default_empty() {
        let book: BookLevels = serde_json::from_str("{}").unwrap();
        assert!(book.bids.is_empty());
        assert!(book.asks.is_empty());
    }
}
