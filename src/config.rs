//! Configuration types for poly-snap

use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::PathBuf;

/// Root configuration structure
///
/// Every section has sensible defaults so the recorder can run without a
/// configuration file at all; CLI flags override individual values.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub gamma: GammaSection,
    #[serde(default)]
    pub clob: ClobSection,
    #[serde(default)]
    pub recorder: RecorderSection,
    #[serde(default)]
    pub stream: StreamSection,
    #[serde(default)]
    pub telemetry: TelemetrySection,
}

/// Gamma API (market catalog) configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GammaSection {
    /// Base URL for the Gamma REST API
    #[serde(default = "default_gamma_base_url")]
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Requests-per-second ceiling, enforced as a fixed inter-request delay
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_second: u32,

    /// Number of markets requested per catalog page
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,
}

/// CLOB API (order books, market stream) configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ClobSection {
    /// Base URL for the CLOB REST API
    #[serde(default = "default_clob_base_url")]
    pub base_url: String,

    /// Market stream WebSocket URL
    #[serde(default = "default_clob_ws_url")]
    pub ws_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Snapshot recording configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RecorderSection {
    /// Path to the SQLite snapshot database
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Recording interval in seconds
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Minimum 24h volume for a market to be recorded
    #[serde(default = "default_min_volume")]
    pub min_volume: Decimal,

    /// Minimum liquidity for a market to be recorded
    #[serde(default = "default_min_liquidity")]
    pub min_liquidity: Decimal,

    /// Order book depth per side (0 = unlimited)
    #[serde(default = "default_book_depth")]
    pub book_depth: usize,
}

/// Market stream configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StreamSection {
    /// Delay before reconnecting after a stream failure, in seconds
    #[serde(default = "default_reconnect_backoff_secs")]
    pub reconnect_backoff_secs: u64,
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetrySection {
    /// Log level filter (overridden by RUST_LOG)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_gamma_base_url() -> String {
    "https://gamma-api.polymarket.com".to_string()
}
fn default_clob_base_url() -> String {
    "https://clob.polymarket.com".to_string()
}
fn default_clob_ws_url() -> String {
    "wss://ws-subscriptions-clob.polymarket.com/ws/market".to_string()
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_rate_limit() -> u32 {
    5
}
fn default_page_limit() -> u32 {
    100
}
fn default_db_path() -> PathBuf {
    PathBuf::from("./data/snapshots.db")
}
fn default_interval_secs() -> u64 {
    60
}
fn default_min_volume() -> Decimal {
    Decimal::new(1000, 0)
}
fn default_min_liquidity() -> Decimal {
    Decimal::new(500, 0)
}
fn default_book_depth() -> usize {
    5
}
fn default_reconnect_backoff_secs() -> u64 {
    5
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for GammaSection {
    fn default() -> Self {
        Self {
            base_url: default_gamma_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            rate_limit_per_second: default_rate_limit(),
            page_limit: default_page_limit(),
        }
    }
}

impl Default for ClobSection {
    fn default() -> Self {
        Self {
            base_url: default_clob_base_url(),
            ws_url: default_clob_ws_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for RecorderSection {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            interval_secs: default_interval_secs(),
            min_volume: default_min_volume(),
            min_liquidity: default_min_liquidity(),
            book_depth: default_book_depth(),
        }
    }
}

impl Default for StreamSection {
    fn default() -> Self {
        Self {
            reconnect_backoff_secs: default_reconnect_backoff_secs(),
        }
    }
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults
    /// when the file is missing or unreadable
    pub fn load_or_default(path: impl AsRef<std::path::Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!(
                    "Warning: could not load config from {}: {}",
                    path.display(),
                    e
                );
                eprintln!("Using default configuration");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.gamma.base_url, "https://gamma-api.polymarket.com");
        assert_eq!(config.gamma.rate_limit_per_second, 5);
        assert_eq!(config.recorder.interval_secs, 60);
        assert_eq!(config.recorder.min_volume, dec!(1000));
        assert_eq!(config.recorder.min_liquidity, dec!(500));
        assert_eq!(config.recorder.book_depth, 5);
        assert_eq!(config.stream.reconnect_backoff_secs, 5);
        assert_eq!(config.telemetry.log_level, "info");
    }

    #[test]
    fn test_config_deserialize() {
        let toml = r#"
            [gamma]
            base_url = "https://gamma.test"
            rate_limit_per_second = 10
            page_limit = 250

            [recorder]
            db_path = "/tmp/snapshots.db"
            interval_secs = 30
            min_volume = 5000
            min_liquidity = 2500

            [stream]
            reconnect_backoff_secs = 2

            [telemetry]
            log_level = "debug"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.gamma.base_url, "https://gamma.test");
        assert_eq!(config.gamma.rate_limit_per_second, 10);
        assert_eq!(config.gamma.page_limit, 250);
        assert_eq!(config.recorder.db_path, PathBuf::from("/tmp/snapshots.db"));
        assert_eq!(config.recorder.interval_secs, 30);
        assert_eq!(config.recorder.min_volume, dec!(5000));
        assert_eq!(config.stream.reconnect_backoff_secs, 2);
        assert_eq!(config.telemetry.log_level, "debug");
    }

    #[test]
    fn test_config_partial_file_uses_defaults() {
        let toml = r#"
            [recorder]
            interval_secs = 15
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.recorder.interval_secs, 15);
        assert_eq!(config.recorder.min_volume, dec!(1000));
        assert_eq!(config.gamma.page_limit, 100);
        assert_eq!(
            config.clob.ws_url,
            "wss://ws-subscriptions-clob.polymarket.com/ws/market"
        );
    }

    #[test]
    fn test_config_load_nonexistent() {
        let result = Config::load("/nonexistent/path/config.toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_config_load_or_default_falls_back() {
        let config = Config::load_or_default("/nonexistent/path/config.toml");
        assert_eq!(config.recorder.interval_secs, 60);
    }
}
