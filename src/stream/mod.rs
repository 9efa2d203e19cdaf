//! Real-time market stream ingestion
//!
//! Maintains the subscribed CLOB WebSocket connection, demultiplexes push
//! events into snapshot records, and reconnects after a fixed backoff on
//! any failure.

mod ingestor;

pub use ingestor::StreamIngestor;

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// CLOB market stream WebSocket URL
pub const MARKET_WS_URL: &str = "wss://ws-subscriptions-clob.polymarket.com/ws/market";

/// Configuration for the stream ingestor
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// WebSocket URL to connect to
    pub ws_url: String,
    /// Fixed delay before re-entering `Connecting` after a failure
    ///
    /// Injectable so tests can exercise the retry path with millisecond
    /// values instead of real sleeps.
    pub reconnect_backoff: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            ws_url: MARKET_WS_URL.to_string(),
            reconnect_backoff: Duration::from_secs(5),
        }
    }
}

/// Connection lifecycle states
///
/// The reconnect loop is the only retry mechanism; a single attempt never
/// retries internally. Any failure while `Subscribed` or `Receiving`
/// drops back to `Disconnected` and re-enters `Connecting` after the
/// configured backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Disconnected,
    Connecting,
    Subscribed,
    Receiving,
}

impl ConnState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnState::Disconnected => "disconnected",
            ConnState::Connecting => "connecting",
            ConnState::Subscribed => "subscribed",
            ConnState::Receiving => "receiving",
        }
    }
}

/// Running per-kind event counters
///
/// An observability aid, not a correctness mechanism; a summary is logged
/// at every multiple of 100 total events.
#[derive(Debug, Default)]
pub struct EventCounters {
    pub book: AtomicU64,
    pub price_change: AtomicU64,
    pub last_trade_price: AtomicU64,
    pub other: AtomicU64,
}

impl EventCounters {
    pub fn total(&self) -> u64 {
        self.book.load(Ordering::Relaxed)
            + self.price_change.load(Ordering::Relaxed)
            + self.last_trade_price.load(Ordering::Relaxed)
            + self.other.load(Ordering::Relaxed)
    }

    pub fn log_summary(&self) {
        tracing::info!(
            book = self.book.load(Ordering::Relaxed),
            price_change = self.price_change.load(Ordering::Relaxed),
            last_trade_price = self.last_trade_price.load(Ordering::Relaxed),
            other = self.other.load(Ordering::Relaxed),
            "Market stream stats"
        );
    }
}
