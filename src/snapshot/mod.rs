//! Snapshot record types
//!
//! Every type here is an immutable point-in-time fact derived from either
//! a polled catalog observation or a pushed stream event. Records are
//! never mutated after construction; derived fields are computed once by
//! the pure functions below and stored as plain values.

pub mod builder;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Side of an order book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookSide {
    Bid,
    Ask,
}

impl BookSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookSide::Bid => "bid",
            BookSide::Ask => "ask",
        }
    }
}

/// Deviation of a binary market's two prices from summing to one
///
/// Positive means the pair can be bought for less than a dollar; negative
/// means it can be sold for more. Rounded to six decimal places.
pub fn parity_gap(yes_price: Decimal, no_price: Decimal) -> Decimal {
    (Decimal::ONE - yes_price - no_price).round_dp(6)
}

/// Best-ask minus best-bid, rounded to six decimal places; absent unless
/// both sides are present
pub fn spread(best_bid: Option<Decimal>, best_ask: Option<Decimal>) -> Option<Decimal> {
    match (best_bid, best_ask) {
        (Some(bid), Some(ask)) => Some((ask - bid).round_dp(6)),
        _ => None,
    }
}

/// Point-in-time record of a binary market
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub timestamp: DateTime<Utc>,
    pub market_id: String,
    pub title: String,
    pub category: Option<String>,
    pub yes_price: Decimal,
    pub no_price: Decimal,
    /// `1 - yes - no`, computed at construction
    pub parity_gap: Decimal,
    pub best_bid: Option<Decimal>,
    pub best_ask: Option<Decimal>,
    /// `ask - bid` when both sides are present, computed at construction
    pub spread: Option<Decimal>,
    pub volume_24h: Option<Decimal>,
    pub liquidity: Option<Decimal>,
    pub end_time: Option<String>,
    pub active: Option<bool>,
}

impl MarketSnapshot {
    /// Build a snapshot, deriving `parity_gap` and `spread` from the
    /// supplied prices and quotes
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        timestamp: DateTime<Utc>,
        market_id: String,
        title: String,
        category: Option<String>,
        yes_price: Decimal,
        no_price: Decimal,
        best_bid: Option<Decimal>,
        best_ask: Option<Decimal>,
        volume_24h: Option<Decimal>,
        liquidity: Option<Decimal>,
        end_time: Option<String>,
        active: Option<bool>,
    ) -> Self {
        Self {
            timestamp,
            market_id,
            title,
            category,
            yes_price,
            no_price,
            parity_gap: parity_gap(yes_price, no_price),
            best_bid,
            best_ask,
            spread: spread(best_bid, best_ask),
            volume_24h,
            liquidity,
            end_time,
            active,
        }
    }
}

/// One outcome of a multi-outcome market at a point in time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeSnapshot {
    pub timestamp: DateTime<Utc>,
    pub market_id: String,
    pub outcome: String,
    pub price: Decimal,
    pub token_id: String,
}

/// One (side, level) pair of an order book at a point in time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    pub timestamp: DateTime<Utc>,
    pub market_id: String,
    pub token_id: String,
    pub side: BookSide,
    /// Depth index into the side, 0 = best price
    pub level: usize,
    pub price: Decimal,
    pub size: Decimal,
}

/// A single observed trade
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeSnapshot {
    pub timestamp: DateTime<Utc>,
    pub market_id: String,
    pub token_id: String,
    pub price: Decimal,
    pub size: Decimal,
    /// Lower-cased aggressor side when known
    pub side: Option<String>,
}

/// Resolution state of a market at a point in time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionSnapshot {
    pub timestamp: DateTime<Utc>,
    pub market_id: String,
    pub resolved: bool,
    pub resolution_outcome: Option<String>,
    pub resolution_source: Option<String>,
}

/// Real-time price delta pushed by the market stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceChangeEvent {
    pub timestamp: DateTime<Utc>,
    pub market_id: String,
    pub token_id: String,
    pub price: Decimal,
    pub size: Decimal,
    /// Side as delivered upstream ("BUY" or "SELL")
    pub side: String,
    /// Best bid at emission time, when the message carried one
    pub best_bid: Option<Decimal>,
    /// Best ask at emission time, when the message carried one
    pub best_ask: Option<Decimal>,
}
