//! Snapshot construction
//!
//! Pure functions that turn normalized markets, order books, and raw
//! stream messages into snapshot records. No I/O happens here. Each
//! builder captures the clock once per call so every record in a batch
//! carries the same timestamp.

use super::{
    BookSide, MarketSnapshot, OrderBookSnapshot, OutcomeSnapshot, PriceChangeEvent,
    ResolutionSnapshot, TradeSnapshot,
};
use crate::clob::{BookLevel, BookLevels, RawTrade};
use crate::market::normalize::{decode_decimal, decode_optional_decimal};
use crate::market::Market;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;

/// A market stream message after JSON decoding
///
/// All event kinds share one wire shape; the discriminant is
/// `event_type` and unused fields simply stay at their defaults.
#[derive(Debug, Default, Deserialize)]
pub struct RawStreamMessage {
    #[serde(default)]
    pub event_type: String,
    /// Market (condition) identifier
    #[serde(default)]
    pub market: String,
    /// Token identifier the event refers to
    #[serde(default)]
    pub asset_id: String,
    /// Upstream timestamp; may be a number, a string, or absent
    #[serde(default)]
    pub timestamp: Option<Value>,
    #[serde(default)]
    pub price: Option<Value>,
    #[serde(default)]
    pub size: Option<Value>,
    #[serde(default)]
    pub side: Option<String>,
    #[serde(default)]
    pub best_bid: Option<Value>,
    #[serde(default)]
    pub best_ask: Option<Value>,
    /// Nested deltas carried by `price_change` events
    #[serde(default)]
    pub price_changes: Vec<RawPriceChange>,
    /// Full book sides carried by `book` events
    #[serde(default)]
    pub bids: Vec<BookLevel>,
    #[serde(default)]
    pub asks: Vec<BookLevel>,
    #[serde(default)]
    pub hash: Option<String>,
}

/// One nested change entry inside a `price_change` message
#[derive(Debug, Default, Deserialize)]
pub struct RawPriceChange {
    #[serde(default)]
    pub asset_id: String,
    #[serde(default)]
    pub price: Option<Value>,
    #[serde(default)]
    pub size: Option<Value>,
    #[serde(default)]
    pub side: Option<String>,
}

/// Decode an upstream timestamp
///
/// Accepts an absent value (current time), a numeric epoch in
/// milliseconds, or an ISO-8601 string with a trailing `Z` treated as
/// the UTC offset. Any other shape falls back to the current time
/// rather than failing.
pub fn decode_timestamp(value: Option<&Value>) -> DateTime<Utc> {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .unwrap_or_else(Utc::now),
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        _ => Utc::now(),
    }
}

/// Build market snapshots for binary markets
///
/// A snapshot is emitted only when a market has exactly two tokens and a
/// positive yes price, which guards against not-yet-priced or malformed
/// binary markets. Yes/no tokens are matched case-insensitively on the
/// outcome label.
pub fn build_market_snapshots(markets: &[Market]) -> Vec<MarketSnapshot> {
    let timestamp = Utc::now();
    let mut snapshots = Vec::new();

    for market in markets {
        let mut yes_price = Decimal::ZERO;
        let mut no_price = Decimal::ZERO;

        for token in &market.tokens {
            if token.outcome.eq_ignore_ascii_case("yes") {
                yes_price = token.price;
            } else if token.outcome.eq_ignore_ascii_case("no") {
                no_price = token.price;
            }
        }

        if market.tokens.len() == 2 && yes_price > Decimal::ZERO {
            snapshots.push(MarketSnapshot::new(
                timestamp,
                market.market_id.clone(),
                market.title.clone(),
                market.category.clone(),
                yes_price,
                no_price,
                market.best_bid,
                market.best_ask,
                Some(market.volume_24h),
                Some(market.liquidity),
                Some(market.end_time.clone()),
                market.active,
            ));
        }
    }

    snapshots
}

/// Build one outcome snapshot per token for markets with three or more
/// outcomes
pub fn build_outcome_snapshots(markets: &[Market]) -> Vec<OutcomeSnapshot> {
    let timestamp = Utc::now();
    let mut snapshots = Vec::new();

    for market in markets {
        if market.tokens.len() < 3 {
            continue;
        }
        for token in &market.tokens {
            snapshots.push(OutcomeSnapshot {
                timestamp,
                market_id: market.market_id.clone(),
                outcome: token.outcome.clone(),
                price: token.price,
                token_id: token.token_id.clone(),
            });
        }
    }

    snapshots
}

/// Build one resolution snapshot per resolved market
pub fn build_resolution_snapshots(markets: &[Market]) -> Vec<ResolutionSnapshot> {
    let timestamp = Utc::now();

    markets
        .iter()
        .filter(|m| m.resolved == Some(true))
        .map(|m| ResolutionSnapshot {
            timestamp,
            market_id: m.market_id.clone(),
            resolved: true,
            resolution_outcome: m.resolution_outcome.clone(),
            resolution_source: m.resolution_source.clone(),
        })
        .collect()
}

/// Build (side, level) records from a fetched order book, truncating
/// each side to `depth` levels (0 = unlimited)
pub fn build_orderbook_snapshots(
    market_id: &str,
    token_id: &str,
    book: &BookLevels,
    depth: usize,
) -> Vec<OrderBookSnapshot> {
    let timestamp = Utc::now();
    book_records(timestamp, market_id, token_id, &book.bids, &book.asks, depth)
}

/// Map raw trade entries into trade snapshots, 1:1
pub fn build_trade_snapshots(
    market_id: &str,
    token_id: &str,
    trades: &[RawTrade],
) -> Vec<TradeSnapshot> {
    let timestamp = Utc::now();

    trades
        .iter()
        .map(|trade| TradeSnapshot {
            timestamp,
            market_id: market_id.to_string(),
            token_id: token_id.to_string(),
            price: decode_decimal(trade.price.as_ref()),
            size: decode_decimal(trade.size.as_ref()),
            side: trade.side.as_ref().map(|s| s.to_lowercase()),
        })
        .collect()
}

/// Convert a `last_trade_price` stream message into a trade snapshot
pub fn decode_trade(msg: &RawStreamMessage) -> TradeSnapshot {
    TradeSnapshot {
        timestamp: decode_timestamp(msg.timestamp.as_ref()),
        market_id: msg.market.clone(),
        token_id: msg.asset_id.clone(),
        price: decode_decimal(msg.price.as_ref()),
        size: decode_decimal(msg.size.as_ref()),
        side: msg.side.as_ref().map(|s| s.to_lowercase()),
    }
}

/// Convert a `price_change` stream message into zero or more events,
/// one per nested change entry
///
/// Every emitted event carries the message-level market id, timestamp,
/// and best bid/ask as observed at emission time.
pub fn decode_price_change(msg: &RawStreamMessage) -> Vec<PriceChangeEvent> {
    let timestamp = decode_timestamp(msg.timestamp.as_ref());
    let best_bid = decode_optional_decimal(msg.best_bid.as_ref());
    let best_ask = decode_optional_decimal(msg.best_ask.as_ref());

    msg.price_changes
        .iter()
        .map(|change| PriceChangeEvent {
            timestamp,
            market_id: msg.market.clone(),
            token_id: change.asset_id.clone(),
            price: decode_decimal(change.price.as_ref()),
            size: decode_decimal(change.size.as_ref()),
            side: change.side.clone().unwrap_or_default(),
            best_bid,
            best_ask,
        })
        .collect()
}

/// Convert a full `book` stream message into one record per (side,
/// level) pair, untruncated
pub fn decode_book(msg: &RawStreamMessage) -> Vec<OrderBookSnapshot> {
    let timestamp = decode_timestamp(msg.timestamp.as_ref());
    book_records(timestamp, &msg.market, &msg.asset_id, &msg.bids, &msg.asks, 0)
}

fn book_records(
    timestamp: DateTime<Utc>,
    market_id: &str,
    token_id: &str,
    bids: &[BookLevel],
    asks: &[BookLevel],
    depth: usize,
) -> Vec<OrderBookSnapshot> {
    let take = |levels: &[BookLevel]| -> usize {
        if depth == 0 {
            levels.len()
        } else {
            depth.min(levels.len())
        }
    };

    let mut snapshots = Vec::with_capacity(take(bids) + take(asks));

    for (level, bid) in bids.iter().take(take(bids)).enumerate() {
        snapshots.push(OrderBookSnapshot {
            timestamp,
            market_id: market_id.to_string(),
            token_id: token_id.to_string(),
            side: BookSide::Bid,
            level,
            price: parse_level_decimal(&bid.price),
            size: parse_level_decimal(&bid.size),
        });
    }

    for (level, ask) in asks.iter().take(take(asks)).enumerate() {
        snapshots.push(OrderBookSnapshot {
            timestamp,
            market_id: market_id.to_string(),
            token_id: token_id.to_string(),
            side: BookSide::Ask,
            level,
            price: parse_level_decimal(&ask.price),
            size: parse_level_decimal(&ask.size),
        });
    }

    snapshots
}

fn parse_level_decimal(s: &str) -> Decimal {
    Decimal::from_str(s.trim()).unwrap_or(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::{test_market, Token};
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn token(outcome: &str, price: Decimal) -> Token {
        Token {
            token_id: format!("tok-{}", outcome.to_lowercase()),
            outcome: outcome.to_string(),
            price,
        }
    }

    fn levels(prices: &[(&str, &str)]) -> Vec<BookLevel> {
        prices
            .iter()
            .map(|(price, size)| BookLevel {
                price: price.to_string(),
                size: size.to_string(),
            })
            .collect()
    }

    #[test]
    fn test_build_market_snapshots_binary_only() {
        let binary = test_market("bin", vec![token("Yes", dec!(0.62)), token("No", dec!(0.37))]);
        let single = test_market("one", vec![token("Yes", dec!(0.9))]);
        let multi = test_market(
            "multi",
            vec![
                token("A", dec!(0.5)),
                token("B", dec!(0.3)),
                token("C", dec!(0.2)),
            ],
        );

        let snapshots = build_market_snapshots(&[binary, single, multi]);
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].market_id, "bin");
        assert_eq!(snapshots[0].yes_price, dec!(0.62));
        assert_eq!(snapshots[0].no_price, dec!(0.37));
        assert_eq!(snapshots[0].parity_gap, dec!(0.01));
    }

    #[test]
    fn test_build_market_snapshots_requires_positive_yes() {
        let unpriced = test_market("zero", vec![token("Yes", dec!(0)), token("No", dec!(0.5))]);
        assert!(build_market_snapshots(&[unpriced]).is_empty());
    }

    #[test]
    fn test_build_market_snapshots_case_insensitive_labels() {
        let shouty = test_market("caps", vec![token("YES", dec!(0.7)), token("nO", dec!(0.3))]);
        let snapshots = build_market_snapshots(&[shouty]);
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].yes_price, dec!(0.7));
        assert_eq!(snapshots[0].no_price, dec!(0.3));
    }

    #[test]
    fn test_build_market_snapshots_spread_from_market_quotes() {
        let mut market = test_market("q", vec![token("Yes", dec!(0.6)), token("No", dec!(0.4))]);
        market.best_bid = Some(dec!(0.59));
        market.best_ask = Some(dec!(0.61));

        let snapshots = build_market_snapshots(&[market]);
        assert_eq!(snapshots[0].spread, Some(dec!(0.02)));
    }

    #[test]
    fn test_build_outcome_snapshots_multi_only() {
        let binary = test_market("bin", vec![token("Yes", dec!(0.6)), token("No", dec!(0.4))]);
        let multi = test_market(
            "multi",
            vec![
                token("A", dec!(0.5)),
                token("B", dec!(0.3)),
                token("C", dec!(0.2)),
            ],
        );

        let snapshots = build_outcome_snapshots(&[binary, multi]);
        assert_eq!(snapshots.len(), 3);
        assert!(snapshots.iter().all(|s| s.market_id == "multi"));
        assert_eq!(snapshots[0].outcome, "A");
        assert_eq!(snapshots[2].price, dec!(0.2));
    }

    #[test]
    fn test_outcome_snapshots_share_one_timestamp() {
        let multi = test_market(
            "multi",
            vec![
                token("A", dec!(0.5)),
                token("B", dec!(0.3)),
                token("C", dec!(0.2)),
            ],
        );

        let snapshots = build_outcome_snapshots(&[multi]);
        assert!(snapshots.iter().all(|s| s.timestamp == snapshots[0].timestamp));
    }

    #[test]
    fn test_build_resolution_snapshots() {
        let mut resolved = test_market("done", vec![]);
        resolved.resolved = Some(true);
        resolved.resolution_outcome = Some("Yes".to_string());
        let mut open = test_market("open", vec![]);
        open.resolved = Some(false);
        let unknown = test_market("unknown", vec![]);

        let snapshots = build_resolution_snapshots(&[resolved, open, unknown]);
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].market_id, "done");
        assert!(snapshots[0].resolved);
        assert_eq!(snapshots[0].resolution_outcome.as_deref(), Some("Yes"));
    }

    #[test]
    fn test_build_orderbook_snapshots_depth_truncation() {
        let book = BookLevels {
            bids: levels(&[
                ("0.50", "10"),
                ("0.49", "20"),
                ("0.48", "30"),
                ("0.47", "40"),
                ("0.46", "50"),
                ("0.45", "60"),
                ("0.44", "70"),
                ("0.43", "80"),
            ]),
            asks: levels(&[("0.52", "15"), ("0.53", "25")]),
        };

        let snapshots = build_orderbook_snapshots("m1", "tok", &book, 5);
        let bids: Vec<_> = snapshots
            .iter()
            .filter(|s| s.side == BookSide::Bid)
            .collect();
        let asks: Vec<_> = snapshots
            .iter()
            .filter(|s| s.side == BookSide::Ask)
            .collect();

        assert_eq!(bids.len(), 5);
        assert_eq!(asks.len(), 2);
        assert_eq!(
            bids.iter().map(|s| s.level).collect::<Vec<_>>(),
            vec![0, 1, 2, 3, 4]
        );
        assert_eq!(bids[0].price, dec!(0.50));
        assert_eq!(bids[4].price, dec!(0.46));
    }

    #[test]
    fn test_build_orderbook_snapshots_zero_depth_unlimited() {
        let book = BookLevels {
            bids: levels(&[("0.50", "10"), ("0.49", "20"), ("0.48", "30")]),
            asks: vec![],
        };

        let snapshots = build_orderbook_snapshots("m1", "tok", &book, 0);
        assert_eq!(snapshots.len(), 3);
    }

    #[test]
    fn test_build_trade_snapshots_one_to_one() {
        let trades = vec![
            RawTrade {
                price: Some(json!("0.55")),
                size: Some(json!(120.0)),
                side: Some("BUY".to_string()),
            },
            RawTrade {
                price: Some(json!(0.54)),
                size: Some(json!("80")),
                side: None,
            },
        ];

        let snapshots = build_trade_snapshots("m1", "tok", &trades);
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0].price, dec!(0.55));
        assert_eq!(snapshots[0].side.as_deref(), Some("buy"));
        assert_eq!(snapshots[1].size, dec!(80));
        assert!(snapshots[1].side.is_none());
    }

    #[test]
    fn test_decode_timestamp_epoch_millis() {
        let ts = decode_timestamp(Some(&json!(1_700_000_000_000_i64)));
        assert_eq!(ts.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_decode_timestamp_iso_string() {
        let ts = decode_timestamp(Some(&json!("2024-01-01T00:00:00Z")));
        assert_eq!(ts.timestamp(), 1_704_067_200);

        let millis = decode_timestamp(Some(&json!(1_704_067_200_000_i64)));
        assert_eq!(ts, millis);
    }

    #[test]
    fn test_decode_timestamp_fallbacks() {
        let before = Utc::now();
        let absent = decode_timestamp(None);
        let null = decode_timestamp(Some(&json!(null)));
        let garbage = decode_timestamp(Some(&json!("not a timestamp")));
        let wrong_shape = decode_timestamp(Some(&json!({"nested": true})));
        let after = Utc::now();

        for ts in [absent, null, garbage, wrong_shape] {
            assert!(ts >= before && ts <= after);
        }
    }

    #[test]
    fn test_decode_trade() {
        let msg: RawStreamMessage = serde_json::from_value(json!({
            "event_type": "last_trade_price",
            "market": "0xm",
            "asset_id": "tok-1",
            "price": "0.71",
            "size": "42",
            "side": "SELL",
            "timestamp": 1_700_000_000_000_i64
        }))
        .unwrap();

        let trade = decode_trade(&msg);
        assert_eq!(trade.market_id, "0xm");
        assert_eq!(trade.token_id, "tok-1");
        assert_eq!(trade.price, dec!(0.71));
        assert_eq!(trade.size, dec!(42));
        assert_eq!(trade.side.as_deref(), Some("sell"));
        assert_eq!(trade.timestamp.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_decode_price_change_fans_out() {
        let msg: RawStreamMessage = serde_json::from_value(json!({
            "event_type": "price_change",
            "market": "0xm",
            "best_bid": "0.55",
            "best_ask": "0.57",
            "price_changes": [
                {"asset_id": "tok-1", "price": "0.55", "size": "10", "side": "BUY"},
                {"asset_id": "tok-2", "price": "0.45", "size": "20", "side": "SELL"}
            ]
        }))
        .unwrap();

        let events = decode_price_change(&msg);
        assert_eq!(events.len(), 2);
        for event in &events {
            assert_eq!(event.market_id, "0xm");
            assert_eq!(event.best_bid, Some(dec!(0.55)));
            assert_eq!(event.best_ask, Some(dec!(0.57)));
            assert_eq!(event.timestamp, events[0].timestamp);
        }
        assert_eq!(events[0].token_id, "tok-1");
        assert_eq!(events[0].side, "BUY");
        assert_eq!(events[1].token_id, "tok-2");
        assert_eq!(events[1].price, dec!(0.45));
    }

    #[test]
    fn test_decode_price_change_empty() {
        let msg: RawStreamMessage =
            serde_json::from_value(json!({"event_type": "price_change", "market": "0xm"}))
                .unwrap();
        assert!(decode_price_change(&msg).is_empty());
    }

    #[test]
    fn test_decode_book_untruncated() {
        let msg: RawStreamMessage = serde_json::from_value(json!({
            "event_type": "book",
            "market": "0xm",
            "asset_id": "tok-1",
            "timestamp": "1704067200000",
            "bids": [
                {"price": "0.50", "size": "100"},
                {"price": "0.49", "size": "200"},
                {"price": "0.48", "size": "300"},
                {"price": "0.47", "size": "400"},
                {"price": "0.46", "size": "500"},
                {"price": "0.45", "size": "600"}
            ],
            "asks": [{"price": "0.52", "size": "150"}]
        }))
        .unwrap();

        let snapshots = decode_book(&msg);
        assert_eq!(snapshots.len(), 7);
        assert!(snapshots.iter().all(|s| s.market_id == "0xm"));
        assert!(snapshots.iter().all(|s| s.token_id == "tok-1"));
        assert_eq!(
            snapshots
                .iter()
                .filter(|s| s.side == BookSide::Bid)
                .count(),
            6
        );
    }

    #[test]
    fn test_decode_book_bad_level_defaults_to_zero() {
        let msg: RawStreamMessage = serde_json::from_value(json!({
            "event_type": "book",
            "asset_id": "tok-1",
            "bids": [{"price": "garbage", "size": "100"}]
        }))
        .unwrap();

        let snapshots = decode_book(&msg);
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].price, Decimal::ZERO);
        assert_eq!(snapshots[0].size, dec!(100));
    }
}
