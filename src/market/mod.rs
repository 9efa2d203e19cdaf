//! Market catalog module
//!
//! Fetches the market listing from the Gamma API and normalizes the
//! loosely-typed payloads into strict in-memory market values.

mod gamma;
pub mod normalize;

pub use gamma::{GammaClient, GammaConfig, GAMMA_API_URL};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single tradable outcome of a market
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    /// CLOB token identifier (may be empty when upstream omits it)
    pub token_id: String,
    /// Outcome label, e.g. "Yes" or a candidate name
    pub outcome: String,
    /// Current outcome price
    pub price: Decimal,
}

/// A normalized Polymarket market
///
/// The identity fields can legitimately differ from one another; all of
/// them are retained rather than collapsed into `market_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Market {
    /// Primary identifier used throughout the snapshot pipeline
    pub market_id: String,
    /// Generic numeric id assigned by the catalog, if present
    pub numeric_id: Option<String>,
    /// URL slug, if present
    pub slug: Option<String>,
    /// Condition identifier, if present
    pub condition_id: Option<String>,
    /// Market question
    pub title: String,
    /// 24h traded volume
    pub volume_24h: Decimal,
    /// Current liquidity
    pub liquidity: Decimal,
    /// Market start time as delivered upstream
    pub start_time: Option<String>,
    /// Market end time as delivered upstream
    pub end_time: String,
    pub active: Option<bool>,
    pub closed: Option<bool>,
    pub archived: Option<bool>,
    pub resolved: Option<bool>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    /// Best bid across the market's primary book
    pub best_bid: Option<Decimal>,
    /// Best ask across the market's primary book
    pub best_ask: Option<Decimal>,
    pub last_trade_price: Option<Decimal>,
    pub competitive: Option<Decimal>,
    pub resolution_source: Option<String>,
    pub resolution_outcome: Option<String>,
    /// Outcome labels in upstream order
    pub outcomes: Vec<String>,
    /// One token per outcome, aligned positionally with `outcomes`
    pub tokens: Vec<Token>,
}

impl Market {
    /// A market is binary iff it has exactly two outcome tokens
    pub fn is_binary(&self) -> bool {
        self.tokens.len() == 2
    }
}

/// Keep only markets whose 24h volume meets the threshold
pub fn filter_by_volume(markets: Vec<Market>, min_volume: Decimal) -> Vec<Market> {
    markets
        .into_iter()
        .filter(|m| m.volume_24h >= min_volume)
        .collect()
}

/// Keep only markets whose liquidity meets the threshold
pub fn filter_by_liquidity(markets: Vec<Market>, min_liquidity: Decimal) -> Vec<Market> {
    markets
        .into_iter()
        .filter(|m| m.liquidity >= min_liquidity)
        .collect()
}

#[cfg(test)]
pub(crate) fn test_market(market_id: &str, tokens: Vec<Token>) -> Market {
    Market {
        market_id: market_id.to_string(),
        numeric_id: None,
        slug: None,
        condition_id: None,
        title: format!("Test market {}", market_id),
        volume_24h: Decimal::ZERO,
        liquidity: Decimal::ZERO,
        start_time: None,
        end_time: String::new(),
        active: Some(true),
        closed: Some(false),
        archived: None,
        resolved: None,
        category: None,
        tags: vec![],
        description: None,
        image: None,
        best_bid: None,
        best_ask: None,
        last_trade_price: None,
        competitive: None,
        resolution_source: None,
        resolution_outcome: None,
        outcomes: tokens.iter().map(|t| t.outcome.clone()).collect(),
        tokens,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn token(outcome: &str, price: Decimal) -> Token {
        Token {
            token_id: format!("tok-{}", outcome),
            outcome: outcome.to_string(),
            price,
        }
    }

    #[test]
    fn test_is_binary() {
        let binary = test_market("m1", vec![token("Yes", dec!(0.6)), token("No", dec!(0.4))]);
        assert!(binary.is_binary());

        let single = test_market("m2", vec![token("Yes", dec!(1))]);
        assert!(!single.is_binary());

        let multi = test_market(
            "m3",
            vec![
                token("A", dec!(0.5)),
                token("B", dec!(0.3)),
                token("C", dec!(0.2)),
            ],
        );
        assert!(!multi.is_binary());
    }

    #[test]
    fn test_filter_by_volume_inclusive() {
        let mut low = test_market("low", vec![]);
        low.volume_24h = dec!(999);
        let mut exact = test_market("exact", vec![]);
        exact.volume_24h = dec!(1000);
        let mut high = test_market("high", vec![]);
        high.volume_24h = dec!(5000);

        let kept = filter_by_volume(vec![low, exact, high], dec!(1000));
        let ids: Vec<_> = kept.iter().map(|m| m.market_id.as_str()).collect();
        assert_eq!(ids, vec!["exact", "high"]);
    }

    #[test]
    fn test_filter_by_liquidity_inclusive() {
        let mut thin = test_market("thin", vec![]);
        thin.liquidity = dec!(499.99);
        let mut deep = test_market("deep", vec![]);
        deep.liquidity = dec!(500);

        let kept = filter_by_liquidity(vec![thin, deep], dec!(500));
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].market_id, "deep");
    }
}
