//! Payload normalization for Gamma API market objects
//!
//! Upstream fields arrive with mixed encodings: JSON arrays are sometimes
//! delivered as strings that need a second decode pass, numeric fields may
//! be absent or string-typed, and identity fields go by several names.
//! Everything here converts those shapes into strict [`Market`] values
//! without ever failing on a single bad field.

use super::{Market, Token};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;

/// Outcome of decoding one flexibly-encoded list field
///
/// Carrying the fallback as its own variant (instead of silently returning
/// an empty Vec) lets callers and tests see which path was taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListDecode {
    /// The field decoded to a list of items
    Parsed(Vec<String>),
    /// The field was absent, null, or failed to decode; treated as empty
    EmptyFallback,
}

impl ListDecode {
    /// Consume the outcome, mapping the fallback to an empty list
    pub fn into_items(self) -> Vec<String> {
        match self {
            ListDecode::Parsed(items) => items,
            ListDecode::EmptyFallback => Vec::new(),
        }
    }

    /// True when the empty-fallback path was taken
    pub fn is_fallback(&self) -> bool {
        matches!(self, ListDecode::EmptyFallback)
    }
}

/// Raw market object as returned by the Gamma `/markets` endpoint
///
/// Fields with inconsistent upstream encodings are kept as raw JSON values
/// and decoded by the functions below. Both spellings of the condition
/// identifier are captured separately so precedence stays deterministic.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMarket {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub condition_id: Option<String>,
    #[serde(default, rename = "condition_id")]
    pub condition_id_snake: Option<String>,
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub outcomes: Option<Value>,
    #[serde(default)]
    pub outcome_prices: Option<Value>,
    #[serde(default)]
    pub clob_token_ids: Option<Value>,
    #[serde(default)]
    pub volume: Option<Value>,
    #[serde(default)]
    pub liquidity: Option<Value>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default, rename = "end_date_iso")]
    pub end_date_iso: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default, rename = "start_date_iso")]
    pub start_date_iso: Option<String>,
    #[serde(default)]
    pub best_bid: Option<Value>,
    #[serde(default)]
    pub best_ask: Option<Value>,
    #[serde(default)]
    pub last_trade_price: Option<Value>,
    #[serde(default)]
    pub competitive: Option<Value>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub closed: Option<bool>,
    #[serde(default)]
    pub archived: Option<bool>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Option<Value>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub resolution_source: Option<String>,
    #[serde(default)]
    pub resolved: Option<bool>,
    #[serde(default)]
    pub outcome: Option<String>,
}

/// Decode a list field that may arrive as a JSON array or as a string
/// containing encoded JSON
///
/// Null, absence, a failed secondary decode, and any other shape all land
/// on [`ListDecode::EmptyFallback`]. Array elements that are not strings
/// are rendered through their JSON display form, so numeric price arrays
/// survive.
pub fn decode_string_list(value: Option<&Value>) -> ListDecode {
    match value {
        Some(Value::String(encoded)) => match serde_json::from_str::<Vec<Value>>(encoded) {
            Ok(items) => ListDecode::Parsed(items.iter().map(value_to_string).collect()),
            Err(_) => ListDecode::EmptyFallback,
        },
        Some(Value::Array(items)) => {
            ListDecode::Parsed(items.iter().map(value_to_string).collect())
        }
        _ => ListDecode::EmptyFallback,
    }
}

/// Decode a numeric field that may be absent, a JSON number, or a
/// numeric string; anything else becomes zero
pub fn decode_decimal(value: Option<&Value>) -> Decimal {
    decode_optional_decimal(value).unwrap_or(Decimal::ZERO)
}

/// Like [`decode_decimal`] but preserving absence
pub fn decode_optional_decimal(value: Option<&Value>) -> Option<Decimal> {
    match value? {
        Value::Number(n) => n
            .as_f64()
            .and_then(Decimal::from_f64)
            .or_else(|| n.as_i64().map(Decimal::from)),
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

/// Build the token sequence by positional alignment across the three
/// independently-sourced arrays
///
/// The outcome labels drive the iteration; an index beyond the price
/// array defaults to price zero, and one beyond the token-id array
/// defaults to an empty identifier. Mismatched lengths are expected
/// upstream and must not fail.
pub fn build_tokens(outcomes: &[String], prices: &[String], token_ids: &[String]) -> Vec<Token> {
    outcomes
        .iter()
        .enumerate()
        .map(|(i, outcome)| Token {
            token_id: token_ids.get(i).cloned().unwrap_or_default(),
            outcome: outcome.clone(),
            price: prices
                .get(i)
                .and_then(|p| Decimal::from_str(p.trim()).ok())
                .unwrap_or(Decimal::ZERO),
        })
        .collect()
}

/// Convert a raw Gamma market object into a normalized [`Market`]
pub fn market_from_raw(raw: RawMarket) -> Market {
    let outcomes = decode_string_list(raw.outcomes.as_ref()).into_items();
    let prices = decode_string_list(raw.outcome_prices.as_ref()).into_items();
    let token_ids = decode_string_list(raw.clob_token_ids.as_ref()).into_items();
    let tags = decode_string_list(raw.tags.as_ref()).into_items();

    let tokens = build_tokens(&outcomes, &prices, &token_ids);

    // Identity precedence: camel-case condition id, then snake-case, then
    // a synthesized string form of the generic numeric id
    let condition_id = raw
        .condition_id
        .as_deref()
        .filter(|s| !s.is_empty())
        .or_else(|| raw.condition_id_snake.as_deref().filter(|s| !s.is_empty()))
        .map(str::to_string);

    let numeric_id = raw
        .id
        .as_ref()
        .map(value_to_string)
        .filter(|s| !s.is_empty());

    let market_id = condition_id
        .clone()
        .or_else(|| numeric_id.clone())
        .unwrap_or_default();

    Market {
        market_id,
        numeric_id,
        slug: raw.slug.filter(|s| !s.is_empty()),
        condition_id,
        title: raw.question.unwrap_or_default(),
        volume_24h: decode_decimal(raw.volume.as_ref()),
        liquidity: decode_decimal(raw.liquidity.as_ref()),
        start_time: raw
            .start_date
            .filter(|s| !s.is_empty())
            .or(raw.start_date_iso),
        end_time: raw
            .end_date
            .filter(|s| !s.is_empty())
            .or(raw.end_date_iso)
            .unwrap_or_default(),
        active: raw.active,
        closed: raw.closed,
        archived: raw.archived,
        resolved: raw.resolved,
        category: raw.category,
        tags,
        description: raw.description,
        image: raw.image,
        best_bid: decode_optional_decimal(raw.best_bid.as_ref()),
        best_ask: decode_optional_decimal(raw.best_ask.as_ref()),
        last_trade_price: decode_optional_decimal(raw.last_trade_price.as_ref()),
        competitive: decode_optional_decimal(raw.competitive.as_ref()),
        resolution_source: raw.resolution_source,
        resolution_outcome: raw.outcome,
        outcomes,
        tokens,
    }
}

/// Parse one element of the catalog response
///
/// Anything that is not a JSON object is a malformed item; the caller
/// skips it and moves on to the next element.
pub fn market_from_value(value: &Value) -> anyhow::Result<Market> {
    let raw: RawMarket = serde_json::from_value(value.clone())?;
    Ok(market_from_raw(raw))
}
