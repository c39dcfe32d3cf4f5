//! Decimal arithmetic utilities for financial calculations.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{de, Deserialize, Deserializer};
use std::str::FromStr;

/// Express `part` as a percentage of `whole`.
///
/// `None` when `whole` is not positive or the result does not fit a `Decimal`.
pub fn percent_of(part: Decimal, whole: Decimal) -> Option<Decimal> {
    if whole <= Decimal::ZERO {
        return None;
    }
    part.checked_div(whole)?.checked_mul(dec!(100))
}

/// Parse a decimal from exchange text, accepting scientific notation.
pub fn parse_decimal(text: &str) -> Result<Decimal, String> {
    let trimmed = text.trim();
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|e| format!("invalid decimal {:?}: {}", text, e))
}

/// A numeric field as the exchange may send it.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawNumber {
    Number(serde_json::Number),
    Text(String),
}

impl RawNumber {
    fn into_decimal(self) -> Result<Option<Decimal>, String> {
        match self {
            RawNumber::Number(n) => parse_decimal(&n.to_string()).map(Some),
            RawNumber::Text(s) if s.trim().is_empty() => Ok(None),
            RawNumber::Text(s) => parse_decimal(&s).map(Some),
        }
    }
}

/// Deserialize a number, numeric string, empty string or null into
/// `Option<Decimal>`. Use with `#[serde(default, deserialize_with = ...)]`.
pub fn lenient_option<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<RawNumber>::deserialize(deserializer)? {
        Some(raw) => raw.into_decimal().map_err(de::Error::custom),
        None => Ok(None),
    }
}

/// Like [`lenient_option`], but absent values become zero.
pub fn lenient<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_option(deserializer).map(|value| value.unwrap_or(Decimal::ZERO))
}
