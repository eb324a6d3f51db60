//! Shared newtypes and utilities used across all domain modules.
//!
//! These types are serialization-transparent: they serialize/deserialize as the
//! plain strings callers already use, so they can appear directly in wire types
//! and configuration without conversion overhead.

pub mod clock;
pub mod precision;
pub mod serde_util;

pub use clock::{Clock, FixedClock, SystemClock};
pub use precision::{decimals_of_step, fits_decimals, round_to_step, truncate_to_step};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;

// ─── Currency codes ──────────────────────────────────────────────────────────

/// Legacy or exchange-specific currency codes mapped to their common code.
const COMMON_CURRENCY_CODES: &[(&str, &str)] = &[
    ("XBT", "BTC"),
    ("BCC", "BCH"),
    ("BCHABC", "BCH"),
    ("BCHSV", "BSV"),
    ("DRK", "DASH"),
];

/// Upper-case a currency code and map it to its common name.
pub fn common_currency_code(code: &str) -> String {
    let upper = code.trim().to_ascii_uppercase();
    COMMON_CURRENCY_CODES
        .iter()
        .find(|(from, _)| *from == upper)
        .map(|(_, to)| to.to_string())
        .unwrap_or(upper)
}

// ─── Symbol ──────────────────────────────────────────────────────────────────

/// Unified market symbol in `BASE/QUOTE` form (e.g. `"BTC/USDT"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(String);

impl Symbol {
    /// Build a symbol from exchange currency codes, applying common-code mapping.
    pub fn new(base: &str, quote: &str) -> Self {
        Self(format!(
            "{}/{}",
            common_currency_code(base),
            common_currency_code(quote)
        ))
    }

    /// Parse a unified `BASE/QUOTE` string.
    pub fn parse(s: &str) -> Option<Self> {
        let (base, quote) = s.split_once('/')?;
        if base.is_empty() || quote.is_empty() || quote.contains('/') {
            return None;
        }
        Some(Self::new(base, quote))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn base(&self) -> &str {
        self.0.split_once('/').map(|(b, _)| b).unwrap_or(&self.0)
    }

    pub fn quote(&self) -> &str {
        self.0.split_once('/').map(|(_, q)| q).unwrap_or("")
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Symbol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Symbol::parse(s).ok_or_else(|| format!("Invalid symbol '{s}', expected BASE/QUOTE"))
    }
}

impl Serialize for Symbol {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Symbol {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Symbol::parse(&s).ok_or_else(|| serde::de::Error::custom(format!("Invalid symbol: {s}")))
    }
}

// ─── Side ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }

    pub fn opposite(&self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "buy" | "bid" => Ok(Side::Buy),
            "sell" | "ask" => Ok(Side::Sell),
            other => Err(format!("Invalid side: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_is_canonical() {
        let symbol = Symbol::new("xbt", "usdt");
        assert_eq!(symbol.as_str(), "BTC/USDT");
        assert_eq!(symbol.base(), "BTC");
        assert_eq!(symbol.quote(), "USDT");
    }

    #[test]
    fn test_symbol_parse_rejects_malformed() {
        assert!(Symbol::parse("BTCUSDT").is_none());
        assert!(Symbol::parse("/USDT").is_none());
        assert!(Symbol::parse("BTC/").is_none());
        assert!(Symbol::parse("A/B/C").is_none());
        assert_eq!(Symbol::parse("eth/btc").unwrap().as_str(), "ETH/BTC");
    }

    #[test]
    fn test_symbol_serde_transparent() {
        let symbol: Symbol = serde_json::from_str("\"BTC/USDT\"").unwrap();
        assert_eq!(serde_json::to_string(&symbol).unwrap(), "\"BTC/USDT\"");
    }

    #[test]
    fn test_side_parse() {
        assert_eq!("BUY".parse::<Side>().unwrap(), Side::Buy);
        assert_eq!("ask".parse::<Side>().unwrap(), Side::Sell);
        assert!("hold".parse::<Side>().is_err());
        assert_eq!(Side::Buy.opposite(), Side::Sell);
    }

    #[test]
    fn test_common_currency_code() {
        assert_eq!(common_currency_code("XBT"), "BTC");
        assert_eq!(common_currency_code(" usdt "), "USDT");
        assert_eq!(common_currency_code("BCHSV"), "BSV");
    }
}
