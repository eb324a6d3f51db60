//! Raw order book records produced by adapters (REST depth and stream frames).

use serde::{Deserialize, Serialize};

use super::{OrderBook, PriceLevel};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawLevel {
    pub price: Option<String>,
    pub amount: Option<String>,
}

impl RawLevel {
    pub fn new(price: impl Into<String>, amount: impl Into<String>) -> Self {
        Self {
            price: Some(price.into()),
            amount: Some(amount.into()),
        }
    }
}

impl From<&PriceLevel> for RawLevel {
    fn from(level: &PriceLevel) -> Self {
        RawLevel::new(level.price.to_string(), level.amount.to_string())
    }
}

/// Full depth snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawOrderBook {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_id: Option<String>,
    pub bids: Vec<RawLevel>,
    pub asks: Vec<RawLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<u64>,
}

impl From<&OrderBook> for RawOrderBook {
    fn from(book: &OrderBook) -> Self {
        RawOrderBook {
            market_id: None,
            bids: book.bids.iter().map(RawLevel::from).collect(),
            asks: book.asks.iter().map(RawLevel::from).collect(),
            timestamp: book.timestamp.map(|t| t.timestamp_millis()),
            nonce: book.nonce,
        }
    }
}

/// Incremental depth update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawBookDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_id: Option<String>,
    pub bids: Vec<RawLevel>,
    pub asks: Vec<RawLevel>,
    /// Defaults to `last_seq` when the exchange sends a single sequence number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_seq: Option<u64>,
    pub last_seq: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev_seq: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}
