//! Raw market record produced by adapters.

use serde::{Deserialize, Serialize};

/// One market as parsed from an exchange listing. Numbers stay strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawMarket {
    pub id: Option<String>,
    pub base: Option<String>,
    pub quote: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    /// Price step. Either this or `price_decimals` is required.
    pub tick_size: Option<String>,
    /// Amount step. Either this or `amount_decimals` is required.
    pub lot_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_decimals: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_decimals: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_cost: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_cost: Option<String>,
}
