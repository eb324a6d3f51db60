//! Trade domain — public and private fills, rolling history.

pub mod client;
mod convert;
pub mod state;
pub mod wire;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::shared::{Side, Symbol};

pub use state::TradeHistory;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TakerOrMaker {
    Taker,
    Maker,
}

/// Immutable fill record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: String,
    /// Order this fill belongs to, for private trades.
    pub order_id: Option<String>,
    pub symbol: Symbol,
    /// Taker side of a public trade; the account's side of its own fill.
    pub side: Side,
    pub price: Decimal,
    pub amount: Decimal,
    pub cost: Decimal,
    pub timestamp: DateTime<Utc>,
    pub taker_or_maker: Option<TakerOrMaker>,
}
