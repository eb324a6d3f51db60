//! Market domain — markets, precision rules, the loaded catalog.

pub mod client;
mod convert;
pub mod wire;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::order::OrderType;
use crate::error::{ExchangeError, ExchangeErrorKind, NormalizeError};
use crate::shared::{round_to_step, truncate_to_step, Symbol};

/// Code reported on orders rejected before they reach the exchange.
pub const CLIENT_VALIDATION_CODE: &str = "client";

// ─── Market ──────────────────────────────────────────────────────────────────

/// Decimal places accepted for prices and amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Precision {
    pub price: u32,
    pub amount: u32,
}

/// An inclusive bound; either side may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinMax {
    pub min: Option<Decimal>,
    pub max: Option<Decimal>,
}

impl MinMax {
    pub fn new(min: Option<Decimal>, max: Option<Decimal>) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: Decimal) -> bool {
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketLimits {
    pub amount: MinMax,
    pub price: MinMax,
    /// Notional (`price * amount`) bounds.
    pub cost: MinMax,
}

/// A tradable pair. Immutable once loaded; replaced on reload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Market {
    /// Exchange-native market id (e.g. `BTCUSDT`, `BTC-USDT`).
    pub id: String,
    pub symbol: Symbol,
    pub base: String,
    pub quote: String,
    pub active: bool,
    pub precision: Precision,
    pub tick_size: Decimal,
    pub lot_size: Decimal,
    pub limits: MarketLimits,
}

impl Market {
    /// Round a price to the nearest tick. Midpoints round away from zero.
    pub fn price_to_precision(&self, price: Decimal) -> Result<Decimal, NormalizeError> {
        round_to_step(price, self.tick_size).ok_or_else(|| NormalizeError::InvalidNumber {
            field: "price".into(),
            value: price.to_string(),
        })
    }

    /// Truncate an amount down to a whole number of lots.
    pub fn amount_to_precision(&self, amount: Decimal) -> Result<Decimal, NormalizeError> {
        truncate_to_step(amount, self.lot_size).ok_or_else(|| NormalizeError::InvalidNumber {
            field: "amount".into(),
            value: amount.to_string(),
        })
    }

    /// Check an already-rounded order against the market's limits.
    pub fn validate_order(
        &self,
        order_type: OrderType,
        amount: Decimal,
        price: Option<Decimal>,
    ) -> Result<(), ExchangeError> {
        let invalid =
            |msg: String| ExchangeError::new(ExchangeErrorKind::InvalidOrder, CLIENT_VALIDATION_CODE, msg);

        if !self.active {
            return Err(invalid(format!("market {} is not active", self.symbol)));
        }
        if amount <= Decimal::ZERO {
            return Err(invalid(format!(
                "amount must be positive after truncation to lot size {}",
                self.lot_size
            )));
        }
        if !self.limits.amount.contains(amount) {
            return Err(invalid(format!(
                "amount {amount} outside limits {:?}",
                self.limits.amount
            )));
        }

        let price = match (order_type, price) {
            (OrderType::Limit, None) => return Err(invalid("limit order requires a price".into())),
            (_, Some(p)) if p <= Decimal::ZERO => {
                return Err(invalid(format!("price {p} must be positive")))
            }
            (_, p) => p,
        };
        if let Some(price) = price {
            if !self.limits.price.contains(price) {
                return Err(invalid(format!(
                    "price {price} outside limits {:?}",
                    self.limits.price
                )));
            }
            let cost = price * amount;
            if !self.limits.cost.contains(cost) {
                return Err(invalid(format!(
                    "cost {cost} outside limits {:?}",
                    self.limits.cost
                )));
            }
        }
        Ok(())
    }
}

// ─── Catalog ─────────────────────────────────────────────────────────────────

/// Immutable index of loaded markets, by unified symbol and by exchange id.
#[derive(Debug, Clone, Default)]
pub struct MarketCatalog {
    by_symbol: BTreeMap<Symbol, Arc<Market>>,
    by_id: HashMap<String, Arc<Market>>,
}

impl MarketCatalog {
    /// Later entries win when two markets share a symbol or id.
    pub fn new(markets: Vec<Market>) -> Self {
        let mut by_symbol = BTreeMap::new();
        let mut by_id = HashMap::new();
        for market in markets {
            let market = Arc::new(market);
            by_id.insert(market.id.clone(), market.clone());
            by_symbol.insert(market.symbol.clone(), market);
        }
        Self { by_symbol, by_id }
    }

    pub fn get(&self, symbol: &Symbol) -> Option<&Arc<Market>> {
        self.by_symbol.get(symbol)
    }

    pub fn by_id(&self, id: &str) -> Option<&Arc<Market>> {
        self.by_id.get(id)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.by_symbol.keys()
    }

    /// Markets ordered by symbol.
    pub fn markets(&self) -> impl Iterator<Item = &Arc<Market>> {
        self.by_symbol.values()
    }

    pub fn len(&self) -> usize {
        self.by_symbol.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_symbol.is_empty()
    }
}
