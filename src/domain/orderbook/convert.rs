//! Conversion: RawOrderBook → OrderBook, RawBookDelta → BookDelta.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use super::wire::{RawBookDelta, RawLevel, RawOrderBook};
use super::{BookDelta, OrderBook, PriceLevel};
use crate::domain::market::Market;
use crate::error::NormalizeError;
use crate::normalize::{check_precision, required, required_decimal, timestamp, NormalizeContext};

const ENTITY: &str = "order_book";

fn level(raw: &RawLevel, market: &Market) -> Result<PriceLevel, NormalizeError> {
    let price = required_decimal(ENTITY, "price", raw.price.as_deref())?;
    let amount = required_decimal(ENTITY, "amount", raw.amount.as_deref())?;
    if price <= Decimal::ZERO || amount < Decimal::ZERO {
        return Err(NormalizeError::InvariantViolation(format!(
            "level {price} x {amount} is not positive"
        )));
    }
    Ok(PriceLevel {
        price: check_precision("price", price, market.precision.price)?,
        amount: check_precision("amount", amount, market.precision.amount)?,
    })
}

/// Parse one side: zero levels dropped, duplicate prices collapse (last
/// wins), sorted best first.
fn side(raw: &[RawLevel], market: &Market, descending: bool) -> Result<Vec<PriceLevel>, NormalizeError> {
    let mut levels = BTreeMap::new();
    for raw in raw {
        let level = level(raw, market)?;
        levels.insert(level.price, level.amount);
    }
    let levels = levels
        .into_iter()
        .filter(|(_, amount)| !amount.is_zero())
        .map(|(price, amount)| PriceLevel { price, amount });
    Ok(if descending {
        levels.rev().collect()
    } else {
        levels.collect()
    })
}

impl TryFrom<(RawOrderBook, &NormalizeContext)> for OrderBook {
    type Error = NormalizeError;

    fn try_from(value: (RawOrderBook, &NormalizeContext)) -> Result<Self, Self::Error> {
        let (raw, ctx) = value;
        let market = ctx.resolve(raw.market_id.as_deref())?;

        Ok(OrderBook {
            symbol: market.symbol.clone(),
            bids: side(&raw.bids, market, true)?,
            asks: side(&raw.asks, market, false)?,
            timestamp: timestamp(raw.timestamp),
            nonce: raw.nonce,
        })
    }
}

impl TryFrom<(RawBookDelta, &NormalizeContext)> for BookDelta {
    type Error = NormalizeError;

    fn try_from(value: (RawBookDelta, &NormalizeContext)) -> Result<Self, Self::Error> {
        let (raw, ctx) = value;
        let market = ctx.resolve(raw.market_id.as_deref())?;

        let last_seq = required(ENTITY, "last_seq", raw.last_seq)?;
        let first_seq = raw.first_seq.unwrap_or(last_seq);
        if first_seq > last_seq {
            return Err(NormalizeError::InvariantViolation(format!(
                "delta sequence range {first_seq}..{last_seq} is reversed"
            )));
        }

        // Zero amounts are kept: they remove a level when applied.
        let levels = |raw: &[RawLevel]| -> Result<Vec<PriceLevel>, NormalizeError> {
            raw.iter().map(|l| level(l, market)).collect()
        };

        Ok(BookDelta {
            symbol: market.symbol.clone(),
            bids: levels(&raw.bids)?,
            asks: levels(&raw.asks)?,
            first_seq,
            last_seq,
            prev_seq: raw.prev_seq,
            timestamp: timestamp(raw.timestamp),
        })
    }
}
