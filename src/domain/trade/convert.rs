//! Conversion: RawTrade → Trade.

use super::wire::RawTrade;
use super::Trade;
use crate::error::NormalizeError;
use crate::normalize::{
    check_precision, optional_decimal, required, required_decimal, timestamp, NormalizeContext,
};

const ENTITY: &str = "trade";

impl TryFrom<(RawTrade, &NormalizeContext)> for Trade {
    type Error = NormalizeError;

    fn try_from(value: (RawTrade, &NormalizeContext)) -> Result<Self, Self::Error> {
        let (raw, ctx) = value;
        let market = ctx.resolve(raw.market_id.as_deref())?;

        let id = required(ENTITY, "id", raw.id)?;
        let side = required(ENTITY, "side", raw.side)?;
        let price = required_decimal(ENTITY, "price", raw.price.as_deref())?;
        let price = check_precision("price", price, market.precision.price)?;
        let amount = required_decimal(ENTITY, "amount", raw.amount.as_deref())?;
        let amount = check_precision("amount", amount, market.precision.amount)?;
        let timestamp = required(ENTITY, "timestamp", timestamp(raw.timestamp))?;
        let cost = optional_decimal("cost", raw.cost.as_deref())?.unwrap_or(price * amount);

        Ok(Trade {
            id,
            order_id: raw.order_id,
            symbol: market.symbol.clone(),
            side,
            price,
            amount,
            cost,
            timestamp,
            taker_or_maker: raw.taker_or_maker,
        })
    }
}
