//! Conversion: RawOrder → Order, deriving fill fields the exchange omitted.

use rust_decimal::Decimal;

use super::wire::RawOrder;
use super::{Order, OrderType};
use crate::error::NormalizeError;
use crate::normalize::{
    check_precision, optional_decimal, required, required_decimal, timestamp, NormalizeContext,
};

const ENTITY: &str = "order";

impl TryFrom<(RawOrder, &NormalizeContext)> for Order {
    type Error = NormalizeError;

    fn try_from(value: (RawOrder, &NormalizeContext)) -> Result<Self, Self::Error> {
        let (raw, ctx) = value;
        let market = ctx.resolve(raw.market_id.as_deref())?;

        let id = required(ENTITY, "id", raw.id)?;
        let side = required(ENTITY, "side", raw.side)?;
        let order_type = required(ENTITY, "order_type", raw.order_type)?;
        let status = required(ENTITY, "status", raw.status)?;

        let amount = required_decimal(ENTITY, "amount", raw.amount.as_deref())?;
        let amount = check_precision("amount", amount, market.precision.amount)?;

        // Market orders often report a zero price.
        let price = optional_decimal("price", raw.price.as_deref())?.filter(|p| !p.is_zero());
        let price = price
            .map(|p| check_precision("price", p, market.precision.price))
            .transpose()?;

        let remaining = optional_decimal("remaining", raw.remaining.as_deref())?;
        let filled = match (optional_decimal("filled", raw.filled.as_deref())?, remaining) {
            (Some(filled), _) => filled,
            (None, Some(remaining)) => amount - remaining,
            (None, None) => return Err(NormalizeError::missing(ENTITY, "filled")),
        };
        if filled < Decimal::ZERO || filled > amount {
            return Err(NormalizeError::InvariantViolation(format!(
                "order {id}: filled {filled} outside [0, {amount}]"
            )));
        }
        let filled = check_precision("filled", filled, market.precision.amount)?;

        let average = optional_decimal("average", raw.average.as_deref())?.filter(|a| !a.is_zero());
        let cost = match (optional_decimal("cost", raw.cost.as_deref())?, average, price) {
            (Some(cost), _, _) => cost,
            (None, Some(average), _) => average * filled,
            (None, None, Some(price)) if order_type == OrderType::Limit => price * filled,
            _ => Decimal::ZERO,
        };
        let average = average.or_else(|| {
            if filled.is_zero() || cost.is_zero() {
                None
            } else {
                cost.checked_div(filled)
            }
        });

        Ok(Order {
            id,
            client_order_id: raw.client_order_id,
            symbol: market.symbol.clone(),
            side,
            order_type,
            price,
            amount,
            filled,
            remaining: amount - filled,
            average,
            cost,
            status,
            timestamp: timestamp(raw.timestamp),
            last_update: timestamp(raw.last_update.or(raw.timestamp)),
        })
    }
}
