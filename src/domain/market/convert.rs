//! Conversion: RawMarket → Market.

use rust_decimal::Decimal;

use super::wire::RawMarket;
use super::{Market, MarketLimits, MinMax, Precision};
use crate::error::NormalizeError;
use crate::normalize::{optional_decimal, required, NormalizeContext};
use crate::shared::{decimals_of_step, Symbol};

const ENTITY: &str = "market";
const MAX_SCALE: u32 = 28;

/// Resolve a step and its decimals from whichever of the two the exchange sent.
fn step_and_decimals(
    field: &str,
    step: Option<&str>,
    decimals: Option<u32>,
) -> Result<(Decimal, u32), NormalizeError> {
    match (optional_decimal(field, step)?.filter(|s| *s > Decimal::ZERO), decimals) {
        (Some(step), Some(decimals)) => Ok((step, decimals)),
        (Some(step), None) => Ok((step, decimals_of_step(step))),
        (None, Some(decimals)) if decimals <= MAX_SCALE => {
            Ok((Decimal::new(1, decimals), decimals))
        }
        (None, Some(decimals)) => Err(NormalizeError::InvalidNumber {
            field: field.to_string(),
            value: format!("{decimals} decimals"),
        }),
        (None, None) => Err(NormalizeError::missing(ENTITY, field)),
    }
}

/// A zero bound means "no bound" on most exchanges.
fn bound(field: &str, value: Option<&str>) -> Result<Option<Decimal>, NormalizeError> {
    Ok(optional_decimal(field, value)?.filter(|v| !v.is_zero()))
}

impl TryFrom<(RawMarket, &NormalizeContext)> for Market {
    type Error = NormalizeError;

    fn try_from(value: (RawMarket, &NormalizeContext)) -> Result<Self, Self::Error> {
        let (raw, _ctx) = value;

        let id = required(ENTITY, "id", raw.id)?;
        let base = required(ENTITY, "base", raw.base)?;
        let quote = required(ENTITY, "quote", raw.quote)?;
        let symbol = Symbol::new(&base, &quote);

        let (tick_size, price_decimals) =
            step_and_decimals("tick_size", raw.tick_size.as_deref(), raw.price_decimals)?;
        let (lot_size, amount_decimals) =
            step_and_decimals("lot_size", raw.lot_size.as_deref(), raw.amount_decimals)?;

        let limits = MarketLimits {
            amount: MinMax::new(
                bound("min_amount", raw.min_amount.as_deref())?,
                bound("max_amount", raw.max_amount.as_deref())?,
            ),
            price: MinMax::new(
                bound("min_price", raw.min_price.as_deref())?,
                bound("max_price", raw.max_price.as_deref())?,
            ),
            cost: MinMax::new(
                bound("min_cost", raw.min_cost.as_deref())?,
                bound("max_cost", raw.max_cost.as_deref())?,
            ),
        };

        Ok(Market {
            id,
            base: symbol.base().to_string(),
            quote: symbol.quote().to_string(),
            symbol,
            active: raw.active.unwrap_or(true),
            precision: Precision {
                price: price_decimals,
                amount: amount_decimals,
            },
            tick_size,
            lot_size,
            limits,
        })
    }
}
