//! Conversion: RawBalances → Balances, deriving the missing third field.

use rust_decimal::Decimal;

use super::wire::{RawBalance, RawBalances};
use super::{Balance, Balances, BALANCE_DECIMALS};
use crate::error::NormalizeError;
use crate::normalize::{optional_decimal, required, timestamp, NormalizeContext};
use crate::shared::common_currency_code;

const ENTITY: &str = "balance";

fn tolerance() -> Decimal {
    Decimal::new(1, BALANCE_DECIMALS)
}

fn balance(code: &str, raw: &RawBalance) -> Result<Balance, NormalizeError> {
    let free = optional_decimal("free", raw.free.as_deref())?;
    let used = optional_decimal("used", raw.used.as_deref())?;
    let total = optional_decimal("total", raw.total.as_deref())?;

    let balance = match (free, used, total) {
        (Some(free), Some(used), Some(total)) => {
            if (free + used - total).abs() > tolerance() {
                return Err(NormalizeError::InvariantViolation(format!(
                    "{code}: total {total} != free {free} + used {used}"
                )));
            }
            Balance { free, used, total }
        }
        (Some(free), Some(used), None) => Balance {
            free,
            used,
            total: free + used,
        },
        (Some(free), None, Some(total)) => Balance {
            free,
            used: total - free,
            total,
        },
        (None, Some(used), Some(total)) => Balance {
            free: total - used,
            used,
            total,
        },
        (free, _, _) => {
            let field = if free.is_none() { "free" } else { "used" };
            return Err(NormalizeError::missing(ENTITY, field));
        }
    };
    if balance.free < Decimal::ZERO || balance.used < Decimal::ZERO {
        return Err(NormalizeError::InvariantViolation(format!(
            "{code}: negative balance (free {}, used {})",
            balance.free, balance.used
        )));
    }
    Ok(balance)
}

impl TryFrom<(RawBalances, &NormalizeContext)> for Balances {
    type Error = NormalizeError;

    fn try_from(value: (RawBalances, &NormalizeContext)) -> Result<Self, Self::Error> {
        let (raw, _ctx) = value;
        let mut balances = Balances {
            timestamp: timestamp(raw.timestamp),
            ..Default::default()
        };

        for line in &raw.assets {
            let code = common_currency_code(&required(ENTITY, "code", line.code.as_deref())?);
            let parsed = balance(&code, line)?;
            let entry = balances.assets.entry(code).or_default();
            *entry = *entry + parsed;
        }
        Ok(balances)
    }
}
