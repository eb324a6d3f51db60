//! Balance domain — per-asset free/used/total, replaced wholesale per fetch.

pub mod client;
mod convert;
pub mod wire;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Decimals used for the `total = free + used` tolerance.
pub const BALANCE_DECIMALS: u32 = 8;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub free: Decimal,
    pub used: Decimal,
    pub total: Decimal,
}

impl std::ops::Add for Balance {
    type Output = Balance;

    fn add(self, rhs: Balance) -> Balance {
        Balance {
            free: self.free + rhs.free,
            used: self.used + rhs.used,
            total: self.total + rhs.total,
        }
    }
}

/// Account balances keyed by common currency code.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Balances {
    pub timestamp: Option<DateTime<Utc>>,
    pub assets: BTreeMap<String, Balance>,
}

impl Balances {
    pub fn get(&self, code: &str) -> Option<&Balance> {
        self.assets.get(code)
    }

    pub fn free(&self, code: &str) -> Decimal {
        self.get(code).map_or(Decimal::ZERO, |b| b.free)
    }

    pub fn total(&self, code: &str) -> Decimal {
        self.get(code).map_or(Decimal::ZERO, |b| b.total)
    }

    /// Assets with a non-zero total.
    pub fn non_zero(&self) -> impl Iterator<Item = (&String, &Balance)> {
        self.assets.iter().filter(|(_, b)| !b.total.is_zero())
    }
}
