//! Normalization entry point.
//!
//! Adapters parse exchange JSON into raw wire records (`domain::*::wire`).
//! Each normalized type implements `TryFrom<(Raw, &NormalizeContext)>` and
//! this module provides the generic entry points plus the field helpers the
//! conversions share. Everything here is pure.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::market::{Market, MarketCatalog};
use crate::error::NormalizeError;
use crate::shared::{fits_decimals, Symbol};

/// What a conversion needs to know beyond the raw record.
#[derive(Debug, Clone, Default)]
pub struct NormalizeContext {
    /// Reporting exchange id.
    pub exchange: String,
    /// Loaded markets, used to resolve exchange market ids.
    pub catalog: Option<Arc<MarketCatalog>>,
    /// Market the call was made for, used when the record carries no id.
    pub market: Option<Arc<Market>>,
}

impl NormalizeContext {
    pub fn new(exchange: impl Into<String>) -> Self {
        Self {
            exchange: exchange.into(),
            ..Default::default()
        }
    }

    pub fn with_catalog(mut self, catalog: Arc<MarketCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn with_market(mut self, market: Arc<Market>) -> Self {
        self.market = Some(market);
        self
    }

    /// Resolve the market of a record: by exchange id through the catalog,
    /// falling back to the call's market.
    pub fn resolve(&self, market_id: Option<&str>) -> Result<&Market, NormalizeError> {
        if let (Some(id), Some(catalog)) = (market_id, &self.catalog) {
            if let Some(market) = catalog.by_id(id) {
                return Ok(market);
            }
        }
        match (&self.market, market_id) {
            (Some(market), None) => Ok(market),
            (Some(market), Some(id)) if market.id == id => Ok(market),
            (_, id) => Err(NormalizeError::UnknownMarket(
                id.unwrap_or("<none>").to_string(),
            )),
        }
    }

    pub fn symbol(&self, market_id: Option<&str>) -> Result<Symbol, NormalizeError> {
        self.resolve(market_id).map(|m| m.symbol.clone())
    }
}

/// Normalize one raw record into `T`.
pub fn normalize<R, T>(raw: R, ctx: &NormalizeContext) -> Result<T, NormalizeError>
where
    T: for<'c> TryFrom<(R, &'c NormalizeContext), Error = NormalizeError>,
{
    T::try_from((raw, ctx))
}

/// Normalize a batch, failing on the first invalid record.
pub fn normalize_all<R, T>(
    raws: impl IntoIterator<Item = R>,
    ctx: &NormalizeContext,
) -> Result<Vec<T>, NormalizeError>
where
    T: for<'c> TryFrom<(R, &'c NormalizeContext), Error = NormalizeError>,
{
    raws.into_iter().map(|raw| normalize(raw, ctx)).collect()
}

// ─── Field helpers ───────────────────────────────────────────────────────────

pub(crate) fn required<T>(
    entity: &'static str,
    field: &str,
    value: Option<T>,
) -> Result<T, NormalizeError> {
    value.ok_or_else(|| NormalizeError::missing(entity, field))
}

/// Parse a decimal from its exchange string form (plain or scientific).
pub(crate) fn decimal(field: &str, value: &str) -> Result<Decimal, NormalizeError> {
    let trimmed = value.trim();
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|_| NormalizeError::InvalidNumber {
            field: field.to_string(),
            value: value.to_string(),
        })
}

pub(crate) fn required_decimal(
    entity: &'static str,
    field: &str,
    value: Option<&str>,
) -> Result<Decimal, NormalizeError> {
    decimal(field, required(entity, field, value)?)
}

pub(crate) fn optional_decimal(
    field: &str,
    value: Option<&str>,
) -> Result<Option<Decimal>, NormalizeError> {
    value.map(|v| decimal(field, v)).transpose()
}

/// Fail when `value` needs more decimals than the market declares.
pub(crate) fn check_precision(
    field: &str,
    value: Decimal,
    decimals: u32,
) -> Result<Decimal, NormalizeError> {
    if fits_decimals(value, decimals) {
        Ok(value)
    } else {
        Err(NormalizeError::Precision {
            field: field.to_string(),
            value: value.to_string(),
            decimals,
        })
    }
}

pub(crate) fn timestamp(ms: Option<i64>) -> Option<DateTime<Utc>> {
    ms.and_then(DateTime::from_timestamp_millis)
}
