//! Exchange ids and their construction.
//!
//! Aliases resolve to the canonical adapter plus an identity override, so an
//! alias client runs exactly the code its canonical exchange runs.

use std::sync::Arc;

use crate::client::{Exchange, ExchangeBuilder};
use crate::config::ConfigOverride;
use crate::error::SdkError;
use crate::exchange::{BinanceAdapter, ExchangeAdapter, OkxAdapter};

/// Alias id → canonical id.
const ALIASES: &[(&str, &str)] = &[("okex", "okx")];

/// Every id `builder` accepts, canonical ids first.
pub fn ids() -> Vec<&'static str> {
    let mut ids = vec![super::binance::ID, super::okx::ID];
    ids.extend(ALIASES.iter().map(|(alias, _)| *alias));
    ids
}

/// Canonical id of `id`; `id` itself when it is not an alias.
pub fn canonical_id(id: &str) -> &str {
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == id)
        .map_or(id, |(_, canonical)| canonical)
}

pub fn is_alias(id: &str) -> bool {
    ALIASES.iter().any(|(alias, _)| *alias == id)
}

fn adapter(canonical: &str) -> Option<Arc<dyn ExchangeAdapter>> {
    match canonical {
        super::binance::ID => Some(Arc::new(BinanceAdapter::new())),
        super::okx::ID => Some(Arc::new(OkxAdapter::new())),
        _ => None,
    }
}

/// A builder for `id`, carrying the alias identity when `id` is an alias.
pub fn builder(id: &str) -> Result<ExchangeBuilder, SdkError> {
    let normalized = id.trim().to_ascii_lowercase();
    let canonical = canonical_id(&normalized);
    let adapter = adapter(canonical).ok_or_else(|| {
        SdkError::Config(format!("unknown exchange '{id}'; expected one of {:?}", ids()))
    })?;

    let builder = ExchangeBuilder::new(adapter);
    if is_alias(&normalized) {
        tracing::debug!(alias = %normalized, %canonical, "Resolving exchange alias");
        return Ok(builder.config_override(ConfigOverride::alias(normalized.as_str())));
    }
    Ok(builder)
}

/// Build `id` with default settings.
pub fn create(id: &str) -> Result<Exchange, SdkError> {
    builder(id)?.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_include_aliases() {
        assert_eq!(ids(), vec!["binance", "okx", "okex"]);
        assert_eq!(canonical_id("okex"), "okx");
        assert_eq!(canonical_id("binance"), "binance");
        assert!(is_alias("okex"));
        assert!(!is_alias("okx"));
    }

    #[test]
    fn test_alias_differs_only_in_identity() {
        let canonical = builder("okx").unwrap().build().unwrap();
        let alias = builder("OKEX").unwrap().build().unwrap();

        assert_eq!(canonical.id(), "okx");
        assert_eq!(alias.id(), "okex");
        assert!(alias.is_alias());
        assert!(!canonical.is_alias());

        assert_eq!(alias.config().urls, canonical.config().urls);
        assert_eq!(alias.config().rate_limits, canonical.config().rate_limits);
        assert_eq!(alias.capabilities(), canonical.capabilities());
    }

    #[test]
    fn test_unknown_id_is_a_config_error() {
        let err = builder("mtgox").err().unwrap();
        assert!(matches!(err, SdkError::Config(msg) if msg.contains("mtgox")));
    }
}
