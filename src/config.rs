//! Exchange configuration.
//!
//! An adapter describes its defaults as an immutable `ExchangeConfig`. Callers
//! (and aliases) adjust it with a `ConfigOverride`; `ExchangeConfig::merge`
//! produces a new config where the override wins on conflict and maps merge
//! key by key.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SdkError;
use crate::http::retry::RetryConfig;
use crate::throttle::{RateLimit, WeightClass};
use crate::ws::WsConfig;

fn default_timeout() -> Duration {
    Duration::from_secs(10)
}

/// Base URLs of an exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Urls {
    pub rest: String,
    #[serde(default)]
    pub ws: Option<String>,
}

/// Full description of one exchange client identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// Reported identifier (e.g. `"okx"`, or `"okex"` for the alias).
    pub id: String,
    pub name: String,
    /// Whether this identity is an alias of a canonical exchange.
    #[serde(default)]
    pub alias: bool,
    pub urls: Urls,
    #[serde(default)]
    pub rate_limits: BTreeMap<WeightClass, RateLimit>,
    #[serde(default)]
    pub retry: RetryConfig,
    /// Per-request HTTP timeout.
    #[serde(default = "default_timeout")]
    pub timeout: Duration,
    #[serde(default)]
    pub ws: WsConfig,
    /// Exchange-specific options (e.g. `recvWindow`), deep-merged on override.
    #[serde(default)]
    pub options: BTreeMap<String, Value>,
}

/// Partial configuration layered over an `ExchangeConfig`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigOverride {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub alias: Option<bool>,
    #[serde(default)]
    pub rest_url: Option<String>,
    #[serde(default)]
    pub ws_url: Option<String>,
    #[serde(default)]
    pub rate_limits: BTreeMap<WeightClass, RateLimit>,
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    #[serde(default)]
    pub timeout: Option<Duration>,
    #[serde(default)]
    pub ws: Option<WsConfig>,
    #[serde(default)]
    pub options: BTreeMap<String, Value>,
}

impl ConfigOverride {
    /// Identity-only override turning a canonical exchange into an alias.
    pub fn alias(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            alias: Some(true),
            ..Default::default()
        }
    }

    /// Layer `other` on top of `self`; `other` wins on conflict.
    pub fn then(mut self, other: ConfigOverride) -> ConfigOverride {
        self.id = other.id.or(self.id);
        self.name = other.name.or(self.name);
        self.alias = other.alias.or(self.alias);
        self.rest_url = other.rest_url.or(self.rest_url);
        self.ws_url = other.ws_url.or(self.ws_url);
        self.rate_limits.extend(other.rate_limits);
        self.retry = other.retry.or(self.retry);
        self.timeout = other.timeout.or(self.timeout);
        self.ws = other.ws.or(self.ws);
        for (key, value) in other.options {
            merge_option(&mut self.options, key, value);
        }
        self
    }
}

impl ExchangeConfig {
    /// Produce a new config with `overrides` applied.
    pub fn merge(&self, overrides: &ConfigOverride) -> ExchangeConfig {
        let mut merged = self.clone();
        if let Some(id) = &overrides.id {
            merged.id = id.clone();
        }
        if let Some(name) = &overrides.name {
            merged.name = name.clone();
        }
        if let Some(alias) = overrides.alias {
            merged.alias = alias;
        }
        if let Some(url) = &overrides.rest_url {
            merged.urls.rest = url.clone();
        }
        if let Some(url) = &overrides.ws_url {
            merged.urls.ws = Some(url.clone());
        }
        for (class, limit) in &overrides.rate_limits {
            merged.rate_limits.insert(class.clone(), *limit);
        }
        if let Some(retry) = &overrides.retry {
            merged.retry = retry.clone();
        }
        if let Some(timeout) = overrides.timeout {
            merged.timeout = timeout;
        }
        if let Some(ws) = &overrides.ws {
            merged.ws = ws.clone();
        }
        for (key, value) in &overrides.options {
            merge_option(&mut merged.options, key.clone(), value.clone());
        }
        merged
    }

    pub fn validate(&self) -> Result<(), SdkError> {
        if self.id.trim().is_empty() {
            return Err(SdkError::Config("exchange id must not be empty".into()));
        }
        if !self.urls.rest.starts_with("http://") && !self.urls.rest.starts_with("https://") {
            return Err(SdkError::Config(format!(
                "REST url must be http(s): {}",
                self.urls.rest
            )));
        }
        if let Some(ws) = &self.urls.ws {
            if !ws.starts_with("ws://") && !ws.starts_with("wss://") {
                return Err(SdkError::Config(format!("WebSocket url must be ws(s): {ws}")));
            }
        }
        Ok(())
    }

    pub fn option(&self, key: &str) -> Option<&Value> {
        self.options.get(key)
    }

    pub fn option_u64(&self, key: &str) -> Option<u64> {
        self.options.get(key).and_then(Value::as_u64)
    }
}

/// Objects merge recursively; anything else is replaced.
fn merge_option(target: &mut BTreeMap<String, Value>, key: String, value: Value) {
    match (target.get_mut(&key), value) {
        (Some(Value::Object(existing)), Value::Object(incoming)) => {
            deep_merge(existing, incoming);
        }
        (_, value) => {
            target.insert(key, value);
        }
    }
}

fn deep_merge(target: &mut serde_json::Map<String, Value>, incoming: serde_json::Map<String, Value>) {
    for (key, value) in incoming {
        match (target.get_mut(&key), value) {
            (Some(Value::Object(existing)), Value::Object(nested)) => deep_merge(existing, nested),
            (_, value) => {
                target.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base() -> ExchangeConfig {
        let mut rate_limits = BTreeMap::new();
        rate_limits.insert(WeightClass::from_static("public"), RateLimit::per_second(10));
        rate_limits.insert(WeightClass::from_static("private"), RateLimit::per_second(5));

        let mut options = BTreeMap::new();
        options.insert("recvWindow".to_string(), json!(5000));
        options.insert("broker".to_string(), json!({"id": "x", "tag": "y"}));

        ExchangeConfig {
            id: "okx".into(),
            name: "OKX".into(),
            alias: false,
            urls: Urls {
                rest: "https://www.okx.com".into(),
                ws: Some("wss://ws.okx.com:8443/ws/v5/public".into()),
            },
            rate_limits,
            retry: RetryConfig::default(),
            timeout: Duration::from_secs(10),
            ws: WsConfig::default(),
            options,
        }
    }

    #[test]
    fn test_alias_override_changes_identity_only() {
        let canonical = base();
        let alias = canonical.merge(&ConfigOverride::alias("okex"));

        assert_eq!(alias.id, "okex");
        assert!(alias.alias);
        assert_eq!(alias.name, canonical.name);
        assert_eq!(alias.urls, canonical.urls);
        assert_eq!(alias.rate_limits, canonical.rate_limits);
        assert_eq!(alias.options, canonical.options);
        // The canonical description is untouched.
        assert_eq!(canonical.id, "okx");
        assert!(!canonical.alias);
    }

    #[test]
    fn test_rate_limits_merge_key_wise() {
        let mut overrides = ConfigOverride::default();
        overrides
            .rate_limits
            .insert(WeightClass::from_static("private"), RateLimit::per_second(1));
        overrides
            .rate_limits
            .insert(WeightClass::from_static("trade"), RateLimit::per_second(30));

        let merged = base().merge(&overrides);
        assert_eq!(merged.rate_limits.len(), 3);
        assert_eq!(
            merged.rate_limits[&WeightClass::from_static("public")],
            RateLimit::per_second(10)
        );
        assert_eq!(
            merged.rate_limits[&WeightClass::from_static("private")],
            RateLimit::per_second(1)
        );
    }

    #[test]
    fn test_options_deep_merge() {
        let mut overrides = ConfigOverride::default();
        overrides
            .options
            .insert("broker".to_string(), json!({"tag": "z"}));
        overrides.options.insert("recvWindow".to_string(), json!(10000));

        let merged = base().merge(&overrides);
        assert_eq!(merged.option("broker"), Some(&json!({"id": "x", "tag": "z"})));
        assert_eq!(merged.option_u64("recvWindow"), Some(10000));
    }

    #[test]
    fn test_override_chain_later_wins() {
        let chained = ConfigOverride::alias("okex").then(ConfigOverride {
            rest_url: Some("https://aws.okx.com".into()),
            ..Default::default()
        });
        let merged = base().merge(&chained);
        assert_eq!(merged.id, "okex");
        assert_eq!(merged.urls.rest, "https://aws.okx.com");
    }

    #[test]
    fn test_validate() {
        assert!(base().validate().is_ok());

        let mut bad = base();
        bad.urls.rest = "ftp://example.com".into();
        assert!(matches!(bad.validate(), Err(SdkError::Config(_))));

        let mut bad_ws = base();
        bad_ws.urls.ws = Some("https://example.com".into());
        assert!(bad_ws.validate().is_err());
    }

    #[test]
    fn test_config_serde_round_trip() {
        let config = base();
        let json = serde_json::to_string(&config).unwrap();
        let back: ExchangeConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
