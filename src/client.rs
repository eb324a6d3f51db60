//! High-level client — `Exchange`, one per exchange identity.
//!
//! Each domain keeps its operations in `domain/<name>/client.rs` as an
//! `impl Exchange` block. This module keeps the builder, shared state and
//! the request pipeline: adapter → throttle → signer → transport → adapter.
//!
//! Clones share the market catalog, the throttle, the transport and the
//! stream connection.

use std::sync::Arc;

use async_lock::RwLock;
use serde_json::Value;

use crate::auth::{Credentials, Signer};
use crate::cancel::CallOptions;
use crate::config::{ConfigOverride, ExchangeConfig};
use crate::domain::market::{Market, MarketCatalog, CLIENT_VALIDATION_CODE};
use crate::error::{ExchangeError, ExchangeErrorKind, NetworkError, SdkError, SignError};
use crate::exchange::{Capabilities, ExchangeAdapter};
use crate::http::{Api, ExchangeHttp, HttpRequest, HttpResponse, RequestSpec, Transport};
use crate::normalize::NormalizeContext;
use crate::shared::{Clock, Symbol, SystemClock};
use crate::throttle::Throttle;
use crate::ws::ConnectionState;

#[cfg(feature = "ws-native")]
use crate::ws::native::WsConnection;

/// Unified client for one exchange.
pub struct Exchange {
    pub(crate) adapter: Arc<dyn ExchangeAdapter>,
    pub(crate) config: Arc<ExchangeConfig>,
    pub(crate) credentials: Option<Arc<Credentials>>,
    /// Built from the merged config; `None` when the adapter has no private API.
    pub(crate) signer: Option<Arc<dyn Signer>>,
    pub(crate) http: ExchangeHttp,
    pub(crate) clock: Arc<dyn Clock>,
    /// Loaded once, replaced wholesale on reload.
    pub(crate) markets: Arc<RwLock<Option<Arc<MarketCatalog>>>>,
    /// Opened on the first watch.
    #[cfg(feature = "ws-native")]
    pub(crate) ws: Arc<async_lock::Mutex<Option<Arc<WsConnection>>>>,
    pub(crate) options: CallOptions,
}

impl std::fmt::Debug for Exchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exchange")
            .field("id", &self.config.id)
            .field("alias", &self.config.alias)
            .field("adapter", &self.adapter)
            .field("credentials", &self.credentials)
            .finish()
    }
}

impl Exchange {
    pub fn builder(adapter: impl ExchangeAdapter + 'static) -> ExchangeBuilder {
        ExchangeBuilder::new(Arc::new(adapter))
    }

    /// Reported identifier (`"okex"` for the alias of `"okx"`).
    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn is_alias(&self) -> bool {
        self.config.alias
    }

    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    pub fn capabilities(&self) -> Capabilities {
        self.adapter.capabilities()
    }

    pub fn options(&self) -> &CallOptions {
        &self.options
    }

    /// A clone whose calls use `options` (cancellation, throttle timeout).
    /// Caches, throttle and connections stay shared.
    pub fn with_options(&self, options: CallOptions) -> Exchange {
        Exchange {
            options,
            ..self.clone()
        }
    }

    /// State of the stream connection; `Disconnected` before the first watch.
    pub async fn ws_state(&self) -> ConnectionState {
        #[cfg(feature = "ws-native")]
        if let Some(connection) = self.ws.lock().await.as_ref() {
            return connection.state();
        }
        ConnectionState::Disconnected
    }

    /// Close the stream connection. Watch streams end; REST calls keep working.
    pub async fn close(&self) {
        #[cfg(feature = "ws-native")]
        {
            let connection = self.ws.lock().await.take();
            if let Some(connection) = connection {
                tracing::info!(exchange = %self.config.id, "Closing stream connection");
                connection.close().await;
            }
        }
    }

    // ── Internal plumbing ────────────────────────────────────────────────

    /// Run one endpoint call and return its decoded JSON body.
    ///
    /// Private requests are signed per attempt, after the throttle wait, so
    /// the signature timestamp is never older than the send.
    pub(crate) async fn request(&self, spec: &RequestSpec) -> Result<Value, SdkError> {
        let base_url = self.config.urls.rest.as_str();
        let signing = match spec.api {
            Api::Public => None,
            Api::Private => {
                let credentials = self
                    .credentials
                    .as_deref()
                    .ok_or(SignError::MissingCredentials)?;
                let signer = self
                    .signer
                    .as_deref()
                    .ok_or_else(|| SdkError::not_supported("private endpoints", self.id()))?;
                Some((signer, credentials))
            }
        };
        let build = || -> Result<HttpRequest, SdkError> {
            match signing {
                None => Ok(HttpRequest::unsigned(spec, base_url)),
                Some((signer, credentials)) => {
                    Ok(signer.sign(spec, base_url, credentials, self.clock.now_ms())?)
                }
            }
        };

        tracing::debug!(
            exchange = %self.config.id,
            method = %spec.method,
            path = %spec.path,
            class = %spec.weight,
            "Request"
        );
        let response = self
            .http
            .execute_with(&build, &spec.weight, spec.cost, &spec.retry, &self.options)
            .await?;

        let body = serde_json::from_str::<Value>(&response.body);
        if let Ok(value) = &body {
            if let Some(error) = self.adapter.parse_error(response.status, value) {
                tracing::debug!(exchange = %self.config.id, %error, "Exchange rejected request");
                return Err(error.with_retry_after(response.retry_after_ms()).into());
            }
        }
        if !response.is_success() {
            return Err(status_error(&response));
        }
        Ok(body?)
    }

    /// Loaded catalog, loading it on first use.
    pub(crate) async fn catalog(&self) -> Result<Arc<MarketCatalog>, SdkError> {
        self.load_markets().await
    }

    pub(crate) async fn resolve_market(&self, symbol: &Symbol) -> Result<Arc<Market>, SdkError> {
        let catalog = self.catalog().await?;
        catalog.get(symbol).cloned().ok_or_else(|| {
            ExchangeError::new(
                ExchangeErrorKind::BadSymbol,
                CLIENT_VALIDATION_CODE,
                format!("{} does not list {symbol}", self.config.id),
            )
            .into()
        })
    }

    /// Normalization context over the loaded catalog, optionally pinned to
    /// the call's market.
    pub(crate) async fn context(&self, market: Option<Arc<Market>>) -> Result<NormalizeContext, SdkError> {
        let ctx = NormalizeContext::new(self.config.id.clone()).with_catalog(self.catalog().await?);
        Ok(match market {
            Some(market) => ctx.with_market(market),
            None => ctx,
        })
    }

    /// Shared stream connection, opened (or reopened after a failure) on demand.
    #[cfg(feature = "ws-native")]
    pub(crate) async fn ws_connection(&self) -> Result<Arc<WsConnection>, SdkError> {
        let mut guard = self.ws.lock().await;
        if let Some(connection) = guard.as_ref() {
            if !connection.is_closed() {
                return Ok(connection.clone());
            }
        }
        let url = self
            .config
            .urls
            .ws
            .clone()
            .ok_or_else(|| SdkError::not_supported("streaming", self.id()))?;
        tracing::info!(exchange = %self.config.id, %url, "Opening stream connection");
        let connection = Arc::new(WsConnection::connect(
            url,
            self.config.ws.clone(),
            self.adapter.clone(),
        ));
        *guard = Some(connection.clone());
        Ok(connection)
    }
}

/// Fallback when the adapter does not recognise an error body.
fn status_error(response: &HttpResponse) -> SdkError {
    let status = response.status;
    let message: String = response.body.chars().take(200).collect();
    let kind = match status {
        418 | 429 => ExchangeErrorKind::RateLimited,
        401 | 403 => ExchangeErrorKind::AuthenticationFailed,
        500..=599 => {
            return NetworkError::ServerError {
                status,
                body: message,
            }
            .into()
        }
        _ => ExchangeErrorKind::Rejected,
    };
    ExchangeError::new(kind, status.to_string(), message)
        .with_retry_after(response.retry_after_ms())
        .into()
}

impl Clone for Exchange {
    fn clone(&self) -> Self {
        Self {
            adapter: self.adapter.clone(),
            config: self.config.clone(),
            credentials: self.credentials.clone(),
            signer: self.signer.clone(),
            http: self.http.clone(),
            clock: self.clock.clone(),
            markets: self.markets.clone(),
            #[cfg(feature = "ws-native")]
            ws: self.ws.clone(),
            options: self.options.clone(),
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════════
// Builder
// ═════════════════════════════════════════════════════════════════════════════

pub struct ExchangeBuilder {
    adapter: Arc<dyn ExchangeAdapter>,
    overrides: ConfigOverride,
    credentials: Option<Credentials>,
    transport: Option<Arc<dyn Transport>>,
    clock: Option<Arc<dyn Clock>>,
}

impl ExchangeBuilder {
    pub fn new(adapter: Arc<dyn ExchangeAdapter>) -> Self {
        Self {
            adapter,
            overrides: ConfigOverride::default(),
            credentials: None,
            transport: None,
            clock: None,
        }
    }

    pub fn rest_url(mut self, url: &str) -> Self {
        self.overrides.rest_url = Some(url.to_string());
        self
    }

    pub fn ws_url(mut self, url: &str) -> Self {
        self.overrides.ws_url = Some(url.to_string());
        self
    }

    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Layer `overrides` over those already set; later layers win.
    pub fn config_override(mut self, overrides: ConfigOverride) -> Self {
        self.overrides = self.overrides.then(overrides);
        self
    }

    /// Share a transport (and its connection pool) between clients.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Result<Exchange, SdkError> {
        let config = self.adapter.describe().merge(&self.overrides);
        config.validate()?;
        if let Some(credentials) = &self.credentials {
            credentials.validate()?;
        }

        let transport = match self.transport {
            Some(transport) => transport,
            None => default_transport(&config)?,
        };
        let http = ExchangeHttp::new(
            transport,
            Throttle::new(&config.rate_limits),
            config.retry.clone(),
        );
        let signer = self.adapter.signer(&config);
        tracing::debug!(exchange = %config.id, alias = config.alias, "Exchange client built");

        Ok(Exchange {
            signer,
            adapter: self.adapter,
            config: Arc::new(config),
            credentials: self.credentials.map(Arc::new),
            http,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            markets: Arc::new(RwLock::new(None)),
            #[cfg(feature = "ws-native")]
            ws: Arc::new(async_lock::Mutex::new(None)),
            options: CallOptions::default(),
        })
    }
}

#[cfg(feature = "http")]
fn default_transport(config: &ExchangeConfig) -> Result<Arc<dyn Transport>, SdkError> {
    let transport = crate::http::ReqwestTransport::new(config.timeout)
        .map_err(|e| SdkError::Config(format!("HTTP transport: {e}")))?;
    Ok(Arc::new(transport))
}

#[cfg(not(feature = "http"))]
fn default_transport(_config: &ExchangeConfig) -> Result<Arc<dyn Transport>, SdkError> {
    Err(SdkError::Config(
        "no transport configured; enable the `http` feature or call `transport()`".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{BinanceAdapter, OkxAdapter};

    #[test]
    fn test_status_error_fallback() {
        let mut limited = HttpResponse::new(429, "Too many requests");
        limited.headers.push(("Retry-After".into(), "2".into()));
        let err = status_error(&limited);
        assert!(matches!(
            err,
            SdkError::Exchange(ExchangeError::RateLimited {
                retry_after_ms: Some(2000),
                ..
            })
        ));

        assert_eq!(
            status_error(&HttpResponse::new(401, "no")).exchange_kind(),
            Some(ExchangeErrorKind::AuthenticationFailed)
        );
        assert_eq!(
            status_error(&HttpResponse::new(404, "nope")).exchange_kind(),
            Some(ExchangeErrorKind::Rejected)
        );
        assert!(matches!(
            status_error(&HttpResponse::new(503, "down")),
            SdkError::Network(NetworkError::ServerError { status: 503, .. })
        ));
    }

    #[test]
    fn test_builder_rejects_bad_config() {
        let err = Exchange::builder(BinanceAdapter::new())
            .rest_url("ftp://nope")
            .build()
            .unwrap_err();
        assert!(matches!(err, SdkError::Config(_)));

        let err = Exchange::builder(OkxAdapter::new())
            .credentials(Credentials::new("", "secret"))
            .build()
            .unwrap_err();
        assert!(matches!(err, SdkError::Signing(SignError::InvalidCredentials(_))));
    }

    #[test]
    fn test_builder_applies_overrides() {
        let exchange = Exchange::builder(OkxAdapter::new())
            .config_override(ConfigOverride::alias("okex"))
            .rest_url("https://aws.okx.com")
            .build()
            .unwrap();
        assert_eq!(exchange.id(), "okex");
        assert!(exchange.is_alias());
        assert_eq!(exchange.name(), "OKX");
        assert_eq!(exchange.config().urls.rest, "https://aws.okx.com");
    }
}
