//! Request signers.
//!
//! A signer is a pure function of `(request, credentials, timestamp)`: the same
//! inputs always produce the same signed request. The timestamp is injected by
//! the caller from a `Clock`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::Credentials;
use crate::error::SignError;
use crate::http::request::{HttpRequest, RequestSpec};

type HmacSha256 = Hmac<Sha256>;

/// Turns an unsigned `RequestSpec` into an authenticated `HttpRequest`.
pub trait Signer: Send + Sync + std::fmt::Debug {
    fn sign(
        &self,
        request: &RequestSpec,
        base_url: &str,
        credentials: &Credentials,
        timestamp_ms: i64,
    ) -> Result<HttpRequest, SignError>;
}

fn hmac_sha256(secret: &str, payload: &str) -> Result<Vec<u8>, SignError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| SignError::InvalidCredentials(format!("HMAC key: {e}")))?;
    mac.update(payload.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

// ─── Query-string HMAC (Binance style) ───────────────────────────────────────

/// Appends `timestamp` (and optionally `recvWindow`) to the query, signs the
/// full query string plus body with hex HMAC-SHA256 and appends `signature`.
/// The API key travels in a header.
#[derive(Debug, Clone)]
pub struct QueryHmacSigner {
    api_key_header: &'static str,
    recv_window_ms: Option<u64>,
}

impl QueryHmacSigner {
    pub fn new(api_key_header: &'static str) -> Self {
        Self {
            api_key_header,
            recv_window_ms: None,
        }
    }

    pub fn with_recv_window(mut self, ms: u64) -> Self {
        self.recv_window_ms = Some(ms);
        self
    }
}

impl Signer for QueryHmacSigner {
    fn sign(
        &self,
        request: &RequestSpec,
        base_url: &str,
        credentials: &Credentials,
        timestamp_ms: i64,
    ) -> Result<HttpRequest, SignError> {
        credentials.validate()?;

        let mut spec = request.clone();
        if let Some(window) = self.recv_window_ms {
            spec.query.push(("recvWindow".into(), window.to_string()));
        }
        spec.query.push(("timestamp".into(), timestamp_ms.to_string()));

        let mut payload = spec.query_string();
        if let Some(body) = spec.body_string() {
            payload.push_str(&body);
        }
        let signature = hex::encode(hmac_sha256(&credentials.secret, &payload)?);
        spec.query.push(("signature".into(), signature));

        let mut signed = HttpRequest::unsigned(&spec, base_url);
        signed.set_header(self.api_key_header, credentials.api_key.clone());
        Ok(signed)
    }
}

// ─── Header HMAC (OKX style) ─────────────────────────────────────────────────

/// Signs `timestamp + METHOD + path?query + body` with base64 HMAC-SHA256 and
/// sends key, signature, ISO-8601 timestamp and (optionally) passphrase as
/// headers.
#[derive(Debug, Clone)]
pub struct HeaderHmacSigner {
    key_header: &'static str,
    sign_header: &'static str,
    timestamp_header: &'static str,
    passphrase_header: Option<&'static str>,
}

impl HeaderHmacSigner {
    pub fn new(
        key_header: &'static str,
        sign_header: &'static str,
        timestamp_header: &'static str,
    ) -> Self {
        Self {
            key_header,
            sign_header,
            timestamp_header,
            passphrase_header: None,
        }
    }

    /// Require a passphrase and send it in `header`.
    pub fn with_passphrase_header(mut self, header: &'static str) -> Self {
        self.passphrase_header = Some(header);
        self
    }
}

/// `2020-12-08T09:08:57.715Z`
fn iso8601_ms(timestamp_ms: i64) -> Result<String, SignError> {
    let at: DateTime<Utc> = DateTime::from_timestamp_millis(timestamp_ms)
        .ok_or(SignError::InvalidTimestamp(timestamp_ms))?;
    Ok(at.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
}

impl Signer for HeaderHmacSigner {
    fn sign(
        &self,
        request: &RequestSpec,
        base_url: &str,
        credentials: &Credentials,
        timestamp_ms: i64,
    ) -> Result<HttpRequest, SignError> {
        credentials.validate()?;
        let passphrase = match self.passphrase_header {
            Some(header) => Some((
                header,
                credentials.passphrase.clone().ok_or_else(|| {
                    SignError::InvalidCredentials("passphrase required".into())
                })?,
            )),
            None => None,
        };

        let timestamp = iso8601_ms(timestamp_ms)?;
        let prehash = format!(
            "{}{}{}{}",
            timestamp,
            request.method.as_str(),
            request.path_and_query(),
            request.body_string().unwrap_or_default()
        );
        let signature = STANDARD.encode(hmac_sha256(&credentials.secret, &prehash)?);

        let mut signed = HttpRequest::unsigned(request, base_url);
        signed.set_header(self.key_header, credentials.api_key.clone());
        signed.set_header(self.sign_header, signature);
        signed.set_header(self.timestamp_header, timestamp);
        if let Some((header, value)) = passphrase {
            signed.set_header(header, value);
        }
        Ok(signed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const BINANCE_KEY: &str = "vmPUZE6mv9SD5VNHk4HlWFsOr6aKE2zvsw0MuIgwCIPy6utIco14y7Ju91duEh8A";
    const BINANCE_SECRET: &str = "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j";

    fn binance_order() -> RequestSpec {
        RequestSpec::post("/api/v3/order")
            .private()
            .query("symbol", "LTCBTC")
            .query("side", "BUY")
            .query("type", "LIMIT")
            .query("timeInForce", "GTC")
            .query("quantity", "1")
            .query("price", "0.1")
    }

    #[test]
    fn test_query_signer_matches_reference_vector() {
        let signer = QueryHmacSigner::new("X-MBX-APIKEY").with_recv_window(5000);
        let creds = Credentials::new(BINANCE_KEY, BINANCE_SECRET);
        let signed = signer
            .sign(&binance_order(), "https://api.binance.com", &creds, 1_499_827_319_559)
            .unwrap();

        assert_eq!(
            signed.url,
            "https://api.binance.com/api/v3/order?symbol=LTCBTC&side=BUY&type=LIMIT\
             &timeInForce=GTC&quantity=1&price=0.1&recvWindow=5000&timestamp=1499827319559\
             &signature=c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71"
        );
        assert_eq!(signed.header("X-MBX-APIKEY"), Some(BINANCE_KEY));
        assert!(signed.body.is_none());
    }

    #[test]
    fn test_signing_is_deterministic() {
        let signer = QueryHmacSigner::new("X-MBX-APIKEY");
        let creds = Credentials::new("key", "secret");
        let a = signer.sign(&binance_order(), "https://x", &creds, 42).unwrap();
        let b = signer.sign(&binance_order(), "https://x", &creds, 42).unwrap();
        let c = signer.sign(&binance_order(), "https://x", &creds, 43).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_malformed_credentials_are_rejected() {
        let signer = QueryHmacSigner::new("X-MBX-APIKEY");
        let err = signer
            .sign(&binance_order(), "https://x", &Credentials::new("bad key", "s"), 1)
            .unwrap_err();
        assert!(matches!(err, SignError::InvalidCredentials(_)));
    }

    fn okx_signer() -> HeaderHmacSigner {
        HeaderHmacSigner::new("OK-ACCESS-KEY", "OK-ACCESS-SIGN", "OK-ACCESS-TIMESTAMP")
            .with_passphrase_header("OK-ACCESS-PASSPHRASE")
    }

    #[test]
    fn test_header_signer_prehash_and_headers() {
        let creds = Credentials::new("okx-key", "okx-secret").with_passphrase("phrase");
        let spec = RequestSpec::post("/api/v5/trade/order")
            .private()
            .json(json!({"instId": "BTC-USDT", "sz": "1"}));

        let signed = okx_signer()
            .sign(&spec, "https://www.okx.com", &creds, 1_607_418_537_715)
            .unwrap();

        let timestamp = "2020-12-08T09:08:57.715Z";
        let body = r#"{"instId":"BTC-USDT","sz":"1"}"#;
        let prehash = format!("{timestamp}POST/api/v5/trade/order{body}");
        let expected = STANDARD.encode(hmac_sha256("okx-secret", &prehash).unwrap());

        assert_eq!(signed.header("OK-ACCESS-TIMESTAMP"), Some(timestamp));
        assert_eq!(signed.header("OK-ACCESS-SIGN"), Some(expected.as_str()));
        assert_eq!(signed.header("OK-ACCESS-KEY"), Some("okx-key"));
        assert_eq!(signed.header("OK-ACCESS-PASSPHRASE"), Some("phrase"));
        assert_eq!(signed.body.as_deref(), Some(body));
        assert_eq!(signed.url, "https://www.okx.com/api/v5/trade/order");
    }

    #[test]
    fn test_header_signer_includes_query_in_prehash() {
        let creds = Credentials::new("k", "s").with_passphrase("p");
        let spec = RequestSpec::get("/api/v5/account/balance")
            .private()
            .query("ccy", "BTC");
        let signed = okx_signer().sign(&spec, "https://www.okx.com", &creds, 0).unwrap();

        let prehash = "1970-01-01T00:00:00.000ZGET/api/v5/account/balance?ccy=BTC";
        let expected = STANDARD.encode(hmac_sha256("s", prehash).unwrap());
        assert_eq!(signed.header("OK-ACCESS-SIGN"), Some(expected.as_str()));
    }

    #[test]
    fn test_header_signer_requires_passphrase() {
        let spec = RequestSpec::get("/api/v5/account/balance").private();
        let err = okx_signer()
            .sign(&spec, "https://www.okx.com", &Credentials::new("k", "s"), 0)
            .unwrap_err();
        assert_eq!(err, SignError::InvalidCredentials("passphrase required".into()));
    }
}
