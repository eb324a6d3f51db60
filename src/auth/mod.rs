//! Authentication: API credentials and request signers.
//!
//! Credentials are supplied by the caller (loading them from files or secret
//! stores is out of scope). Signers are pure functions of the request, the
//! credentials and an injected timestamp.

pub mod signer;

pub use signer::{HeaderHmacSigner, QueryHmacSigner, Signer};

use crate::error::SignError;

/// API key material for private endpoints.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    pub secret: String,
    /// Required by exchanges that bind a passphrase to the key (e.g. OKX).
    pub passphrase: Option<String>,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            secret: secret.into(),
            passphrase: None,
        }
    }

    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(passphrase.into());
        self
    }

    /// Reject key material that cannot be placed in a header or used as a key.
    pub fn validate(&self) -> Result<(), SignError> {
        check_header_value("api key", &self.api_key)?;
        if self.secret.is_empty() {
            return Err(SignError::InvalidCredentials("secret is empty".into()));
        }
        if let Some(passphrase) = &self.passphrase {
            check_header_value("passphrase", passphrase)?;
        }
        Ok(())
    }
}

fn check_header_value(what: &str, value: &str) -> Result<(), SignError> {
    if value.is_empty() {
        return Err(SignError::InvalidCredentials(format!("{what} is empty")));
    }
    if !value.chars().all(|c| c.is_ascii_graphic()) {
        return Err(SignError::InvalidCredentials(format!(
            "{what} contains whitespace or non-printable characters"
        )));
    }
    Ok(())
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &redact(&self.api_key))
            .field("secret", &"***")
            .field("passphrase", &self.passphrase.as_ref().map(|_| "***"))
            .finish()
    }
}

fn redact(key: &str) -> String {
    let prefix: String = key.chars().take(4).collect();
    format!("{prefix}***")
}
