//! Unified SDK error types.
//!
//! Every layer has its own error enum; `SdkError` wraps them so callers can
//! match on the layer that failed. Transport, signer and throttle errors are
//! surfaced unchanged. Raw exchange codes are translated by adapters into
//! `ExchangeError`.

use thiserror::Error;

/// Top-level SDK error.
#[derive(Error, Debug)]
pub enum SdkError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Exchange error: {0}")]
    Exchange(#[from] ExchangeError),

    #[error("Throttle error: {0}")]
    Throttle(#[from] ThrottleError),

    #[error("Normalization error: {0}")]
    Normalize(#[from] NormalizeError),

    #[error("Signing error: {0}")]
    Signing(#[from] SignError),

    #[error("WebSocket error: {0}")]
    Ws(#[from] WsError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl SdkError {
    /// Whether retrying the same call may succeed.
    ///
    /// Only network-level failures are transient; exchange rejections are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            SdkError::Network(NetworkError::Transport(e)) => e.is_transient(),
            SdkError::Network(NetworkError::ServerError { .. }) => true,
            SdkError::Network(NetworkError::MaxRetriesExceeded { .. }) => true,
            _ => false,
        }
    }

    /// The exchange error kind, if this is an exchange rejection.
    pub fn exchange_kind(&self) -> Option<ExchangeErrorKind> {
        match self {
            SdkError::Exchange(e) => Some(e.kind()),
            _ => None,
        }
    }

    pub(crate) fn not_supported(capability: &str, exchange: &str) -> Self {
        SdkError::NotSupported(format!("{exchange} does not support {capability}"))
    }
}

// ─── Network ─────────────────────────────────────────────────────────────────

/// Transient network-layer errors.
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Transport failure: {0}")]
    Transport(#[from] TransportError),

    #[error("Server error {status}: {body}")]
    ServerError { status: u16, body: String },

    #[error("Max retries exceeded after {attempts} attempts: {last_error}")]
    MaxRetriesExceeded { attempts: u32, last_error: String },
}

/// A single failed transport attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Request timed out")]
    Timeout,

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl TransportError {
    /// Connection resets, timeouts and mid-flight I/O failures are transient.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TransportError::Connect(_) | TransportError::Timeout | TransportError::Io(_)
        )
    }
}

// ─── Exchange ────────────────────────────────────────────────────────────────

/// Classification of an exchange rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExchangeErrorKind {
    InsufficientFunds,
    InvalidOrder,
    OrderNotFound,
    BadSymbol,
    AuthenticationFailed,
    RateLimited,
    Rejected,
}

/// An error reported by the exchange itself. Never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    #[error("Insufficient funds [{code}]: {message}")]
    InsufficientFunds { code: String, message: String },

    #[error("Invalid order [{code}]: {message}")]
    InvalidOrder { code: String, message: String },

    #[error("Order not found [{code}]: {message}")]
    OrderNotFound { code: String, message: String },

    #[error("Bad symbol [{code}]: {message}")]
    BadSymbol { code: String, message: String },

    #[error("Authentication failed [{code}]: {message}")]
    AuthenticationFailed { code: String, message: String },

    #[error("Rate limited [{code}] (retry after {retry_after_ms:?}ms): {message}")]
    RateLimited {
        code: String,
        message: String,
        retry_after_ms: Option<u64>,
    },

    #[error("Rejected [{code}]: {message}")]
    Rejected { code: String, message: String },
}

impl ExchangeError {
    pub fn new(kind: ExchangeErrorKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        let code = code.into();
        let message = message.into();
        match kind {
            ExchangeErrorKind::InsufficientFunds => ExchangeError::InsufficientFunds { code, message },
            ExchangeErrorKind::InvalidOrder => ExchangeError::InvalidOrder { code, message },
            ExchangeErrorKind::OrderNotFound => ExchangeError::OrderNotFound { code, message },
            ExchangeErrorKind::BadSymbol => ExchangeError::BadSymbol { code, message },
            ExchangeErrorKind::AuthenticationFailed => {
                ExchangeError::AuthenticationFailed { code, message }
            }
            ExchangeErrorKind::RateLimited => ExchangeError::RateLimited {
                code,
                message,
                retry_after_ms: None,
            },
            ExchangeErrorKind::Rejected => ExchangeError::Rejected { code, message },
        }
    }

    pub fn kind(&self) -> ExchangeErrorKind {
        match self {
            ExchangeError::InsufficientFunds { .. } => ExchangeErrorKind::InsufficientFunds,
            ExchangeError::InvalidOrder { .. } => ExchangeErrorKind::InvalidOrder,
            ExchangeError::OrderNotFound { .. } => ExchangeErrorKind::OrderNotFound,
            ExchangeError::BadSymbol { .. } => ExchangeErrorKind::BadSymbol,
            ExchangeError::AuthenticationFailed { .. } => ExchangeErrorKind::AuthenticationFailed,
            ExchangeError::RateLimited { .. } => ExchangeErrorKind::RateLimited,
            ExchangeError::Rejected { .. } => ExchangeErrorKind::Rejected,
        }
    }

    pub fn code(&self) -> &str {
        match self {
            ExchangeError::InsufficientFunds { code, .. }
            | ExchangeError::InvalidOrder { code, .. }
            | ExchangeError::OrderNotFound { code, .. }
            | ExchangeError::BadSymbol { code, .. }
            | ExchangeError::AuthenticationFailed { code, .. }
            | ExchangeError::RateLimited { code, .. }
            | ExchangeError::Rejected { code, .. } => code,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ExchangeError::InsufficientFunds { message, .. }
            | ExchangeError::InvalidOrder { message, .. }
            | ExchangeError::OrderNotFound { message, .. }
            | ExchangeError::BadSymbol { message, .. }
            | ExchangeError::AuthenticationFailed { message, .. }
            | ExchangeError::RateLimited { message, .. }
            | ExchangeError::Rejected { message, .. } => message,
        }
    }

    /// Attach a `Retry-After` hint to a rate-limit rejection.
    pub fn with_retry_after(self, ms: Option<u64>) -> Self {
        match self {
            ExchangeError::RateLimited { code, message, .. } => ExchangeError::RateLimited {
                code,
                message,
                retry_after_ms: ms,
            },
            other => other,
        }
    }
}

// ─── Throttle ────────────────────────────────────────────────────────────────

/// Rate limiter errors. None of these consume budget.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ThrottleError {
    #[error("Throttle timeout waiting for budget in class '{class}'")]
    Timeout { class: String },

    #[error("Throttle acquire cancelled")]
    Cancelled,

    #[error("Weight {weight} exceeds capacity {capacity} of class '{class}'")]
    WeightExceedsCapacity {
        class: String,
        weight: u32,
        capacity: u32,
    },
}

// ─── Normalization ───────────────────────────────────────────────────────────

/// Errors raised while turning raw exchange records into normalized entities.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("Schema mismatch: {entity} is missing required field '{field}'")]
    SchemaMismatch { entity: &'static str, field: String },

    #[error("Invalid number in field '{field}': {value}")]
    InvalidNumber { field: String, value: String },

    #[error("Field '{field}' value {value} exceeds {decimals} decimal places")]
    Precision {
        field: String,
        value: String,
        decimals: u32,
    },

    #[error("Unknown market: {0}")]
    UnknownMarket(String),

    #[error("Invariant violated: {0}")]
    InvariantViolation(String),
}

impl NormalizeError {
    pub(crate) fn missing(entity: &'static str, field: &str) -> Self {
        NormalizeError::SchemaMismatch {
            entity,
            field: field.to_string(),
        }
    }
}

// ─── Signing ─────────────────────────────────────────────────────────────────

/// Request signing errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignError {
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Credentials required for private endpoint")]
    MissingCredentials,

    #[error("Timestamp out of range: {0}")]
    InvalidTimestamp(i64),
}

// ─── WebSocket ───────────────────────────────────────────────────────────────

/// WebSocket errors.
///
/// `Clone` so a terminal connection failure can be fanned out to every
/// subscription.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WsError {
    #[error("Not connected")]
    NotConnected,

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("Subscription rejected [{code}]: {message}")]
    SubscriptionRejected { code: String, message: String },

    #[error("Connection closed: code={code:?} reason={reason}")]
    Closed { code: Option<u16>, reason: String },

    #[error("Max reconnect attempts reached")]
    MaxReconnectReached,
}
