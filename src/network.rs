//! Network URL constants for the built-in exchanges.

/// Binance spot REST API base URL.
pub const BINANCE_REST_URL: &str = "https://api.binance.com";

/// Binance spot stream URL.
pub const BINANCE_WS_URL: &str = "wss://stream.binance.com:9443/ws";

/// OKX v5 REST API base URL.
pub const OKX_REST_URL: &str = "https://www.okx.com";

/// OKX v5 public stream URL.
pub const OKX_WS_URL: &str = "wss://ws.okx.com:8443/ws/v5/public";
