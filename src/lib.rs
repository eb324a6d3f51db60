//! # omniex
//!
//! A unified client core for cryptocurrency exchanges: one normalized model
//! and one facade over heterogeneous REST and WebSocket protocols.
//!
//! ## Architecture
//!
//! The crate is organized in layers:
//!
//! 1. **Core** — Shared types, domain models, normalization, errors
//! 2. **Throttle** — Per-class token buckets with FIFO waiters
//! 3. **Auth** — Credentials and per-exchange request signers
//! 4. **HTTP** — `Transport` trait, `ReqwestTransport`, retry policies
//! 5. **WebSocket** — Multiplexed connection task with reconnect and replay
//! 6. **Exchanges** — Stateless adapters (`binance`, `okx`) and the registry
//! 7. **High-Level Client** — `Exchange`, one per exchange identity
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use omniex::prelude::*;
//!
//! let okx = omniex::exchange::registry::create("okx")?;
//! let symbol = Symbol::new("BTC", "USDT");
//!
//! let book = okx.fetch_order_book(&symbol, Some(10)).await?;
//! let mut stream = okx.watch_order_book(&symbol).await?;
//! while let Some(book) = stream.next().await {
//!     println!("{:?}", book?.best_bid());
//! }
//! ```

// ── Layer 1: Core ────────────────────────────────────────────────────────────

/// Shared newtypes and helpers used across all domains.
pub mod shared;

/// Domain modules (vertical slices): types, wire records, conversions, state.
pub mod domain;

/// Raw record → normalized entity conversions.
pub mod normalize;

/// Unified SDK error types.
pub mod error;

/// Default exchange URLs.
pub mod network;

/// Exchange configuration and overrides.
pub mod config;

/// Cancellation tokens and per-call options.
pub mod cancel;

// ── Layer 2: Throttle ────────────────────────────────────────────────────────

pub mod throttle;

// ── Layer 3: Auth ────────────────────────────────────────────────────────────

/// Credentials and request signers.
pub mod auth;

// ── Layer 4: HTTP ────────────────────────────────────────────────────────────

/// Request model, transports and retry policies.
pub mod http;

// ── Layer 5: WebSocket ───────────────────────────────────────────────────────

/// WebSocket subscriptions, messages, events and the native connection.
pub mod ws;

// ── Layer 6: Exchanges ───────────────────────────────────────────────────────

/// Exchange adapters and the id registry.
pub mod exchange;

// ── Layer 7: High-Level Client ───────────────────────────────────────────────

/// `Exchange`, the primary entry point.
pub mod client;

// ── Prelude ──────────────────────────────────────────────────────────────────

pub mod prelude {
    // Shared newtypes
    pub use crate::shared::{Side, Symbol};

    // Domain types
    pub use crate::domain::balance::{Balance, Balances};
    pub use crate::domain::market::{Market, MarketCatalog, MarketLimits, MinMax, Precision};
    pub use crate::domain::order::{Order, OrderRequest, OrderStatus, OrderType};
    pub use crate::domain::orderbook::{BookDelta, OrderBook, PriceLevel};
    pub use crate::domain::trade::{TakerOrMaker, Trade};

    // State containers
    pub use crate::domain::order::OrderTracker;
    pub use crate::domain::orderbook::{BookSync, LocalOrderBook};
    pub use crate::domain::trade::TradeHistory;

    // Errors
    pub use crate::error::{ExchangeError, ExchangeErrorKind, SdkError};

    // Configuration and auth
    pub use crate::auth::Credentials;
    pub use crate::cancel::{CallOptions, CancelToken};
    pub use crate::config::{ConfigOverride, ExchangeConfig};
    pub use crate::http::{RetryConfig, RetryPolicy};

    // Client and adapters
    pub use crate::client::{Exchange, ExchangeBuilder};
    pub use crate::exchange::{registry, BinanceAdapter, Capabilities, ExchangeAdapter, OkxAdapter};

    // Streams
    #[cfg(feature = "ws-native")]
    pub use crate::domain::orderbook::client::OrderBookStream;
    #[cfg(feature = "ws-native")]
    pub use crate::domain::trade::client::TradeStream;
    #[cfg(feature = "ws-native")]
    pub use futures_util::StreamExt;
    pub use crate::ws::ConnectionState;
}
