//! WebSocket layer — subscriptions, parsed messages, events, configuration.
//!
//! Adapters turn exchange frames into `WsMessage`s keyed by `Subscription`.
//! The connection task (`native`, behind the `ws-native` feature) routes them
//! to per-subscription queues as `WsEvent`s.

pub mod subscriptions;

#[cfg(feature = "ws-native")]
pub mod native;

use serde::{Deserialize, Serialize};

use crate::domain::orderbook::wire::{RawBookDelta, RawOrderBook};
use crate::domain::trade::wire::RawTrade;
use crate::error::WsError;

pub use subscriptions::Routes;

// ─── Subscriptions ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    OrderBook,
    Trades,
}

/// One stream: a channel for one exchange market id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Subscription {
    pub channel: Channel,
    pub market_id: String,
}

impl Subscription {
    pub fn order_book(market_id: impl Into<String>) -> Self {
        Self {
            channel: Channel::OrderBook,
            market_id: market_id.into(),
        }
    }

    pub fn trades(market_id: impl Into<String>) -> Self {
        Self {
            channel: Channel::Trades,
            market_id: market_id.into(),
        }
    }
}

impl std::fmt::Display for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}:{}", self.channel, self.market_id)
    }
}

// ─── Inbound messages ────────────────────────────────────────────────────────

/// A frame parsed by an adapter. Payloads are raw records; normalization
/// happens in the subscriber.
#[derive(Debug, Clone, PartialEq)]
pub enum WsMessage {
    BookSnapshot {
        subscription: Subscription,
        book: RawOrderBook,
    },
    BookDelta {
        subscription: Subscription,
        delta: RawBookDelta,
    },
    Trades {
        subscription: Subscription,
        trades: Vec<RawTrade>,
    },
    /// Application-level pong.
    Pong,
    /// Subscribe/unsubscribe acknowledgement.
    Ack { request_id: Option<u64> },
    /// Error frame, attributed to a subscription when the exchange says
    /// which, or to the request id it echoes.
    Error {
        subscription: Option<Subscription>,
        request_id: Option<u64>,
        code: String,
        message: String,
    },
}

impl WsMessage {
    /// The subscription a data message belongs to.
    pub fn subscription(&self) -> Option<&Subscription> {
        match self {
            WsMessage::BookSnapshot { subscription, .. }
            | WsMessage::BookDelta { subscription, .. }
            | WsMessage::Trades { subscription, .. } => Some(subscription),
            WsMessage::Error { subscription, .. } => subscription.as_ref(),
            WsMessage::Pong | WsMessage::Ack { .. } => None,
        }
    }
}

// ─── Events ──────────────────────────────────────────────────────────────────

/// Events delivered to a subscriber.
#[derive(Debug, Clone, PartialEq)]
pub enum WsEvent {
    Message(WsMessage),
    /// The connection dropped and the subscription was replayed on a new one.
    /// Stream state (e.g. a local order book) must be rebuilt.
    Resubscribed,
    /// Terminal: the subscription will receive nothing more.
    Failed(WsError),
}

// ─── Connection state ────────────────────────────────────────────────────────

/// `Disconnected → Connecting → Subscribed → (Resubscribing on drop) → Disconnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ConnectionState {
    Disconnected = 0,
    Connecting = 1,
    Subscribed = 2,
    Resubscribing = 3,
}

impl From<u16> for ConnectionState {
    fn from(value: u16) -> Self {
        match value {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Subscribed,
            3 => ConnectionState::Resubscribing,
            _ => ConnectionState::Disconnected,
        }
    }
}

// ─── Config ──────────────────────────────────────────────────────────────────

/// Connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WsConfig {
    pub ping_interval_ms: u64,
    pub pong_timeout_ms: u64,
    pub reconnect: bool,
    pub max_reconnect_attempts: u32,
    pub base_reconnect_delay_ms: u64,
    pub max_reconnect_delay_ms: u64,
    pub max_jitter_ms: u64,
    pub connect_timeout_ms: u64,
    /// Queue size of each subscription.
    pub dispatch_capacity: usize,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            ping_interval_ms: 20_000,
            pong_timeout_ms: 10_000,
            reconnect: true,
            max_reconnect_attempts: 10,
            base_reconnect_delay_ms: 1000,
            max_reconnect_delay_ms: 60_000,
            max_jitter_ms: 500,
            connect_timeout_ms: 30_000,
            dispatch_capacity: 1024,
        }
    }
}
