//! Exchange adapters.
//!
//! An adapter is the per-exchange translation layer: it builds `RequestSpec`s,
//! parses response bodies into raw wire records, translates error payloads and
//! speaks the exchange's stream protocol. It holds no state and applies no
//! business rules; precision, validation and normalization live in the core.
//!
//! An alias (e.g. `okex`) is the canonical adapter with an identity-only
//! `ConfigOverride`; see `registry`.

pub mod binance;
pub mod errors;
pub mod okx;
pub mod registry;

use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::Value;

use crate::auth::Signer;
use crate::config::ExchangeConfig;
use crate::domain::balance::wire::RawBalances;
use crate::domain::market::wire::RawMarket;
use crate::domain::market::Market;
use crate::domain::order::wire::RawOrder;
use crate::domain::order::OrderRequest;
use crate::domain::orderbook::wire::{RawLevel, RawOrderBook};
use crate::domain::trade::wire::RawTrade;
use crate::error::{ExchangeError, SdkError, WsError};
use crate::http::RequestSpec;
use crate::shared::serde_util::as_string;
use crate::ws::{Subscription, WsMessage};

pub use binance::BinanceAdapter;
pub use errors::ErrorTable;
pub use okx::OkxAdapter;

/// Operations an adapter implements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub fetch_markets: bool,
    pub fetch_order_book: bool,
    pub fetch_trades: bool,
    pub fetch_my_trades: bool,
    pub create_order: bool,
    pub cancel_order: bool,
    pub cancel_all_orders: bool,
    pub fetch_order: bool,
    pub fetch_open_orders: bool,
    pub fetch_closed_orders: bool,
    pub fetch_balance: bool,
    pub watch_order_book: bool,
    pub watch_trades: bool,
}

/// How a streamed order book recovers from a sequence gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookResync {
    /// Keep the diff stream and fetch a REST snapshot.
    RestSnapshot,
    /// Resubscribe; the stream starts over with its own snapshot.
    Resubscribe,
}

/// Result of a cancel call.
#[derive(Debug, Clone, PartialEq)]
pub enum CancelOutcome {
    /// The exchange returned the canceled order.
    Order(RawOrder),
    /// The exchange only acknowledged the id; fetch the order for its state.
    Acknowledged { id: String },
}

fn unsupported<T>(adapter: &(impl ExchangeAdapter + ?Sized), capability: &str) -> Result<T, SdkError> {
    Err(SdkError::not_supported(capability, &adapter.describe().id))
}

/// Per-exchange wire construction and parsing.
///
/// Every request builder has a parser counterpart. Defaults report
/// `NotSupported`, so an adapter only implements what its exchange offers.
pub trait ExchangeAdapter: Send + Sync + std::fmt::Debug {
    /// Default identity, URLs, rate limits, retry and stream settings.
    fn describe(&self) -> ExchangeConfig;

    fn capabilities(&self) -> Capabilities;

    /// Signer for private endpoints, built once per client from its merged
    /// config so exchange options (e.g. `recvWindow`) reach the signature.
    fn signer(&self, _config: &ExchangeConfig) -> Option<Arc<dyn Signer>> {
        None
    }

    fn book_resync(&self) -> BookResync {
        BookResync::RestSnapshot
    }

    /// Translate an error payload. `None` when the body is not an error.
    fn parse_error(&self, status: u16, body: &Value) -> Option<ExchangeError>;

    // ── Markets ──────────────────────────────────────────────────────────

    fn markets_request(&self) -> Result<RequestSpec, SdkError> {
        unsupported(self, "fetchMarkets")
    }

    fn parse_markets(&self, _body: &Value) -> Result<Vec<RawMarket>, SdkError> {
        unsupported(self, "fetchMarkets")
    }

    // ── Order book and trades ────────────────────────────────────────────

    fn order_book_request(&self, _market: &Market, _limit: Option<u32>) -> Result<RequestSpec, SdkError> {
        unsupported(self, "fetchOrderBook")
    }

    fn parse_order_book(&self, _body: &Value, _market: &Market) -> Result<RawOrderBook, SdkError> {
        unsupported(self, "fetchOrderBook")
    }

    fn trades_request(&self, _market: &Market, _limit: Option<u32>) -> Result<RequestSpec, SdkError> {
        unsupported(self, "fetchTrades")
    }

    fn parse_trades(&self, _body: &Value, _market: &Market) -> Result<Vec<RawTrade>, SdkError> {
        unsupported(self, "fetchTrades")
    }

    /// The account's own fills. `market` narrows the listing; some
    /// exchanges require it.
    fn my_trades_request(&self, _market: Option<&Market>, _limit: Option<u32>) -> Result<RequestSpec, SdkError> {
        unsupported(self, "fetchMyTrades")
    }

    fn parse_my_trades(&self, _body: &Value, _market: Option<&Market>) -> Result<Vec<RawTrade>, SdkError> {
        unsupported(self, "fetchMyTrades")
    }

    // ── Orders ───────────────────────────────────────────────────────────

    /// `request` amount and price are already rounded to market precision.
    fn create_order_request(&self, _request: &OrderRequest, _market: &Market) -> Result<RequestSpec, SdkError> {
        unsupported(self, "createOrder")
    }

    fn parse_create_order(
        &self,
        _body: &Value,
        _request: &OrderRequest,
        _market: &Market,
    ) -> Result<RawOrder, SdkError> {
        unsupported(self, "createOrder")
    }

    fn cancel_order_request(&self, _id: &str, _market: &Market) -> Result<RequestSpec, SdkError> {
        unsupported(self, "cancelOrder")
    }

    fn parse_cancel_order(&self, _body: &Value, _id: &str, _market: &Market) -> Result<CancelOutcome, SdkError> {
        unsupported(self, "cancelOrder")
    }

    fn cancel_all_orders_request(&self, _market: Option<&Market>) -> Result<RequestSpec, SdkError> {
        unsupported(self, "cancelAllOrders")
    }

    fn parse_cancel_all_orders(&self, _body: &Value) -> Result<Vec<RawOrder>, SdkError> {
        unsupported(self, "cancelAllOrders")
    }

    fn fetch_order_request(&self, _id: &str, _market: &Market) -> Result<RequestSpec, SdkError> {
        unsupported(self, "fetchOrder")
    }

    fn parse_order(&self, _body: &Value) -> Result<RawOrder, SdkError> {
        unsupported(self, "fetchOrder")
    }

    fn open_orders_request(&self, _market: Option<&Market>) -> Result<RequestSpec, SdkError> {
        unsupported(self, "fetchOpenOrders")
    }

    fn closed_orders_request(&self, _market: Option<&Market>) -> Result<RequestSpec, SdkError> {
        unsupported(self, "fetchClosedOrders")
    }

    /// Parses both open and closed order listings.
    fn parse_orders(&self, _body: &Value) -> Result<Vec<RawOrder>, SdkError> {
        unsupported(self, "fetchOrders")
    }

    // ── Account ──────────────────────────────────────────────────────────

    fn balance_request(&self) -> Result<RequestSpec, SdkError> {
        unsupported(self, "fetchBalance")
    }

    fn parse_balance(&self, _body: &Value) -> Result<RawBalances, SdkError> {
        unsupported(self, "fetchBalance")
    }

    // ── Streams ──────────────────────────────────────────────────────────

    fn subscribe_message(&self, subscription: &Subscription, _request_id: u64) -> Result<String, WsError> {
        Err(WsError::ProtocolError(format!("cannot subscribe to {subscription}")))
    }

    fn unsubscribe_message(&self, subscription: &Subscription, _request_id: u64) -> Result<String, WsError> {
        Err(WsError::ProtocolError(format!("cannot unsubscribe from {subscription}")))
    }

    /// Application-level ping. `None` means protocol ping frames.
    fn ping_message(&self) -> Option<String> {
        None
    }

    /// Parse one text frame into zero or more messages.
    fn parse_ws_message(&self, _text: &str) -> Result<Vec<WsMessage>, WsError> {
        Ok(Vec::new())
    }
}

// ─── Shared parsing helpers ──────────────────────────────────────────────────

/// Error for a response body that does not have the expected shape.
pub(crate) fn unexpected(what: &str, body: &Value) -> SdkError {
    let mut text = body.to_string();
    if text.len() > 200 {
        let mut cut = 200;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
    }
    SdkError::Validation(format!("unexpected {what} response: {text}"))
}

/// `[[price, amount, ...], ...]` levels, as both exchanges send them.
pub(crate) fn parse_levels(levels: Option<&Value>) -> Vec<RawLevel> {
    levels
        .and_then(Value::as_array)
        .map(|levels| {
            levels
                .iter()
                .map(|level| RawLevel {
                    price: level.get(0).and_then(as_string),
                    amount: level.get(1).and_then(as_string),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Plain decimal text without trailing zeros, as sent in order parameters.
pub(crate) fn wire_decimal(value: Decimal) -> String {
    value.normalize().to_string()
}

pub(crate) fn require_market<'a>(
    market: Option<&'a Market>,
    exchange: &str,
    capability: &str,
) -> Result<&'a Market, SdkError> {
    market.ok_or_else(|| SdkError::Validation(format!("{exchange} {capability} requires a symbol")))
}
