//! OKX v5 adapter (spot).
//!
//! Responses share one envelope, `{"code": "0", "msg": "", "data": [...]}`;
//! order operations additionally report per-item `sCode`/`sMsg`. Order book
//! streams open with a snapshot and chain updates by `prevSeqId`.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use super::{
    parse_levels, unexpected, wire_decimal, BookResync, CancelOutcome, Capabilities, ErrorTable,
    ExchangeAdapter,
};
use crate::auth::{HeaderHmacSigner, Signer};
use crate::config::{ExchangeConfig, Urls};
use crate::domain::balance::wire::{RawBalance, RawBalances};
use crate::domain::market::wire::RawMarket;
use crate::domain::market::Market;
use crate::domain::order::wire::RawOrder;
use crate::domain::order::{OrderRequest, OrderStatus, OrderType};
use crate::domain::orderbook::wire::{RawBookDelta, RawOrderBook};
use crate::domain::trade::wire::RawTrade;
use crate::domain::trade::TakerOrMaker;
use crate::error::{ExchangeError, ExchangeErrorKind, SdkError, WsError};
use crate::http::retry::RetryConfig;
use crate::http::RequestSpec;
use crate::network::{OKX_REST_URL, OKX_WS_URL};
use crate::shared::serde_util::{array_field, i64_field, str_field, u64_field};
use crate::shared::Side;
use crate::throttle::{RateLimit, WeightClass};
use crate::ws::{Channel, Subscription, WsConfig, WsMessage};

pub const ID: &str = "okx";

pub const PUBLIC: WeightClass = WeightClass::from_static("public");
pub const PRIVATE: WeightClass = WeightClass::from_static("private");
pub const TRADE: WeightClass = WeightClass::from_static("trade");

const ERRORS: ErrorTable = ErrorTable::new(
    &[
        ("50011", ExchangeErrorKind::RateLimited),
        ("50061", ExchangeErrorKind::RateLimited),
        ("50111", ExchangeErrorKind::AuthenticationFailed),
        ("50112", ExchangeErrorKind::AuthenticationFailed),
        ("50113", ExchangeErrorKind::AuthenticationFailed),
        ("50114", ExchangeErrorKind::AuthenticationFailed),
        ("51000", ExchangeErrorKind::InvalidOrder),
        ("51001", ExchangeErrorKind::BadSymbol),
        ("51008", ExchangeErrorKind::InsufficientFunds),
        ("51020", ExchangeErrorKind::InvalidOrder),
        ("51121", ExchangeErrorKind::InvalidOrder),
        ("51400", ExchangeErrorKind::OrderNotFound),
        ("51401", ExchangeErrorKind::OrderNotFound),
        ("51603", ExchangeErrorKind::OrderNotFound),
    ],
    &[
        ("insufficient", ExchangeErrorKind::InsufficientFunds),
        ("order does not exist", ExchangeErrorKind::OrderNotFound),
        ("instrument id does not exist", ExchangeErrorKind::BadSymbol),
    ],
);

#[derive(Debug, Clone)]
pub struct OkxAdapter {
    signer: HeaderHmacSigner,
}

impl Default for OkxAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl OkxAdapter {
    pub fn new() -> Self {
        Self {
            signer: HeaderHmacSigner::new("OK-ACCESS-KEY", "OK-ACCESS-SIGN", "OK-ACCESS-TIMESTAMP")
                .with_passphrase_header("OK-ACCESS-PASSPHRASE"),
        }
    }
}

/// The `data` array of a successful envelope.
fn data<'a>(body: &'a Value, what: &str) -> Result<&'a [Value], SdkError> {
    body.get("data")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .ok_or_else(|| unexpected(what, body))
}

fn first<'a>(body: &'a Value, what: &str) -> Result<&'a Value, SdkError> {
    data(body, what)?.first().ok_or_else(|| unexpected(what, body))
}

fn parse_state(state: &str) -> Option<OrderStatus> {
    match state {
        "live" | "partially_filled" => Some(OrderStatus::Open),
        "filled" => Some(OrderStatus::Closed),
        "canceled" | "mmp_canceled" => Some(OrderStatus::Canceled),
        _ => None,
    }
}

fn parse_order_type(kind: &str) -> Option<OrderType> {
    match kind {
        "market" => Some(OrderType::Market),
        "limit" | "post_only" | "fok" | "ioc" => Some(OrderType::Limit),
        _ => None,
    }
}

fn parse_order_value(order: &Value) -> RawOrder {
    let text = |key: &str| order.get(key).and_then(Value::as_str);
    RawOrder {
        id: str_field(order, "ordId"),
        client_order_id: str_field(order, "clOrdId"),
        market_id: str_field(order, "instId"),
        side: text("side").and_then(|s| Side::from_str(s).ok()),
        order_type: text("ordType").and_then(parse_order_type),
        status: text("state").and_then(parse_state),
        price: str_field(order, "px"),
        amount: str_field(order, "sz"),
        filled: str_field(order, "accFillSz"),
        remaining: None,
        average: str_field(order, "avgPx"),
        cost: None,
        timestamp: i64_field(order, "cTime"),
        last_update: i64_field(order, "uTime"),
    }
}

fn parse_trade_value(trade: &Value) -> RawTrade {
    RawTrade {
        id: str_field(trade, "tradeId"),
        order_id: None,
        market_id: str_field(trade, "instId"),
        side: trade
            .get("side")
            .and_then(Value::as_str)
            .and_then(|s| Side::from_str(s).ok()),
        price: str_field(trade, "px"),
        amount: str_field(trade, "sz"),
        cost: None,
        timestamp: i64_field(trade, "ts"),
        taker_or_maker: None,
    }
}

/// An account fill from `trade/fills`.
fn parse_fill_value(fill: &Value) -> RawTrade {
    let taker_or_maker = match fill.get("execType").and_then(Value::as_str) {
        Some("T") => Some(TakerOrMaker::Taker),
        Some("M") => Some(TakerOrMaker::Maker),
        _ => None,
    };
    RawTrade {
        id: str_field(fill, "tradeId"),
        order_id: str_field(fill, "ordId"),
        market_id: str_field(fill, "instId"),
        side: fill
            .get("side")
            .and_then(Value::as_str)
            .and_then(|s| Side::from_str(s).ok()),
        price: str_field(fill, "fillPx"),
        amount: str_field(fill, "fillSz"),
        cost: None,
        timestamp: i64_field(fill, "ts"),
        taker_or_maker,
    }
}

fn parse_book(book: &Value, market_id: String) -> RawOrderBook {
    RawOrderBook {
        market_id: Some(market_id),
        bids: parse_levels(book.get("bids")),
        asks: parse_levels(book.get("asks")),
        timestamp: i64_field(book, "ts"),
        nonce: u64_field(book, "seqId"),
    }
}

fn channel_name(channel: Channel) -> &'static str {
    match channel {
        Channel::OrderBook => "books",
        Channel::Trades => "trades",
    }
}

fn subscription_from_arg(arg: &Value) -> Option<Subscription> {
    let market_id = str_field(arg, "instId")?;
    match arg.get("channel").and_then(Value::as_str)? {
        "books" => Some(Subscription::order_book(market_id)),
        "trades" => Some(Subscription::trades(market_id)),
        _ => None,
    }
}

fn op_message(op: &str, subscription: &Subscription) -> String {
    json!({
        "op": op,
        "args": [{
            "channel": channel_name(subscription.channel),
            "instId": subscription.market_id,
        }],
    })
    .to_string()
}

impl ExchangeAdapter for OkxAdapter {
    fn describe(&self) -> ExchangeConfig {
        let mut rate_limits = BTreeMap::new();
        rate_limits.insert(PUBLIC, RateLimit::new(20, Duration::from_secs(2)));
        rate_limits.insert(PRIVATE, RateLimit::new(10, Duration::from_secs(2)));
        rate_limits.insert(TRADE, RateLimit::new(60, Duration::from_secs(2)));

        ExchangeConfig {
            id: ID.into(),
            name: "OKX".into(),
            alias: false,
            urls: Urls {
                rest: OKX_REST_URL.into(),
                ws: Some(OKX_WS_URL.into()),
            },
            rate_limits,
            retry: RetryConfig::default(),
            timeout: Duration::from_secs(10),
            ws: WsConfig {
                // OKX drops idle connections after 30s.
                ping_interval_ms: 15_000,
                ..WsConfig::default()
            },
            options: BTreeMap::new(),
        }
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            fetch_markets: true,
            fetch_order_book: true,
            fetch_trades: true,
            fetch_my_trades: true,
            create_order: true,
            cancel_order: true,
            cancel_all_orders: false,
            fetch_order: true,
            fetch_open_orders: true,
            fetch_closed_orders: true,
            fetch_balance: true,
            watch_order_book: true,
            watch_trades: true,
        }
    }

    fn signer(&self, _config: &ExchangeConfig) -> Option<Arc<dyn Signer>> {
        Some(Arc::new(self.signer.clone()))
    }

    fn book_resync(&self) -> BookResync {
        BookResync::Resubscribe
    }

    /// Non-zero envelope `code`, or a non-zero `sCode` on the first item.
    fn parse_error(&self, _status: u16, body: &Value) -> Option<ExchangeError> {
        let code = str_field(body, "code")?;
        if code != "0" {
            let message = str_field(body, "msg").unwrap_or_default();
            // Batch-style failures carry the useful code on the item.
            if let Some(item) = array_field(body, "data").first() {
                if let Some(s_code) = str_field(item, "sCode").filter(|c| c != "0") {
                    let s_msg = str_field(item, "sMsg").unwrap_or(message);
                    return Some(ERRORS.translate(&s_code, &s_msg));
                }
            }
            return Some(ERRORS.translate(&code, &message));
        }
        let item = array_field(body, "data").first()?;
        let s_code = str_field(item, "sCode").filter(|c| c != "0")?;
        let s_msg = str_field(item, "sMsg").unwrap_or_default();
        Some(ERRORS.translate(&s_code, &s_msg))
    }

    fn markets_request(&self) -> Result<RequestSpec, SdkError> {
        Ok(RequestSpec::get("/api/v5/public/instruments")
            .query("instType", "SPOT")
            .weight(PUBLIC, 1))
    }

    fn parse_markets(&self, body: &Value) -> Result<Vec<RawMarket>, SdkError> {
        Ok(data(body, "instruments")?
            .iter()
            .map(|inst| RawMarket {
                id: str_field(inst, "instId"),
                base: str_field(inst, "baseCcy"),
                quote: str_field(inst, "quoteCcy"),
                active: inst
                    .get("state")
                    .and_then(Value::as_str)
                    .map(|s| s == "live"),
                tick_size: str_field(inst, "tickSz"),
                lot_size: str_field(inst, "lotSz"),
                price_decimals: None,
                amount_decimals: None,
                min_amount: str_field(inst, "minSz"),
                max_amount: str_field(inst, "maxLmtSz"),
                min_price: None,
                max_price: None,
                min_cost: None,
                max_cost: None,
            })
            .collect())
    }

    fn order_book_request(&self, market: &Market, limit: Option<u32>) -> Result<RequestSpec, SdkError> {
        Ok(RequestSpec::get("/api/v5/market/books")
            .query("instId", &market.id)
            .query_opt("sz", limit)
            .weight(PUBLIC, 1))
    }

    fn parse_order_book(&self, body: &Value, market: &Market) -> Result<RawOrderBook, SdkError> {
        Ok(parse_book(first(body, "books")?, market.id.clone()))
    }

    fn trades_request(&self, market: &Market, limit: Option<u32>) -> Result<RequestSpec, SdkError> {
        Ok(RequestSpec::get("/api/v5/market/trades")
            .query("instId", &market.id)
            .query_opt("limit", limit)
            .weight(PUBLIC, 1))
    }

    fn parse_trades(&self, body: &Value, _market: &Market) -> Result<Vec<RawTrade>, SdkError> {
        Ok(data(body, "trades")?.iter().map(parse_trade_value).collect())
    }

    fn my_trades_request(&self, market: Option<&Market>, limit: Option<u32>) -> Result<RequestSpec, SdkError> {
        Ok(RequestSpec::get("/api/v5/trade/fills")
            .private()
            .query("instType", "SPOT")
            .query_opt("instId", market.map(|m| m.id.as_str()))
            .query_opt("limit", limit)
            .weight(PRIVATE, 1))
    }

    fn parse_my_trades(&self, body: &Value, _market: Option<&Market>) -> Result<Vec<RawTrade>, SdkError> {
        Ok(data(body, "fills")?.iter().map(parse_fill_value).collect())
    }

    fn create_order_request(&self, request: &OrderRequest, market: &Market) -> Result<RequestSpec, SdkError> {
        let mut body = json!({
            "instId": market.id,
            "tdMode": "cash",
            "side": request.side.as_str(),
            "ordType": request.order_type.as_str(),
            "sz": wire_decimal(request.amount),
        });
        match (request.order_type, request.price) {
            (OrderType::Limit, Some(price)) => body["px"] = json!(wire_decimal(price)),
            (OrderType::Limit, None) => {
                return Err(SdkError::Validation("limit order requires a price".into()))
            }
            // Market sizes default to the quote currency for buys.
            (OrderType::Market, _) => body["tgtCcy"] = json!("base_ccy"),
        }
        if let Some(id) = &request.client_order_id {
            body["clOrdId"] = json!(id);
        }
        Ok(RequestSpec::post("/api/v5/trade/order")
            .private()
            .json(body)
            .weight(TRADE, 1))
    }

    /// The placement response only carries ids; the order is the request as
    /// accepted.
    fn parse_create_order(
        &self,
        body: &Value,
        request: &OrderRequest,
        market: &Market,
    ) -> Result<RawOrder, SdkError> {
        let item = first(body, "order")?;
        let id = str_field(item, "ordId").ok_or_else(|| unexpected("order", body))?;
        Ok(RawOrder {
            id: Some(id),
            client_order_id: str_field(item, "clOrdId").or_else(|| request.client_order_id.clone()),
            market_id: Some(market.id.clone()),
            side: Some(request.side),
            order_type: Some(request.order_type),
            status: Some(OrderStatus::Open),
            price: request.price.map(wire_decimal),
            amount: Some(wire_decimal(request.amount)),
            filled: Some("0".into()),
            remaining: None,
            average: None,
            cost: None,
            timestamp: i64_field(item, "ts"),
            last_update: None,
        })
    }

    fn cancel_order_request(&self, id: &str, market: &Market) -> Result<RequestSpec, SdkError> {
        Ok(RequestSpec::post("/api/v5/trade/cancel-order")
            .private()
            .json(json!({"instId": market.id, "ordId": id}))
            .weight(TRADE, 1))
    }

    fn parse_cancel_order(&self, body: &Value, id: &str, _market: &Market) -> Result<CancelOutcome, SdkError> {
        let item = first(body, "cancel")?;
        Ok(CancelOutcome::Acknowledged {
            id: str_field(item, "ordId").unwrap_or_else(|| id.to_string()),
        })
    }

    fn fetch_order_request(&self, id: &str, market: &Market) -> Result<RequestSpec, SdkError> {
        Ok(RequestSpec::get("/api/v5/trade/order")
            .private()
            .query("instId", &market.id)
            .query("ordId", id)
            .weight(PRIVATE, 1))
    }

    fn parse_order(&self, body: &Value) -> Result<RawOrder, SdkError> {
        Ok(parse_order_value(first(body, "order")?))
    }

    fn open_orders_request(&self, market: Option<&Market>) -> Result<RequestSpec, SdkError> {
        Ok(RequestSpec::get("/api/v5/trade/orders-pending")
            .private()
            .query("instType", "SPOT")
            .query_opt("instId", market.map(|m| m.id.as_str()))
            .weight(PRIVATE, 1))
    }

    fn closed_orders_request(&self, market: Option<&Market>) -> Result<RequestSpec, SdkError> {
        Ok(RequestSpec::get("/api/v5/trade/orders-history")
            .private()
            .query("instType", "SPOT")
            .query_opt("instId", market.map(|m| m.id.as_str()))
            .weight(PRIVATE, 1))
    }

    fn parse_orders(&self, body: &Value) -> Result<Vec<RawOrder>, SdkError> {
        Ok(data(body, "orders")?.iter().map(parse_order_value).collect())
    }

    fn balance_request(&self) -> Result<RequestSpec, SdkError> {
        Ok(RequestSpec::get("/api/v5/account/balance")
            .private()
            .weight(PRIVATE, 1))
    }

    fn parse_balance(&self, body: &Value) -> Result<RawBalances, SdkError> {
        let account = first(body, "balance")?;
        Ok(RawBalances {
            timestamp: i64_field(account, "uTime"),
            assets: array_field(account, "details")
                .iter()
                .map(|d| RawBalance {
                    code: str_field(d, "ccy"),
                    free: str_field(d, "availBal"),
                    used: str_field(d, "frozenBal"),
                    total: None,
                })
                .collect(),
        })
    }

    fn subscribe_message(&self, subscription: &Subscription, _request_id: u64) -> Result<String, WsError> {
        Ok(op_message("subscribe", subscription))
    }

    fn unsubscribe_message(&self, subscription: &Subscription, _request_id: u64) -> Result<String, WsError> {
        Ok(op_message("unsubscribe", subscription))
    }

    fn ping_message(&self) -> Option<String> {
        Some("ping".into())
    }

    fn parse_ws_message(&self, text: &str) -> Result<Vec<WsMessage>, WsError> {
        if text == "pong" {
            return Ok(vec![WsMessage::Pong]);
        }
        let value: Value =
            serde_json::from_str(text).map_err(|e| WsError::ProtocolError(e.to_string()))?;
        let subscription = value.get("arg").and_then(subscription_from_arg);

        match value.get("event").and_then(Value::as_str) {
            Some("subscribe") | Some("unsubscribe") => {
                return Ok(vec![WsMessage::Ack { request_id: None }])
            }
            Some("error") => {
                return Ok(vec![WsMessage::Error {
                    subscription,
                    request_id: None,
                    code: str_field(&value, "code").unwrap_or_default(),
                    message: str_field(&value, "msg").unwrap_or_default(),
                }])
            }
            Some(_) => return Ok(Vec::new()),
            None => {}
        }

        let Some(subscription) = subscription else {
            return Ok(Vec::new());
        };
        let items = array_field(&value, "data");
        let messages = match subscription.channel {
            Channel::OrderBook => {
                let snapshot = value.get("action").and_then(Value::as_str) == Some("snapshot");
                items
                    .iter()
                    .map(|book| {
                        if snapshot {
                            WsMessage::BookSnapshot {
                                subscription: subscription.clone(),
                                book: parse_book(book, subscription.market_id.clone()),
                            }
                        } else {
                            WsMessage::BookDelta {
                                subscription: subscription.clone(),
                                delta: RawBookDelta {
                                    market_id: Some(subscription.market_id.clone()),
                                    bids: parse_levels(book.get("bids")),
                                    asks: parse_levels(book.get("asks")),
                                    first_seq: None,
                                    last_seq: u64_field(book, "seqId"),
                                    prev_seq: u64_field(book, "prevSeqId"),
                                    timestamp: i64_field(book, "ts"),
                                },
                            }
                        }
                    })
                    .collect()
            }
            Channel::Trades => vec![WsMessage::Trades {
                trades: items.iter().map(parse_trade_value).collect(),
                subscription,
            }],
        };
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::balance::Balances;
    use crate::normalize::{normalize, NormalizeContext};
    use rust_decimal::Decimal;

    fn btc_usdt() -> Market {
        let body = json!({
            "code": "0", "msg": "",
            "data": [{
                "instId": "BTC-USDT", "instType": "SPOT", "baseCcy": "BTC", "quoteCcy": "USDT",
                "tickSz": "0.1", "lotSz": "0.00000001", "minSz": "0.00001", "maxLmtSz": "9999999999",
                "state": "live"
            }]
        });
        let raw = OkxAdapter::new().parse_markets(&body).unwrap();
        normalize(raw[0].clone(), &NormalizeContext::new(ID)).unwrap()
    }

    #[test]
    fn test_parse_instruments() {
        let market = btc_usdt();
        assert_eq!(market.id, "BTC-USDT");
        assert_eq!(market.symbol.as_str(), "BTC/USDT");
        assert_eq!(market.precision.price, 1);
        assert_eq!(market.precision.amount, 8);
        assert_eq!(market.limits.amount.min, Some(Decimal::new(1, 5)));
    }

    #[test]
    fn test_parse_error_envelope_and_item_codes() {
        let adapter = OkxAdapter::new();
        let err = adapter
            .parse_error(200, &json!({"code": "51001", "msg": "Instrument ID does not exist", "data": []}))
            .unwrap();
        assert_eq!(err.kind(), ExchangeErrorKind::BadSymbol);

        let err = adapter
            .parse_error(
                200,
                &json!({"code": "1", "msg": "Operation failed.",
                        "data": [{"ordId": "", "sCode": "51008", "sMsg": "Order failed. Insufficient USDT balance"}]}),
            )
            .unwrap();
        assert_eq!(err.kind(), ExchangeErrorKind::InsufficientFunds);
        assert_eq!(err.code(), "51008");

        assert!(adapter
            .parse_error(200, &json!({"code": "0", "msg": "", "data": [{"ordId": "1", "sCode": "0"}]}))
            .is_none());
    }

    #[test]
    fn test_create_order_body() {
        let adapter = OkxAdapter::new();
        let market = btc_usdt();
        let request = OrderRequest::market(market.symbol.clone(), Side::Buy, Decimal::new(15, 4));
        let spec = adapter.create_order_request(&request, &market).unwrap();
        assert_eq!(
            spec.body,
            Some(json!({
                "instId": "BTC-USDT", "tdMode": "cash", "side": "buy",
                "ordType": "market", "sz": "0.0015", "tgtCcy": "base_ccy"
            }))
        );
        assert_eq!(spec.weight, TRADE);

        let body = json!({"code": "0", "msg": "", "data": [{"ordId": "312269865356374016", "clOrdId": "", "sCode": "0", "sMsg": ""}]});
        let raw = adapter.parse_create_order(&body, &request, &market).unwrap();
        assert_eq!(raw.id.as_deref(), Some("312269865356374016"));
        assert_eq!(raw.status, Some(OrderStatus::Open));
        assert_eq!(raw.filled.as_deref(), Some("0"));
    }

    #[test]
    fn test_cancel_is_acknowledged() {
        let adapter = OkxAdapter::new();
        let body = json!({"code": "0", "msg": "", "data": [{"ordId": "42", "sCode": "0", "sMsg": ""}]});
        assert_eq!(
            adapter.parse_cancel_order(&body, "42", &btc_usdt()).unwrap(),
            CancelOutcome::Acknowledged { id: "42".into() }
        );
    }

    #[test]
    fn test_parse_balance() {
        let body = json!({"code": "0", "data": [{
            "uTime": "1705474164160",
            "details": [
                {"ccy": "BTC", "availBal": "1.5", "frozenBal": "0.5", "eq": "2"},
                {"ccy": "USDT", "availBal": "100", "frozenBal": "0", "eq": "100"}
            ]
        }]});
        let raw = OkxAdapter::new().parse_balance(&body).unwrap();
        let balances: Balances = normalize(raw, &NormalizeContext::new(ID)).unwrap();
        assert_eq!(balances.total("BTC"), Decimal::from(2));
        assert_eq!(balances.free("USDT"), Decimal::from(100));
    }

    #[test]
    fn test_ws_books_snapshot_and_update() {
        let adapter = OkxAdapter::new();
        let snapshot = r#"{"arg":{"channel":"books","instId":"BTC-USDT"},"action":"snapshot",
            "data":[{"asks":[["30001.0","1","0","1"]],"bids":[["30000.0","2","0","1"]],
            "ts":"1597026383085","checksum":0,"prevSeqId":-1,"seqId":100}]}"#;
        let messages = adapter.parse_ws_message(snapshot).unwrap();
        let [WsMessage::BookSnapshot { book, .. }] = &messages[..] else {
            panic!("expected snapshot, got {messages:?}");
        };
        assert_eq!(book.nonce, Some(100));
        assert_eq!(book.bids[0].amount.as_deref(), Some("2"));

        let update = r#"{"arg":{"channel":"books","instId":"BTC-USDT"},"action":"update",
            "data":[{"asks":[],"bids":[["30000.0","0","0","0"]],"ts":"1597026383086","prevSeqId":100,"seqId":101}]}"#;
        let messages = adapter.parse_ws_message(update).unwrap();
        let [WsMessage::BookDelta { delta, .. }] = &messages[..] else {
            panic!("expected delta");
        };
        assert_eq!(delta.prev_seq, Some(100));
        assert_eq!(delta.last_seq, Some(101));
    }

    #[test]
    fn test_ws_control_frames() {
        let adapter = OkxAdapter::new();
        assert_eq!(adapter.parse_ws_message("pong").unwrap(), vec![WsMessage::Pong]);
        assert_eq!(
            adapter
                .parse_ws_message(r#"{"event":"subscribe","arg":{"channel":"trades","instId":"BTC-USDT"}}"#)
                .unwrap(),
            vec![WsMessage::Ack { request_id: None }]
        );
        assert_eq!(
            adapter
                .parse_ws_message(
                    r#"{"event":"error","code":"60018","msg":"Wrong URL or channel","arg":{"channel":"books","instId":"NOPE"}}"#
                )
                .unwrap(),
            vec![WsMessage::Error {
                subscription: Some(Subscription::order_book("NOPE")),
                request_id: None,
                code: "60018".into(),
                message: "Wrong URL or channel".into(),
            }]
        );
        let sub: Value = serde_json::from_str(
            &adapter.subscribe_message(&Subscription::trades("BTC-USDT"), 1).unwrap(),
        )
        .unwrap();
        assert_eq!(sub, json!({"op": "subscribe", "args": [{"channel": "trades", "instId": "BTC-USDT"}]}));
    }

    #[test]
    fn test_parse_fills() {
        let adapter = OkxAdapter::new();
        let market = btc_usdt();
        let spec = adapter.my_trades_request(Some(&market), None).unwrap();
        assert_eq!(spec.path, "/api/v5/trade/fills");
        assert_eq!(spec.query_string(), "instType=SPOT&instId=BTC-USDT");

        let body = json!({"code": "0", "msg": "", "data": [{
            "instType": "SPOT", "instId": "BTC-USDT", "tradeId": "123", "ordId": "312269865356374016",
            "clOrdId": "", "billId": "1", "fillPx": "30000.1", "fillSz": "0.01", "side": "sell",
            "execType": "M", "feeCcy": "USDT", "fee": "-0.3", "ts": "1597026383085"
        }]});
        let raw = adapter.parse_my_trades(&body, Some(&market)).unwrap();
        assert_eq!(raw[0].order_id.as_deref(), Some("312269865356374016"));
        assert_eq!(raw[0].side, Some(Side::Sell));
        assert_eq!(raw[0].taker_or_maker, Some(TakerOrMaker::Maker));
        assert_eq!(raw[0].timestamp, Some(1597026383085));
    }
}
