//! Binance spot adapter.
//!
//! Private endpoints are signed in the query string. Order books stream as
//! diffs (`depthUpdate`) on top of a REST snapshot.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use super::{
    parse_levels, require_market, unexpected, wire_decimal, BookResync, CancelOutcome,
    Capabilities, ErrorTable, ExchangeAdapter,
};
use crate::auth::{QueryHmacSigner, Signer};
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
use crate::network::{BINANCE_REST_URL, BINANCE_WS_URL};
use crate::shared::serde_util::{array_field, as_string, bool_field, i64_field, str_field, u64_field};
use crate::shared::Side;
use crate::throttle::{RateLimit, WeightClass};
use crate::ws::{Channel, Subscription, WsConfig, WsMessage};

pub const ID: &str = "binance";

/// Shared IP weight budget of every REST endpoint.
pub const REQUEST_WEIGHT: WeightClass = WeightClass::from_static("request_weight");
/// Order placement and cancellation budget.
pub const ORDERS: WeightClass = WeightClass::from_static("orders");

/// Option key of the signed-request validity window, in milliseconds.
pub const RECV_WINDOW: &str = "recvWindow";
const DEFAULT_RECV_WINDOW_MS: u64 = 5000;

const ERRORS: ErrorTable = ErrorTable::new(
    &[
        ("-1003", ExchangeErrorKind::RateLimited),
        ("-1015", ExchangeErrorKind::RateLimited),
        ("-1013", ExchangeErrorKind::InvalidOrder),
        ("-1111", ExchangeErrorKind::InvalidOrder),
        ("-1121", ExchangeErrorKind::BadSymbol),
        ("-2010", ExchangeErrorKind::InsufficientFunds),
        ("-2011", ExchangeErrorKind::OrderNotFound),
        ("-2013", ExchangeErrorKind::OrderNotFound),
        ("-1022", ExchangeErrorKind::AuthenticationFailed),
        ("-2014", ExchangeErrorKind::AuthenticationFailed),
        ("-2015", ExchangeErrorKind::AuthenticationFailed),
    ],
    &[
        ("insufficient balance", ExchangeErrorKind::InsufficientFunds),
        ("unknown order", ExchangeErrorKind::OrderNotFound),
        ("invalid symbol", ExchangeErrorKind::BadSymbol),
        ("filter failure", ExchangeErrorKind::InvalidOrder),
    ],
);

#[derive(Debug, Clone, Copy, Default)]
pub struct BinanceAdapter;

impl BinanceAdapter {
    pub fn new() -> Self {
        Self
    }
}

fn side_param(side: Side) -> &'static str {
    match side {
        Side::Buy => "BUY",
        Side::Sell => "SELL",
    }
}

fn parse_status(status: &str) -> Option<OrderStatus> {
    match status {
        "NEW" | "PARTIALLY_FILLED" | "PENDING_NEW" => Some(OrderStatus::Open),
        "FILLED" => Some(OrderStatus::Closed),
        "CANCELED" | "PENDING_CANCEL" => Some(OrderStatus::Canceled),
        "REJECTED" => Some(OrderStatus::Rejected),
        "EXPIRED" | "EXPIRED_IN_MATCH" => Some(OrderStatus::Expired),
        _ => None,
    }
}

fn parse_order_type(kind: &str) -> Option<OrderType> {
    match kind {
        "MARKET" => Some(OrderType::Market),
        k if k.contains("LIMIT") => Some(OrderType::Limit),
        _ => None,
    }
}

/// Find `key` of the filter with `filterType == kind`.
fn filter_field(filters: &[Value], kind: &str, key: &str) -> Option<String> {
    filters
        .iter()
        .find(|f| f.get("filterType").and_then(Value::as_str) == Some(kind))
        .and_then(|f| str_field(f, key))
}

fn parse_market(symbol: &Value) -> RawMarket {
    let filters = array_field(symbol, "filters");
    let notional = |key: &str| {
        filter_field(filters, "NOTIONAL", key).or_else(|| filter_field(filters, "MIN_NOTIONAL", key))
    };
    RawMarket {
        id: str_field(symbol, "symbol"),
        base: str_field(symbol, "baseAsset"),
        quote: str_field(symbol, "quoteAsset"),
        active: symbol
            .get("status")
            .and_then(Value::as_str)
            .map(|s| s == "TRADING"),
        tick_size: filter_field(filters, "PRICE_FILTER", "tickSize"),
        lot_size: filter_field(filters, "LOT_SIZE", "stepSize"),
        price_decimals: None,
        amount_decimals: None,
        min_amount: filter_field(filters, "LOT_SIZE", "minQty"),
        max_amount: filter_field(filters, "LOT_SIZE", "maxQty"),
        min_price: filter_field(filters, "PRICE_FILTER", "minPrice"),
        max_price: filter_field(filters, "PRICE_FILTER", "maxPrice"),
        min_cost: notional("minNotional"),
        max_cost: notional("maxNotional"),
    }
}

fn parse_order_value(order: &Value) -> RawOrder {
    let text = |key: &str| order.get(key).and_then(Value::as_str);
    RawOrder {
        id: str_field(order, "orderId"),
        client_order_id: str_field(order, "clientOrderId"),
        market_id: str_field(order, "symbol"),
        side: text("side").and_then(|s| Side::from_str(s).ok()),
        order_type: text("type").and_then(parse_order_type),
        status: text("status").and_then(parse_status),
        price: str_field(order, "price"),
        amount: str_field(order, "origQty"),
        filled: str_field(order, "executedQty"),
        remaining: None,
        average: None,
        cost: str_field(order, "cummulativeQuoteQty"),
        timestamp: i64_field(order, "time").or_else(|| i64_field(order, "transactTime")),
        last_update: i64_field(order, "updateTime"),
    }
}

fn parse_trade_value(trade: &Value, market_id: Option<String>) -> RawTrade {
    // The buyer being the maker means the aggressor sold.
    let side = bool_field(trade, "isBuyerMaker")
        .or_else(|| bool_field(trade, "m"))
        .map(|maker| if maker { Side::Sell } else { Side::Buy });
    RawTrade {
        id: str_field(trade, "id").or_else(|| str_field(trade, "t")),
        order_id: None,
        market_id: market_id.or_else(|| str_field(trade, "s")),
        side,
        price: str_field(trade, "price").or_else(|| str_field(trade, "p")),
        amount: str_field(trade, "qty").or_else(|| str_field(trade, "q")),
        cost: str_field(trade, "quoteQty"),
        timestamp: i64_field(trade, "time").or_else(|| i64_field(trade, "T")),
        taker_or_maker: None,
    }
}

/// An account fill from `myTrades`; the side is the account's own.
fn parse_my_trade_value(trade: &Value) -> RawTrade {
    RawTrade {
        id: str_field(trade, "id"),
        order_id: str_field(trade, "orderId"),
        market_id: str_field(trade, "symbol"),
        side: bool_field(trade, "isBuyer").map(|buyer| if buyer { Side::Buy } else { Side::Sell }),
        price: str_field(trade, "price"),
        amount: str_field(trade, "qty"),
        cost: str_field(trade, "quoteQty"),
        timestamp: i64_field(trade, "time"),
        taker_or_maker: bool_field(trade, "isMaker").map(|maker| {
            if maker {
                TakerOrMaker::Maker
            } else {
                TakerOrMaker::Taker
            }
        }),
    }
}

/// Stream names are the lower-cased market id plus a channel suffix.
fn stream_name(subscription: &Subscription) -> String {
    let market = subscription.market_id.to_ascii_lowercase();
    match subscription.channel {
        Channel::OrderBook => format!("{market}@depth@100ms"),
        Channel::Trades => format!("{market}@trade"),
    }
}

fn depth_weight(limit: Option<u32>) -> u32 {
    match limit.unwrap_or(100) {
        0..=100 => 5,
        101..=500 => 25,
        501..=1000 => 50,
        _ => 250,
    }
}

impl ExchangeAdapter for BinanceAdapter {
    fn describe(&self) -> ExchangeConfig {
        let mut rate_limits = BTreeMap::new();
        rate_limits.insert(REQUEST_WEIGHT, RateLimit::new(6000, Duration::from_secs(60)));
        rate_limits.insert(ORDERS, RateLimit::new(50, Duration::from_secs(10)));

        ExchangeConfig {
            id: ID.into(),
            name: "Binance".into(),
            alias: false,
            urls: Urls {
                rest: BINANCE_REST_URL.into(),
                ws: Some(BINANCE_WS_URL.into()),
            },
            rate_limits,
            retry: RetryConfig::default(),
            timeout: Duration::from_secs(10),
            ws: WsConfig::default(),
            options: BTreeMap::from([(RECV_WINDOW.to_string(), json!(DEFAULT_RECV_WINDOW_MS))]),
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
            cancel_all_orders: true,
            fetch_order: true,
            fetch_open_orders: true,
            fetch_closed_orders: true,
            fetch_balance: true,
            watch_order_book: true,
            watch_trades: true,
        }
    }

    fn signer(&self, config: &ExchangeConfig) -> Option<Arc<dyn Signer>> {
        let window = config.option_u64(RECV_WINDOW).unwrap_or(DEFAULT_RECV_WINDOW_MS);
        Some(Arc::new(QueryHmacSigner::new("X-MBX-APIKEY").with_recv_window(window)))
    }

    fn book_resync(&self) -> BookResync {
        BookResync::RestSnapshot
    }

    /// Binance errors are `{"code": -2010, "msg": "..."}`.
    fn parse_error(&self, _status: u16, body: &Value) -> Option<ExchangeError> {
        let code = i64_field(body, "code")?;
        let message = body.get("msg").and_then(Value::as_str)?;
        Some(ERRORS.translate(&code.to_string(), message))
    }

    fn markets_request(&self) -> Result<RequestSpec, SdkError> {
        Ok(RequestSpec::get("/api/v3/exchangeInfo").weight(REQUEST_WEIGHT, 20))
    }

    fn parse_markets(&self, body: &Value) -> Result<Vec<RawMarket>, SdkError> {
        let symbols = body
            .get("symbols")
            .and_then(Value::as_array)
            .ok_or_else(|| unexpected("exchangeInfo", body))?;
        Ok(symbols.iter().map(parse_market).collect())
    }

    fn order_book_request(&self, market: &Market, limit: Option<u32>) -> Result<RequestSpec, SdkError> {
        Ok(RequestSpec::get("/api/v3/depth")
            .query("symbol", &market.id)
            .query_opt("limit", limit)
            .weight(REQUEST_WEIGHT, depth_weight(limit)))
    }

    fn parse_order_book(&self, body: &Value, market: &Market) -> Result<RawOrderBook, SdkError> {
        let nonce = u64_field(body, "lastUpdateId").ok_or_else(|| unexpected("depth", body))?;
        Ok(RawOrderBook {
            market_id: Some(market.id.clone()),
            bids: parse_levels(body.get("bids")),
            asks: parse_levels(body.get("asks")),
            timestamp: None,
            nonce: Some(nonce),
        })
    }

    fn trades_request(&self, market: &Market, limit: Option<u32>) -> Result<RequestSpec, SdkError> {
        Ok(RequestSpec::get("/api/v3/trades")
            .query("symbol", &market.id)
            .query_opt("limit", limit)
            .weight(REQUEST_WEIGHT, 25))
    }

    fn parse_trades(&self, body: &Value, market: &Market) -> Result<Vec<RawTrade>, SdkError> {
        let trades = body.as_array().ok_or_else(|| unexpected("trades", body))?;
        Ok(trades
            .iter()
            .map(|t| parse_trade_value(t, Some(market.id.clone())))
            .collect())
    }

    fn my_trades_request(&self, market: Option<&Market>, limit: Option<u32>) -> Result<RequestSpec, SdkError> {
        let market = require_market(market, ID, "fetchMyTrades")?;
        Ok(RequestSpec::get("/api/v3/myTrades")
            .private()
            .query("symbol", &market.id)
            .query_opt("limit", limit)
            .weight(REQUEST_WEIGHT, 20))
    }

    fn parse_my_trades(&self, body: &Value, _market: Option<&Market>) -> Result<Vec<RawTrade>, SdkError> {
        let trades = body.as_array().ok_or_else(|| unexpected("myTrades", body))?;
        Ok(trades.iter().map(parse_my_trade_value).collect())
    }

    fn create_order_request(&self, request: &OrderRequest, market: &Market) -> Result<RequestSpec, SdkError> {
        let mut spec = RequestSpec::post("/api/v3/order")
            .private()
            .query("symbol", &market.id)
            .query("side", side_param(request.side))
            .query("type", request.order_type.as_str().to_ascii_uppercase())
            .query("quantity", wire_decimal(request.amount));
        if request.order_type == OrderType::Limit {
            let price = request
                .price
                .ok_or_else(|| SdkError::Validation("limit order requires a price".into()))?;
            spec = spec
                .query("timeInForce", "GTC")
                .query("price", wire_decimal(price));
        }
        Ok(spec
            .query_opt("newClientOrderId", request.client_order_id.as_deref())
            .query("newOrderRespType", "RESULT")
            .weight(ORDERS, 1))
    }

    fn parse_create_order(
        &self,
        body: &Value,
        _request: &OrderRequest,
        _market: &Market,
    ) -> Result<RawOrder, SdkError> {
        self.parse_order(body)
    }

    fn cancel_order_request(&self, id: &str, market: &Market) -> Result<RequestSpec, SdkError> {
        Ok(RequestSpec::delete("/api/v3/order")
            .private()
            .query("symbol", &market.id)
            .query("orderId", id)
            .weight(ORDERS, 1))
    }

    fn parse_cancel_order(&self, body: &Value, _id: &str, _market: &Market) -> Result<CancelOutcome, SdkError> {
        self.parse_order(body).map(CancelOutcome::Order)
    }

    fn cancel_all_orders_request(&self, market: Option<&Market>) -> Result<RequestSpec, SdkError> {
        let market = require_market(market, ID, "cancelAllOrders")?;
        Ok(RequestSpec::delete("/api/v3/openOrders")
            .private()
            .query("symbol", &market.id)
            .weight(ORDERS, 1))
    }

    fn parse_cancel_all_orders(&self, body: &Value) -> Result<Vec<RawOrder>, SdkError> {
        let orders = body.as_array().ok_or_else(|| unexpected("openOrders", body))?;
        // OCO lists come back alongside plain orders; only the latter carry an orderId.
        Ok(orders
            .iter()
            .filter(|o| o.get("orderId").is_some())
            .map(parse_order_value)
            .collect())
    }

    fn fetch_order_request(&self, id: &str, market: &Market) -> Result<RequestSpec, SdkError> {
        Ok(RequestSpec::get("/api/v3/order")
            .private()
            .query("symbol", &market.id)
            .query("orderId", id)
            .weight(REQUEST_WEIGHT, 4))
    }

    fn parse_order(&self, body: &Value) -> Result<RawOrder, SdkError> {
        if body.get("orderId").is_none() {
            return Err(unexpected("order", body));
        }
        Ok(parse_order_value(body))
    }

    fn open_orders_request(&self, market: Option<&Market>) -> Result<RequestSpec, SdkError> {
        let weight = if market.is_some() { 6 } else { 80 };
        Ok(RequestSpec::get("/api/v3/openOrders")
            .private()
            .query_opt("symbol", market.map(|m| m.id.as_str()))
            .weight(REQUEST_WEIGHT, weight))
    }

    fn closed_orders_request(&self, market: Option<&Market>) -> Result<RequestSpec, SdkError> {
        let market = require_market(market, ID, "fetchClosedOrders")?;
        Ok(RequestSpec::get("/api/v3/allOrders")
            .private()
            .query("symbol", &market.id)
            .weight(REQUEST_WEIGHT, 20))
    }

    fn parse_orders(&self, body: &Value) -> Result<Vec<RawOrder>, SdkError> {
        let orders = body.as_array().ok_or_else(|| unexpected("orders", body))?;
        Ok(orders.iter().map(parse_order_value).collect())
    }

    fn balance_request(&self) -> Result<RequestSpec, SdkError> {
        Ok(RequestSpec::get("/api/v3/account")
            .private()
            .query("omitZeroBalances", "true")
            .weight(REQUEST_WEIGHT, 20))
    }

    fn parse_balance(&self, body: &Value) -> Result<RawBalances, SdkError> {
        let balances = body
            .get("balances")
            .and_then(Value::as_array)
            .ok_or_else(|| unexpected("account", body))?;
        Ok(RawBalances {
            timestamp: i64_field(body, "updateTime"),
            assets: balances
                .iter()
                .map(|b| RawBalance {
                    code: str_field(b, "asset"),
                    free: str_field(b, "free"),
                    used: str_field(b, "locked"),
                    total: None,
                })
                .collect(),
        })
    }

    fn subscribe_message(&self, subscription: &Subscription, request_id: u64) -> Result<String, WsError> {
        Ok(json!({
            "method": "SUBSCRIBE",
            "params": [stream_name(subscription)],
            "id": request_id,
        })
        .to_string())
    }

    fn unsubscribe_message(&self, subscription: &Subscription, request_id: u64) -> Result<String, WsError> {
        Ok(json!({
            "method": "UNSUBSCRIBE",
            "params": [stream_name(subscription)],
            "id": request_id,
        })
        .to_string())
    }

    fn parse_ws_message(&self, text: &str) -> Result<Vec<WsMessage>, WsError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| WsError::ProtocolError(e.to_string()))?;
        // Combined streams wrap the payload as {"stream": ..., "data": ...}.
        let event = value.get("data").unwrap_or(&value);

        // Rejections only echo the request id of the failed subscribe.
        if let Some(error) = event.get("error") {
            return Ok(vec![WsMessage::Error {
                subscription: None,
                request_id: u64_field(event, "id"),
                code: error.get("code").and_then(as_string).unwrap_or_default(),
                message: str_field(error, "msg").unwrap_or_default(),
            }]);
        }
        if event.get("result").is_some() {
            return Ok(vec![WsMessage::Ack {
                request_id: u64_field(event, "id"),
            }]);
        }

        let market_id = str_field(event, "s");
        let message = match (event.get("e").and_then(Value::as_str), market_id) {
            (Some("depthUpdate"), Some(market_id)) => WsMessage::BookDelta {
                subscription: Subscription::order_book(market_id.clone()),
                delta: RawBookDelta {
                    market_id: Some(market_id),
                    bids: parse_levels(event.get("b")),
                    asks: parse_levels(event.get("a")),
                    first_seq: u64_field(event, "U"),
                    last_seq: u64_field(event, "u"),
                    prev_seq: None,
                    timestamp: i64_field(event, "E"),
                },
            },
            (Some("trade"), Some(market_id)) => WsMessage::Trades {
                subscription: Subscription::trades(market_id.clone()),
                trades: vec![parse_trade_value(event, Some(market_id))],
            },
            _ => return Ok(Vec::new()),
        };
        Ok(vec![message])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::MarketCatalog;
    use crate::normalize::{normalize, normalize_all, NormalizeContext};
    use rust_decimal::Decimal;
    use std::sync::Arc;

    fn exchange_info() -> Value {
        json!({
            "symbols": [{
                "symbol": "BTCUSDT",
                "status": "TRADING",
                "baseAsset": "BTC",
                "quoteAsset": "USDT",
                "filters": [
                    {"filterType": "PRICE_FILTER", "minPrice": "0.01000000", "maxPrice": "1000000.00000000", "tickSize": "0.01000000"},
                    {"filterType": "LOT_SIZE", "minQty": "0.00001000", "maxQty": "9000.00000000", "stepSize": "0.00001000"},
                    {"filterType": "NOTIONAL", "minNotional": "5.00000000", "maxNotional": "9000000.00000000"}
                ]
            }]
        })
    }

    fn btc_usdt() -> Market {
        let raw = BinanceAdapter::new().parse_markets(&exchange_info()).unwrap();
        normalize(raw[0].clone(), &NormalizeContext::new(ID)).unwrap()
    }

    #[test]
    fn test_parse_markets_reads_filters() {
        let market = btc_usdt();
        assert_eq!(market.symbol.as_str(), "BTC/USDT");
        assert_eq!(market.tick_size, Decimal::new(1, 2));
        assert_eq!(market.lot_size, Decimal::new(1, 5));
        assert_eq!(market.precision.price, 2);
        assert_eq!(market.precision.amount, 5);
        assert_eq!(market.limits.cost.min, Some(Decimal::from(5)));
        assert!(market.active);
    }

    #[test]
    fn test_parse_order_book() {
        let adapter = BinanceAdapter::new();
        let market = btc_usdt();
        let body = json!({
            "lastUpdateId": 1027024,
            "bids": [["30000.00", "0.50000"], ["29999.99", "1.00000"]],
            "asks": [["30000.01", "0.25000"]]
        });
        let raw = adapter.parse_order_book(&body, &market).unwrap();
        assert_eq!(raw.nonce, Some(1027024));
        assert_eq!(raw.bids.len(), 2);
        assert_eq!(raw.asks[0].price.as_deref(), Some("30000.01"));
    }

    #[test]
    fn test_parse_trades_side_from_maker_flag() {
        let adapter = BinanceAdapter::new();
        let market = btc_usdt();
        let body = json!([
            {"id": 28457, "price": "30000.00", "qty": "0.01000", "time": 1499865549590u64, "isBuyerMaker": true},
            {"id": 28458, "price": "30000.01", "qty": "0.02000", "time": 1499865549591u64, "isBuyerMaker": false}
        ]);
        let raw = adapter.parse_trades(&body, &market).unwrap();
        let ctx = NormalizeContext::new(ID).with_market(Arc::new(market));
        let trades: Vec<crate::domain::trade::Trade> = normalize_all(raw, &ctx).unwrap();
        assert_eq!(trades[0].side, Side::Sell);
        assert_eq!(trades[1].side, Side::Buy);
        assert_eq!(trades[0].cost, Decimal::new(300, 0));
    }

    #[test]
    fn test_create_order_request() {
        let adapter = BinanceAdapter::new();
        let market = btc_usdt();
        let request = OrderRequest::limit(
            market.symbol.clone(),
            Side::Buy,
            Decimal::new(100, 5),
            Decimal::new(3000000, 2),
        )
        .with_client_order_id("my-1");
        let spec = adapter.create_order_request(&request, &market).unwrap();
        assert_eq!(
            spec.query_string(),
            "symbol=BTCUSDT&side=BUY&type=LIMIT&quantity=0.001&timeInForce=GTC&price=30000\
             &newClientOrderId=my-1&newOrderRespType=RESULT"
        );
        assert_eq!(spec.weight, ORDERS);
    }

    #[test]
    fn test_parse_order_status_and_fill() {
        let adapter = BinanceAdapter::new();
        let body = json!({
            "symbol": "BTCUSDT", "orderId": 28, "clientOrderId": "my-1",
            "transactTime": 1507725176595u64, "price": "30000.00", "origQty": "0.00100",
            "executedQty": "0.00050", "cummulativeQuoteQty": "15.00000000",
            "status": "PARTIALLY_FILLED", "type": "LIMIT", "side": "BUY"
        });
        let raw = adapter.parse_order(&body).unwrap();
        assert_eq!(raw.status, Some(OrderStatus::Open));
        assert_eq!(raw.order_type, Some(OrderType::Limit));
        assert_eq!(raw.id.as_deref(), Some("28"));

        let catalog = Arc::new(MarketCatalog::new(vec![btc_usdt()]));
        let order: crate::domain::order::Order =
            normalize(raw, &NormalizeContext::new(ID).with_catalog(catalog)).unwrap();
        assert_eq!(order.remaining, Decimal::new(50, 5));
        assert_eq!(order.average, Some(Decimal::from(30000)));
    }

    #[test]
    fn test_parse_error_translation() {
        let adapter = BinanceAdapter::new();
        let err = adapter
            .parse_error(400, &json!({"code": -2010, "msg": "Account has insufficient balance for requested action."}))
            .unwrap();
        assert_eq!(err.kind(), ExchangeErrorKind::InsufficientFunds);
        assert_eq!(err.code(), "-2010");

        let err = adapter
            .parse_error(400, &json!({"code": -1100, "msg": "Illegal characters found in parameter."}))
            .unwrap();
        assert_eq!(err.kind(), ExchangeErrorKind::Rejected);

        assert!(adapter.parse_error(200, &json!({"symbols": []})).is_none());
    }

    #[test]
    fn test_cancel_all_requires_symbol() {
        let adapter = BinanceAdapter::new();
        assert!(matches!(
            adapter.cancel_all_orders_request(None),
            Err(SdkError::Validation(_))
        ));
    }

    #[test]
    fn test_ws_subscribe_and_depth_update() {
        let adapter = BinanceAdapter::new();
        let msg = adapter
            .subscribe_message(&Subscription::order_book("BTCUSDT"), 7)
            .unwrap();
        let value: Value = serde_json::from_str(&msg).unwrap();
        assert_eq!(value, json!({"method": "SUBSCRIBE", "params": ["btcusdt@depth@100ms"], "id": 7}));

        let frame = r#"{"e":"depthUpdate","E":123456789,"s":"BTCUSDT","U":157,"u":160,
            "b":[["30000.00","0.1"]],"a":[["30001.00","0"]]}"#;
        let messages = adapter.parse_ws_message(frame).unwrap();
        match &messages[..] {
            [WsMessage::BookDelta { subscription, delta }] => {
                assert_eq!(subscription, &Subscription::order_book("BTCUSDT"));
                assert_eq!(delta.first_seq, Some(157));
                assert_eq!(delta.last_seq, Some(160));
                assert_eq!(delta.asks[0].amount.as_deref(), Some("0"));
            }
            other => panic!("unexpected {other:?}"),
        }

        assert_eq!(
            adapter.parse_ws_message(r#"{"result":null,"id":7}"#).unwrap(),
            vec![WsMessage::Ack { request_id: Some(7) }]
        );
        assert!(adapter.parse_ws_message("not json").is_err());
    }

    #[test]
    fn test_ws_trade_event() {
        let adapter = BinanceAdapter::new();
        let frame = r#"{"e":"trade","E":1,"s":"BTCUSDT","t":12345,"p":"30000.00","q":"0.01000","T":2,"m":false}"#;
        let messages = adapter.parse_ws_message(frame).unwrap();
        let [WsMessage::Trades { trades, .. }] = &messages[..] else {
            panic!("expected trades");
        };
        assert_eq!(trades[0].id.as_deref(), Some("12345"));
        assert_eq!(trades[0].side, Some(Side::Buy));
        assert_eq!(trades[0].timestamp, Some(2));
    }

    #[test]
    fn test_parse_my_trades_keeps_order_and_liquidity() {
        let adapter = BinanceAdapter::new();
        let market = btc_usdt();
        let spec = adapter.my_trades_request(Some(&market), Some(50)).unwrap();
        assert_eq!(spec.path, "/api/v3/myTrades");
        assert_eq!(spec.query_string(), "symbol=BTCUSDT&limit=50");
        assert!(matches!(
            adapter.my_trades_request(None, None),
            Err(SdkError::Validation(_))
        ));

        let body = json!([{
            "symbol": "BTCUSDT", "id": 28457, "orderId": 100234, "orderListId": -1,
            "price": "30000.00", "qty": "0.01000", "quoteQty": "300.00",
            "commission": "0.00001", "commissionAsset": "BTC",
            "time": 1499865549590u64, "isBuyer": true, "isMaker": false, "isBestMatch": true
        }]);
        let raw = adapter.parse_my_trades(&body, Some(&market)).unwrap();
        assert_eq!(raw[0].order_id.as_deref(), Some("100234"));
        assert_eq!(raw[0].side, Some(Side::Buy));
        assert_eq!(raw[0].taker_or_maker, Some(TakerOrMaker::Taker));
        assert_eq!(raw[0].cost.as_deref(), Some("300.00"));
    }

    #[test]
    fn test_recv_window_follows_config() {
        let adapter = BinanceAdapter::new();
        let spec = RequestSpec::get("/api/v3/account").private();
        let creds = crate::auth::Credentials::new("key", "secret");

        let mut config = adapter.describe();
        let signed = adapter.signer(&config).unwrap().sign(&spec, "https://x", &creds, 1).unwrap();
        assert!(signed.url.contains("recvWindow=5000&"));

        config.options.insert(RECV_WINDOW.into(), json!(2500));
        let signed = adapter.signer(&config).unwrap().sign(&spec, "https://x", &creds, 1).unwrap();
        assert!(signed.url.contains("recvWindow=2500&"));
    }

    #[test]
    fn test_ws_error_carries_request_id() {
        let adapter = BinanceAdapter::new();
        let frame = r#"{"error":{"code":2,"msg":"Invalid request: unknown stream"},"id":9}"#;
        assert_eq!(
            adapter.parse_ws_message(frame).unwrap(),
            vec![WsMessage::Error {
                subscription: None,
                request_id: Some(9),
                code: "2".into(),
                message: "Invalid request: unknown stream".into(),
            }]
        );
    }
}
