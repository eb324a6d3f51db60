//! Stream tests against a local WebSocket server.
//!
//! The server forwards every text frame it receives to the test and sends
//! whatever frames the test scripts, so subscription replay, book resync and
//! reconnects can be asserted end to end without network access.

#![cfg(feature = "ws-native")]

mod common;

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

use common::*;
use omniex::prelude::*;
use omniex::ws::WsConfig;

const STEP: Duration = Duration::from_secs(5);

enum ServerEvent {
    Connected(mpsc::UnboundedSender<Message>),
    Text(String),
}

struct MockServer {
    url: String,
    events: mpsc::UnboundedReceiver<ServerEvent>,
}

impl MockServer {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let (events_tx, events) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let events_tx = events_tx.clone();
                tokio::spawn(async move {
                    let Ok(ws) = tokio_tungstenite::accept_async(stream).await else {
                        return;
                    };
                    let (mut sink, mut source) = ws.split();
                    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();
                    let _ = events_tx.send(ServerEvent::Connected(out_tx));

                    loop {
                        tokio::select! {
                            out = out_rx.recv() => {
                                let Some(frame) = out else { break };
                                let closing = matches!(frame, Message::Close(_));
                                if sink.send(frame).await.is_err() || closing {
                                    break;
                                }
                            }
                            incoming = source.next() => match incoming {
                                Some(Ok(Message::Text(text))) => {
                                    let text: &str = text.as_ref();
                                    if text == "ping" {
                                        let _ = sink.send(Message::Text("pong".into())).await;
                                    } else {
                                        let _ = events_tx.send(ServerEvent::Text(text.to_string()));
                                    }
                                }
                                Some(Ok(_)) => {}
                                _ => break,
                            },
                        }
                    }
                });
            }
        });

        Self { url, events }
    }

    async fn next_connection(&mut self) -> mpsc::UnboundedSender<Message> {
        match timeout(STEP, self.events.recv()).await {
            Ok(Some(ServerEvent::Connected(tx))) => tx,
            Ok(Some(ServerEvent::Text(text))) => panic!("expected a connection, got {text}"),
            _ => panic!("no connection"),
        }
    }

    async fn next_text(&mut self) -> Value {
        match timeout(STEP, self.events.recv()).await {
            Ok(Some(ServerEvent::Text(text))) => serde_json::from_str(&text).unwrap(),
            Ok(Some(ServerEvent::Connected(_))) => panic!("expected a frame, got a connection"),
            _ => panic!("no frame"),
        }
    }
}

fn send(tx: &mpsc::UnboundedSender<Message>, frame: Value) {
    tx.send(Message::Text(frame.to_string().into())).unwrap();
}

fn test_ws_config() -> WsConfig {
    WsConfig {
        base_reconnect_delay_ms: 10,
        max_reconnect_delay_ms: 50,
        max_jitter_ms: 0,
        connect_timeout_ms: 2_000,
        ..WsConfig::default()
    }
}

fn exchange(adapter: impl ExchangeAdapter + 'static, transport: Arc<ScriptedTransport>, url: &str) -> Exchange {
    Exchange::builder(adapter)
        .transport(transport)
        .ws_url(url)
        .config_override(ConfigOverride {
            ws: Some(test_ws_config()),
            ..Default::default()
        })
        .build()
        .unwrap()
}

async fn next_book(stream: &mut OrderBookStream) -> Arc<OrderBook> {
    timeout(STEP, stream.next())
        .await
        .expect("timed out waiting for a book")
        .expect("stream ended")
        .expect("stream failed")
}

/// Skip conflated intermediate books until `pred` holds.
async fn book_where(stream: &mut OrderBookStream, pred: impl Fn(&OrderBook) -> bool) -> Arc<OrderBook> {
    loop {
        let book = next_book(stream).await;
        if pred(&book) {
            return book;
        }
    }
}

fn okx_books_arg() -> Value {
    json!({"channel": "books", "instId": "BTC-USDT"})
}

fn okx_book_frame(action: &str, prev: i64, seq: u64, bids: Value, asks: Value) -> Value {
    json!({
        "arg": okx_books_arg(),
        "action": action,
        "data": [{
            "bids": bids,
            "asks": asks,
            "ts": "1700000000000",
            "prevSeqId": prev,
            "seqId": seq
        }]
    })
}

// ─── Order books ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_okx_book_resubscribes_on_sequence_gap() {
    let mut server = MockServer::start().await;
    let transport = ScriptedTransport::new();
    transport.json("/api/v5/public/instruments", 200, okx_instruments());
    let okx = exchange(OkxAdapter::new(), transport, &server.url);

    let mut stream = okx.watch_order_book(&btc_usdt()).await.unwrap();
    let conn = server.next_connection().await;
    let subscribe = server.next_text().await;
    assert_eq!(subscribe, json!({"op": "subscribe", "args": [okx_books_arg()]}));

    send(&conn, json!({"event": "subscribe", "arg": okx_books_arg(), "connId": "a1"}));
    send(
        &conn,
        okx_book_frame("snapshot", -1, 100, json!([["30000.0", "2", "0", "1"]]), json!([["30001.0", "1", "0", "1"]])),
    );
    let book = next_book(&mut stream).await;
    assert_eq!(book.nonce, Some(100));
    assert_eq!(book.best_bid().unwrap().amount, dec!(2));

    // Chained update: remove the top bid, add a lower one.
    send(
        &conn,
        okx_book_frame(
            "update",
            100,
            101,
            json!([["30000.0", "0", "0", "0"], ["29999.5", "3", "0", "1"]]),
            json!([]),
        ),
    );
    let book = next_book(&mut stream).await;
    assert_eq!(book.nonce, Some(101));
    assert_eq!(book.bids.len(), 1);
    assert_eq!(book.best_bid().unwrap().price, dec!(29999.5));

    // Gap: 101 → (105) 106. The watcher asks for a fresh snapshot.
    send(
        &conn,
        okx_book_frame("update", 105, 106, json!([["29000.0", "9", "0", "1"]]), json!([])),
    );
    assert_eq!(
        server.next_text().await,
        json!({"op": "unsubscribe", "args": [okx_books_arg()]})
    );
    assert_eq!(server.next_text().await, subscribe);

    send(
        &conn,
        okx_book_frame("snapshot", -1, 200, json!([["29998.0", "4", "0", "1"]]), json!([["29999.0", "1", "0", "1"]])),
    );
    let book = next_book(&mut stream).await;
    assert_eq!(book.nonce, Some(200));
    assert_eq!(book.best_bid().unwrap().price, dec!(29998.0));
    // The out-of-sequence level never made it into the book.
    assert!(book.bids.iter().all(|l| l.price != dec!(29000.0)));

    // Dropping the stream unsubscribes.
    drop(stream);
    assert_eq!(
        server.next_text().await,
        json!({"op": "unsubscribe", "args": [okx_books_arg()]})
    );
    okx.close().await;
}

#[tokio::test]
async fn test_binance_book_syncs_from_rest_snapshot() {
    let mut server = MockServer::start().await;
    let transport = ScriptedTransport::new();
    transport.json("/api/v3/exchangeInfo", 200, binance_exchange_info());
    transport.json(
        "/api/v3/depth",
        200,
        json!({
            "lastUpdateId": 100,
            "bids": [["30000.00", "1.00000"], ["29999.00", "2.00000"]],
            "asks": [["30001.00", "1.50000"]]
        }),
    );
    let binance = exchange(BinanceAdapter::new(), transport.clone(), &server.url);

    let mut stream = binance.watch_order_book(&btc_usdt()).await.unwrap();
    let conn = server.next_connection().await;
    let subscribe = server.next_text().await;
    assert_eq!(subscribe["method"], "SUBSCRIBE");
    assert_eq!(subscribe["params"], json!(["btcusdt@depth@100ms"]));

    // Straddles the snapshot: U <= 101 <= u.
    send(
        &conn,
        json!({
            "e": "depthUpdate", "E": 1700000000000i64, "s": "BTCUSDT",
            "U": 95, "u": 105,
            "b": [["29999.00", "0.00000"]],
            "a": [["30001.00", "0.50000"]]
        }),
    );
    let book = book_where(&mut stream, |b| b.nonce == Some(105)).await;
    assert_eq!(book.bids.len(), 1);
    assert_eq!(book.best_ask().unwrap().amount, dec!(0.5));

    send(
        &conn,
        json!({
            "e": "depthUpdate", "E": 1700000000100i64, "s": "BTCUSDT",
            "U": 106, "u": 107,
            "b": [["30000.50", "0.25000"]],
            "a": []
        }),
    );
    let book = book_where(&mut stream, |b| b.nonce == Some(107)).await;
    assert_eq!(book.best_bid().unwrap().price, dec!(30000.50));

    // A gap is recovered from a new REST snapshot.
    transport.replace_json(
        "/api/v3/depth",
        200,
        json!({"lastUpdateId": 300, "bids": [["29500.00", "1.00000"]], "asks": [["29501.00", "1.00000"]]}),
    );
    send(
        &conn,
        json!({
            "e": "depthUpdate", "E": 1700000000200i64, "s": "BTCUSDT",
            "U": 250, "u": 260,
            "b": [["1.00", "1.00000"]],
            "a": []
        }),
    );
    let book = book_where(&mut stream, |b| b.nonce == Some(300)).await;
    assert_eq!(book.best_bid().unwrap().price, dec!(29500.00));
    assert!(transport.calls_to("/api/v3/depth").len() >= 2);

    binance.close().await;
}

// ─── Trades and reconnects ───────────────────────────────────────────────────

#[tokio::test]
async fn test_trades_resume_after_reconnect() {
    let mut server = MockServer::start().await;
    let transport = ScriptedTransport::new();
    transport.json("/api/v5/public/instruments", 200, okx_instruments());
    let okx = exchange(OkxAdapter::new(), transport, &server.url);

    let mut trades = okx.watch_trades(&btc_usdt()).await.unwrap();
    let conn = server.next_connection().await;
    let subscribe = server.next_text().await;
    assert_eq!(
        subscribe,
        json!({"op": "subscribe", "args": [{"channel": "trades", "instId": "BTC-USDT"}]})
    );

    let trade_frame = |id: &str, px: &str| {
        json!({
            "arg": {"channel": "trades", "instId": "BTC-USDT"},
            "data": [{"instId": "BTC-USDT", "tradeId": id, "px": px, "sz": "0.1", "side": "sell", "ts": "1700000000000"}]
        })
    };
    send(&conn, trade_frame("1", "30000.0"));
    let batch = timeout(STEP, trades.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].id, "1");
    assert_eq!(batch[0].side, Side::Sell);
    assert_eq!(batch[0].cost, dec!(3000));
    assert_eq!(okx.ws_state().await, ConnectionState::Subscribed);

    // Server drops the connection; the client reconnects and replays.
    conn.send(Message::Close(None)).unwrap();
    let conn = server.next_connection().await;
    assert_eq!(server.next_text().await, subscribe);

    send(&conn, trade_frame("2", "30010.0"));
    let batch = timeout(STEP, trades.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(batch[0].id, "2");
    assert_eq!(batch[0].price, dec!(30010.0));

    okx.close().await;
    assert!(timeout(STEP, trades.next()).await.unwrap().is_none());
    assert_eq!(okx.ws_state().await, ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_rejected_subscription_fails_the_stream() {
    let mut server = MockServer::start().await;
    let transport = ScriptedTransport::new();
    transport.json("/api/v5/public/instruments", 200, okx_instruments());
    let okx = exchange(OkxAdapter::new(), transport, &server.url);

    let mut trades = okx.watch_trades(&btc_usdt()).await.unwrap();
    let conn = server.next_connection().await;
    server.next_text().await;

    send(
        &conn,
        json!({
            "event": "error",
            "code": "60012",
            "msg": "Invalid request",
            "arg": {"channel": "trades", "instId": "BTC-USDT"}
        }),
    );
    let err = timeout(STEP, trades.next()).await.unwrap().unwrap().unwrap_err();
    assert!(matches!(
        err,
        SdkError::Ws(omniex::error::WsError::SubscriptionRejected { ref code, .. }) if code == "60012"
    ));
    assert!(timeout(STEP, trades.next()).await.unwrap().is_none());

    okx.close().await;
}

#[tokio::test]
async fn test_binance_rejection_is_matched_by_request_id() {
    let mut server = MockServer::start().await;
    let transport = ScriptedTransport::new();
    transport.json("/api/v3/exchangeInfo", 200, binance_exchange_info());
    let binance = exchange(BinanceAdapter::new(), transport, &server.url);

    let mut trades = binance.watch_trades(&btc_usdt()).await.unwrap();
    let conn = server.next_connection().await;
    let subscribe = server.next_text().await;
    assert_eq!(subscribe["params"], json!(["btcusdt@trade"]));
    let id = subscribe["id"].as_u64().unwrap();

    send(&conn, json!({"error": {"code": 2, "msg": "Invalid request: unknown stream"}, "id": id}));
    let err = timeout(STEP, trades.next()).await.unwrap().unwrap().unwrap_err();
    assert!(matches!(
        err,
        SdkError::Ws(omniex::error::WsError::SubscriptionRejected { ref code, .. }) if code == "2"
    ));
    assert!(timeout(STEP, trades.next()).await.unwrap().is_none());

    binance.close().await;
}

#[tokio::test]
async fn test_malformed_trade_batch_is_reported_and_stream_continues() {
    let mut server = MockServer::start().await;
    let transport = ScriptedTransport::new();
    transport.json("/api/v5/public/instruments", 200, okx_instruments());
    let okx = exchange(OkxAdapter::new(), transport, &server.url);

    let mut trades = okx.watch_trades(&btc_usdt()).await.unwrap();
    let conn = server.next_connection().await;
    server.next_text().await;

    let trade_frame = |id: &str, px: &str| {
        json!({
            "arg": {"channel": "trades", "instId": "BTC-USDT"},
            "data": [{"instId": "BTC-USDT", "tradeId": id, "px": px, "sz": "0.1", "side": "buy", "ts": "1700000000000"}]
        })
    };
    send(&conn, trade_frame("1", "not-a-price"));
    let err = timeout(STEP, trades.next()).await.unwrap().unwrap().unwrap_err();
    assert!(matches!(err, SdkError::Normalize(_)));

    send(&conn, trade_frame("2", "30000.0"));
    let batch = timeout(STEP, trades.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(batch[0].id, "2");

    okx.close().await;
}

#[tokio::test]
async fn test_watch_requires_a_stream_url() {
    let transport = ScriptedTransport::new();
    transport.json("/api/v5/public/instruments", 200, okx_instruments());
    let okx = Exchange::builder(NoStreams(OkxAdapter::new()))
        .transport(transport)
        .build()
        .unwrap();
    assert!(okx.config().urls.ws.is_none());

    let err = okx.watch_trades(&btc_usdt()).await.err().unwrap();
    assert!(matches!(err, SdkError::NotSupported(_)));
    assert_eq!(okx.ws_state().await, ConnectionState::Disconnected);
}

/// OKX without a stream endpoint.
#[derive(Debug)]
struct NoStreams(OkxAdapter);

impl ExchangeAdapter for NoStreams {
    fn describe(&self) -> ExchangeConfig {
        let mut config = self.0.describe();
        config.urls.ws = None;
        config
    }

    fn capabilities(&self) -> Capabilities {
        self.0.capabilities()
    }

    fn parse_error(&self, status: u16, body: &Value) -> Option<ExchangeError> {
        self.0.parse_error(status, body)
    }

    fn markets_request(&self) -> Result<omniex::http::RequestSpec, SdkError> {
        self.0.markets_request()
    }

    fn parse_markets(&self, body: &Value) -> Result<Vec<omniex::domain::market::wire::RawMarket>, SdkError> {
        self.0.parse_markets(body)
    }
}
