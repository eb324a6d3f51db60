//! Shared test support: a scripted in-memory transport and exchange fixtures.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use omniex::error::TransportError;
use omniex::http::{HttpRequest, HttpResponse, Transport};
use omniex::shared::Symbol;

pub const NOW_MS: i64 = 1_700_000_000_000;

pub type Reply = Result<HttpResponse, TransportError>;

/// Answers requests by path from per-path queues. The last reply of a queue
/// repeats.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<Vec<(String, VecDeque<Reply>)>>,
    calls: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply(&self, path: &str, reply: Reply) {
        let mut routes = self.routes.lock().unwrap();
        match routes.iter_mut().find(|(p, _)| p == path) {
            Some((_, queue)) => queue.push_back(reply),
            None => routes.push((path.to_string(), VecDeque::from([reply]))),
        }
    }

    pub fn json(&self, path: &str, status: u16, body: Value) {
        self.reply(path, Ok(HttpResponse::new(status, body.to_string())));
    }

    /// Drop whatever is queued for `path` and answer with `body` from now on.
    pub fn replace_json(&self, path: &str, status: u16, body: Value) {
        let reply = Ok(HttpResponse::new(status, body.to_string()));
        let mut routes = self.routes.lock().unwrap();
        routes.retain(|(p, _)| p != path);
        routes.push((path.to_string(), VecDeque::from([reply])));
    }

    pub fn calls(&self) -> Vec<HttpRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, path: &str) -> Vec<HttpRequest> {
        self.calls()
            .into_iter()
            .filter(|r| path_of(&r.url) == path)
            .collect()
    }
}

pub fn path_of(url: &str) -> &str {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let path = without_scheme.find('/').map_or("", |i| &without_scheme[i..]);
    path.split('?').next().unwrap_or(path)
}

pub fn query_param<'a>(url: &'a str, key: &str) -> Option<&'a str> {
    let (_, query) = url.split_once('?')?;
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v)
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let path = path_of(&request.url).to_string();
        self.calls.lock().unwrap().push(request);

        let mut routes = self.routes.lock().unwrap();
        let queue = routes
            .iter_mut()
            .find(|(p, _)| *p == path)
            .map(|(_, q)| q)
            .unwrap_or_else(|| panic!("no scripted reply for {path}"));
        if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue.front().cloned().unwrap()
        }
    }
}

// ─── Fixtures ────────────────────────────────────────────────────────────────

pub fn btc_usdt() -> Symbol {
    Symbol::new("BTC", "USDT")
}

pub fn binance_exchange_info() -> Value {
    json!({
        "symbols": [{
            "symbol": "BTCUSDT",
            "status": "TRADING",
            "baseAsset": "BTC",
            "quoteAsset": "USDT",
            "filters": [
                {"filterType": "PRICE_FILTER", "minPrice": "0.01", "maxPrice": "1000000", "tickSize": "0.01"},
                {"filterType": "LOT_SIZE", "minQty": "0.00001", "maxQty": "9000", "stepSize": "0.00001"},
                {"filterType": "NOTIONAL", "minNotional": "5", "maxNotional": "9000000"}
            ]
        }]
    })
}

pub fn okx_instruments() -> Value {
    json!({
        "code": "0",
        "msg": "",
        "data": [{
            "instId": "BTC-USDT",
            "baseCcy": "BTC",
            "quoteCcy": "USDT",
            "state": "live",
            "tickSz": "0.1",
            "lotSz": "0.00000001",
            "minSz": "0.00001",
            "maxLmtSz": "9999999999"
        }]
    })
}

pub fn okx_books() -> Value {
    json!({
        "code": "0",
        "msg": "",
        "data": [{
            "asks": [["30001.5", "0.5", "0", "2"], ["30001.0", "1.25", "0", "3"]],
            "bids": [["30000.0", "2", "0", "1"], ["29999.9", "0.75", "0", "4"]],
            "ts": "1700000000123",
            "seqId": 42
        }]
    })
}
