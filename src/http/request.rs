//! Request and response models shared by adapters, signers and transports.
//!
//! Adapters describe an endpoint call as a `RequestSpec`. A signer (or
//! `HttpRequest::unsigned` for public endpoints) turns it into a concrete
//! `HttpRequest` that a `Transport` can send.

use serde_json::Value;

use crate::http::retry::RetryPolicy;
use crate::throttle::WeightClass;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether an endpoint requires signing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Api {
    Public,
    Private,
}

/// Unsigned description of one endpoint call.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    pub method: HttpMethod,
    pub api: Api,
    /// Path relative to the REST base URL, starting with `/`.
    pub path: String,
    /// Query parameters in the order they are sent (and signed).
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub weight: WeightClass,
    pub cost: u32,
    pub retry: RetryPolicy,
}

impl RequestSpec {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            api: Api::Public,
            path: path.into(),
            query: Vec::new(),
            body: None,
            weight: WeightClass::DEFAULT,
            cost: 1,
            retry: RetryPolicy::for_method(method),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    pub fn private(mut self) -> Self {
        self.api = Api::Private;
        self
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn query_opt<T: ToString>(self, key: &str, value: Option<T>) -> Self {
        match value {
            Some(v) => self.query(key, v),
            None => self,
        }
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn weight(mut self, class: WeightClass, cost: u32) -> Self {
        self.weight = class;
        self.cost = cost;
        self
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// URL-encoded query string without the leading `?`.
    pub fn query_string(&self) -> String {
        encode_query(&self.query)
    }

    /// `path` plus `?query` when there is a query.
    pub fn path_and_query(&self) -> String {
        let query = self.query_string();
        if query.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, query)
        }
    }

    pub fn body_string(&self) -> Option<String> {
        self.body.as_ref().map(Value::to_string)
    }
}

/// URL-encode `key=value` pairs joined by `&`, preserving order.
pub fn encode_query(params: &[(String, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// A fully built request, ready for the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    /// Build a request for a public endpoint.
    pub fn unsigned(spec: &RequestSpec, base_url: &str) -> Self {
        let mut request = Self {
            method: spec.method,
            url: format!("{}{}", base_url.trim_end_matches('/'), spec.path_and_query()),
            headers: Vec::new(),
            body: spec.body_string(),
        };
        if request.body.is_some() {
            request.set_header("Content-Type", "application/json");
        }
        request
    }

    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.into()));
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// Raw response of a single attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// `Retry-After` in milliseconds, when given in seconds.
    pub fn retry_after_ms(&self) -> Option<u64> {
        self.header("Retry-After")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(|secs| secs * 1000)
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}
