//! HTTP layer — request model, transport, retry policies and the throttled
//! executor `ExchangeHttp`.

pub mod client;
pub mod request;
pub mod retry;
pub mod transport;

pub use client::{ExchangeHttp, RequestBuilder};
pub use request::{Api, HttpMethod, HttpRequest, HttpResponse, RequestSpec};
pub use retry::{RetryConfig, RetryPolicy};
#[cfg(feature = "http")]
pub use transport::ReqwestTransport;
pub use transport::Transport;
