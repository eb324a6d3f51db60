//! Throttled, retrying request executor — `ExchangeHttp`.
//!
//! Every attempt first acquires throttle budget for the request's weight class,
//! then builds (and for private calls, signs) the request, consumes the budget
//! once the request is handed to the transport, and honors the caller's
//! cancellation token while waiting, sending and backing off. Building after
//! the wait keeps signature timestamps fresh however long the queue is.
//! Internal to the SDK; the facade wraps this.

use std::sync::Arc;

use tokio::time::Instant;

use crate::cancel::CallOptions;
use crate::error::{NetworkError, SdkError, ThrottleError, TransportError};
use crate::http::request::{HttpRequest, HttpResponse};
use crate::http::retry::{RetryConfig, RetryPolicy};
use crate::http::transport::Transport;
use crate::throttle::{Throttle, WeightClass};

/// Builds a request for one attempt; called again on every retry.
pub type RequestBuilder<'a> = dyn Fn() -> Result<HttpRequest, SdkError> + Send + Sync + 'a;

/// Executes requests against one exchange.
#[derive(Clone)]
pub struct ExchangeHttp {
    transport: Arc<dyn Transport>,
    throttle: Throttle,
    retry: RetryConfig,
}

impl ExchangeHttp {
    pub fn new(transport: Arc<dyn Transport>, throttle: Throttle, retry: RetryConfig) -> Self {
        Self {
            transport,
            throttle,
            retry,
        }
    }

    pub fn throttle(&self) -> &Throttle {
        &self.throttle
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Send a fixed `request`; see `execute_with`.
    pub async fn execute(
        &self,
        request: &HttpRequest,
        class: &WeightClass,
        cost: u32,
        policy: &RetryPolicy,
        options: &CallOptions,
    ) -> Result<HttpResponse, SdkError> {
        self.execute_with(&|| Ok(request.clone()), class, cost, policy, options)
            .await
    }

    /// Send the request produced by `build`, retrying transient failures
    /// according to `policy`. `build` runs once per attempt, after the
    /// throttle grants budget; an error from it ends the call and refunds
    /// the budget.
    ///
    /// Returns the response for any status that is not retried (so the adapter
    /// can translate 4xx bodies). A retryable 5xx still failing on the last
    /// attempt is returned as-is; a transport failure on the last attempt
    /// becomes `NetworkError::MaxRetriesExceeded`.
    pub async fn execute_with(
        &self,
        build: &RequestBuilder<'_>,
        class: &WeightClass,
        cost: u32,
        policy: &RetryPolicy,
        options: &CallOptions,
    ) -> Result<HttpResponse, SdkError> {
        let config = policy.resolve(&self.retry);
        let max_retries = config.as_ref().map_or(0, |c| c.max_retries);
        let mut attempt = 0u32;

        loop {
            let outcome = self.attempt(build, class, cost, options).await?;

            let should_retry = match (&config, &outcome) {
                (Some(c), Ok(resp)) => c.should_retry_status(resp.status),
                (Some(_), Err(e)) => e.is_transient(),
                (None, _) => false,
            };

            if !should_retry {
                return outcome.map_err(|e| NetworkError::Transport(e).into());
            }

            if attempt >= max_retries {
                return match outcome {
                    Ok(resp) => Ok(resp),
                    Err(e) => Err(NetworkError::MaxRetriesExceeded {
                        attempts: attempt + 1,
                        last_error: e.to_string(),
                    }
                    .into()),
                };
            }

            let delay = config
                .as_ref()
                .map(|c| c.delay_for_attempt(attempt))
                .unwrap_or_default();
            tracing::debug!(
                attempt = attempt + 1,
                max = max_retries,
                delay_ms = delay.as_millis() as u64,
                reason = %describe(&outcome),
                "Retrying request"
            );

            tokio::select! {
                biased;
                _ = options.cancelled() => return Err(SdkError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }

    /// One throttled attempt. The outer error is fatal (throttle, cancel,
    /// build); the inner one is the transport's.
    async fn attempt(
        &self,
        build: &RequestBuilder<'_>,
        class: &WeightClass,
        cost: u32,
        options: &CallOptions,
    ) -> Result<Result<HttpResponse, TransportError>, SdkError> {
        let deadline = options.throttle_timeout.map(|t| Instant::now() + t);
        let permit = self
            .throttle
            .acquire(class, cost, deadline, options.cancel.as_ref())
            .await
            .map_err(|e| match e {
                ThrottleError::Cancelled => SdkError::Cancelled,
                other => SdkError::Throttle(other),
            })?;

        if options.is_cancelled() {
            return Err(SdkError::Cancelled);
        }
        // Dropping the unconsumed permit refunds it.
        let request = build()?;
        permit.consume();

        tokio::select! {
            biased;
            _ = options.cancelled() => Err(SdkError::Cancelled),
            result = self.transport.execute(request) => Ok(result),
        }
    }
}

fn describe(outcome: &Result<HttpResponse, TransportError>) -> String {
    match outcome {
        Ok(resp) => format!("status {}", resp.status),
        Err(e) => e.to_string(),
    }
}
