//! Retry policies for HTTP requests.
//!
//! Only transient failures are retried: transport errors (connection reset,
//! timeout) and gateway statuses. 4xx responses, 429 included, are exchange
//! answers and are surfaced immediately.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::request::HttpMethod;

/// Retry policy for an HTTP request.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RetryPolicy {
    /// No retries. Default for order placement and cancellation.
    #[default]
    None,
    /// Retry with the exchange's configured `RetryConfig`.
    /// Default for GET endpoints.
    Idempotent,
    /// User-provided retry logic.
    Custom(RetryConfig),
}

impl RetryPolicy {
    /// Default policy for a method: reads are idempotent, writes are not.
    pub fn for_method(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => RetryPolicy::Idempotent,
            _ => RetryPolicy::None,
        }
    }

    /// The effective config, or `None` when the request must not be retried.
    pub fn resolve(&self, exchange_default: &RetryConfig) -> Option<RetryConfig> {
        match self {
            RetryPolicy::None => None,
            RetryPolicy::Idempotent => Some(exchange_default.clone()),
            RetryPolicy::Custom(c) => Some(c.clone()),
        }
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not counting the initial request).
    pub max_retries: u32,
    /// Initial delay before the first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Multiplier applied to the delay after each retry.
    pub backoff_factor: f64,
    /// Whether to add jitter to the delay.
    pub jitter: bool,
    /// 5xx status codes that trigger a retry.
    pub retryable_statuses: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
            backoff_factor: 2.0,
            jitter: true,
            retryable_statuses: vec![502, 503, 504],
        }
    }
}

impl RetryConfig {
    /// Whether a response status warrants another attempt. Never true for 4xx.
    pub fn should_retry_status(&self, status: u16) -> bool {
        status >= 500 && self.retryable_statuses.contains(&status)
    }

    /// Calculate delay for a given attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_millis() as f64
            * self.backoff_factor.powi(attempt as i32);
        let capped = base.min(self.max_delay.as_millis() as f64);

        let final_ms = if self.jitter {
            let jitter_range = capped * 0.25;
            let jitter = (rand::random::<f64>() - 0.5) * 2.0 * jitter_range;
            (capped + jitter).max(0.0)
        } else {
            capped
        };

        Duration::from_millis(final_ms as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_defaults_by_method() {
        assert_eq!(RetryPolicy::for_method(HttpMethod::Get), RetryPolicy::Idempotent);
        assert_eq!(RetryPolicy::for_method(HttpMethod::Post), RetryPolicy::None);
        assert_eq!(RetryPolicy::for_method(HttpMethod::Delete), RetryPolicy::None);
        assert_eq!(RetryPolicy::default(), RetryPolicy::None);
    }

    #[test]
    fn test_resolve_uses_exchange_default_for_idempotent() {
        let exchange = RetryConfig {
            max_retries: 7,
            ..Default::default()
        };
        assert!(RetryPolicy::None.resolve(&exchange).is_none());
        assert_eq!(
            RetryPolicy::Idempotent.resolve(&exchange).unwrap().max_retries,
            7
        );
        let custom = RetryConfig {
            max_retries: 1,
            ..Default::default()
        };
        assert_eq!(
            RetryPolicy::Custom(custom).resolve(&exchange).unwrap().max_retries,
            1
        );
    }

    #[test]
    fn test_never_retries_client_errors() {
        let config = RetryConfig {
            retryable_statuses: vec![429, 502, 503],
            ..Default::default()
        };
        assert!(!config.should_retry_status(429));
        assert!(!config.should_retry_status(400));
        assert!(config.should_retry_status(502));
        assert!(!config.should_retry_status(500));
    }

    #[test]
    fn test_delay_for_attempt_no_jitter() {
        let config = RetryConfig {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            backoff_factor: 2.0,
            jitter: false,
            retryable_statuses: vec![502, 503, 504],
        };
        assert_eq!(config.delay_for_attempt(0).as_millis(), 100);
        assert_eq!(config.delay_for_attempt(1).as_millis(), 200);
        assert_eq!(config.delay_for_attempt(2).as_millis(), 400);
    }

    #[test]
    fn test_delay_caps_at_max() {
        let config = RetryConfig {
            max_retries: 5,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(2000),
            backoff_factor: 10.0,
            jitter: false,
            retryable_statuses: vec![],
        };
        assert_eq!(config.delay_for_attempt(3).as_millis(), 2000);
    }

    #[test]
    fn test_jitter_stays_within_quarter() {
        let config = RetryConfig {
            initial_delay: Duration::from_millis(1000),
            ..Default::default()
        };
        for _ in 0..50 {
            let ms = config.delay_for_attempt(0).as_millis();
            assert!((750..=1250).contains(&ms), "delay {ms}ms out of range");
        }
    }
}
