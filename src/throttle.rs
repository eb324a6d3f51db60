//! Per-weight-class rate limiting.
//!
//! Each weight class owns a token bucket of `capacity` tokens. A spent token
//! returns to the bucket exactly one `period` after it was spent, so no window
//! of length `period` ever admits more than `capacity` weight.
//!
//! Waiters queue FIFO per class behind a fair gate. Different classes never
//! block each other. A caller-supplied deadline or cancellation aborts the wait
//! without consuming budget, and a `Permit` dropped before `consume()` returns
//! its tokens.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::cancel::CancelToken;
use crate::error::ThrottleError;

// ─── WeightClass ─────────────────────────────────────────────────────────────

/// Name of an independent request budget (e.g. `"request_weight"`, `"orders"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeightClass(Cow<'static, str>);

impl WeightClass {
    /// Class used by requests that do not name one.
    pub const DEFAULT: WeightClass = WeightClass::from_static("default");

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for WeightClass {
    fn default() -> Self {
        WeightClass::DEFAULT
    }
}

impl std::fmt::Display for WeightClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ─── RateLimit ───────────────────────────────────────────────────────────────

/// `capacity` units of weight per `period`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimit {
    pub capacity: u32,
    pub period: Duration,
}

impl RateLimit {
    pub const fn new(capacity: u32, period: Duration) -> Self {
        Self { capacity, period }
    }

    pub const fn per_second(capacity: u32) -> Self {
        Self::new(capacity, Duration::from_secs(1))
    }
}

// ─── Bucket ──────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct Spend {
    id: u64,
    at: Instant,
    weight: u32,
}

#[derive(Debug, Default)]
struct BucketState {
    spent: VecDeque<Spend>,
    in_window: u32,
    next_id: u64,
}

impl BucketState {
    /// Return tokens whose period has elapsed.
    fn expire(&mut self, now: Instant, period: Duration) {
        while let Some(front) = self.spent.front() {
            if front.at + period > now {
                break;
            }
            self.in_window -= front.weight;
            self.spent.pop_front();
        }
    }

    /// `None` if `weight` fits now, otherwise the instant at which it will.
    fn ready_at(&self, weight: u32, limit: &RateLimit) -> Option<Instant> {
        if self.in_window + weight <= limit.capacity {
            return None;
        }
        let excess = self.in_window + weight - limit.capacity;
        let mut freed = 0u32;
        for spend in &self.spent {
            freed += spend.weight;
            if freed >= excess {
                return Some(spend.at + limit.period);
            }
        }
        None
    }

    fn admit(&mut self, now: Instant, weight: u32) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.in_window += weight;
        self.spent.push_back(Spend { id, at: now, weight });
        id
    }

    fn refund(&mut self, id: u64) -> bool {
        match self.spent.iter().position(|s| s.id == id) {
            Some(index) => {
                if let Some(spend) = self.spent.remove(index) {
                    self.in_window -= spend.weight;
                }
                true
            }
            None => false,
        }
    }
}

#[derive(Debug)]
struct Bucket {
    class: WeightClass,
    limit: RateLimit,
    /// Fair (FIFO) queue of waiters; held for the whole wait.
    gate: tokio::sync::Mutex<()>,
    state: Mutex<BucketState>,
    refunded: Notify,
}

impl Bucket {
    fn lock_state(&self) -> MutexGuard<'_, BucketState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn refund(&self, id: u64) {
        if self.lock_state().refund(id) {
            tracing::debug!(class = %self.class, "Throttle permit refunded");
            self.refunded.notify_waiters();
        }
    }
}

// ─── Throttle ────────────────────────────────────────────────────────────────

/// Token buckets keyed by weight class. Cheap to clone; clones share budget.
#[derive(Debug, Clone, Default)]
pub struct Throttle {
    buckets: Arc<HashMap<WeightClass, Arc<Bucket>>>,
}

impl Throttle {
    pub fn new(limits: &BTreeMap<WeightClass, RateLimit>) -> Self {
        let mut buckets = HashMap::new();
        for (class, limit) in limits {
            if limit.capacity == 0 || limit.period.is_zero() {
                tracing::warn!(class = %class, "Ignoring empty rate limit");
                continue;
            }
            buckets.insert(
                class.clone(),
                Arc::new(Bucket {
                    class: class.clone(),
                    limit: *limit,
                    gate: tokio::sync::Mutex::new(()),
                    state: Mutex::new(BucketState::default()),
                    refunded: Notify::new(),
                }),
            );
        }
        Self {
            buckets: Arc::new(buckets),
        }
    }

    /// A throttle that admits everything immediately.
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Remaining weight available right now, or `None` for an unthrottled class.
    pub fn available(&self, class: &WeightClass) -> Option<u32> {
        let bucket = self.buckets.get(class)?;
        let mut state = bucket.lock_state();
        state.expire(Instant::now(), bucket.limit.period);
        Some(bucket.limit.capacity - state.in_window)
    }

    /// Wait until `weight` units of budget are available in `class`.
    ///
    /// Never drops a request: the call suspends until budget frees up, the
    /// `deadline` passes (`ThrottleError::Timeout`) or `cancel` fires
    /// (`ThrottleError::Cancelled`). Neither failure consumes budget.
    pub async fn acquire(
        &self,
        class: &WeightClass,
        weight: u32,
        deadline: Option<Instant>,
        cancel: Option<&CancelToken>,
    ) -> Result<Permit, ThrottleError> {
        let Some(bucket) = self.buckets.get(class) else {
            tracing::debug!(class = %class, "No rate limit for class, passing through");
            return Ok(Permit::unthrottled(weight));
        };

        let limit = bucket.limit;
        if weight > limit.capacity {
            return Err(ThrottleError::WeightExceedsCapacity {
                class: class.to_string(),
                weight,
                capacity: limit.capacity,
            });
        }

        let _turn = tokio::select! {
            biased;
            _ = cancelled(cancel) => return Err(ThrottleError::Cancelled),
            _ = sleep_until_opt(deadline) => return Err(timeout(class)),
            guard = bucket.gate.lock() => guard,
        };

        loop {
            let refunded = bucket.refunded.notified();
            tokio::pin!(refunded);
            refunded.as_mut().enable();

            let ready_at = {
                let mut state = bucket.lock_state();
                let now = Instant::now();
                state.expire(now, limit.period);
                match state.ready_at(weight, &limit) {
                    None => {
                        let id = state.admit(now, weight);
                        return Ok(Permit {
                            bucket: Some(Arc::clone(bucket)),
                            id,
                            weight,
                            consumed: false,
                        });
                    }
                    Some(at) => at,
                }
            };

            tracing::trace!(
                class = %class,
                weight,
                wait_ms = ready_at.saturating_duration_since(Instant::now()).as_millis() as u64,
                "Waiting for throttle budget"
            );

            tokio::select! {
                biased;
                _ = cancelled(cancel) => return Err(ThrottleError::Cancelled),
                _ = sleep_until_opt(deadline) => return Err(timeout(class)),
                _ = tokio::time::sleep_until(ready_at) => {}
                _ = &mut refunded => {}
            }
        }
    }
}

fn timeout(class: &WeightClass) -> ThrottleError {
    ThrottleError::Timeout {
        class: class.to_string(),
    }
}

async fn cancelled(cancel: Option<&CancelToken>) {
    match cancel {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

// ─── Permit ──────────────────────────────────────────────────────────────────

/// Budget reserved by `Throttle::acquire`.
///
/// Call `consume()` once the request is actually sent. Dropping an unconsumed
/// permit (e.g. on cancellation) returns its tokens to the bucket.
#[derive(Debug)]
#[must_use = "dropping a permit without consuming it refunds the budget"]
pub struct Permit {
    bucket: Option<Arc<Bucket>>,
    id: u64,
    weight: u32,
    consumed: bool,
}

impl Permit {
    fn unthrottled(weight: u32) -> Self {
        Self {
            bucket: None,
            id: 0,
            weight,
            consumed: false,
        }
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    /// Mark the budget as spent.
    pub fn consume(mut self) {
        self.consumed = true;
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        if self.consumed {
            return;
        }
        if let Some(bucket) = self.bucket.take() {
            bucket.refund(self.id);
        }
    }
}
