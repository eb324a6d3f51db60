//! Orderbook state containers — app-owned, SDK-provided update logic.

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::{BookDelta, OrderBook, PriceLevel};
use crate::shared::Symbol;

/// Deltas held while waiting for a snapshot.
pub const DEFAULT_MAX_BUFFERED: usize = 1000;

/// Result of applying a delta to a `LocalOrderBook`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaOutcome {
    Applied,
    /// Entirely older than the current nonce; nothing changed.
    Stale,
}

/// A delta that does not continue the current sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceGap {
    pub nonce: Option<u64>,
    pub first_seq: u64,
    pub last_seq: u64,
    pub prev_seq: Option<u64>,
}

impl std::fmt::Display for SequenceGap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "sequence gap: book at {:?}, delta {}..={} (prev {:?})",
            self.nonce, self.first_seq, self.last_seq, self.prev_seq
        )
    }
}

/// Live order book that applies snapshots and sequenced deltas.
#[derive(Debug, Clone)]
pub struct LocalOrderBook {
    symbol: Symbol,
    bids: BTreeMap<Decimal, Decimal>,
    asks: BTreeMap<Decimal, Decimal>,
    nonce: Option<u64>,
    timestamp: Option<DateTime<Utc>>,
}

impl LocalOrderBook {
    pub fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            nonce: None,
            timestamp: None,
        }
    }

    /// Replace the whole book.
    pub fn apply_snapshot(&mut self, book: &OrderBook) {
        self.bids = book.bids.iter().map(|l| (l.price, l.amount)).collect();
        self.asks = book.asks.iter().map(|l| (l.price, l.amount)).collect();
        self.bids.retain(|_, amount| !amount.is_zero());
        self.asks.retain(|_, amount| !amount.is_zero());
        self.nonce = book.nonce;
        self.timestamp = book.timestamp;
    }

    /// Apply a delta if it continues the sequence.
    ///
    /// With a `prev_seq` the delta must build on the current nonce exactly.
    /// Without one it must cover `nonce + 1`. A book with no nonce accepts
    /// every delta.
    pub fn apply_delta(&mut self, delta: &BookDelta) -> Result<DeltaOutcome, SequenceGap> {
        if let Some(nonce) = self.nonce {
            let chained = delta.prev_seq == Some(nonce);
            if !chained {
                if delta.last_seq <= nonce {
                    return Ok(DeltaOutcome::Stale);
                }
                let covers_next = delta.prev_seq.is_none()
                    && delta.first_seq <= nonce + 1
                    && nonce + 1 <= delta.last_seq;
                if !covers_next {
                    return Err(SequenceGap {
                        nonce: self.nonce,
                        first_seq: delta.first_seq,
                        last_seq: delta.last_seq,
                        prev_seq: delta.prev_seq,
                    });
                }
            }
        }

        for level in &delta.bids {
            upsert(&mut self.bids, level);
        }
        for level in &delta.asks {
            upsert(&mut self.asks, level);
        }
        self.nonce = Some(delta.last_seq);
        if delta.timestamp.is_some() {
            self.timestamp = delta.timestamp;
        }
        Ok(DeltaOutcome::Applied)
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn nonce(&self) -> Option<u64> {
        self.nonce
    }

    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.keys().next_back().copied()
    }

    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.keys().next().copied()
    }

    /// Immutable snapshot, optionally limited to `depth` levels per side.
    pub fn snapshot(&self, depth: Option<usize>) -> OrderBook {
        let depth = depth.unwrap_or(usize::MAX);
        OrderBook {
            symbol: self.symbol.clone(),
            bids: self
                .bids
                .iter()
                .rev()
                .take(depth)
                .map(|(p, a)| PriceLevel::new(*p, *a))
                .collect(),
            asks: self
                .asks
                .iter()
                .take(depth)
                .map(|(p, a)| PriceLevel::new(*p, *a))
                .collect(),
            timestamp: self.timestamp,
            nonce: self.nonce,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    pub fn clear(&mut self) {
        self.bids.clear();
        self.asks.clear();
        self.nonce = None;
        self.timestamp = None;
    }
}

fn upsert(side: &mut BTreeMap<Decimal, Decimal>, level: &PriceLevel) {
    if level.amount.is_zero() {
        side.remove(&level.price);
    } else {
        side.insert(level.price, level.amount);
    }
}

// ─── Sync lifecycle ──────────────────────────────────────────────────────────

/// Result of feeding a `BookSync`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The book changed; publish a new snapshot.
    Updated,
    /// Held until a snapshot arrives.
    Buffered,
    /// Stale update, nothing changed.
    Ignored,
    /// Sequence broken; a fresh snapshot is needed before further updates.
    ResyncRequired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyncState {
    AwaitingSnapshot,
    Live,
}

/// Drives a `LocalOrderBook` through snapshot → live → (gap) → snapshot.
///
/// No delta is applied after a gap until a snapshot has been applied. Deltas
/// received while waiting are buffered (bounded, oldest dropped) and replayed
/// on top of the next snapshot.
#[derive(Debug, Clone)]
pub struct BookSync {
    book: LocalOrderBook,
    state: SyncState,
    buffer: VecDeque<BookDelta>,
    max_buffered: usize,
}

impl BookSync {
    pub fn new(symbol: Symbol) -> Self {
        Self::with_capacity(symbol, DEFAULT_MAX_BUFFERED)
    }

    pub fn with_capacity(symbol: Symbol, max_buffered: usize) -> Self {
        Self {
            book: LocalOrderBook::new(symbol),
            state: SyncState::AwaitingSnapshot,
            buffer: VecDeque::new(),
            max_buffered,
        }
    }

    pub fn book(&self) -> &LocalOrderBook {
        &self.book
    }

    pub fn is_live(&self) -> bool {
        self.state == SyncState::Live
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Apply a snapshot and replay buffered deltas newer than it.
    pub fn on_snapshot(&mut self, snapshot: &OrderBook) -> SyncOutcome {
        self.book.apply_snapshot(snapshot);
        self.state = SyncState::Live;

        while let Some(delta) = self.buffer.pop_front() {
            if let Err(gap) = self.book.apply_delta(&delta) {
                tracing::debug!(symbol = %self.book.symbol, %gap, "Buffered delta does not follow snapshot");
                self.state = SyncState::AwaitingSnapshot;
                self.buffer.push_front(delta);
                return SyncOutcome::ResyncRequired;
            }
        }
        SyncOutcome::Updated
    }

    pub fn on_delta(&mut self, delta: BookDelta) -> SyncOutcome {
        if self.state == SyncState::AwaitingSnapshot {
            self.push_buffer(delta);
            return SyncOutcome::Buffered;
        }

        match self.book.apply_delta(&delta) {
            Ok(DeltaOutcome::Applied) => SyncOutcome::Updated,
            Ok(DeltaOutcome::Stale) => SyncOutcome::Ignored,
            Err(gap) => {
                tracing::warn!(symbol = %self.book.symbol, %gap, "Order book out of sync");
                self.state = SyncState::AwaitingSnapshot;
                self.buffer.clear();
                self.push_buffer(delta);
                SyncOutcome::ResyncRequired
            }
        }
    }

    /// Drop the book and buffered deltas, e.g. before resubscribing to a
    /// stream that starts with its own snapshot.
    pub fn reset(&mut self) {
        self.book.clear();
        self.buffer.clear();
        self.state = SyncState::AwaitingSnapshot;
    }

    fn push_buffer(&mut self, delta: BookDelta) {
        if self.max_buffered == 0 {
            return;
        }
        if self.buffer.len() >= self.max_buffered {
            self.buffer.pop_front();
        }
        self.buffer.push_back(delta);
    }
}
