//! Trade state containers — app-owned, SDK-provided update logic.

use std::collections::VecDeque;

use super::Trade;
use crate::shared::Symbol;

/// Rolling, append-only trade history for one market, newest first.
///
/// The app owns instances of this type. The SDK provides update methods.
#[derive(Debug, Clone)]
pub struct TradeHistory {
    pub symbol: Symbol,
    trades: VecDeque<Trade>,
    max_size: usize,
}

impl TradeHistory {
    pub fn new(symbol: Symbol, max_size: usize) -> Self {
        Self {
            symbol,
            trades: VecDeque::with_capacity(max_size),
            max_size,
        }
    }

    /// Push a new trade, evicting the oldest if at capacity.
    ///
    /// A trade whose id is already held is ignored, so replayed stream
    /// messages after a reconnect do not duplicate fills.
    pub fn push(&mut self, trade: Trade) {
        if self.max_size == 0 || self.trades.iter().any(|t| t.id == trade.id) {
            return;
        }
        if self.trades.len() >= self.max_size {
            self.trades.pop_back();
        }
        self.trades.push_front(trade);
    }

    /// Push a batch given in chronological order.
    pub fn extend(&mut self, trades: impl IntoIterator<Item = Trade>) {
        for trade in trades {
            self.push(trade);
        }
    }

    /// Replace all trades (e.g. from a REST fetch returned oldest first).
    pub fn replace(&mut self, trades: Vec<Trade>) {
        self.trades.clear();
        self.extend(trades);
    }

    pub fn trades(&self) -> &VecDeque<Trade> {
        &self.trades
    }

    pub fn latest(&self) -> Option<&Trade> {
        self.trades.front()
    }

    pub fn clear(&mut self) {
        self.trades.clear();
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::Side;
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn make_trade(id: &str, price: i64, amount: i64) -> Trade {
        Trade {
            id: id.to_string(),
            order_id: None,
            symbol: Symbol::new("BTC", "USDT"),
            side: Side::Buy,
            price: Decimal::from(price),
            amount: Decimal::from(amount),
            cost: Decimal::from(price * amount),
            timestamp: Utc::now(),
            taker_or_maker: None,
        }
    }

    fn history(max: usize) -> TradeHistory {
        TradeHistory::new(Symbol::new("BTC", "USDT"), max)
    }

    #[test]
    fn test_push_adds_trades() {
        let mut th = history(10);
        th.push(make_trade("t1", 50, 5));
        th.push(make_trade("t2", 51, 3));
        assert_eq!(th.len(), 2);
        assert_eq!(th.latest().unwrap().id, "t2");
    }

    #[test]
    fn test_rolling_buffer_evicts_oldest() {
        let mut th = history(3);
        th.push(make_trade("t1", 50, 1));
        th.push(make_trade("t2", 51, 2));
        th.push(make_trade("t3", 52, 3));
        assert_eq!(th.len(), 3);
        th.push(make_trade("t4", 53, 4));
        assert_eq!(th.len(), 3);
        let ids: Vec<_> = th.trades().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["t4", "t3", "t2"]);
    }

    #[test]
    fn test_duplicate_ids_are_ignored() {
        let mut th = history(5);
        th.extend([make_trade("t1", 50, 1), make_trade("t2", 50, 1)]);
        th.push(make_trade("t2", 50, 1));
        assert_eq!(th.len(), 2);
    }

    #[test]
    fn test_replace_clears_and_fills() {
        let mut th = history(10);
        th.push(make_trade("t1", 50, 1));
        th.replace(vec![make_trade("a", 49, 1), make_trade("b", 50, 2)]);
        assert_eq!(th.len(), 2);
        assert_eq!(th.latest().unwrap().id, "b");
    }
}
