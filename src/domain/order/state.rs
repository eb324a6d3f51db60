//! Order state containers — app-owned, SDK-provided update logic.

use std::collections::HashMap;
use std::sync::Arc;

use super::Order;

/// Tracks orders by id as immutable snapshots.
///
/// Updates may arrive out of order (REST polls racing stream updates), so
/// `apply` merges rather than replaces: the filled amount never decreases and
/// never exceeds the order amount, and a terminal status is never reverted.
#[derive(Debug, Clone, Default)]
pub struct OrderTracker {
    orders: HashMap<String, Arc<Order>>,
}

impl OrderTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge an update and return the new snapshot.
    pub fn apply(&mut self, update: Order) -> Arc<Order> {
        let merged = match self.orders.get(&update.id) {
            Some(current) => merge(current, update),
            None => clamp(update),
        };
        let snapshot = Arc::new(merged);
        self.orders.insert(snapshot.id.clone(), snapshot.clone());
        snapshot
    }

    pub fn get(&self, id: &str) -> Option<&Arc<Order>> {
        self.orders.get(id)
    }

    /// Orders that are still open.
    pub fn open_orders(&self) -> Vec<Arc<Order>> {
        self.orders.values().filter(|o| o.is_open()).cloned().collect()
    }

    pub fn remove(&mut self, id: &str) -> Option<Arc<Order>> {
        self.orders.remove(id)
    }

    /// Drop every order in a terminal state.
    pub fn prune_terminal(&mut self) {
        self.orders.retain(|_, o| !o.status.is_terminal());
    }

    pub fn clear(&mut self) {
        self.orders.clear();
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

fn clamp(mut order: Order) -> Order {
    order.filled = order.filled.min(order.amount);
    order.remaining = order.amount - order.filled;
    order
}

fn merge(current: &Order, mut update: Order) -> Order {
    if current.filled > update.filled {
        update.filled = current.filled;
        update.average = current.average.or(update.average);
        update.cost = current.cost.max(update.cost);
    }
    if current.status.is_terminal() {
        update.status = current.status;
    }
    update.timestamp = current.timestamp.or(update.timestamp);
    update.client_order_id = update.client_order_id.or_else(|| current.client_order_id.clone());
    clamp(update)
}
