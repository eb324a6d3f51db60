//! Subscription tracking and per-subscription dispatch.
//!
//! Several subscribers may share one exchange subscription; the exchange is
//! subscribed when the first route is added and unsubscribed when the last
//! one goes away. The tracked set is what gets replayed after a reconnect.

use std::collections::BTreeMap;

use tokio::sync::mpsc;

use super::{Subscription, WsEvent};

pub type RouteId = u64;

/// What the caller must tell the exchange after a routing change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteChange {
    /// First route for this subscription: subscribe on the exchange.
    Subscribe,
    /// Last route removed: unsubscribe on the exchange.
    Unsubscribe,
    None,
}

/// Tracked subscriptions and their subscriber queues.
#[derive(Debug, Default)]
pub struct Routes {
    routes: BTreeMap<Subscription, Vec<(RouteId, mpsc::Sender<WsEvent>)>>,
}

impl Routes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &mut self,
        subscription: Subscription,
        id: RouteId,
        sink: mpsc::Sender<WsEvent>,
    ) -> RouteChange {
        let entry = self.routes.entry(subscription).or_default();
        entry.push((id, sink));
        if entry.len() == 1 {
            RouteChange::Subscribe
        } else {
            RouteChange::None
        }
    }

    pub fn remove(&mut self, subscription: &Subscription, id: RouteId) -> RouteChange {
        let Some(entry) = self.routes.get_mut(subscription) else {
            return RouteChange::None;
        };
        let before = entry.len();
        entry.retain(|(route, _)| *route != id);
        if entry.is_empty() {
            self.routes.remove(subscription);
            if before > 0 {
                return RouteChange::Unsubscribe;
            }
        }
        RouteChange::None
    }

    /// Remove every route of `subscription`, returning their queues.
    pub fn remove_all(&mut self, subscription: &Subscription) -> Vec<mpsc::Sender<WsEvent>> {
        self.routes
            .remove(subscription)
            .map(|routes| routes.into_iter().map(|(_, sink)| sink).collect())
            .unwrap_or_default()
    }

    /// Deliver without blocking. A full queue drops the event; a closed queue
    /// drops the route. Returns true when the subscription lost its last
    /// route and should be unsubscribed.
    pub fn dispatch(&mut self, subscription: &Subscription, event: &WsEvent) -> bool {
        let Some(entry) = self.routes.get_mut(subscription) else {
            tracing::debug!(%subscription, "Message for untracked subscription");
            return false;
        };
        entry.retain(|(route, sink)| match sink.try_send(event.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(%subscription, route, "Subscriber queue full, dropping message");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(%subscription, route, "Subscriber gone");
                false
            }
        });
        if entry.is_empty() {
            self.routes.remove(subscription);
            true
        } else {
            false
        }
    }

    /// Deliver to every route. Returns subscriptions left without routes.
    pub fn broadcast(&mut self, event: &WsEvent) -> Vec<Subscription> {
        let subscriptions: Vec<_> = self.routes.keys().cloned().collect();
        subscriptions
            .into_iter()
            .filter(|sub| self.dispatch(sub, event))
            .collect()
    }

    /// Tracked subscriptions, in a stable order.
    pub fn subscriptions(&self) -> impl Iterator<Item = &Subscription> {
        self.routes.keys()
    }

    pub fn contains(&self, subscription: &Subscription) -> bool {
        self.routes.contains_key(subscription)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
