//! Raw order record produced by adapters.
//!
//! Adapters map exchange enums (side, type, status) before building the
//! record; numeric fields stay as exchange strings.

use serde::{Deserialize, Serialize};

use super::{Order, OrderStatus, OrderType};
use crate::shared::Side;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawOrder {
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_order_id: Option<String>,
    /// Exchange market id; falls back to the call's market when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_id: Option<String>,
    pub side: Option<Side>,
    pub order_type: Option<OrderType>,
    pub status: Option<OrderStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    pub amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filled: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_update: Option<i64>,
}

impl From<&Order> for RawOrder {
    fn from(order: &Order) -> Self {
        RawOrder {
            id: Some(order.id.clone()),
            client_order_id: order.client_order_id.clone(),
            market_id: None,
            side: Some(order.side),
            order_type: Some(order.order_type),
            status: Some(order.status),
            price: order.price.map(|p| p.to_string()),
            amount: Some(order.amount.to_string()),
            filled: Some(order.filled.to_string()),
            remaining: Some(order.remaining.to_string()),
            average: order.average.map(|a| a.to_string()),
            cost: Some(order.cost.to_string()),
            timestamp: order.timestamp.map(|t| t.timestamp_millis()),
            last_update: order.last_update.map(|t| t.timestamp_millis()),
        }
    }
}
