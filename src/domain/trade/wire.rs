//! Raw trade record produced by adapters (REST and stream).

use serde::{Deserialize, Serialize};

use super::{TakerOrMaker, Trade};
use crate::shared::Side;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTrade {
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_id: Option<String>,
    pub side: Option<Side>,
    pub price: Option<String>,
    pub amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<String>,
    pub timestamp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taker_or_maker: Option<TakerOrMaker>,
}

impl From<&Trade> for RawTrade {
    fn from(trade: &Trade) -> Self {
        RawTrade {
            id: Some(trade.id.clone()),
            order_id: trade.order_id.clone(),
            market_id: None,
            side: Some(trade.side),
            price: Some(trade.price.to_string()),
            amount: Some(trade.amount.to_string()),
            cost: Some(trade.cost.to_string()),
            timestamp: Some(trade.timestamp.timestamp_millis()),
            taker_or_maker: trade.taker_or_maker,
        }
    }
}
