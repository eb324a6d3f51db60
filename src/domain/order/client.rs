//! Order operations — place, cancel and query orders.

use rust_decimal::Decimal;

use crate::client::Exchange;
use crate::domain::market::Market;
use crate::domain::order::{Order, OrderRequest, OrderType};
use crate::error::SdkError;
use crate::exchange::CancelOutcome;
use crate::normalize::{normalize, normalize_all};
use crate::shared::{Side, Symbol};

impl Exchange {
    /// Place an order. `price` is required for limit orders and ignored by
    /// market orders on exchanges that do not accept one.
    pub async fn create_order(
        &self,
        symbol: &Symbol,
        order_type: OrderType,
        side: Side,
        amount: Decimal,
        price: Option<Decimal>,
    ) -> Result<Order, SdkError> {
        self.submit_order(OrderRequest {
            symbol: symbol.clone(),
            order_type,
            side,
            amount,
            price,
            client_order_id: None,
        })
        .await
    }

    pub async fn create_limit_order(
        &self,
        symbol: &Symbol,
        side: Side,
        amount: Decimal,
        price: Decimal,
    ) -> Result<Order, SdkError> {
        self.submit_order(OrderRequest::limit(symbol.clone(), side, amount, price))
            .await
    }

    pub async fn create_market_order(&self, symbol: &Symbol, side: Side, amount: Decimal) -> Result<Order, SdkError> {
        self.submit_order(OrderRequest::market(symbol.clone(), side, amount))
            .await
    }

    /// Round `request` to market precision, check it against the market's
    /// limits and send it. Nothing is sent when validation fails.
    pub async fn submit_order(&self, request: OrderRequest) -> Result<Order, SdkError> {
        let market = self.resolve_market(&request.symbol).await?;
        let request = round_request(request, &market)?;
        market.validate_order(request.order_type, request.amount, request.price)?;

        let spec = self.adapter.create_order_request(&request, &market)?;
        let body = self.request(&spec).await?;
        let raw = self.adapter.parse_create_order(&body, &request, &market)?;

        let order: Order = normalize(raw, &self.context(Some(market)).await?)?;
        tracing::info!(
            exchange = %self.config.id,
            id = %order.id,
            symbol = %order.symbol,
            side = %order.side,
            amount = %order.amount,
            "Order placed"
        );
        Ok(order)
    }

    /// Cancel one order and return its final state.
    pub async fn cancel_order(&self, id: &str, symbol: &Symbol) -> Result<Order, SdkError> {
        let market = self.resolve_market(symbol).await?;
        let spec = self.adapter.cancel_order_request(id, &market)?;
        let body = self.request(&spec).await?;

        let order = match self.adapter.parse_cancel_order(&body, id, &market)? {
            CancelOutcome::Order(raw) => normalize(raw, &self.context(Some(market)).await?)?,
            CancelOutcome::Acknowledged { id } => {
                tracing::debug!(exchange = %self.config.id, %id, "Cancel acknowledged, fetching order");
                self.fetch_order(&id, symbol).await?
            }
        };
        tracing::info!(exchange = %self.config.id, id = %order.id, status = %order.status, "Order canceled");
        Ok(order)
    }

    /// Cancel every open order, of one market or of the whole account.
    pub async fn cancel_all_orders(&self, symbol: Option<&Symbol>) -> Result<Vec<Order>, SdkError> {
        let market = self.optional_market(symbol).await?;
        let spec = self.adapter.cancel_all_orders_request(market.as_deref())?;
        let body = self.request(&spec).await?;
        let raws = self.adapter.parse_cancel_all_orders(&body)?;
        Ok(normalize_all(raws, &self.context(market).await?)?)
    }

    pub async fn fetch_order(&self, id: &str, symbol: &Symbol) -> Result<Order, SdkError> {
        let market = self.resolve_market(symbol).await?;
        let spec = self.adapter.fetch_order_request(id, &market)?;
        let body = self.request(&spec).await?;
        let raw = self.adapter.parse_order(&body)?;
        Ok(normalize(raw, &self.context(Some(market)).await?)?)
    }

    pub async fn fetch_open_orders(&self, symbol: Option<&Symbol>) -> Result<Vec<Order>, SdkError> {
        let market = self.optional_market(symbol).await?;
        let spec = self.adapter.open_orders_request(market.as_deref())?;
        let body = self.request(&spec).await?;
        let raws = self.adapter.parse_orders(&body)?;
        Ok(normalize_all(raws, &self.context(market).await?)?)
    }

    /// Finished orders (filled, canceled, rejected or expired), oldest first.
    pub async fn fetch_closed_orders(&self, symbol: Option<&Symbol>) -> Result<Vec<Order>, SdkError> {
        let market = self.optional_market(symbol).await?;
        let spec = self.adapter.closed_orders_request(market.as_deref())?;
        let body = self.request(&spec).await?;
        let raws = self.adapter.parse_orders(&body)?;
        let orders: Vec<Order> = normalize_all(raws, &self.context(market).await?)?;
        let mut closed: Vec<Order> = orders.into_iter().filter(|o| !o.is_open()).collect();
        closed.sort_by_key(|o| o.timestamp);
        Ok(closed)
    }

    pub(crate) async fn optional_market(&self, symbol: Option<&Symbol>) -> Result<Option<std::sync::Arc<Market>>, SdkError> {
        match symbol {
            Some(symbol) => Ok(Some(self.resolve_market(symbol).await?)),
            None => Ok(None),
        }
    }
}

/// Truncate the amount to lots and round the price to ticks.
fn round_request(mut request: OrderRequest, market: &Market) -> Result<OrderRequest, SdkError> {
    request.amount = market.amount_to_precision(request.amount)?;
    request.price = request
        .price
        .map(|p| market.price_to_precision(p))
        .transpose()?;
    Ok(request)
}
