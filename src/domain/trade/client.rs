//! Trade operations — public trades (REST and streamed) and the account's fills.

use crate::client::Exchange;
use crate::domain::trade::Trade;
use crate::error::SdkError;
use crate::normalize::normalize_all;
use crate::shared::Symbol;

impl Exchange {
    /// Recent public trades of `symbol`, oldest first.
    pub async fn fetch_trades(&self, symbol: &Symbol, limit: Option<u32>) -> Result<Vec<Trade>, SdkError> {
        let market = self.resolve_market(symbol).await?;
        let spec = self.adapter.trades_request(&market, limit)?;
        let body = self.request(&spec).await?;
        let raws = self.adapter.parse_trades(&body, &market)?;

        let ctx = self.context(Some(market)).await?;
        let mut trades: Vec<Trade> = normalize_all(raws, &ctx)?;
        trades.sort_by_key(|t| t.timestamp);
        Ok(trades)
    }

    /// The account's own fills, oldest first, each carrying its order id
    /// and liquidity role. Binance requires `symbol`.
    pub async fn fetch_my_trades(
        &self,
        symbol: Option<&Symbol>,
        limit: Option<u32>,
    ) -> Result<Vec<Trade>, SdkError> {
        let market = self.optional_market(symbol).await?;
        let spec = self.adapter.my_trades_request(market.as_deref(), limit)?;
        let body = self.request(&spec).await?;
        let raws = self.adapter.parse_my_trades(&body, market.as_deref())?;

        let ctx = self.context(market).await?;
        let mut trades: Vec<Trade> = normalize_all(raws, &ctx)?;
        trades.sort_by_key(|t| t.timestamp);
        Ok(trades)
    }
}

#[cfg(feature = "ws-native")]
pub use self::watch::TradeStream;

#[cfg(feature = "ws-native")]
mod watch {
    use std::pin::Pin;

    use futures_util::Stream;

    use super::*;
    use crate::ws::{Subscription, WsEvent, WsMessage};

    /// Batches of trades in arrival order. A batch that fails normalization
    /// is yielded as an error and the stream continues; a failed
    /// subscription ends it with an error.
    pub type TradeStream = Pin<Box<dyn Stream<Item = Result<Vec<Trade>, SdkError>> + Send>>;

    impl Exchange {
        /// Stream public trades of `symbol`. Dropping the stream unsubscribes.
        pub async fn watch_trades(&self, symbol: &Symbol) -> Result<TradeStream, SdkError> {
            if !self.capabilities().watch_trades {
                return Err(SdkError::not_supported("watchTrades", self.id()));
            }
            let market = self.resolve_market(symbol).await?;
            let ctx = self.context(Some(market.clone())).await?;
            let connection = self.ws_connection().await?;
            let mut handle = connection.subscribe(Subscription::trades(market.id.clone())).await?;
            let options = self.options.clone();

            let stream = async_stream::stream! {
                loop {
                    let event = tokio::select! {
                        _ = options.cancelled() => None,
                        event = handle.recv() => Some(event),
                    };
                    let Some(event) = event else {
                        yield Err(SdkError::Cancelled);
                        break;
                    };
                    match event {
                        None => break,
                        Some(WsEvent::Failed(e)) => {
                            yield Err(e.into());
                            break;
                        }
                        Some(WsEvent::Resubscribed) => {
                            tracing::debug!(symbol = %market.symbol, "Trade stream resumed");
                        }
                        Some(WsEvent::Message(WsMessage::Trades { trades, .. })) => {
                            match normalize_all::<_, Trade>(trades, &ctx) {
                                Ok(batch) if batch.is_empty() => {}
                                Ok(batch) => yield Ok(batch),
                                Err(e) => {
                                    tracing::warn!(symbol = %market.symbol, error = %e, "Malformed trade batch");
                                    yield Err(e.into());
                                }
                            }
                        }
                        Some(WsEvent::Message(_)) => {}
                    }
                }
            };
            Ok(Box::pin(stream))
        }
    }
}
