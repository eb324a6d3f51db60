//! Order book operations — REST snapshots and the synchronized stream.

use crate::client::Exchange;
use crate::domain::orderbook::OrderBook;
use crate::error::SdkError;
use crate::normalize::normalize;
use crate::shared::Symbol;

impl Exchange {
    /// Current order book, best levels first, at most `limit` levels per side.
    pub async fn fetch_order_book(&self, symbol: &Symbol, limit: Option<u32>) -> Result<OrderBook, SdkError> {
        let market = self.resolve_market(symbol).await?;
        let spec = self.adapter.order_book_request(&market, limit)?;
        let body = self.request(&spec).await?;
        let raw = self.adapter.parse_order_book(&body, &market)?;

        let ctx = self.context(Some(market)).await?;
        let mut book: OrderBook = normalize(raw, &ctx)?;
        if let Some(limit) = limit {
            book.truncate(limit as usize);
        }
        Ok(book)
    }
}

#[cfg(feature = "ws-native")]
pub use self::watch::OrderBookStream;

#[cfg(feature = "ws-native")]
mod watch {
    use std::pin::Pin;
    use std::sync::Arc;

    use futures_util::Stream;
    use tokio::sync::watch;
    use tokio::task::{JoinError, JoinHandle};

    use super::*;
    use crate::domain::market::Market;
    use crate::domain::orderbook::{BookDelta, BookSync, SyncOutcome};
    use crate::error::WsError;
    use crate::exchange::BookResync;
    use crate::normalize::NormalizeContext;
    use crate::ws::native::SubscriptionHandle;
    use crate::ws::{Subscription, WsEvent, WsMessage};

    /// Depth requested for REST resync snapshots unless the
    /// `orderBookSnapshotDepth` option says otherwise.
    const DEFAULT_SNAPSHOT_DEPTH: u32 = 1000;

    /// Latest synchronized book after every change. Slow readers skip
    /// intermediate states. Ends with an error when the stream fails.
    pub type OrderBookStream = Pin<Box<dyn Stream<Item = Result<Arc<OrderBook>, SdkError>> + Send>>;

    impl Exchange {
        /// Stream the order book of `symbol`, kept in sync from the exchange's
        /// diff stream. Dropping the stream unsubscribes.
        pub async fn watch_order_book(&self, symbol: &Symbol) -> Result<OrderBookStream, SdkError> {
            if !self.capabilities().watch_order_book {
                return Err(SdkError::not_supported("watchOrderBook", self.id()));
            }
            let market = self.resolve_market(symbol).await?;
            let ctx = self.context(Some(market.clone())).await?;
            let connection = self.ws_connection().await?;
            let handle = connection
                .subscribe(Subscription::order_book(market.id.clone()))
                .await?;

            let (tx, mut rx) = watch::channel(None);
            let watcher = BookWatcher {
                exchange: self.clone(),
                sync: BookSync::new(market.symbol.clone()),
                resync: self.adapter.book_resync(),
                market,
                ctx,
                pending: None,
            };
            let task = tokio::spawn(watcher.run(handle, tx));

            let stream = async_stream::stream! {
                while rx.changed().await.is_ok() {
                    let book = rx.borrow_and_update().clone();
                    if let Some(book) = book {
                        yield Ok(book);
                    }
                }
                match task.await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => yield Err(e),
                    Err(e) if e.is_cancelled() => {}
                    Err(e) => yield Err(SdkError::Ws(WsError::ProtocolError(format!("order book task: {e}")))),
                }
            };
            Ok(Box::pin(stream))
        }
    }

    type SnapshotTask = JoinHandle<Result<OrderBook, SdkError>>;

    /// Owns the local book of one watch stream.
    struct BookWatcher {
        exchange: Exchange,
        market: Arc<Market>,
        ctx: NormalizeContext,
        sync: BookSync,
        resync: BookResync,
        /// In-flight REST snapshot.
        pending: Option<SnapshotTask>,
    }

    impl Drop for BookWatcher {
        fn drop(&mut self) {
            if let Some(task) = self.pending.take() {
                task.abort();
            }
        }
    }

    impl BookWatcher {
        async fn run(
            mut self,
            mut handle: SubscriptionHandle,
            tx: watch::Sender<Option<Arc<OrderBook>>>,
        ) -> Result<(), SdkError> {
            if self.resync == BookResync::RestSnapshot {
                self.request_snapshot();
            }
            let options = self.exchange.options.clone();

            loop {
                let outcome = tokio::select! {
                    _ = tx.closed() => return Ok(()),
                    _ = options.cancelled() => return Err(SdkError::Cancelled),
                    joined = join_pending(&mut self.pending) => {
                        self.pending = None;
                        let book = flatten(joined)?;
                        tracing::debug!(symbol = %self.market.symbol, nonce = ?book.nonce, "Snapshot fetched");
                        self.sync.on_snapshot(&book)
                    }
                    event = handle.recv() => match event {
                        None => return Ok(()),
                        Some(WsEvent::Failed(e)) => return Err(e.into()),
                        Some(WsEvent::Resubscribed) => {
                            tracing::info!(symbol = %self.market.symbol, "Rebuilding order book after reconnect");
                            self.sync.reset();
                            if self.resync == BookResync::RestSnapshot {
                                self.request_snapshot();
                            }
                            SyncOutcome::Buffered
                        }
                        Some(WsEvent::Message(message)) => self.on_message(message),
                    },
                };

                match outcome {
                    SyncOutcome::Updated => {
                        let book = Arc::new(self.sync.book().snapshot(None));
                        if tx.send(Some(book)).is_err() {
                            return Ok(());
                        }
                    }
                    SyncOutcome::Buffered | SyncOutcome::Ignored => {}
                    SyncOutcome::ResyncRequired => self.recover(&handle).await?,
                }
            }
        }

        fn on_message(&mut self, message: WsMessage) -> SyncOutcome {
            let result = match message {
                WsMessage::BookSnapshot { book, .. } => normalize::<_, OrderBook>(book, &self.ctx)
                    .map(|book| self.sync.on_snapshot(&book)),
                WsMessage::BookDelta { delta, .. } => {
                    normalize::<_, BookDelta>(delta, &self.ctx).map(|delta| self.sync.on_delta(delta))
                }
                _ => return SyncOutcome::Ignored,
            };
            result.unwrap_or_else(|e| {
                tracing::warn!(symbol = %self.market.symbol, error = %e, "Malformed book update");
                self.sync.reset();
                SyncOutcome::ResyncRequired
            })
        }

        async fn recover(&mut self, handle: &SubscriptionHandle) -> Result<(), SdkError> {
            match self.resync {
                BookResync::RestSnapshot => {
                    if self.pending.is_none() {
                        self.request_snapshot();
                    }
                }
                BookResync::Resubscribe => {
                    tracing::info!(symbol = %self.market.symbol, "Resubscribing for a fresh snapshot");
                    self.sync.reset();
                    handle.resubscribe().await?;
                }
            }
            Ok(())
        }

        fn request_snapshot(&mut self) {
            if let Some(task) = self.pending.take() {
                task.abort();
            }
            let exchange = self.exchange.clone();
            let symbol = self.market.symbol.clone();
            let depth = exchange
                .config
                .option_u64("orderBookSnapshotDepth")
                .and_then(|d| u32::try_from(d).ok())
                .unwrap_or(DEFAULT_SNAPSHOT_DEPTH);
            self.pending = Some(tokio::spawn(async move {
                exchange.fetch_order_book(&symbol, Some(depth)).await
            }));
        }
    }

    /// Resolves with the pending task's output; never resolves when idle.
    async fn join_pending(task: &mut Option<SnapshotTask>) -> Result<Result<OrderBook, SdkError>, JoinError> {
        match task {
            Some(handle) => handle.await,
            None => std::future::pending().await,
        }
    }

    fn flatten(joined: Result<Result<OrderBook, SdkError>, JoinError>) -> Result<OrderBook, SdkError> {
        joined.map_err(|e| SdkError::Ws(WsError::ProtocolError(format!("snapshot task: {e}"))))?
    }
}
