//! Market operations — fetch, load and cache the catalog.

use std::sync::Arc;

use crate::client::Exchange;
use crate::domain::market::{Market, MarketCatalog};
use crate::error::SdkError;
use crate::normalize::{normalize, NormalizeContext};
use crate::shared::Symbol;

impl Exchange {
    /// Fetch every listed market. Not cached; see `load_markets`.
    ///
    /// Markets that fail normalization are skipped with a warning so one odd
    /// listing does not hide the rest.
    pub async fn fetch_markets(&self) -> Result<Vec<Market>, SdkError> {
        let spec = self.adapter.markets_request()?;
        let body = self.request(&spec).await?;
        let raws = self.adapter.parse_markets(&body)?;

        let ctx = NormalizeContext::new(self.config.id.clone());
        let mut markets = Vec::with_capacity(raws.len());
        for raw in raws {
            let id = raw.id.clone().unwrap_or_default();
            match normalize::<_, Market>(raw, &ctx) {
                Ok(market) => markets.push(market),
                Err(e) => {
                    tracing::warn!(exchange = %self.config.id, market = %id, error = %e, "Skipping market")
                }
            }
        }
        tracing::debug!(exchange = %self.config.id, count = markets.len(), "Markets fetched");
        Ok(markets)
    }

    /// The market catalog, fetched once and shared by every clone.
    pub async fn load_markets(&self) -> Result<Arc<MarketCatalog>, SdkError> {
        if let Some(catalog) = self.markets.read().await.as_ref() {
            return Ok(catalog.clone());
        }
        let mut guard = self.markets.write().await;
        // Another caller may have loaded it while we waited for the lock.
        if let Some(catalog) = guard.as_ref() {
            return Ok(catalog.clone());
        }
        let catalog = Arc::new(MarketCatalog::new(self.fetch_markets().await?));
        *guard = Some(catalog.clone());
        Ok(catalog)
    }

    /// Refetch the catalog, replacing the cached one.
    pub async fn reload_markets(&self) -> Result<Arc<MarketCatalog>, SdkError> {
        let catalog = Arc::new(MarketCatalog::new(self.fetch_markets().await?));
        *self.markets.write().await = Some(catalog.clone());
        Ok(catalog)
    }

    /// One market by unified symbol, loading the catalog if needed.
    pub async fn market(&self, symbol: &Symbol) -> Result<Arc<Market>, SdkError> {
        self.resolve_market(symbol).await
    }

    /// Drop the cached catalog; the next call reloads it.
    pub async fn invalidate_markets(&self) {
        *self.markets.write().await = None;
    }
}
