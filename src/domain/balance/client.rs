//! Balance operations.

use crate::client::Exchange;
use crate::domain::balance::Balances;
use crate::error::SdkError;
use crate::normalize::{normalize, NormalizeContext};

impl Exchange {
    /// Account balances, replaced wholesale on every call.
    pub async fn fetch_balance(&self) -> Result<Balances, SdkError> {
        let spec = self.adapter.balance_request()?;
        let body = self.request(&spec).await?;
        let raw = self.adapter.parse_balance(&body)?;
        let balances: Balances = normalize(raw, &NormalizeContext::new(self.config.id.clone()))?;
        tracing::debug!(exchange = %self.config.id, assets = balances.assets.len(), "Balance fetched");
        Ok(balances)
    }
}
