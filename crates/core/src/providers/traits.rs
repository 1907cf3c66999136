use async_trait::async_trait;

use crate::errors::CoreError;
use crate::models::price::{Granularity, PricePoint, Window};

/// A market data source able to quote a symbol and return its price history.
///
/// Implemented by Yahoo Finance and Alpha Vantage; tests register mocks.
#[async_trait]
pub trait PriceHistorySource: Send + Sync {
    /// Human-readable name of this provider (for logs/errors).
    fn name(&self) -> &str;

    /// Get the latest available price of a symbol.
    async fn latest_price(&self, symbol: &str) -> Result<f64, CoreError>;

    /// Get the close prices of a symbol over `window`, one point per `granularity` bar.
    /// Points may come back unsorted; callers normalize them through `PriceSeries::new`.
    async fn history(
        &self,
        symbol: &str,
        window: Window,
        granularity: Granularity,
    ) -> Result<Vec<PricePoint>, CoreError>;
}
