use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::CoreError;
use crate::models::price::{Granularity, PricePoint, Window};
use super::traits::PriceHistorySource;

const PROVIDER_NAME: &str = "Yahoo Finance";

/// Yahoo Finance API provider for stock/equity prices.
///
/// - **Free**: No API key required.
/// - **No strict rate limits** (unofficial public API).
/// - **Coverage**: Global equities, ETFs, indices, mutual funds.
/// - **Data**: Real-time quotes + intraday bars down to one minute.
///
/// Uses the `yahoo_finance_api` crate which wraps Yahoo Finance's
/// public chart endpoint. Prices are in the listing currency.
pub struct YahooFinanceProvider {
    connector: yahoo_finance_api::YahooConnector,
}

impl YahooFinanceProvider {
    pub fn new() -> Result<Self, CoreError> {
        let connector = yahoo_finance_api::YahooConnector::new().map_err(|e| CoreError::Api {
            provider: PROVIDER_NAME.into(),
            message: format!("Failed to create connector: {e}"),
        })?;
        Ok(Self { connector })
    }

    /// Convert a unix timestamp (seconds) to a UTC instant.
    fn timestamp_to_utc(ts: i64) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(ts, 0)
    }
}

#[async_trait]
impl PriceHistorySource for YahooFinanceProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn latest_price(&self, symbol: &str) -> Result<f64, CoreError> {
        let resp = self
            .connector
            .get_latest_quotes(symbol, "1d")
            .await
            .map_err(|e| CoreError::Api {
                provider: PROVIDER_NAME.into(),
                message: format!("Failed to fetch latest quote for {symbol}: {e}"),
            })?;

        let quote = resp.last_quote().map_err(|e| CoreError::PriceNotAvailable {
            symbol: symbol.to_string(),
            detail: format!("no quote data: {e}"),
        })?;

        Ok(quote.close)
    }

    async fn history(
        &self,
        symbol: &str,
        window: Window,
        granularity: Granularity,
    ) -> Result<Vec<PricePoint>, CoreError> {
        let resp = self
            .connector
            .get_quote_range(symbol, granularity.as_interval(), window.as_range())
            .await
            .map_err(|e| CoreError::Api {
                provider: PROVIDER_NAME.into(),
                message: format!("Failed to fetch {window} history for {symbol}: {e}"),
            })?;

        let quotes = resp.quotes().map_err(|e| CoreError::PriceNotAvailable {
            symbol: symbol.to_string(),
            detail: format!("failed to parse quotes: {e}"),
        })?;

        let points: Vec<PricePoint> = quotes
            .iter()
            .filter_map(|q| {
                let timestamp = Self::timestamp_to_utc(q.timestamp)?;
                Some(PricePoint::new(timestamp, q.close))
            })
            .collect();

        Ok(points)
    }
}
