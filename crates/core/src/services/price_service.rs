use std::time::Duration;

use crate::errors::CoreError;
use crate::models::price::{Granularity, PriceSeries, Window};
use crate::models::settings::DEFAULT_FETCH_TIMEOUT_SECS;
use crate::providers::registry::PriceProviderRegistry;

/// Fetches prices from the registered sources with fallback and a time bound.
///
/// - Sources are tried in registration order; an error falls through to the next.
/// - The whole lookup for one symbol (fallbacks included) is bounded by
///   `fetch_timeout`; when it elapses the call fails with `SourceTimeout`.
/// - Nothing is cached: every call goes to the sources.
pub struct PriceService {
    registry: PriceProviderRegistry,
    fetch_timeout: Duration,
}

impl PriceService {
    pub fn new(registry: PriceProviderRegistry) -> Self {
        Self::with_timeout(registry, Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS))
    }

    pub fn with_timeout(registry: PriceProviderRegistry, fetch_timeout: Duration) -> Self {
        Self {
            registry,
            fetch_timeout,
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout
    }

    /// Check if at least one source is registered.
    pub fn has_provider(&self) -> bool {
        !self.registry.is_empty()
    }

    /// Get the names of all registered sources, in priority order.
    pub fn get_provider_names(&self) -> Vec<String> {
        self.registry.names()
    }

    /// Latest price of `symbol`, validated to be finite and non-negative.
    pub async fn latest_price(&self, symbol: &str) -> Result<f64, CoreError> {
        self.bounded(symbol, self.fetch_latest(symbol)).await
    }

    /// Price history of `symbol`, normalized into an ascending `PriceSeries`.
    /// A source that answers with no usable points counts as a failure.
    pub async fn history(
        &self,
        symbol: &str,
        window: Window,
        granularity: Granularity,
    ) -> Result<PriceSeries, CoreError> {
        self.bounded(symbol, self.fetch_history(symbol, window, granularity))
            .await
    }

    async fn bounded<T>(
        &self,
        symbol: &str,
        fut: impl std::future::Future<Output = Result<T, CoreError>>,
    ) -> Result<T, CoreError> {
        match tokio::time::timeout(self.fetch_timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                log::warn!(
                    "Price lookup for {symbol} timed out after {:?}",
                    self.fetch_timeout
                );
                Err(CoreError::SourceTimeout {
                    symbol: symbol.to_string(),
                    seconds: self.fetch_timeout.as_secs(),
                })
            }
        }
    }

    async fn fetch_latest(&self, symbol: &str) -> Result<f64, CoreError> {
        let providers = self.registry.providers();
        if providers.is_empty() {
            return Err(CoreError::NoProvider(format!("latest price for {symbol}")));
        }

        let mut last_error = None;
        for provider in &providers {
            match provider.latest_price(symbol).await {
                Ok(price) if price.is_finite() && price >= 0.0 => return Ok(price),
                Ok(price) => {
                    last_error = Some(CoreError::Api {
                        provider: provider.name().to_string(),
                        message: format!(
                            "Invalid price returned for {symbol}: {price} (must be finite and non-negative)"
                        ),
                    });
                }
                Err(e) => {
                    log::warn!("{} failed latest price for {symbol}: {e}", provider.name());
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| CoreError::NoProvider(symbol.to_string())))
    }

    async fn fetch_history(
        &self,
        symbol: &str,
        window: Window,
        granularity: Granularity,
    ) -> Result<PriceSeries, CoreError> {
        let providers = self.registry.providers();
        if providers.is_empty() {
            return Err(CoreError::NoProvider(format!("history for {symbol}")));
        }

        let mut last_error = None;
        for provider in &providers {
            match provider.history(symbol, window, granularity).await {
                Ok(points) => {
                    let series = PriceSeries::new(symbol, points);
                    if !series.is_empty() {
                        log::debug!(
                            "{} returned {} bars for {symbol} ({window}/{granularity})",
                            provider.name(),
                            series.len()
                        );
                        return Ok(series);
                    }
                    last_error = Some(CoreError::PriceNotAvailable {
                        symbol: symbol.to_string(),
                        detail: format!("{} returned no bars", provider.name()),
                    });
                }
                Err(e) => {
                    log::warn!("{} failed history for {symbol}: {e}", provider.name());
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| CoreError::NoProvider(symbol.to_string())))
    }
}
