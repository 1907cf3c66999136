use std::collections::HashMap;

use super::alphavantage::AlphaVantageProvider;
use super::traits::PriceHistorySource;
use super::yahoo_finance::YahooFinanceProvider;

/// Ordered registry of price sources.
///
/// Registration order is priority order: the first source is asked first,
/// later ones are fallbacks.
pub struct PriceProviderRegistry {
    providers: Vec<Box<dyn PriceHistorySource>>,
}

impl PriceProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    /// Create a registry with all default providers pre-configured.
    pub fn new_with_defaults(api_keys: &HashMap<String, String>) -> Self {
        let mut registry = Self::new();

        // Primary, no API key needed
        match YahooFinanceProvider::new() {
            Ok(yahoo) => registry.register(Box::new(yahoo)),
            Err(e) => log::warn!("Yahoo Finance provider unavailable: {e}"),
        }

        // Fallback, only when a key is configured
        if let Some(key) = api_keys.get("alphavantage") {
            registry.register(Box::new(AlphaVantageProvider::new(key.clone())));
        }

        registry
    }

    /// Register a new price source at the lowest priority.
    pub fn register(&mut self, provider: Box<dyn PriceHistorySource>) {
        self.providers.push(provider);
    }

    /// All sources, in priority order.
    pub fn providers(&self) -> Vec<&dyn PriceHistorySource> {
        self.providers.iter().map(|p| p.as_ref()).collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }
}

impl Default for PriceProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
