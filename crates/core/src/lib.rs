pub mod errors;
pub mod models;
pub mod providers;
pub mod services;
pub mod storage;

use chrono::{DateTime, Utc};
use models::{
    chart::{ChartPayload, CurrentTotalPayload},
    holding::{normalize_symbol, Holding, NewHolding},
    position::AggregatedPosition,
    price::PriceSeries,
    settings::{MissingBarPolicy, Settings},
    valuation::{CurrentValuation, PortfolioValueSeries},
};
use providers::registry::PriceProviderRegistry;
use services::{
    aggregation_service::AggregationService, price_service::PriceService,
    valuation_service::ValuationService,
};
use storage::holdings_store::HoldingsStore;

use errors::CoreError;

/// Main entry point for the Portfolio Tracker core library.
/// Wires the holdings store, price sources and valuation engine together.
#[must_use]
pub struct PortfolioTracker {
    store: HoldingsStore,
    settings: Settings,
    aggregation_service: AggregationService,
    price_service: PriceService,
    valuation_service: ValuationService,
}

impl std::fmt::Debug for PortfolioTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortfolioTracker")
            .field("store", &self.store)
            .field("providers", &self.price_service.get_provider_names())
            .field("window", &self.settings.window)
            .field("granularity", &self.settings.granularity)
            .field("missing_bar_policy", &self.settings.missing_bar_policy)
            .finish()
    }
}

impl PortfolioTracker {
    /// Open the SQLite store at `settings.database_path` with the default price sources.
    pub fn open(settings: Settings) -> Result<Self, CoreError> {
        settings.validate()?;
        let store = HoldingsStore::open(&settings.database_path)?;
        let registry = PriceProviderRegistry::new_with_defaults(&settings.api_keys);
        Ok(Self::build(store, registry, settings))
    }

    /// Same as `open`, but backed by an in-memory database.
    pub fn open_in_memory(settings: Settings) -> Result<Self, CoreError> {
        settings.validate()?;
        let store = HoldingsStore::open_in_memory()?;
        let registry = PriceProviderRegistry::new_with_defaults(&settings.api_keys);
        Ok(Self::build(store, registry, settings))
    }

    /// Assemble a tracker from explicit parts (custom sources, shared store).
    pub fn with_components(
        store: HoldingsStore,
        registry: PriceProviderRegistry,
        settings: Settings,
    ) -> Result<Self, CoreError> {
        settings.validate()?;
        Ok(Self::build(store, registry, settings))
    }

    // ── Holdings ────────────────────────────────────────────────────

    /// Record a purchase (positive quantity) or a sale (negative quantity).
    /// A sale larger than the current net quantity is rejected.
    pub async fn add_holding(
        &self,
        user_id: i64,
        symbol: &str,
        quantity: f64,
        purchase_price: f64,
    ) -> Result<Holding, CoreError> {
        self.store
            .add_holding(NewHolding::new(user_id, symbol, quantity, purchase_price))
            .await
    }

    /// Delete one holding row. Rejected if it would leave a negative net quantity.
    pub async fn remove_holding(&self, user_id: i64, holding_id: i64) -> Result<Holding, CoreError> {
        self.store.remove_holding(user_id, holding_id).await
    }

    pub async fn list_holdings(&self, user_id: i64) -> Result<Vec<Holding>, CoreError> {
        self.store.list_holdings(user_id).await
    }

    /// Every user's holdings (admin/debug view).
    pub async fn list_all_holdings(&self) -> Result<Vec<Holding>, CoreError> {
        self.store.list_all_holdings().await
    }

    /// Net quantity per symbol, in first-purchase order.
    pub async fn get_positions(&self, user_id: i64) -> Result<Vec<AggregatedPosition>, CoreError> {
        let holdings = self.store.list_holdings(user_id).await?;
        Ok(self.aggregation_service.aggregate(&holdings))
    }

    // ── Valuation ───────────────────────────────────────────────────

    /// Current portfolio value. Unpriceable positions are reported as degraded,
    /// never counted as zero.
    pub async fn get_current_value(&self, user_id: i64) -> Result<CurrentValuation, CoreError> {
        let positions = self.get_positions(user_id).await?;
        Ok(self
            .valuation_service
            .current_valuation(&self.price_service, &positions)
            .await)
    }

    /// Portfolio value over the configured window, as of now.
    pub async fn get_value_history(&self, user_id: i64) -> Result<PortfolioValueSeries, CoreError> {
        self.get_value_history_with_now(user_id, Utc::now()).await
    }

    /// Portfolio value over the configured window, treating `now` as the current instant
    /// when deciding whether the trailing bar has closed.
    pub async fn get_value_history_with_now(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<PortfolioValueSeries, CoreError> {
        let positions = self.get_positions(user_id).await?;
        Ok(self
            .valuation_service
            .value_history(&self.price_service, &positions, now)
            .await)
    }

    /// `{timestamps, values}` payload for the chart front end.
    pub async fn get_chart_payload(&self, user_id: i64) -> Result<ChartPayload, CoreError> {
        let series = self.get_value_history(user_id).await?;
        Ok(ChartPayload::from(&series))
    }

    /// `{current_total}` payload for the dashboard header.
    pub async fn get_current_total_payload(
        &self,
        user_id: i64,
    ) -> Result<CurrentTotalPayload, CoreError> {
        let valuation = self.get_current_value(user_id).await?;
        Ok(CurrentTotalPayload::from(&valuation))
    }

    // ── Single stock ────────────────────────────────────────────────

    /// Latest price of one symbol, independent of any user's holdings.
    pub async fn get_stock_price(&self, symbol: &str) -> Result<f64, CoreError> {
        self.price_service.latest_price(&normalize_symbol(symbol)).await
    }

    /// Price history of one symbol over the configured window and granularity.
    pub async fn get_stock_history(&self, symbol: &str) -> Result<PriceSeries, CoreError> {
        self.get_stock_history_with_now(symbol, Utc::now()).await
    }

    /// Like `get_stock_history`, with `now` deciding whether the trailing bar has closed.
    /// Fails with `PriceNotAvailable` when no completed bar remains.
    pub async fn get_stock_history_with_now(
        &self,
        symbol: &str,
        now: DateTime<Utc>,
    ) -> Result<PriceSeries, CoreError> {
        let symbol = normalize_symbol(symbol);
        let mut series = self
            .price_service
            .history(&symbol, self.settings.window, self.settings.granularity)
            .await?;

        if series.drop_incomplete_tail(self.settings.granularity, now) {
            log::debug!("Dropped still-forming bar for {symbol}");
        }
        if series.is_empty() {
            return Err(CoreError::PriceNotAvailable {
                symbol,
                detail: "no completed bars".into(),
            });
        }
        Ok(series)
    }

    // ── Settings ────────────────────────────────────────────────────

    #[must_use]
    pub fn get_settings(&self) -> &Settings {
        &self.settings
    }

    pub fn set_missing_bar_policy(&mut self, policy: MissingBarPolicy) {
        self.settings.missing_bar_policy = policy;
        self.valuation_service = ValuationService::from_settings(&self.settings);
    }

    /// Set an API key for a provider (e.g., "alphavantage").
    /// Rebuilds the provider registry so the new key takes effect immediately.
    pub fn set_api_key(&mut self, provider: String, key: String) {
        self.settings.api_keys.insert(provider, key);

        let registry = PriceProviderRegistry::new_with_defaults(&self.settings.api_keys);
        self.price_service = PriceService::with_timeout(registry, self.settings.fetch_timeout());
    }

    /// Get the names of the registered price sources, in priority order.
    #[must_use]
    pub fn provider_names(&self) -> Vec<String> {
        self.price_service.get_provider_names()
    }

    // ── Internal ────────────────────────────────────────────────────

    fn build(store: HoldingsStore, registry: PriceProviderRegistry, settings: Settings) -> Self {
        let price_service = PriceService::with_timeout(registry, settings.fetch_timeout());
        let valuation_service = ValuationService::from_settings(&settings);

        Self {
            store,
            settings,
            aggregation_service: AggregationService::new(),
            price_service,
            valuation_service,
        }
    }
}
