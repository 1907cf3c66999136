use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use portfolio_tracker_core::errors::CoreError;
use portfolio_tracker_core::models::position::AggregatedPosition;
use portfolio_tracker_core::models::price::{Granularity, PricePoint, Window};
use portfolio_tracker_core::models::settings::{MissingBarPolicy, Settings};
use portfolio_tracker_core::providers::registry::PriceProviderRegistry;
use portfolio_tracker_core::providers::traits::PriceHistorySource;
use portfolio_tracker_core::storage::holdings_store::HoldingsStore;
use portfolio_tracker_core::PortfolioTracker;
use std::collections::HashMap;

// ═══════════════════════════════════════════════════════════════════
// Mock Price Source (for testing without real API calls)
// ═══════════════════════════════════════════════════════════════════

fn ts(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 15, hour, minute, 0).unwrap()
}

struct MockPriceSource {
    latest: HashMap<String, f64>,
    history: HashMap<String, Vec<PricePoint>>,
}

impl MockPriceSource {
    fn new() -> Self {
        let mut latest = HashMap::new();
        latest.insert("AAPL".to_string(), 150.0);
        latest.insert("MSFT".to_string(), 400.0);

        let mut history = HashMap::new();
        history.insert(
            "AAPL".to_string(),
            vec![
                PricePoint::new(ts(14, 30), 148.0),
                PricePoint::new(ts(14, 31), 149.0),
                PricePoint::new(ts(14, 32), 150.0),
            ],
        );
        // MSFT skipped the 14:31 bar
        history.insert(
            "MSFT".to_string(),
            vec![
                PricePoint::new(ts(14, 30), 400.0),
                PricePoint::new(ts(14, 32), 402.0),
            ],
        );

        Self { latest, history }
    }
}

#[async_trait]
impl PriceHistorySource for MockPriceSource {
    fn name(&self) -> &str {
        "MockSource"
    }

    async fn latest_price(&self, symbol: &str) -> Result<f64, CoreError> {
        self.latest
            .get(symbol)
            .copied()
            .ok_or_else(|| CoreError::PriceNotAvailable {
                symbol: symbol.to_string(),
                detail: "unknown symbol".into(),
            })
    }

    async fn history(
        &self,
        symbol: &str,
        _window: Window,
        _granularity: Granularity,
    ) -> Result<Vec<PricePoint>, CoreError> {
        self.history
            .get(symbol)
            .cloned()
            .ok_or_else(|| CoreError::PriceNotAvailable {
                symbol: symbol.to_string(),
                detail: "unknown symbol".into(),
            })
    }
}

fn tracker_with(settings: Settings) -> PortfolioTracker {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut registry = PriceProviderRegistry::new();
    registry.register(Box::new(MockPriceSource::new()));
    let store = HoldingsStore::open_in_memory().unwrap();
    PortfolioTracker::with_components(store, registry, settings).unwrap()
}

fn tracker() -> PortfolioTracker {
    tracker_with(Settings::default())
}

const USER: i64 = 1;

// ═══════════════════════════════════════════════════════════════════
// Construction
// ═══════════════════════════════════════════════════════════════════

#[test]
fn invalid_settings_rejected() {
    let settings = Settings {
        fetch_timeout_secs: 0,
        ..Settings::default()
    };
    let store = HoldingsStore::open_in_memory().unwrap();
    let err = PortfolioTracker::with_components(store, PriceProviderRegistry::new(), settings)
        .unwrap_err();
    assert!(matches!(err, CoreError::Config(_)));
}

#[test]
fn provider_names_come_from_registry() {
    assert_eq!(tracker().provider_names(), vec!["MockSource"]);
}

#[test]
fn open_in_memory_uses_default_sources() {
    let tracker = PortfolioTracker::open_in_memory(Settings::default()).unwrap();
    assert_eq!(tracker.provider_names(), vec!["Yahoo Finance"]);
}

#[test]
fn set_api_key_adds_fallback_source() {
    let mut tracker = PortfolioTracker::open_in_memory(Settings::default()).unwrap();
    tracker.set_api_key("alphavantage".into(), "demo".into());
    assert_eq!(tracker.provider_names(), vec!["Yahoo Finance", "Alpha Vantage"]);
    assert_eq!(
        tracker.get_settings().api_keys.get("alphavantage").map(String::as_str),
        Some("demo")
    );
}

#[tokio::test]
async fn open_file_backed_tracker() {
    let dir = tempfile::tempdir().unwrap();
    let settings = Settings {
        database_path: dir.path().join("portfolio.db").to_string_lossy().into_owned(),
        ..Settings::default()
    };

    {
        let tracker = PortfolioTracker::open(settings.clone()).unwrap();
        tracker.add_holding(USER, "AAPL", 3.0, 120.0).await.unwrap();
    }

    let reopened = PortfolioTracker::open(settings).unwrap();
    let holdings = reopened.list_holdings(USER).await.unwrap();
    assert_eq!(holdings.len(), 1);
    assert_eq!(holdings[0].symbol, "AAPL");
}

// ═══════════════════════════════════════════════════════════════════
// Holdings → positions
// ═══════════════════════════════════════════════════════════════════

#[tokio::test]
async fn incremental_purchases_aggregate() {
    let tracker = tracker();
    tracker.add_holding(USER, "AAPL", 5.0, 140.0).await.unwrap();
    tracker.add_holding(USER, "aapl", 5.0, 145.0).await.unwrap();
    tracker.add_holding(USER, "MSFT", 2.0, 390.0).await.unwrap();

    let positions = tracker.get_positions(USER).await.unwrap();
    assert_eq!(
        positions,
        vec![
            AggregatedPosition::new("AAPL", 10.0),
            AggregatedPosition::new("MSFT", 2.0),
        ]
    );
}

#[tokio::test]
async fn oversell_rejected_through_facade() {
    let tracker = tracker();
    tracker.add_holding(USER, "AAPL", 1.0, 140.0).await.unwrap();
    let err = tracker.add_holding(USER, "AAPL", -2.0, 150.0).await.unwrap_err();
    assert!(matches!(err, CoreError::ValidationError(_)));
}

#[tokio::test]
async fn remove_then_list() {
    let tracker = tracker();
    let aapl = tracker.add_holding(USER, "AAPL", 1.0, 140.0).await.unwrap();
    tracker.add_holding(2, "MSFT", 1.0, 400.0).await.unwrap();

    tracker.remove_holding(USER, aapl.id).await.unwrap();
    assert!(tracker.list_holdings(USER).await.unwrap().is_empty());
    assert_eq!(tracker.list_all_holdings().await.unwrap().len(), 1);
}

// ═══════════════════════════════════════════════════════════════════
// Current value
// ═══════════════════════════════════════════════════════════════════

#[tokio::test]
async fn current_value_and_payload() {
    let tracker = tracker();
    tracker.add_holding(USER, "AAPL", 10.0, 140.0).await.unwrap();
    tracker.add_holding(USER, "MSFT", 2.0, 390.0).await.unwrap();

    let value = tracker.get_current_value(USER).await.unwrap();
    assert_eq!(value.current_total, 2300.0);
    assert!(value.is_complete());

    let payload = tracker.get_current_total_payload(USER).await.unwrap();
    assert_eq!(payload.current_total, 2300.0);
    assert!(payload.complete);
}

#[tokio::test]
async fn unknown_symbol_degrades_current_value() {
    let tracker = tracker();
    tracker.add_holding(USER, "AAPL", 10.0, 140.0).await.unwrap();
    tracker.add_holding(USER, "XYZ", 3.0, 1.0).await.unwrap();

    let payload = tracker.get_current_total_payload(USER).await.unwrap();
    assert_eq!(payload.current_total, 1500.0);
    assert!(!payload.complete);
    assert_eq!(payload.degraded, vec!["XYZ".to_string()]);
}

#[tokio::test]
async fn user_without_holdings_has_zero_value() {
    let tracker = tracker();
    let value = tracker.get_current_value(USER).await.unwrap();
    assert_eq!(value.current_total, 0.0);
    assert!(value.degraded.is_empty());

    let history = tracker.get_value_history_with_now(USER, ts(16, 0)).await.unwrap();
    assert!(history.is_empty());
}

#[tokio::test]
async fn sold_out_position_is_ignored() {
    let tracker = tracker();
    tracker.add_holding(USER, "AAPL", 2.0, 140.0).await.unwrap();
    tracker.add_holding(USER, "XYZ", 3.0, 1.0).await.unwrap();
    tracker.add_holding(USER, "XYZ", -3.0, 1.0).await.unwrap();

    let value = tracker.get_current_value(USER).await.unwrap();
    assert_eq!(value.current_total, 300.0);
    assert!(value.is_complete());
}

// ═══════════════════════════════════════════════════════════════════
// Value history
// ═══════════════════════════════════════════════════════════════════

#[tokio::test]
async fn value_history_carries_missing_bar_forward() {
    let tracker = tracker();
    tracker.add_holding(USER, "AAPL", 1.0, 140.0).await.unwrap();
    tracker.add_holding(USER, "MSFT", 1.0, 390.0).await.unwrap();

    let series = tracker.get_value_history_with_now(USER, ts(16, 0)).await.unwrap();
    assert_eq!(series.points.len(), 3);
    assert_eq!(series.value_at(ts(14, 30)), Some(548.0));
    assert_eq!(series.value_at(ts(14, 31)), Some(549.0));
    assert_eq!(series.value_at(ts(14, 32)), Some(552.0));
}

#[tokio::test]
async fn switching_to_omit_changes_gap_handling() {
    let mut tracker = tracker();
    tracker.add_holding(USER, "AAPL", 1.0, 140.0).await.unwrap();
    tracker.add_holding(USER, "MSFT", 1.0, 390.0).await.unwrap();

    tracker.set_missing_bar_policy(MissingBarPolicy::Omit);
    assert_eq!(tracker.get_settings().missing_bar_policy, MissingBarPolicy::Omit);

    let series = tracker.get_value_history_with_now(USER, ts(16, 0)).await.unwrap();
    assert_eq!(series.value_at(ts(14, 31)), Some(149.0));
}

#[tokio::test]
async fn forming_bar_excluded_from_history() {
    let tracker = tracker();
    tracker.add_holding(USER, "AAPL", 1.0, 140.0).await.unwrap();

    let now = ts(14, 32) + chrono::Duration::seconds(20);
    let series = tracker.get_value_history_with_now(USER, now).await.unwrap();
    assert_eq!(series.points.len(), 2);
    assert_eq!(series.value_at(ts(14, 32)), None);
}

#[tokio::test]
async fn value_history_reports_degraded_symbol() {
    let tracker = tracker();
    tracker.add_holding(USER, "AAPL", 2.0, 140.0).await.unwrap();
    tracker.add_holding(USER, "XYZ", 3.0, 1.0).await.unwrap();

    let series = tracker.get_value_history_with_now(USER, ts(16, 0)).await.unwrap();
    assert_eq!(series.value_at(ts(14, 30)), Some(296.0));
    assert!(!series.is_complete());
    assert_eq!(series.degraded[0].symbol, "XYZ");
}

#[tokio::test]
async fn chart_payload_is_aligned() {
    let tracker = tracker();
    tracker.add_holding(USER, "AAPL", 1.0, 140.0).await.unwrap();

    // Fixture bars are in the past relative to the wall clock, so all are closed.
    let payload = tracker.get_chart_payload(USER).await.unwrap();
    assert_eq!(payload.timestamps.len(), payload.values.len());
    assert_eq!(payload.timestamps, vec![ts(14, 30), ts(14, 31), ts(14, 32)]);
    assert_eq!(payload.values, vec![148.0, 149.0, 150.0]);
    assert!(payload.degraded.is_empty());
}

#[tokio::test]
async fn repeated_reads_are_identical() {
    let tracker = tracker();
    tracker.add_holding(USER, "AAPL", 10.0, 140.0).await.unwrap();
    tracker.add_holding(USER, "MSFT", 2.0, 390.0).await.unwrap();

    let first = tracker.get_value_history_with_now(USER, ts(16, 0)).await.unwrap();
    let second = tracker.get_value_history_with_now(USER, ts(16, 0)).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn buy_then_sell_in_pieces_leaves_nothing_to_value() {
    let tracker = tracker();
    tracker.add_holding(USER, "AAPL", 10.1, 140.0).await.unwrap();
    tracker.add_holding(USER, "AAPL", -10.0, 150.0).await.unwrap();
    tracker.add_holding(USER, "AAPL", -0.1, 150.0).await.unwrap();
    tracker.add_holding(USER, "XYZ", 1.0, 1.0).await.unwrap();
    tracker.add_holding(USER, "XYZ", -1.0, 1.0).await.unwrap();

    let value = tracker.get_current_value(USER).await.unwrap();
    assert_eq!(value.current_total, 0.0);
    assert!(value.positions.is_empty());
    assert!(value.degraded.is_empty());
}

// ═══════════════════════════════════════════════════════════════════
// Single stock
// ═══════════════════════════════════════════════════════════════════

#[tokio::test]
async fn stock_price_without_holdings() {
    let tracker = tracker();
    assert_eq!(tracker.get_stock_price("AAPL").await.unwrap(), 150.0);
    assert_eq!(tracker.get_stock_price(" msft ").await.unwrap(), 400.0);
}

#[tokio::test]
async fn unknown_stock_price_is_an_error() {
    let err = tracker().get_stock_price("XYZ").await.unwrap_err();
    assert!(matches!(err, CoreError::PriceNotAvailable { .. }));
}

#[tokio::test]
async fn stock_history_keeps_closed_bars() {
    let tracker = tracker();
    let series = tracker.get_stock_history_with_now("aapl", ts(16, 0)).await.unwrap();
    assert_eq!(series.symbol, "AAPL");
    let prices: Vec<f64> = series.points.iter().map(|p| p.price).collect();
    assert_eq!(prices, vec![148.0, 149.0, 150.0]);
}

#[tokio::test]
async fn stock_history_drops_forming_bar() {
    let tracker = tracker();
    let now = ts(14, 32) + chrono::Duration::seconds(20);
    let series = tracker.get_stock_history_with_now("AAPL", now).await.unwrap();
    assert_eq!(series.len(), 2);
    assert_eq!(series.latest().unwrap().timestamp, ts(14, 31));
}

#[tokio::test]
async fn stock_history_with_wall_clock() {
    // Fixture bars lie in the past, so every bar has closed.
    let series = tracker().get_stock_history("MSFT").await.unwrap();
    assert_eq!(series.len(), 2);
}

#[tokio::test]
async fn stock_history_unknown_symbol_is_an_error() {
    let err = tracker()
        .get_stock_history_with_now("XYZ", ts(16, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::PriceNotAvailable { .. }));
}
