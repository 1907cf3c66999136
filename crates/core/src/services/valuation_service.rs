use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::collections::BTreeSet;

use crate::errors::CoreError;
use crate::models::position::AggregatedPosition;
use crate::models::price::{Granularity, PriceSeries, Window};
use crate::models::settings::{MissingBarPolicy, Settings};
use crate::models::valuation::{
    CurrentValuation, DegradationReason, DegradedPosition, PortfolioValueSeries,
    PositionValuation, ValuePoint,
};
use crate::services::price_service::PriceService;

/// Turns aggregated positions into a current total and a value-over-time series.
///
/// Stateless apart from its configuration. A price failure for one symbol
/// never aborts the valuation: the symbol is reported as degraded and left
/// out of the totals.
pub struct ValuationService {
    window: Window,
    granularity: Granularity,
    missing_bar_policy: MissingBarPolicy,
}

impl ValuationService {
    pub fn new(window: Window, granularity: Granularity, missing_bar_policy: MissingBarPolicy) -> Self {
        Self {
            window,
            granularity,
            missing_bar_policy,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.window,
            settings.granularity,
            settings.missing_bar_policy,
        )
    }

    pub fn window(&self) -> Window {
        self.window
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn missing_bar_policy(&self) -> MissingBarPolicy {
        self.missing_bar_policy
    }

    /// Value every open position at its latest price.
    ///
    /// Lookups run concurrently. Positions whose price cannot be obtained
    /// are listed in `degraded` and contribute nothing to `current_total`.
    pub async fn current_valuation(
        &self,
        price_service: &PriceService,
        positions: &[AggregatedPosition],
    ) -> CurrentValuation {
        let open: Vec<&AggregatedPosition> = positions.iter().filter(|p| !p.is_closed()).collect();
        if open.is_empty() {
            return CurrentValuation::empty();
        }

        let lookups = open
            .iter()
            .map(|position| price_service.latest_price(&position.symbol));
        let prices = join_all(lookups).await;

        let mut valuation = CurrentValuation::empty();
        for (position, price) in open.into_iter().zip(prices) {
            match price {
                Ok(price) => {
                    let value = position.net_quantity * price;
                    valuation.current_total += value;
                    valuation.positions.push(PositionValuation {
                        symbol: position.symbol.clone(),
                        quantity: position.net_quantity,
                        price: Some(price),
                        value: Some(value),
                    });
                }
                Err(e) => {
                    log::warn!("Current value of {} degraded: {e}", position.symbol);
                    valuation.positions.push(PositionValuation {
                        symbol: position.symbol.clone(),
                        quantity: position.net_quantity,
                        price: None,
                        value: None,
                    });
                    valuation.degraded.push(DegradedPosition {
                        symbol: position.symbol.clone(),
                        reason: degradation_reason(&e),
                    });
                }
            }
        }

        valuation
    }

    /// Portfolio value over the configured window, on the union of all
    /// symbols' timestamps.
    ///
    /// Each symbol's trailing bar is dropped when it has not closed by `now`.
    pub async fn value_history(
        &self,
        price_service: &PriceService,
        positions: &[AggregatedPosition],
        now: DateTime<Utc>,
    ) -> PortfolioValueSeries {
        let open: Vec<&AggregatedPosition> = positions.iter().filter(|p| !p.is_closed()).collect();
        if open.is_empty() {
            return PortfolioValueSeries::empty();
        }

        let fetches = open.iter().map(|position| {
            price_service.history(&position.symbol, self.window, self.granularity)
        });
        let results = join_all(fetches).await;

        let mut weighted: Vec<(f64, PriceSeries)> = Vec::with_capacity(open.len());
        let mut degraded = Vec::new();

        for (position, result) in open.into_iter().zip(results) {
            match result {
                Ok(mut series) => {
                    if series.drop_incomplete_tail(self.granularity, now) {
                        log::debug!("Dropped still-forming bar for {}", position.symbol);
                    }
                    if series.is_empty() {
                        log::warn!("No completed bars for {}", position.symbol);
                        degraded.push(DegradedPosition {
                            symbol: position.symbol.clone(),
                            reason: DegradationReason::Unavailable("no completed bars".into()),
                        });
                    } else {
                        weighted.push((position.net_quantity, series));
                    }
                }
                Err(e) => {
                    log::warn!("Value history of {} degraded: {e}", position.symbol);
                    degraded.push(DegradedPosition {
                        symbol: position.symbol.clone(),
                        reason: degradation_reason(&e),
                    });
                }
            }
        }

        let points = combine_series(&weighted, self.missing_bar_policy);
        log::debug!(
            "Combined {} series into {} points ({} degraded)",
            weighted.len(),
            points.len(),
            degraded.len()
        );

        PortfolioValueSeries { points, degraded }
    }
}

/// Sum `quantity × price` across series on the sorted union of their timestamps.
///
/// Series are matched by timestamp, never by list position. A series with no
/// bar at an axis timestamp contributes according to `policy`. Every input
/// series must be sorted ascending with unique timestamps (as `PriceSeries::new`
/// guarantees).
pub fn combine_series(series: &[(f64, PriceSeries)], policy: MissingBarPolicy) -> Vec<ValuePoint> {
    let axis: BTreeSet<DateTime<Utc>> = series
        .iter()
        .flat_map(|(_, s)| s.points.iter().map(|p| p.timestamp))
        .collect();

    // Per series: index of the next unconsumed point and the last seen price
    let mut cursors: Vec<(usize, Option<f64>)> = vec![(0, None); series.len()];
    let mut points = Vec::with_capacity(axis.len());

    for timestamp in axis {
        let mut total = 0.0;
        for ((quantity, s), (cursor, last_price)) in series.iter().zip(cursors.iter_mut()) {
            let own_bar = s
                .points
                .get(*cursor)
                .filter(|p| p.timestamp == timestamp)
                .map(|p| p.price);

            let price = match own_bar {
                Some(price) => {
                    *cursor += 1;
                    *last_price = Some(price);
                    Some(price)
                }
                None => match policy {
                    MissingBarPolicy::CarryForward => *last_price,
                    MissingBarPolicy::Omit => None,
                },
            };

            if let Some(price) = price {
                total += quantity * price;
            }
        }
        points.push(ValuePoint {
            timestamp,
            total_value: total,
        });
    }

    points
}

fn degradation_reason(error: &CoreError) -> DegradationReason {
    match error {
        CoreError::SourceTimeout { .. } => DegradationReason::Timeout,
        other => DegradationReason::Unavailable(other.to_string()),
    }
}
