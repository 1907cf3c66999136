use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::valuation::{CurrentValuation, PortfolioValueSeries};

/// Chart payload for the presentation layer.
///
/// The core computes all the numbers; the frontend just renders them.
/// `timestamps[i]` pairs with `values[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPayload {
    pub timestamps: Vec<DateTime<Utc>>,
    pub values: Vec<f64>,

    /// Symbols excluded from the values above
    pub degraded: Vec<String>,
}

impl From<&PortfolioValueSeries> for ChartPayload {
    fn from(series: &PortfolioValueSeries) -> Self {
        let (timestamps, values) = series
            .points
            .iter()
            .map(|p| (p.timestamp, p.total_value))
            .unzip();
        Self {
            timestamps,
            values,
            degraded: series.degraded.iter().map(|d| d.symbol.clone()).collect(),
        }
    }
}

/// Headline figure for the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentTotalPayload {
    pub current_total: f64,

    /// `false` when at least one position could not be priced
    pub complete: bool,

    pub degraded: Vec<String>,
}

impl From<&CurrentValuation> for CurrentTotalPayload {
    fn from(valuation: &CurrentValuation) -> Self {
        Self {
            current_total: valuation.current_total,
            complete: valuation.is_complete(),
            degraded: valuation.degraded.iter().map(|d| d.symbol.clone()).collect(),
        }
    }
}
