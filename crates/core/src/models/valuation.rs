use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why a position could not be valued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DegradationReason {
    /// The source answered with an error or no data
    Unavailable(String),
    /// The source did not answer within the configured fetch timeout
    Timeout,
}

impl std::fmt::Display for DegradationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DegradationReason::Unavailable(msg) => write!(f, "unavailable: {msg}"),
            DegradationReason::Timeout => write!(f, "timed out"),
        }
    }
}

/// A position left out of a total because its price could not be obtained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DegradedPosition {
    pub symbol: String,
    pub reason: DegradationReason,
}

/// Valuation of one aggregated position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionValuation {
    pub symbol: String,
    pub quantity: f64,

    /// Latest price, `None` when the position is degraded
    pub price: Option<f64>,

    /// `quantity × price`, `None` when the position is degraded
    pub value: Option<f64>,
}

impl PositionValuation {
    pub fn is_degraded(&self) -> bool {
        self.price.is_none()
    }
}

/// Current value of a user's portfolio.
///
/// `current_total` only sums the positions that could be priced. A result
/// with a non-empty `degraded` list is a best-effort partial total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentValuation {
    pub current_total: f64,
    pub positions: Vec<PositionValuation>,
    pub degraded: Vec<DegradedPosition>,
}

impl CurrentValuation {
    /// Nothing to value: zero total, no positions, nothing degraded.
    pub fn empty() -> Self {
        Self {
            current_total: 0.0,
            positions: Vec::new(),
            degraded: Vec::new(),
        }
    }

    /// `true` when every position was priced.
    pub fn is_complete(&self) -> bool {
        self.degraded.is_empty()
    }

    pub fn degraded_symbols(&self) -> Vec<&str> {
        self.degraded.iter().map(|d| d.symbol.as_str()).collect()
    }
}

/// Total portfolio value at one timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuePoint {
    pub timestamp: DateTime<Utc>,
    pub total_value: f64,
}

/// Portfolio value over time, on the union of all symbols' timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioValueSeries {
    pub points: Vec<ValuePoint>,
    pub degraded: Vec<DegradedPosition>,
}

impl PortfolioValueSeries {
    pub fn empty() -> Self {
        Self {
            points: Vec::new(),
            degraded: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.degraded.is_empty()
    }

    /// Value at an exact timestamp on the canonical axis.
    pub fn value_at(&self, timestamp: DateTime<Utc>) -> Option<f64> {
        self.points
            .binary_search_by_key(&timestamp, |p| p.timestamp)
            .ok()
            .map(|idx| self.points[idx].total_value)
    }
}
