use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A single price data point (timestamp → close price).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
}

impl PricePoint {
    pub fn new(timestamp: DateTime<Utc>, price: f64) -> Self {
        Self { timestamp, price }
    }
}

/// Bar size of a price history request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Granularity {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "2m")]
    TwoMinutes,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "1d")]
    OneDay,
}

impl Granularity {
    /// Length of one bar.
    pub fn duration(&self) -> Duration {
        match self {
            Granularity::OneMinute => Duration::minutes(1),
            Granularity::TwoMinutes => Duration::minutes(2),
            Granularity::FiveMinutes => Duration::minutes(5),
            Granularity::FifteenMinutes => Duration::minutes(15),
            Granularity::ThirtyMinutes => Duration::minutes(30),
            Granularity::OneHour => Duration::hours(1),
            Granularity::OneDay => Duration::days(1),
        }
    }

    /// Interval string as understood by Yahoo Finance's chart endpoint.
    pub fn as_interval(&self) -> &'static str {
        match self {
            Granularity::OneMinute => "1m",
            Granularity::TwoMinutes => "2m",
            Granularity::FiveMinutes => "5m",
            Granularity::FifteenMinutes => "15m",
            Granularity::ThirtyMinutes => "30m",
            Granularity::OneHour => "1h",
            Granularity::OneDay => "1d",
        }
    }
}

impl std::fmt::Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_interval())
    }
}

/// Lookback window of a price history request.
///
/// `OneDay` means "the most recent trading day", not a rolling 24 hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Window {
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "5d")]
    FiveDays,
    #[serde(rename = "1mo")]
    OneMonth,
    #[serde(rename = "3mo")]
    ThreeMonths,
    #[serde(rename = "6mo")]
    SixMonths,
    #[serde(rename = "1y")]
    OneYear,
}

impl Window {
    /// Range string as understood by Yahoo Finance's chart endpoint.
    pub fn as_range(&self) -> &'static str {
        match self {
            Window::OneDay => "1d",
            Window::FiveDays => "5d",
            Window::OneMonth => "1mo",
            Window::ThreeMonths => "3mo",
            Window::SixMonths => "6mo",
            Window::OneYear => "1y",
        }
    }

    /// Calendar span covered by the window, measured back from the latest bar.
    pub fn lookback(&self) -> Duration {
        match self {
            Window::OneDay => Duration::days(1),
            Window::FiveDays => Duration::days(5),
            Window::OneMonth => Duration::days(30),
            Window::ThreeMonths => Duration::days(91),
            Window::SixMonths => Duration::days(182),
            Window::OneYear => Duration::days(365),
        }
    }
}

impl std::fmt::Display for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_range())
    }
}

/// Ordered close prices of one symbol, ascending by timestamp.
///
/// Produced per request by a price source; never cached or persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub symbol: String,
    pub points: Vec<PricePoint>,
}

impl PriceSeries {
    /// Build a series from raw provider points.
    ///
    /// Points with non-finite or negative prices are discarded, the rest are
    /// sorted by timestamp and de-duplicated (the later point for a timestamp wins).
    pub fn new(symbol: impl Into<String>, points: Vec<PricePoint>) -> Self {
        let mut points: Vec<PricePoint> = points
            .into_iter()
            .filter(|p| p.price.is_finite() && p.price >= 0.0)
            .collect();
        points.sort_by_key(|p| p.timestamp);

        let mut deduped: Vec<PricePoint> = Vec::with_capacity(points.len());
        for point in points {
            match deduped.last_mut() {
                Some(last) if last.timestamp == point.timestamp => *last = point,
                _ => deduped.push(point),
            }
        }

        Self {
            symbol: symbol.into(),
            points: deduped,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The most recent point, if any.
    pub fn latest(&self) -> Option<&PricePoint> {
        self.points.last()
    }

    /// Exact-match lookup. Uses binary search (O(log n)).
    pub fn price_at(&self, timestamp: DateTime<Utc>) -> Option<f64> {
        self.points
            .binary_search_by_key(&timestamp, |p| p.timestamp)
            .ok()
            .map(|idx| self.points[idx].price)
    }

    /// Remove the trailing bar if its interval has not closed by `now`.
    /// Returns `true` if a bar was dropped.
    pub fn drop_incomplete_tail(&mut self, granularity: Granularity, now: DateTime<Utc>) -> bool {
        let still_forming = self
            .points
            .last()
            .is_some_and(|last| last.timestamp + granularity.duration() > now);
        if still_forming {
            self.points.pop();
        }
        still_forming
    }
}
