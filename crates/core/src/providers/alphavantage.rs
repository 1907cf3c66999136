use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::America::New_York;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::errors::CoreError;
use crate::models::price::{Granularity, PricePoint, Window};
use super::traits::PriceHistorySource;

const BASE_URL: &str = "https://www.alphavantage.co/query";
const PROVIDER_NAME: &str = "Alpha Vantage";

/// Alpha Vantage API provider for stock/equity prices.
///
/// - **Free tier**: 25 requests/day (across ALL endpoints).
/// - **Requires**: API key (set via settings as "alphavantage").
/// - **Coverage**: 100k+ global equity symbols.
/// - **Intraday**: 1, 5, 15, 30 and 60 minute bars, timestamped in US/Eastern.
///
/// Registered after Yahoo Finance, so it only answers when Yahoo fails.
pub struct AlphaVantageProvider {
    client: Client,
    api_key: String,
}

impl AlphaVantageProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| Client::new()),
            api_key,
        }
    }

    /// Intraday interval parameter for a granularity, `None` if Alpha Vantage has no such bar size.
    pub fn intraday_interval(granularity: Granularity) -> Option<&'static str> {
        match granularity {
            Granularity::OneMinute => Some("1min"),
            Granularity::FiveMinutes => Some("5min"),
            Granularity::FifteenMinutes => Some("15min"),
            Granularity::ThirtyMinutes => Some("30min"),
            Granularity::OneHour => Some("60min"),
            Granularity::TwoMinutes | Granularity::OneDay => None,
        }
    }

    /// Parse an intraday timestamp ("2024-01-05 15:59:00", US/Eastern) into UTC.
    pub fn parse_eastern_timestamp(raw: &str) -> Option<DateTime<Utc>> {
        let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").ok()?;
        New_York
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Parse a daily bar date ("2024-01-05") into midnight UTC.
    pub fn parse_daily_timestamp(raw: &str) -> Option<DateTime<Utc>> {
        let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
        date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc())
    }

    /// Keep only the points that fall inside `window`, measured back from the latest point.
    ///
    /// `Window::OneDay` keeps the latest trading day (by New York calendar date).
    pub fn trim_to_window(mut points: Vec<PricePoint>, window: Window) -> Vec<PricePoint> {
        points.sort_by_key(|p| p.timestamp);
        let Some(latest) = points.last().map(|p| p.timestamp) else {
            return points;
        };

        match window {
            Window::OneDay => {
                let session = latest.with_timezone(&New_York).date_naive();
                points.retain(|p| p.timestamp.with_timezone(&New_York).date_naive() == session);
            }
            _ => {
                let cutoff = latest - window.lookback();
                points.retain(|p| p.timestamp > cutoff);
            }
        }
        points
    }

    fn outputsize(window: Window) -> &'static str {
        match window {
            Window::OneDay => "compact",
            _ => "full",
        }
    }

    /// Fetch a raw time series object. Alpha Vantage names it after the
    /// interval ("Time Series (1min)", "Time Series (Daily)"), so the key is
    /// located by prefix.
    async fn fetch_series(
        &self,
        symbol: &str,
        params: &[(&str, &str)],
    ) -> Result<HashMap<String, BarData>, CoreError> {
        let upper = symbol.to_uppercase();
        let mut query: Vec<(&str, &str)> = vec![("symbol", upper.as_str()), ("apikey", self.api_key.as_str())];
        query.extend_from_slice(params);

        let resp: HashMap<String, serde_json::Value> = self
            .client
            .get(BASE_URL)
            .query(&query)
            .send()
            .await?
            .json()
            .await
            .map_err(|e| CoreError::Api {
                provider: PROVIDER_NAME.into(),
                message: format!("Failed to parse time series for {symbol}: {e}"),
            })?;

        let series = resp
            .into_iter()
            .find(|(key, _)| key.starts_with("Time Series"))
            .map(|(_, value)| value)
            .ok_or_else(|| CoreError::Api {
                provider: PROVIDER_NAME.into(),
                message: format!("No time series data for {symbol}. API limit may be exceeded."),
            })?;

        serde_json::from_value(series).map_err(|e| CoreError::Api {
            provider: PROVIDER_NAME.into(),
            message: format!("Unexpected time series layout for {symbol}: {e}"),
        })
    }
}

// ── Alpha Vantage API response types ────────────────────────────────

#[derive(Deserialize)]
struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote")]
    global_quote: Option<GlobalQuote>,
}

#[derive(Deserialize)]
struct GlobalQuote {
    #[serde(rename = "05. price")]
    price: Option<String>,
}

#[derive(Deserialize)]
struct BarData {
    #[serde(rename = "4. close")]
    close: String,
}

#[async_trait]
impl PriceHistorySource for AlphaVantageProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn latest_price(&self, symbol: &str) -> Result<f64, CoreError> {
        let resp: GlobalQuoteResponse = self
            .client
            .get(BASE_URL)
            .query(&[
                ("function", "GLOBAL_QUOTE"),
                ("symbol", &symbol.to_uppercase()),
                ("apikey", &self.api_key),
            ])
            .send()
            .await?
            .json()
            .await
            .map_err(|e| CoreError::Api {
                provider: PROVIDER_NAME.into(),
                message: format!("Failed to parse quote for {symbol}: {e}"),
            })?;

        let price_str = resp
            .global_quote
            .and_then(|q| q.price)
            .ok_or_else(|| CoreError::PriceNotAvailable {
                symbol: symbol.to_string(),
                detail: "no quote data, API limit may be exceeded".into(),
            })?;

        price_str.parse().map_err(|e| CoreError::Api {
            provider: PROVIDER_NAME.into(),
            message: format!("Invalid price format for {symbol}: {e}"),
        })
    }

    async fn history(
        &self,
        symbol: &str,
        window: Window,
        granularity: Granularity,
    ) -> Result<Vec<PricePoint>, CoreError> {
        let daily = granularity == Granularity::OneDay;
        let series = if daily {
            self.fetch_series(
                symbol,
                &[
                    ("function", "TIME_SERIES_DAILY"),
                    ("outputsize", Self::outputsize(window)),
                ],
            )
            .await?
        } else {
            let interval = Self::intraday_interval(granularity).ok_or_else(|| CoreError::Api {
                provider: PROVIDER_NAME.into(),
                message: format!("Unsupported granularity {granularity}"),
            })?;
            self.fetch_series(
                symbol,
                &[
                    ("function", "TIME_SERIES_INTRADAY"),
                    ("interval", interval),
                    ("outputsize", Self::outputsize(window)),
                ],
            )
            .await?
        };

        // Daily bars carry a bare date, intraday bars a New York wall-clock time
        let parse: fn(&str) -> Option<DateTime<Utc>> = if daily {
            Self::parse_daily_timestamp
        } else {
            Self::parse_eastern_timestamp
        };

        let points: Vec<PricePoint> = series
            .iter()
            .filter_map(|(raw_ts, bar)| {
                let timestamp = parse(raw_ts)?;
                let price: f64 = bar.close.parse().ok()?;
                Some(PricePoint::new(timestamp, price))
            })
            .collect();

        Ok(Self::trim_to_window(points, window))
    }
}
