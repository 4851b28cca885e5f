//! Alpha Vantage API client for forex bars and spot quotes.
//!
//! Note: Free tier has very limited rate limits (25 requests/day, 5/minute).

use super::{split_pair, BarSource, QuoteSource};
use crate::error::{AppError, Result};
use crate::types::{Bar, BarSeries, Tick, Timeframe};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

const ALPHA_VANTAGE_URL: &str = "https://www.alphavantage.co/query";

/// Envelope shared by every Alpha Vantage response.
#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
    #[serde(flatten)]
    rest: HashMap<String, Value>,
}

impl ApiEnvelope {
    /// Vendor-side failure or rate limit message, if any.
    fn failure(&self) -> Option<&str> {
        self.error_message
            .as_deref()
            .or(self.note.as_deref())
            .or(self.information.as_deref())
    }
}

/// Individual FX time series data point.
#[derive(Debug, Clone, Deserialize)]
struct FxDataPoint {
    #[serde(rename = "1. open")]
    open: String,
    #[serde(rename = "2. high")]
    high: String,
    #[serde(rename = "3. low")]
    low: String,
    #[serde(rename = "4. close")]
    close: String,
}

/// Realtime exchange rate payload.
#[derive(Debug, Clone, Deserialize)]
struct ExchangeRate {
    #[serde(rename = "5. Exchange Rate")]
    rate: String,
    #[serde(rename = "6. Last Refreshed")]
    last_refreshed: Option<String>,
    #[serde(rename = "9. Ask Price")]
    ask: Option<String>,
}

/// Alpha Vantage API client.
pub struct AlphaVantageClient {
    client: Client,
    api_key: String,
}

impl AlphaVantageClient {
    /// Create a new Alpha Vantage client.
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
        }
    }

    /// Query parameters selecting the FX series for a timeframe.
    fn series_function(timeframe: Timeframe) -> Result<String> {
        let interval = match timeframe {
            Timeframe::OneDay => return Ok("function=FX_DAILY&outputsize=compact".to_string()),
            Timeframe::OneMinute => "1min",
            Timeframe::FiveMinutes => "5min",
            Timeframe::FifteenMinutes => "15min",
            Timeframe::ThirtyMinutes => "30min",
            Timeframe::OneHour => "60min",
            Timeframe::FourHours => {
                return Err(AppError::UnsupportedTimeframe(timeframe.to_string()))
            }
        };
        Ok(format!(
            "function=FX_INTRADAY&interval={}&outputsize=compact",
            interval
        ))
    }

    async fn get(&self, query: &str) -> Result<String> {
        let url = format!("{}?{}&apikey={}", ALPHA_VANTAGE_URL, query, self.api_key);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(AppError::ExternalApi(format!(
                "Alpha Vantage returned {}",
                response.status()
            )));
        }

        Ok(response.text().await?)
    }

    /// Parse an FX time series body into a bar series.
    pub fn parse_time_series(body: &str, symbol: &str, timeframe: Timeframe) -> Result<BarSeries> {
        let envelope: ApiEnvelope = serde_json::from_str(body)?;
        if let Some(message) = envelope.failure() {
            return Err(AppError::ExternalApi(message.to_string()));
        }

        let no_data = || AppError::NoData {
            symbol: symbol.to_string(),
            timeframe: timeframe.to_string(),
        };

        let series_value = envelope
            .rest
            .into_iter()
            .find(|(key, _)| key.starts_with("Time Series FX"))
            .map(|(_, value)| value)
            .ok_or_else(no_data)?;

        let points: HashMap<String, FxDataPoint> = serde_json::from_value(series_value)?;

        let bars: Vec<Bar> = points
            .into_iter()
            .filter_map(|(time_str, point)| {
                let timestamp = parse_timestamp(&time_str)?;
                let bar = Bar::new(
                    timestamp,
                    point.open.parse().ok()?,
                    point.high.parse().ok()?,
                    point.low.parse().ok()?,
                    point.close.parse().ok()?,
                    0.0,
                );
                match bar {
                    Ok(bar) => Some(bar),
                    Err(e) => {
                        warn!("Skipping Alpha Vantage bar {} for {}: {}", time_str, symbol, e);
                        None
                    }
                }
            })
            .collect();

        if bars.is_empty() {
            return Err(no_data());
        }

        BarSeries::from_unsorted(bars)
    }

    /// Parse a realtime exchange rate body into a tick.
    pub fn parse_exchange_rate(body: &str, symbol: &str) -> Result<Tick> {
        let envelope: ApiEnvelope = serde_json::from_str(body)?;
        if let Some(message) = envelope.failure() {
            return Err(AppError::ExternalApi(message.to_string()));
        }

        let rate_value = envelope
            .rest
            .get("Realtime Currency Exchange Rate")
            .cloned()
            .ok_or_else(|| AppError::ExternalApi(format!("No exchange rate for {}", symbol)))?;
        let rate: ExchangeRate = serde_json::from_value(rate_value)?;

        let price = rate
            .ask
            .as_deref()
            .and_then(|a| a.parse::<f64>().ok())
            .filter(|a| *a > 0.0)
            .or_else(|| rate.rate.parse().ok())
            .ok_or_else(|| AppError::ExternalApi(format!("Unparseable rate for {}", symbol)))?;

        let timestamp = rate
            .last_refreshed
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or_else(|| Utc::now().timestamp_millis());

        Ok(Tick::new(symbol, price, timestamp, 0.0))
    }
}

/// Parse "2024-01-02" or "2024-01-02 15:30:00" (UTC) to epoch milliseconds.
fn parse_timestamp(s: &str) -> Option<i64> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc().timestamp_millis());
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis())
}

#[async_trait]
impl BarSource for AlphaVantageClient {
    async fn fetch_bars(&self, symbol: &str, timeframe: Timeframe) -> Result<BarSeries> {
        let (from, to) = split_pair(symbol)
            .ok_or_else(|| AppError::ExternalApi(format!("Not a currency pair: {}", symbol)))?;
        let function = Self::series_function(timeframe)?;

        debug!("Fetching {} bars for {} from Alpha Vantage", timeframe, symbol);
        let body = self
            .get(&format!("{}&from_symbol={}&to_symbol={}", function, from, to))
            .await?;

        Self::parse_time_series(&body, symbol, timeframe)
    }
}

#[async_trait]
impl QuoteSource for AlphaVantageClient {
    async fn quote(&self, symbol: &str) -> Result<Tick> {
        let (from, to) = split_pair(symbol)
            .ok_or_else(|| AppError::ExternalApi(format!("Not a currency pair: {}", symbol)))?;

        let body = self
            .get(&format!(
                "function=CURRENCY_EXCHANGE_RATE&from_currency={}&to_currency={}",
                from, to
            ))
            .await?;

        Self::parse_exchange_rate(&body, symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAILY_BODY: &str = r#"{
        "Meta Data": {"1. Information": "Forex Daily Prices (open, high, low, close)"},
        "Time Series FX (Daily)": {
            "2024-01-03": {"1. open": "1.0920", "2. high": "1.0940", "3. low": "1.0890", "4. close": "1.0925"},
            "2024-01-02": {"1. open": "1.1040", "2. high": "1.1045", "3. low": "1.0900", "4. close": "1.0920"},
            "2024-01-04": {"1. open": "1.0925", "2. high": "1.0960", "3. low": "1.0910", "4. close": "1.0950"}
        }
    }"#;

    #[test]
    fn test_parse_daily_series_sorted() {
        let series =
            AlphaVantageClient::parse_time_series(DAILY_BODY, "EUR/USD", Timeframe::OneDay).unwrap();
        assert_eq!(series.close_prices(), vec![1.0920, 1.0925, 1.0950]);
        assert_eq!(series.bars()[0].volume, 0.0);
    }

    #[test]
    fn test_parse_intraday_timestamps() {
        let body = r#"{
            "Time Series FX (5min)": {
                "2024-01-02 10:05:00": {"1. open": "1.1", "2. high": "1.1", "3. low": "1.1", "4. close": "1.1"},
                "2024-01-02 10:00:00": {"1. open": "1.1", "2. high": "1.1", "3. low": "1.1", "4. close": "1.1"}
            }
        }"#;
        let series =
            AlphaVantageClient::parse_time_series(body, "EUR/USD", Timeframe::FiveMinutes).unwrap();
        let bars = series.bars();
        assert_eq!(bars[1].timestamp - bars[0].timestamp, 300_000);
    }

    #[test]
    fn test_missing_series_is_no_data() {
        let body = r#"{"Meta Data": {}}"#;
        let result = AlphaVantageClient::parse_time_series(body, "EUR/USD", Timeframe::OneDay);
        assert!(matches!(result, Err(AppError::NoData { .. })));
    }

    #[test]
    fn test_empty_series_is_no_data() {
        let body = r#"{"Time Series FX (Daily)": {}}"#;
        let result = AlphaVantageClient::parse_time_series(body, "EUR/USD", Timeframe::OneDay);
        assert!(matches!(result, Err(AppError::NoData { .. })));
    }

    #[test]
    fn test_rate_limit_note_is_external_error() {
        let body = r#"{"Note": "Thank you for using Alpha Vantage! Our standard API call frequency is 5 calls per minute"}"#;
        let result = AlphaVantageClient::parse_time_series(body, "EUR/USD", Timeframe::OneDay);
        assert!(matches!(result, Err(AppError::ExternalApi(_))));
    }

    #[test]
    fn test_four_hour_timeframe_unsupported() {
        assert!(matches!(
            AlphaVantageClient::series_function(Timeframe::FourHours),
            Err(AppError::UnsupportedTimeframe(_))
        ));
        assert!(AlphaVantageClient::series_function(Timeframe::OneHour)
            .unwrap()
            .contains("interval=60min"));
    }

    #[test]
    fn test_parse_exchange_rate_prefers_ask() {
        let body = r#"{
            "Realtime Currency Exchange Rate": {
                "1. From_Currency Code": "EUR",
                "3. To_Currency Code": "USD",
                "5. Exchange Rate": "1.08500000",
                "6. Last Refreshed": "2024-01-02 10:00:01",
                "8. Bid Price": "1.08490000",
                "9. Ask Price": "1.08510000"
            }
        }"#;
        let tick = AlphaVantageClient::parse_exchange_rate(body, "EUR/USD").unwrap();
        assert_eq!(tick.symbol, "EUR/USD");
        assert_eq!(tick.price, 1.0851);
        assert_eq!(tick.timestamp, 1704189601000);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert_eq!(parse_timestamp("1970-01-02"), Some(86_400_000));
        assert_eq!(parse_timestamp("1970-01-01 00:00:01"), Some(1000));
        assert_eq!(parse_timestamp("yesterday"), None);
    }
}
