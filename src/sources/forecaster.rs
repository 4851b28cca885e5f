//! Remote point-forecast client.
//!
//! Posts per-bar features to an HTTP JSON endpoint and reads back a
//! one-step-ahead price with a confidence score.

use super::Forecaster;
use crate::config::IndicatorConfig;
use crate::error::{AppError, Result};
use crate::services::indicators::{macd::macd_line_series, rsi::rsi};
use crate::types::{BarSeries, Forecast, IndicatorResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

const DEFAULT_MODEL: &str = "deepseek-r1";

/// Features sent for each bar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureRow {
    pub close_price: f64,
    pub volume: f64,
    /// Rolling RSI ending at this bar, once enough history exists.
    pub rsi: Option<f64>,
    /// Rolling MACD line ending at this bar, once enough history exists.
    pub macd_line: Option<f64>,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize)]
struct ForecastParameters {
    prediction_horizon: u32,
    confidence_interval: f64,
    features: &'static [&'static str],
}

#[derive(Debug, Clone, Serialize)]
struct ForecastRequest<'a> {
    model: &'a str,
    symbol: &'a str,
    data: Vec<FeatureRow>,
    parameters: ForecastParameters,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    prediction: f64,
    #[serde(default)]
    confidence: f64,
}

/// HTTP forecaster.
pub struct RemoteForecaster {
    client: Client,
    url: String,
    api_key: Option<String>,
    indicators: IndicatorConfig,
}

impl RemoteForecaster {
    pub fn new(url: String, api_key: Option<String>, indicators: IndicatorConfig) -> Self {
        Self {
            client: Client::new(),
            url,
            api_key,
            indicators,
        }
    }

    /// Build the per-bar feature rows for `series`.
    pub fn feature_rows(series: &BarSeries, config: &IndicatorConfig) -> Vec<FeatureRow> {
        let closes = series.close_prices();
        let period = config.rsi_period;

        // Entry j of the MACD path ends at close index j + slow - 1.
        let macd_path = macd_line_series(&closes, config.macd_fast, config.macd_slow)
            .unwrap_or_default();
        let macd_start = config.macd_slow.saturating_sub(1);

        series
            .bars()
            .iter()
            .enumerate()
            .map(|(i, bar)| FeatureRow {
                close_price: bar.close,
                volume: bar.volume,
                rsi: if i >= period {
                    rsi(&closes[i - period..=i], period).ok()
                } else {
                    None
                },
                macd_line: i
                    .checked_sub(macd_start)
                    .and_then(|j| macd_path.get(j))
                    .copied(),
                timestamp: bar.timestamp,
            })
            .collect()
    }
}

#[async_trait]
impl Forecaster for RemoteForecaster {
    async fn forecast(
        &self,
        symbol: &str,
        series: &BarSeries,
        _indicators: &IndicatorResult,
    ) -> Result<Forecast> {
        let request = ForecastRequest {
            model: DEFAULT_MODEL,
            symbol,
            data: Self::feature_rows(series, &self.indicators),
            parameters: ForecastParameters {
                prediction_horizon: 1,
                confidence_interval: 0.95,
                features: &["close_price", "volume", "rsi", "macd_line"],
            },
        };

        debug!("Requesting forecast for {} over {} bars", symbol, request.data.len());

        let mut builder = self.client.post(&self.url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        if !response.status().is_success() {
            return Err(AppError::ExternalApi(format!(
                "Forecast endpoint returned {}",
                response.status()
            )));
        }

        let body: ForecastResponse = response.json().await?;
        if !body.prediction.is_finite() {
            return Err(AppError::ExternalApi(format!(
                "Non-finite forecast for {}",
                symbol
            )));
        }

        Ok(Forecast {
            prediction: body.prediction,
            confidence: body.confidence,
        })
    }
}
