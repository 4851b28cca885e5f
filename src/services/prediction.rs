//! Combines a point forecast with an indicator snapshot.

use crate::error::Result;
use crate::services::indicators::volatility::volatility;
use crate::types::{BarSeries, Forecast, IndicatorResult, Prediction, RiskLevel, Trend};

/// Trailing bars used for risk classification.
pub const DEFAULT_RISK_WINDOW: usize = 30;

#[derive(Debug, Clone, Copy)]
pub struct PredictionAggregator {
    risk_window: usize,
}

impl Default for PredictionAggregator {
    fn default() -> Self {
        Self {
            risk_window: DEFAULT_RISK_WINDOW,
        }
    }
}

impl PredictionAggregator {
    pub fn new(risk_window: usize) -> Self {
        Self {
            risk_window: risk_window.max(1),
        }
    }

    /// Build a prediction record.
    ///
    /// Fails with `EmptySeries` when there is no last close to compare the
    /// forecast against.
    pub fn aggregate(
        &self,
        series: &BarSeries,
        forecast: &Forecast,
        indicators: &IndicatorResult,
    ) -> Result<Prediction> {
        let last_close = series.last()?.close;

        let trailing = series.tail(self.risk_window).close_prices();
        let risk = volatility(&trailing, trailing.len())?;

        Ok(Prediction {
            prediction: forecast.prediction,
            trend: Trend::from_forecast(forecast.prediction, last_close),
            confidence: clamp_unit(forecast.confidence),
            risk_level: RiskLevel::from_volatility(risk),
            indicators: indicators.clone(),
            support_levels: indicators.levels.support.clone(),
            resistance_levels: indicators.levels.resistance.clone(),
        })
    }
}

/// Clamp into [0, 1]; NaN reads as no confidence.
pub(crate) fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
