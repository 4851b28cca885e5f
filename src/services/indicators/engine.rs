//! Full indicator snapshots, single and batched.

use super::{levels, Ema, Indicator, Macd, Rsi, Sma, Volatility};
use crate::config::IndicatorConfig;
use crate::error::{AppError, Result};
use crate::types::{BarSeries, IndicatorResult};
use rayon::prelude::*;
use tracing::debug;

/// Computes every indicator a prediction or advice request needs.
#[derive(Debug, Clone, Default)]
pub struct IndicatorEngine {
    config: IndicatorConfig,
}

impl IndicatorEngine {
    pub fn new(config: IndicatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &IndicatorConfig {
        &self.config
    }

    /// Longest lookback across the configured indicators.
    pub fn min_periods(&self) -> usize {
        [
            self.rsi().min_periods(),
            self.sma().min_periods(),
            self.ema().min_periods(),
            self.volatility().min_periods(),
            self.macd().min_periods(),
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }

    /// Compute a full snapshot for one series.
    pub fn compute(&self, series: &BarSeries) -> Result<IndicatorResult> {
        let required = self.min_periods();
        if series.len() < required {
            return Err(AppError::insufficient(required, series.len()));
        }

        let closes = series.close_prices();
        let c = &self.config;

        Ok(IndicatorResult {
            rsi: super::rsi::rsi(&closes, c.rsi_period)?,
            macd: super::macd::macd(&closes, c.macd_fast, c.macd_slow, c.macd_signal)?,
            sma: super::sma::sma(&closes, c.sma_period)?,
            ema: super::ema::ema(&closes, c.ema_period)?,
            volatility: super::volatility::volatility(&closes, c.volatility_window)?,
            levels: levels::support_resistance(&closes, c.max_levels),
        })
    }

    /// Compute snapshots for many series in parallel.
    ///
    /// Results keep input order; each series fails or succeeds on its own.
    pub fn compute_many<K>(&self, inputs: &[(K, &BarSeries)]) -> Vec<(K, Result<IndicatorResult>)>
    where
        K: Clone + Send + Sync,
    {
        debug!("Computing indicators for {} series", inputs.len());
        inputs
            .par_iter()
            .map(|(key, series)| (key.clone(), self.compute(series)))
            .collect()
    }

    fn rsi(&self) -> Rsi {
        Rsi::new(self.config.rsi_period)
    }

    fn sma(&self) -> Sma {
        Sma::new(self.config.sma_period)
    }

    fn ema(&self) -> Ema {
        Ema::new(self.config.ema_period)
    }

    fn volatility(&self) -> Volatility {
        Volatility::new(self.config.volatility_window)
    }

    fn macd(&self) -> Macd {
        Macd::new(self.config.macd_fast, self.config.macd_slow, self.config.macd_signal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::indicators::test_support::{series_from_closes, uptrend};

    #[test]
    fn test_default_min_periods() {
        // Volatility window of 30 is the longest default lookback.
        assert_eq!(IndicatorEngine::default().min_periods(), 30);
    }

    #[test]
    fn test_compute_rejects_short_series() {
        let result = IndicatorEngine::default().compute(&uptrend(29));
        assert!(matches!(
            result,
            Err(AppError::InsufficientData { required: 30, available: 29 })
        ));
    }

    #[test]
    fn test_compute_snapshot() {
        let closes: Vec<f64> = (0..40)
            .map(|i| 1.08 + if i % 2 == 0 { 0.002 } else { -0.002 } + i as f64 * 0.0001)
            .collect();
        let series = series_from_closes(&closes);
        let result = IndicatorEngine::default().compute(&series).unwrap();

        assert!((0.0..=100.0).contains(&result.rsi));
        assert!(result.volatility > 0.0);
        assert_eq!(result.levels.support.len(), 3);
        assert_eq!(result.levels.resistance.len(), 3);
    }

    #[test]
    fn test_compute_many_keeps_order_and_isolates_errors() {
        let long = uptrend(50);
        let short = uptrend(5);
        let inputs = vec![("EUR/USD", &long), ("GBP/USD", &short), ("USD/JPY", &long)];

        let results = IndicatorEngine::default().compute_many(&inputs);

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].0, "EUR/USD");
        assert!(results[0].1.is_ok());
        assert!(matches!(results[1].1, Err(AppError::InsufficientData { .. })));
        assert_eq!(results[0].1.as_ref().unwrap(), results[2].1.as_ref().unwrap());
    }
}
