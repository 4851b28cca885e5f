//! Exponential Moving Average (EMA) indicator.

use super::{check_period, Indicator};
use crate::error::{AppError, Result};
use crate::types::BarSeries;

/// Full EMA path, one value per input from index `period - 1` onward.
///
/// Seeded with the SMA of the first `period` values, then
/// `ema_i = value_i * k + ema_{i-1} * (1 - k)` with `k = 2 / (period + 1)`.
/// A single-value input yields that value.
pub fn ema_series(values: &[f64], period: usize) -> Result<Vec<f64>> {
    check_period(period)?;
    if values.len() == 1 {
        return Ok(vec![values[0]]);
    }
    if values.len() < period {
        return Err(AppError::insufficient(period, values.len()));
    }

    let k = 2.0 / (period as f64 + 1.0);
    let seed = values[..period].iter().sum::<f64>() / period as f64;

    let mut path = Vec::with_capacity(values.len() - period + 1);
    path.push(seed);

    let mut ema = seed;
    for value in &values[period..] {
        ema = value * k + ema * (1.0 - k);
        path.push(ema);
    }

    Ok(path)
}

/// EMA at the latest value.
pub fn ema(values: &[f64], period: usize) -> Result<f64> {
    let path = ema_series(values, period)?;
    path.last()
        .copied()
        .ok_or_else(|| AppError::insufficient(period, values.len()))
}

/// EMA (Exponential Moving Average) indicator.
///
/// Like SMA but gives more weight to recent closes.
#[derive(Debug, Clone, Copy)]
pub struct Ema {
    period: usize,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        Self { period }
    }
}

impl Default for Ema {
    fn default() -> Self {
        Self { period: 20 }
    }
}

impl Indicator for Ema {
    type Output = f64;

    fn id(&self) -> &str {
        "ema"
    }

    fn min_periods(&self) -> usize {
        self.period
    }

    fn calculate(&self, series: &BarSeries) -> Result<f64> {
        ema(&series.close_prices(), self.period)
    }
}
