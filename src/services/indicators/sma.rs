//! Simple Moving Average (SMA) indicator.

use super::{check_period, Indicator};
use crate::error::{AppError, Result};
use crate::types::BarSeries;

/// Arithmetic mean of the last `period` values.
pub fn sma(values: &[f64], period: usize) -> Result<f64> {
    check_period(period)?;
    if values.len() < period {
        return Err(AppError::insufficient(period, values.len()));
    }

    let sum: f64 = values[values.len() - period..].iter().sum();
    Ok(sum / period as f64)
}

/// SMA (Simple Moving Average) indicator.
///
/// Average close over the trailing `period` bars.
#[derive(Debug, Clone, Copy)]
pub struct Sma {
    period: usize,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        Self { period }
    }
}

impl Default for Sma {
    fn default() -> Self {
        Self { period: 20 }
    }
}

impl Indicator for Sma {
    type Output = f64;

    fn id(&self) -> &str {
        "sma"
    }

    fn min_periods(&self) -> usize {
        self.period
    }

    fn calculate(&self, series: &BarSeries) -> Result<f64> {
        sma(&series.close_prices(), self.period)
    }
}
