//! Relative Strength Index (RSI) indicator.

use super::{check_period, Indicator};
use crate::error::{AppError, Result};
use crate::types::BarSeries;

/// RSI over the most recent `period` close-to-close differences.
///
/// Uses simple averages of gains and losses rather than Wilder smoothing.
/// A window with losses of zero saturates at 100; a completely flat window
/// reads 50.
pub fn rsi(values: &[f64], period: usize) -> Result<f64> {
    check_period(period)?;
    let required = period.checked_add(1).ok_or(AppError::InvalidPeriod(period))?;
    if values.len() < required {
        return Err(AppError::insufficient(required, values.len()));
    }

    let window = &values[values.len() - required..];
    let mut gains = 0.0;
    let mut losses = 0.0;

    for pair in window.windows(2) {
        let change = pair[1] - pair[0];
        if change > 0.0 {
            gains += change;
        } else {
            losses -= change;
        }
    }

    let avg_gain = gains / period as f64;
    let avg_loss = losses / period as f64;

    if avg_loss == 0.0 {
        return Ok(if avg_gain == 0.0 { 50.0 } else { 100.0 });
    }

    let rs = avg_gain / avg_loss;
    Ok(100.0 - (100.0 / (1.0 + rs)))
}

/// RSI (Relative Strength Index) indicator.
///
/// Values range from 0-100:
/// - Below 30: Oversold
/// - Above 70: Overbought
#[derive(Debug, Clone, Copy)]
pub struct Rsi {
    period: usize,
}

impl Default for Rsi {
    fn default() -> Self {
        Self { period: 14 }
    }
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        Self { period }
    }
}

impl Indicator for Rsi {
    type Output = f64;

    fn id(&self) -> &str {
        "rsi"
    }

    fn min_periods(&self) -> usize {
        self.period.saturating_add(1)
    }

    fn calculate(&self, series: &BarSeries) -> Result<f64> {
        rsi(&series.close_prices(), self.period)
    }
}
