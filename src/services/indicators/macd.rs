//! MACD (Moving Average Convergence Divergence) indicator.

use super::ema::{ema, ema_series};
use super::{check_period, Indicator};
use crate::error::{AppError, Result};
use crate::types::{BarSeries, MacdResult};

/// MACD line path: fast EMA minus slow EMA, aligned on the slow EMA.
pub fn macd_line_series(values: &[f64], fast: usize, slow: usize) -> Result<Vec<f64>> {
    check_period(fast)?;
    if fast >= slow {
        return Err(AppError::InvalidPeriod(fast));
    }
    if values.len() < slow {
        return Err(AppError::insufficient(slow, values.len()));
    }

    let fast_ema = ema_series(values, fast)?;
    let slow_ema = ema_series(values, slow)?;

    // Fast path starts `slow - fast` values earlier.
    let offset = slow - fast;
    Ok(fast_ema
        .iter()
        .skip(offset)
        .zip(slow_ema.iter())
        .map(|(f, s)| f - s)
        .collect())
}

/// MACD at the latest value, with the signal line taken over the MACD history.
pub fn macd(values: &[f64], fast: usize, slow: usize, signal: usize) -> Result<MacdResult> {
    check_period(signal)?;
    let line = macd_line_series(values, fast, slow)?;
    let macd_line = *line
        .last()
        .ok_or_else(|| AppError::insufficient(slow, values.len()))?;

    // Short histories use the whole available path as the signal window.
    let signal_line = ema(&line, signal.min(line.len()))?;

    Ok(MacdResult {
        macd_line,
        signal_line,
        histogram: macd_line - signal_line,
    })
}

/// MACD indicator.
///
/// - MACD Line = EMA(12) - EMA(26)
/// - Signal Line = EMA(9) of MACD Line
/// - Histogram = MACD Line - Signal Line
#[derive(Debug, Clone, Copy)]
pub struct Macd {
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
}

impl Default for Macd {
    fn default() -> Self {
        Self {
            fast_period: 12,
            slow_period: 26,
            signal_period: 9,
        }
    }
}

impl Macd {
    pub fn new(fast_period: usize, slow_period: usize, signal_period: usize) -> Self {
        Self {
            fast_period,
            slow_period,
            signal_period,
        }
    }
}

impl Indicator for Macd {
    type Output = MacdResult;

    fn id(&self) -> &str {
        "macd"
    }

    fn min_periods(&self) -> usize {
        self.slow_period
    }

    fn calculate(&self, series: &BarSeries) -> Result<MacdResult> {
        macd(
            &series.close_prices(),
            self.fast_period,
            self.slow_period,
            self.signal_period,
        )
    }
}
