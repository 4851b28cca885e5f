//! Technical indicator implementations.
//!
//! Every indicator is a pure function of a [`BarSeries`] and its parameters.
//! Nothing here holds state between calls, so the same input always yields
//! the same output and calls can run on any thread.

pub mod ema;
pub mod engine;
pub mod levels;
pub mod macd;
pub mod rsi;
pub mod sma;
pub mod volatility;

pub use ema::Ema;
pub use engine::IndicatorEngine;
pub use levels::SupportResistance;
pub use macd::Macd;
pub use rsi::Rsi;
pub use sma::Sma;
pub use volatility::Volatility;

use crate::error::{AppError, Result};
use crate::types::BarSeries;

/// Trait for implementing technical indicators.
pub trait Indicator: Send + Sync {
    /// Value produced for a series.
    type Output;

    /// Unique identifier for this indicator.
    fn id(&self) -> &str;

    /// Minimum number of bars required for calculation.
    fn min_periods(&self) -> usize;

    /// Calculate the indicator from bar data.
    /// Fails with `InsufficientData` when the series is shorter than the lookback.
    fn calculate(&self, series: &BarSeries) -> Result<Self::Output>;
}

pub(crate) fn check_period(period: usize) -> Result<()> {
    if period == 0 {
        return Err(AppError::InvalidPeriod(period));
    }
    Ok(())
}
