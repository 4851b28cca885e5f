//! Volatility as the coefficient of variation of closes.

use super::{check_period, Indicator};
use crate::error::{AppError, Result};
use crate::types::BarSeries;

/// Population standard deviation of the last `window` values over their mean.
pub fn volatility(values: &[f64], window: usize) -> Result<f64> {
    check_period(window)?;
    if values.len() < window {
        return Err(AppError::insufficient(window, values.len()));
    }

    let slice = &values[values.len() - window..];
    let mean = slice.iter().sum::<f64>() / window as f64;
    if mean == 0.0 {
        return Ok(0.0);
    }

    let variance = slice.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / window as f64;
    Ok(variance.sqrt() / mean)
}

/// Trailing-window volatility indicator.
#[derive(Debug, Clone, Copy)]
pub struct Volatility {
    window: usize,
}

impl Default for Volatility {
    fn default() -> Self {
        Self { window: 30 }
    }
}

impl Volatility {
    pub fn new(window: usize) -> Self {
        Self { window }
    }
}

impl Indicator for Volatility {
    type Output = f64;

    fn id(&self) -> &str {
        "volatility"
    }

    fn min_periods(&self) -> usize {
        self.window
    }

    fn calculate(&self, series: &BarSeries) -> Result<f64> {
        volatility(&series.close_prices(), self.window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::indicators::test_support::series_from_closes;

    #[test]
    fn test_constant_prices_have_zero_volatility() {
        let series = series_from_closes(&[1.25; 30]);
        assert_eq!(Volatility::default().calculate(&series).unwrap(), 0.0);
    }

    #[test]
    fn test_known_coefficient_of_variation() {
        // Window [2, 4]: mean 3, population std-dev 1.
        let value = volatility(&[10.0, 2.0, 4.0], 2).unwrap();
        assert!((value - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_volatility_insufficient_data() {
        let series = series_from_closes(&[1.0, 1.1]);
        assert!(matches!(
            Volatility::new(5).calculate(&series),
            Err(AppError::InsufficientData { required: 5, available: 2 })
        ));
    }
}
