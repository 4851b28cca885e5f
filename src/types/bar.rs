use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};

/// One OHLCV sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Bar open time in milliseconds since the Unix epoch (UTC).
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// Create a validated bar.
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Result<Self> {
        let bar = Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        };
        bar.validate()?;
        Ok(bar)
    }

    /// Check price positivity and that high/low bracket open and close.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(AppError::InvalidBar(format!(
                    "{} must be a positive price, got {}",
                    name, value
                )));
            }
        }

        if !self.volume.is_finite() || self.volume < 0.0 {
            return Err(AppError::InvalidBar(format!(
                "volume must be non-negative, got {}",
                self.volume
            )));
        }

        if self.low > self.open.min(self.close) || self.high < self.open.max(self.close) {
            return Err(AppError::InvalidBar(format!(
                "range [{}, {}] does not contain open {} and close {}",
                self.low, self.high, self.open, self.close
            )));
        }

        Ok(())
    }
}

/// Ordered OHLCV history with strictly increasing timestamps.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<Bar>", into = "Vec<Bar>")]
pub struct BarSeries {
    bars: Vec<Bar>,
}

impl BarSeries {
    /// Build a series from bars that are already in chronological order.
    pub fn new(bars: Vec<Bar>) -> Result<Self> {
        for (index, bar) in bars.iter().enumerate() {
            bar.validate()?;
            if index > 0 && bar.timestamp <= bars[index - 1].timestamp {
                return Err(AppError::UnorderedSeries {
                    index,
                    timestamp: bar.timestamp,
                });
            }
        }
        Ok(Self { bars })
    }

    /// Build a series from bars in any order.
    ///
    /// Vendor payloads often arrive as maps keyed by date. Bars are sorted by
    /// timestamp and, on a duplicate timestamp, the later bar in the input wins.
    pub fn from_unsorted(mut bars: Vec<Bar>) -> Result<Self> {
        // Stable sort keeps input order among equal timestamps.
        bars.sort_by_key(|b| b.timestamp);

        let mut deduped: Vec<Bar> = Vec::with_capacity(bars.len());
        for bar in bars {
            match deduped.last_mut() {
                Some(last) if last.timestamp == bar.timestamp => *last = bar,
                _ => deduped.push(bar),
            }
        }

        Self::new(deduped)
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    /// Close prices in chronological order.
    pub fn close_prices(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    /// Most recent bar.
    pub fn last(&self) -> Result<&Bar> {
        self.bars.last().ok_or(AppError::EmptySeries)
    }

    /// Sub-series over the half-open index range `from..to`.
    pub fn slice(&self, from: usize, to: usize) -> Result<BarSeries> {
        if from > to || to > self.bars.len() {
            return Err(AppError::insufficient(to, self.bars.len()));
        }
        Ok(BarSeries {
            bars: self.bars[from..to].to_vec(),
        })
    }

    /// The last `n` bars, or the whole series when it is shorter.
    pub fn tail(&self, n: usize) -> BarSeries {
        let start = self.bars.len().saturating_sub(n);
        BarSeries {
            bars: self.bars[start..].to_vec(),
        }
    }
}

impl TryFrom<Vec<Bar>> for BarSeries {
    type Error = AppError;

    fn try_from(bars: Vec<Bar>) -> Result<Self> {
        BarSeries::new(bars)
    }
}

impl From<BarSeries> for Vec<Bar> {
    fn from(series: BarSeries) -> Self {
        series.bars
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(timestamp: i64, close: f64) -> Bar {
        Bar::new(timestamp, close, close + 0.5, close - 0.5, close, 100.0).unwrap()
    }

    #[test]
    fn test_bar_rejects_non_positive_price() {
        let result = Bar::new(0, 0.0, 1.0, 0.5, 1.0, 0.0);
        assert!(matches!(result, Err(AppError::InvalidBar(_))));
    }

    #[test]
    fn test_bar_rejects_negative_volume() {
        let result = Bar::new(0, 1.0, 1.2, 0.9, 1.1, -5.0);
        assert!(matches!(result, Err(AppError::InvalidBar(_))));
    }

    #[test]
    fn test_bar_rejects_inverted_range() {
        let result = Bar::new(0, 1.0, 1.05, 0.9, 1.1, 0.0);
        assert!(matches!(result, Err(AppError::InvalidBar(_))));
    }

    #[test]
    fn test_series_rejects_duplicate_timestamp() {
        let result = BarSeries::new(vec![bar(1, 1.0), bar(1, 1.1)]);
        assert!(matches!(
            result,
            Err(AppError::UnorderedSeries { index: 1, timestamp: 1 })
        ));
    }

    #[test]
    fn test_from_unsorted_sorts_and_dedupes() {
        let series = BarSeries::from_unsorted(vec![bar(3, 3.0), bar(1, 1.0), bar(3, 3.5)]).unwrap();
        assert_eq!(series.close_prices(), vec![1.0, 3.5]);
    }

    #[test]
    fn test_last_on_empty_series() {
        let series = BarSeries::default();
        assert!(matches!(series.last(), Err(AppError::EmptySeries)));
    }

    #[test]
    fn test_slice_and_tail() {
        let series = BarSeries::new((1..=5).map(|i| bar(i, i as f64)).collect()).unwrap();

        let middle = series.slice(1, 4).unwrap();
        assert_eq!(middle.close_prices(), vec![2.0, 3.0, 4.0]);

        assert!(series.slice(2, 6).is_err());
        assert_eq!(series.tail(2).close_prices(), vec![4.0, 5.0]);
        assert_eq!(series.tail(10).len(), 5);
    }

    #[test]
    fn test_deserialize_validates_order() {
        let json = r#"[
            {"timestamp": 2, "open": 1.0, "high": 1.0, "low": 1.0, "close": 1.0, "volume": 0.0},
            {"timestamp": 1, "open": 1.0, "high": 1.0, "low": 1.0, "close": 1.0, "volume": 0.0}
        ]"#;
        assert!(serde_json::from_str::<BarSeries>(json).is_err());
    }
}
