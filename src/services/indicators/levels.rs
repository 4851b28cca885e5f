//! Support and resistance from strict local extrema of closes.

use super::Indicator;
use crate::error::Result;
use crate::types::{BarSeries, Levels};

/// Local minima and maxima of `values`.
///
/// A value is support when strictly below both neighbors and resistance when
/// strictly above both. Each list is deduplicated (a repeated level keeps its
/// latest position), trimmed to the most recent `max_levels`, and returned in
/// chronological order.
///
/// Keeping the latest position differs from first-occurrence dedup: supports
/// 1, 2, 3, 4, 1 give `[3, 4, 1]` here, not `[2, 3, 4]`.
pub fn support_resistance(values: &[f64], max_levels: usize) -> Levels {
    let mut support = Vec::new();
    let mut resistance = Vec::new();

    for i in 1..values.len().saturating_sub(1) {
        let (prev, current, next) = (values[i - 1], values[i], values[i + 1]);
        if current < prev && current < next {
            push_level(&mut support, current);
        }
        if current > prev && current > next {
            push_level(&mut resistance, current);
        }
    }

    Levels {
        support: most_recent(support, max_levels),
        resistance: most_recent(resistance, max_levels),
    }
}

fn push_level(levels: &mut Vec<f64>, value: f64) {
    levels.retain(|level| *level != value);
    levels.push(value);
}

fn most_recent(mut levels: Vec<f64>, max_levels: usize) -> Vec<f64> {
    let excess = levels.len().saturating_sub(max_levels);
    levels.drain(..excess);
    levels
}

/// Support/resistance detector.
#[derive(Debug, Clone, Copy)]
pub struct SupportResistance {
    max_levels: usize,
}

impl Default for SupportResistance {
    fn default() -> Self {
        Self { max_levels: 3 }
    }
}

impl SupportResistance {
    pub fn new(max_levels: usize) -> Self {
        Self { max_levels }
    }
}

impl Indicator for SupportResistance {
    type Output = Levels;

    fn id(&self) -> &str {
        "support_resistance"
    }

    fn min_periods(&self) -> usize {
        0
    }

    fn calculate(&self, series: &BarSeries) -> Result<Levels> {
        Ok(support_resistance(&series.close_prices(), self.max_levels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_five_bar_example() {
        let levels = support_resistance(&[5.0, 3.0, 4.0, 2.0, 6.0], 3);
        assert_eq!(levels.support, vec![3.0, 2.0]);
        // 4 sits above both 3 and 2.
        assert_eq!(levels.resistance, vec![4.0]);
    }

    #[test]
    fn test_plateaus_are_not_extrema() {
        let levels = support_resistance(&[1.0, 2.0, 2.0, 1.0, 1.0, 2.0], 3);
        assert!(levels.support.is_empty());
        assert!(levels.resistance.is_empty());
    }

    #[test]
    fn test_keeps_most_recent_levels() {
        let values = [5.0, 1.0, 5.0, 2.0, 5.0, 3.0, 5.0, 4.0, 5.0];
        let levels = support_resistance(&values, 3);
        assert_eq!(levels.support, vec![2.0, 3.0, 4.0]);
        assert_eq!(levels.resistance, vec![5.0]);
    }

    #[test]
    fn test_repeated_level_moves_to_latest_position() {
        let values = [5.0, 1.0, 5.0, 2.0, 5.0, 1.0, 5.0];
        let levels = support_resistance(&values, 3);
        assert_eq!(levels.support, vec![2.0, 1.0]);
    }

    #[test]
    fn test_revisited_level_counts_as_most_recent() {
        let values = [9.0, 1.0, 9.0, 2.0, 9.0, 3.0, 9.0, 4.0, 9.0, 1.0, 9.0];
        let levels = support_resistance(&values, 3);
        assert_eq!(levels.support, vec![3.0, 4.0, 1.0]);
        assert_eq!(levels.resistance, vec![9.0]);
    }

    #[test]
    fn test_short_input() {
        assert_eq!(support_resistance(&[], 3), Levels::default());
        assert_eq!(support_resistance(&[1.0, 2.0], 3), Levels::default());
    }
}
