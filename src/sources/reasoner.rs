//! Deterministic trade reasoner built on the indicator snapshot.

use super::TradeReasoner;
use crate::error::Result;
use crate::types::{BarSeries, Direction, IndicatorResult, TradeDecision};
use async_trait::async_trait;

/// RSI above this blocks new longs.
const OVERBOUGHT: f64 = 70.0;
/// RSI below this blocks new shorts.
const OVERSOLD: f64 = 30.0;

/// Volatility band multiples used when no level sits on the needed side.
const STOP_BANDS: f64 = 1.5;
const TARGET_BANDS: f64 = 3.0;

/// Smallest band as a fraction of price, for perfectly flat windows.
const MIN_BAND_FRACTION: f64 = 0.001;

/// Picks direction from MACD momentum gated by RSI, and levels from the
/// nearest support and resistance.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleReasoner;

impl RuleReasoner {
    pub fn new() -> Self {
        Self
    }

    fn direction(indicators: &IndicatorResult) -> Direction {
        let histogram = indicators.macd.histogram;
        if histogram > 0.0 && indicators.rsi < OVERBOUGHT {
            Direction::Long
        } else if histogram < 0.0 && indicators.rsi > OVERSOLD {
            Direction::Short
        } else {
            Direction::Neutral
        }
    }

    /// Highest level strictly below `price`.
    fn nearest_below(levels: &[f64], price: f64) -> Option<f64> {
        levels
            .iter()
            .copied()
            .filter(|l| *l < price)
            .fold(None, |best, l| Some(best.map_or(l, |b: f64| b.max(l))))
    }

    /// Lowest level strictly above `price`.
    fn nearest_above(levels: &[f64], price: f64) -> Option<f64> {
        levels
            .iter()
            .copied()
            .filter(|l| *l > price)
            .fold(None, |best, l| Some(best.map_or(l, |b: f64| b.min(l))))
    }

    /// Build a decision from an indicator snapshot and the last close.
    pub fn decide_at(entry: f64, indicators: &IndicatorResult) -> TradeDecision {
        let direction = Self::direction(indicators);
        let band = (indicators.volatility * entry).max(entry * MIN_BAND_FRACTION);
        let support = &indicators.levels.support;
        let resistance = &indicators.levels.resistance;

        let (stop_loss, take_profit) = match direction {
            Direction::Short => (
                Self::nearest_above(resistance, entry).unwrap_or(entry + STOP_BANDS * band),
                Self::nearest_below(support, entry).unwrap_or(entry - TARGET_BANDS * band),
            ),
            Direction::Long | Direction::Neutral => (
                Self::nearest_below(support, entry).unwrap_or(entry - STOP_BANDS * band),
                Self::nearest_above(resistance, entry).unwrap_or(entry + TARGET_BANDS * band),
            ),
        };

        // Price on the same side of the EMA as the trade confirms momentum.
        let confirmed = match direction {
            Direction::Long => entry > indicators.ema,
            Direction::Short => entry < indicators.ema,
            Direction::Neutral => false,
        };
        let confidence = match (direction, confirmed) {
            (Direction::Neutral, _) => 0.3,
            (_, true) => 0.75,
            (_, false) => 0.6,
        };

        let reasoning = format!(
            "{}: RSI {:.2}, MACD histogram {:.5}, price {} EMA {:.5}, volatility {:.2}%",
            direction,
            indicators.rsi,
            indicators.macd.histogram,
            if entry >= indicators.ema { "above" } else { "below" },
            indicators.ema,
            indicators.volatility * 100.0,
        );

        TradeDecision {
            direction,
            entry_price: entry,
            stop_loss,
            take_profit,
            confidence,
            reasoning,
        }
    }
}

#[async_trait]
impl TradeReasoner for RuleReasoner {
    async fn decide(
        &self,
        _pair: &str,
        series: &BarSeries,
        indicators: &IndicatorResult,
    ) -> Result<TradeDecision> {
        let entry = series.last()?.close;
        Ok(Self::decide_at(entry, indicators))
    }
}
