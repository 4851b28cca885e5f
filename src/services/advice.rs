//! Turns a trade decision into a structured advice record.

use super::prediction::clamp_unit;
use crate::error::{AppError, Result};
use crate::services::indicators::{Indicator, SupportResistance};
use crate::sources::normalize_pair;
use crate::types::{Advice, BarSeries, KeyLevels, Timeframe, TradeDecision};
use tracing::debug;

/// Support levels an advice record needs.
pub const MIN_SUPPORT_LEVELS: usize = 2;
/// Resistance levels an advice record needs.
pub const MIN_RESISTANCE_LEVELS: usize = 1;

#[derive(Debug, Clone, Copy, Default)]
pub struct AdviceSynthesizer {
    levels: SupportResistance,
}

impl AdviceSynthesizer {
    pub fn new(max_levels: usize) -> Self {
        Self {
            levels: SupportResistance::new(max_levels),
        }
    }

    pub fn synthesize(
        &self,
        pair: &str,
        timeframe: Timeframe,
        series: &BarSeries,
        decision: TradeDecision,
    ) -> Result<Advice> {
        let levels = self.levels.calculate(series)?;
        if levels.support.len() < MIN_SUPPORT_LEVELS
            || levels.resistance.len() < MIN_RESISTANCE_LEVELS
        {
            return Err(AppError::InvalidLevels {
                support: levels.support.len(),
                resistance: levels.resistance.len(),
            });
        }

        let pair = normalize_pair(pair);
        let risk_reward =
            risk_reward(decision.entry_price, decision.stop_loss, decision.take_profit);
        debug!(
            "{} {} advice: entry {} stop {} target {} (R:R {:.2})",
            pair,
            decision.direction,
            decision.entry_price,
            decision.stop_loss,
            decision.take_profit,
            risk_reward
        );

        Ok(Advice {
            pair,
            direction: decision.direction,
            entry_price: decision.entry_price,
            stop_loss: decision.stop_loss,
            take_profit: decision.take_profit,
            reasoning: decision.reasoning,
            confidence: clamp_unit(decision.confidence),
            timeframe,
            risk_reward,
            key_levels: KeyLevels {
                support: levels.support,
                resistance: levels.resistance,
            },
        })
    }
}

/// Reward per unit of risk. Zero when the stop sits on the entry.
pub fn risk_reward(entry: f64, stop_loss: f64, take_profit: f64) -> f64 {
    let risk = (entry - stop_loss).abs();
    if risk == 0.0 {
        return 0.0;
    }
    (take_profit - entry) / risk
}
