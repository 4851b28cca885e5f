//! Per-request analysis pipeline: bars in, prediction or advice out.

use super::advice::AdviceSynthesizer;
use super::indicators::IndicatorEngine;
use super::prediction::PredictionAggregator;
use crate::config::IndicatorConfig;
use crate::error::{AppError, Result};
use crate::sources::{normalize_pair, BarSource, Forecaster, TradeReasoner};
use crate::types::{Advice, BarSeries, IndicatorResult, Prediction, Timeframe};
use std::sync::Arc;
use tracing::{debug, info};

/// Wires the bar source, forecaster and reasoner to the pure analysis core.
pub struct AnalysisSession {
    bars: Arc<dyn BarSource>,
    /// Absent in advice-only sessions.
    forecaster: Option<Arc<dyn Forecaster>>,
    reasoner: Arc<dyn TradeReasoner>,
    engine: IndicatorEngine,
    aggregator: PredictionAggregator,
    synthesizer: AdviceSynthesizer,
}

impl AnalysisSession {
    pub fn new(
        bars: Arc<dyn BarSource>,
        forecaster: Arc<dyn Forecaster>,
        reasoner: Arc<dyn TradeReasoner>,
        config: IndicatorConfig,
    ) -> Self {
        Self::build(bars, Some(forecaster), reasoner, config)
    }

    /// Session that can advise but not predict.
    pub fn without_forecaster(
        bars: Arc<dyn BarSource>,
        reasoner: Arc<dyn TradeReasoner>,
        config: IndicatorConfig,
    ) -> Self {
        Self::build(bars, None, reasoner, config)
    }

    fn build(
        bars: Arc<dyn BarSource>,
        forecaster: Option<Arc<dyn Forecaster>>,
        reasoner: Arc<dyn TradeReasoner>,
        config: IndicatorConfig,
    ) -> Self {
        Self {
            bars,
            forecaster,
            reasoner,
            // Risk always reads the trailing 30 bars, whatever the snapshot window.
            aggregator: PredictionAggregator::default(),
            synthesizer: AdviceSynthesizer::new(config.max_levels),
            engine: IndicatorEngine::new(config),
        }
    }

    /// Fetch bars and compute the indicator snapshot.
    pub async fn indicators(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> Result<(BarSeries, IndicatorResult)> {
        let series = self.bars.fetch_bars(symbol, timeframe).await?;
        series.last()?;
        debug!("Fetched {} {} bars for {}", series.len(), timeframe, symbol);

        let indicators = self.engine.compute(&series)?;
        Ok((series, indicators))
    }

    /// Forecast-based prediction for `symbol`.
    pub async fn predict(&self, symbol: &str, timeframe: Timeframe) -> Result<Prediction> {
        let forecaster = self.forecaster.as_ref().ok_or(AppError::NoForecaster)?;
        let symbol = normalize_pair(symbol);
        let (series, indicators) = self.indicators(&symbol, timeframe).await?;
        let forecast = forecaster
            .forecast(&symbol, &series, &indicators)
            .await?;

        let prediction = self.aggregator.aggregate(&series, &forecast, &indicators)?;
        info!(
            "{} {}: {} at {:.5} ({} risk, confidence {:.2})",
            symbol,
            timeframe,
            prediction.trend,
            prediction.prediction,
            prediction.risk_level,
            prediction.confidence
        );
        Ok(prediction)
    }

    /// Structured trade advice for `pair`.
    pub async fn advise(&self, pair: &str, timeframe: Timeframe) -> Result<Advice> {
        let pair = normalize_pair(pair);
        let (series, indicators) = self.indicators(&pair, timeframe).await?;
        let decision = self.reasoner.decide(&pair, &series, &indicators).await?;

        let advice = self
            .synthesizer
            .synthesize(&pair, timeframe, &series, decision)?;
        info!(
            "{} {}: {} entry {:.5} stop {:.5} target {:.5} (R:R {:.2})",
            pair,
            timeframe,
            advice.direction,
            advice.entry_price,
            advice.stop_loss,
            advice.take_profit,
            advice.risk_reward
        );
        Ok(advice)
    }
}
