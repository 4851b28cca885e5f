use serde::{Deserialize, Serialize};

/// MACD line, signal line and histogram at the latest bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MacdResult {
    pub macd_line: f64,
    pub signal_line: f64,
    pub histogram: f64,
}

/// Support and resistance price levels in chronological order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Levels {
    pub support: Vec<f64>,
    pub resistance: Vec<f64>,
}

/// Full indicator snapshot for one series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorResult {
    pub rsi: f64,
    pub macd: MacdResult,
    pub sma: f64,
    pub ema: f64,
    pub volatility: f64,
    pub levels: Levels,
}
