use super::IndicatorResult;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Market trend classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Bullish,
    Bearish,
    Neutral,
}

impl Trend {
    /// Compare a forecast with the latest close.
    pub fn from_forecast(prediction: f64, last_close: f64) -> Self {
        if prediction > last_close {
            Trend::Bullish
        } else if prediction < last_close {
            Trend::Bearish
        } else {
            Trend::Neutral
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trend::Bullish => write!(f, "bullish"),
            Trend::Bearish => write!(f, "bearish"),
            Trend::Neutral => write!(f, "neutral"),
        }
    }
}

/// Risk tier derived from volatility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Volatility above which risk is high.
    pub const HIGH_THRESHOLD: f64 = 0.20;
    /// Volatility above which risk is medium.
    pub const MEDIUM_THRESHOLD: f64 = 0.10;

    /// Exact cutoffs; a value on a boundary falls to the lower tier.
    pub fn from_volatility(volatility: f64) -> Self {
        if volatility > Self::HIGH_THRESHOLD {
            RiskLevel::High
        } else if volatility > Self::MEDIUM_THRESHOLD {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "low"),
            RiskLevel::Medium => write!(f, "medium"),
            RiskLevel::High => write!(f, "high"),
        }
    }
}

/// Point forecast supplied by a forecasting collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub prediction: f64,
    pub confidence: f64,
}

/// Derived market prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub prediction: f64,
    pub trend: Trend,
    pub confidence: f64,
    pub risk_level: RiskLevel,
    pub indicators: IndicatorResult,
    pub support_levels: Vec<f64>,
    pub resistance_levels: Vec<f64>,
}
