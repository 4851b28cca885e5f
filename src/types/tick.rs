use serde::{Deserialize, Serialize};
use std::fmt;

/// Trade direction indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeDirection {
    Up,
    Down,
}

/// A live price sample from a tick transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub symbol: String,
    pub price: f64,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    #[serde(default)]
    pub volume: f64,
}

impl Tick {
    pub fn new(symbol: impl Into<String>, price: f64, timestamp: i64, volume: f64) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            timestamp,
            volume,
        }
    }
}

/// A tick as delivered to listeners, with the move since the previous tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceUpdate {
    pub symbol: String,
    pub price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_price: Option<f64>,
    pub change: f64,
    pub change_percent: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trade_direction: Option<TradeDirection>,
    pub volume: f64,
    pub timestamp: i64,
}

impl PriceUpdate {
    /// Derive the update for `tick` given the last price seen for its symbol.
    pub fn from_tick(tick: Tick, previous_price: Option<f64>) -> Self {
        let change = previous_price.map(|p| tick.price - p).unwrap_or(0.0);
        let change_percent = match previous_price {
            Some(p) if p != 0.0 => change / p * 100.0,
            _ => 0.0,
        };
        let trade_direction = if change > 0.0 {
            Some(TradeDirection::Up)
        } else if change < 0.0 {
            Some(TradeDirection::Down)
        } else {
            None
        };

        Self {
            symbol: tick.symbol,
            price: tick.price,
            previous_price,
            change,
            change_percent,
            trade_direction,
            volume: tick.volume,
            timestamp: tick.timestamp,
        }
    }
}

/// Tick hub connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_tick_has_no_change() {
        let update = PriceUpdate::from_tick(Tick::new("EUR/USD", 1.085, 0, 0.0), None);
        assert_eq!(update.change, 0.0);
        assert_eq!(update.change_percent, 0.0);
        assert_eq!(update.trade_direction, None);
    }

    #[test]
    fn test_change_against_previous_price() {
        let update = PriceUpdate::from_tick(Tick::new("EUR/USD", 99.0, 0, 0.0), Some(101.0));
        assert_eq!(update.change, -2.0);
        assert!((update.change_percent - (-1.980198)).abs() < 1e-6);
        assert_eq!(update.trade_direction, Some(TradeDirection::Down));
    }

    #[test]
    fn test_price_update_serializes_camel_case() {
        let update = PriceUpdate::from_tick(Tick::new("EUR/USD", 1.1, 5, 0.0), Some(1.0));
        let json = serde_json::to_string(&update).unwrap();
        assert!(json.contains("\"changePercent\""));
        assert!(json.contains("\"tradeDirection\":\"up\""));
    }
}
