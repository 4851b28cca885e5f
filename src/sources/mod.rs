//! Collaborator interfaces and the backend adapters that implement them.
//!
//! The analysis core never talks to a vendor directly. It depends on the
//! traits below; which adapter backs each one is a configuration choice.

pub mod alphavantage;
pub mod channel;
pub mod finnhub_ws;
pub mod forecaster;
pub mod polling;
pub mod reasoner;

pub use alphavantage::AlphaVantageClient;
pub use channel::{ChannelHandle, ChannelTransport};
pub use finnhub_ws::FinnhubWs;
pub use forecaster::RemoteForecaster;
pub use polling::PollingTransport;
pub use reasoner::RuleReasoner;

use crate::error::Result;
use crate::types::{BarSeries, Forecast, IndicatorResult, Tick, Timeframe, TradeDecision};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Historical bar provider.
#[async_trait]
pub trait BarSource: Send + Sync {
    /// Fetch ordered bars for `symbol`.
    /// Fails with `NoData` when the vendor returns nothing for the range.
    async fn fetch_bars(&self, symbol: &str, timeframe: Timeframe) -> Result<BarSeries>;
}

/// Spot quote provider for polled feeds.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn quote(&self, symbol: &str) -> Result<Tick>;
}

/// Subscription control sent to a tick transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "symbols", rename_all = "lowercase")]
pub enum ControlMessage {
    Subscribe(Vec<String>),
    Unsubscribe(Vec<String>),
}

/// Event produced by a connected tick transport.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Tick(Tick),
    /// The connection is gone; the reason is for logging only.
    Closed(Option<String>),
}

/// Live tick connection driven by the tick hub.
///
/// `next_event` must be safe to cancel: the hub races it against control
/// messages and shutdown.
#[async_trait]
pub trait TickTransport: Send {
    async fn connect(&mut self) -> Result<()>;

    async fn send(&mut self, message: ControlMessage) -> Result<()>;

    async fn next_event(&mut self) -> TransportEvent;

    async fn close(&mut self);
}

/// Point forecast provider.
#[async_trait]
pub trait Forecaster: Send + Sync {
    async fn forecast(
        &self,
        symbol: &str,
        series: &BarSeries,
        indicators: &IndicatorResult,
    ) -> Result<Forecast>;
}

/// Trade direction and level selection.
#[async_trait]
pub trait TradeReasoner: Send + Sync {
    async fn decide(
        &self,
        pair: &str,
        series: &BarSeries,
        indicators: &IndicatorResult,
    ) -> Result<TradeDecision>;
}

/// Canonical pair symbol: upper case with a slash, e.g. "EUR/USD".
pub fn normalize_pair(symbol: &str) -> String {
    let upper = symbol.trim().to_uppercase();
    if upper.contains('/') {
        return upper;
    }
    let cleaned: String = upper.chars().filter(|c| c.is_ascii_alphabetic()).collect();
    if cleaned.len() == 6 {
        format!("{}/{}", &cleaned[..3], &cleaned[3..])
    } else {
        upper
    }
}

/// Split "EUR/USD" into ("EUR", "USD").
pub fn split_pair(symbol: &str) -> Option<(String, String)> {
    let pair = normalize_pair(symbol);
    let (from, to) = pair.split_once('/')?;
    if from.is_empty() || to.is_empty() {
        return None;
    }
    Some((from.to_string(), to.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_pair() {
        assert_eq!(normalize_pair("eur/usd"), "EUR/USD");
        assert_eq!(normalize_pair("EURUSD"), "EUR/USD");
        assert_eq!(normalize_pair("eur_usd"), "EUR/USD");
        assert_eq!(normalize_pair("XAU"), "XAU");
    }

    #[test]
    fn test_split_pair() {
        assert_eq!(
            split_pair("gbp/usd"),
            Some(("GBP".to_string(), "USD".to_string()))
        );
        assert_eq!(split_pair("GBP/"), None);
        assert_eq!(split_pair("BTC"), None);
    }

    #[test]
    fn test_control_message_serialization() {
        let msg = ControlMessage::Subscribe(vec!["EUR/USD".to_string()]);
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"subscribe","symbols":["EUR/USD"]}"#);
    }
}
