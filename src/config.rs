use crate::types::Timeframe;
use std::env;
use std::time::Duration;

/// Indicator periods used for full snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorConfig {
    pub rsi_period: usize,
    pub sma_period: usize,
    pub ema_period: usize,
    /// Trailing bars for the volatility snapshot. Risk always uses 30.
    pub volatility_window: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    /// Support/resistance levels kept per side.
    pub max_levels: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            sma_period: 20,
            ema_period: 20,
            volatility_window: 30,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            max_levels: 3,
        }
    }
}

/// Which tick transport backs the live feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedKind {
    /// WebSocket push (Finnhub).
    Streaming,
    /// HTTP quote polling (Alpha Vantage).
    Polling,
}

impl FeedKind {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "streaming" | "ws" | "websocket" => Some(FeedKind::Streaming),
            "polling" | "http" => Some(FeedKind::Polling),
            _ => None,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Currency pairs to analyze and stream, e.g. "EUR/USD".
    pub pairs: Vec<String>,
    /// Bar timeframe for analysis requests.
    pub timeframe: Timeframe,
    /// Live feed backend.
    pub feed: FeedKind,
    /// Alpha Vantage API key for bars and polled quotes.
    pub alpha_vantage_api_key: Option<String>,
    /// Finnhub API key for streamed ticks.
    pub finnhub_api_key: Option<String>,
    /// Remote forecasting endpoint.
    pub forecast_url: Option<String>,
    /// Bearer token for the forecasting endpoint.
    pub forecast_api_key: Option<String>,
    /// Delay before each reconnect attempt (ms).
    pub reconnect_delay_ms: u64,
    /// Quote polling interval (ms).
    pub poll_interval_ms: u64,
    /// Indicator periods.
    pub indicators: IndicatorConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let parse_or = |key: &str, default: u64| -> u64 {
            lookup(key).and_then(|v| v.parse().ok()).unwrap_or(default)
        };
        let period_or = |key: &str, default: usize| -> usize {
            lookup(key)
                .and_then(|v| v.parse().ok())
                .filter(|p: &usize| *p > 0)
                .unwrap_or(default)
        };

        // Format: "EUR/USD,GBP/USD"
        let pairs: Vec<String> = lookup("FXLENS_PAIRS")
            .map(|s| {
                s.split(',')
                    .map(|p| p.trim().to_uppercase())
                    .filter(|p| !p.is_empty())
                    .collect()
            })
            .filter(|p: &Vec<String>| !p.is_empty())
            .unwrap_or_else(default_pairs);

        let finnhub_api_key = lookup("FINNHUB_API_KEY").filter(|k| !k.is_empty());
        let default_feed = if finnhub_api_key.is_some() {
            FeedKind::Streaming
        } else {
            FeedKind::Polling
        };

        let defaults = IndicatorConfig::default();

        Self {
            pairs,
            timeframe: lookup("FXLENS_TIMEFRAME")
                .and_then(|v| v.parse().ok())
                .unwrap_or(Timeframe::OneDay),
            feed: lookup("FXLENS_FEED")
                .and_then(|v| FeedKind::parse(&v))
                .unwrap_or(default_feed),
            alpha_vantage_api_key: lookup("ALPHA_VANTAGE_API_KEY").filter(|k| !k.is_empty()),
            finnhub_api_key,
            forecast_url: lookup("FORECAST_URL").filter(|u| !u.is_empty()),
            forecast_api_key: lookup("FORECAST_API_KEY").filter(|k| !k.is_empty()),
            reconnect_delay_ms: parse_or("RECONNECT_DELAY_MS", 5_000),
            poll_interval_ms: parse_or("POLL_INTERVAL_MS", 10_000),
            indicators: IndicatorConfig {
                rsi_period: period_or("RSI_PERIOD", defaults.rsi_period),
                sma_period: period_or("SMA_PERIOD", defaults.sma_period),
                ema_period: period_or("EMA_PERIOD", defaults.ema_period),
                volatility_window: period_or("VOLATILITY_WINDOW", defaults.volatility_window),
                ..defaults
            },
        }
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn default_pairs() -> Vec<String> {
    vec![
        "EUR/USD".to_string(),
        "GBP/USD".to_string(),
        "USD/JPY".to_string(),
    ]
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.pairs, vec!["EUR/USD", "GBP/USD", "USD/JPY"]);
        assert_eq!(config.timeframe, Timeframe::OneDay);
        assert_eq!(config.feed, FeedKind::Polling);
        assert_eq!(config.reconnect_delay(), Duration::from_secs(5));
        assert_eq!(config.poll_interval(), Duration::from_secs(10));
        assert_eq!(config.indicators, IndicatorConfig::default());
    }

    #[test]
    fn test_finnhub_key_defaults_to_streaming() {
        let config = Config::from_lookup(lookup_from(&[("FINNHUB_API_KEY", "abc")]));
        assert_eq!(config.feed, FeedKind::Streaming);

        let config = Config::from_lookup(lookup_from(&[
            ("FINNHUB_API_KEY", "abc"),
            ("FXLENS_FEED", "polling"),
        ]));
        assert_eq!(config.feed, FeedKind::Polling);
    }

    #[test]
    fn test_pairs_are_normalized() {
        let config = Config::from_lookup(lookup_from(&[("FXLENS_PAIRS", " eur/usd, ,aud/usd ")]));
        assert_eq!(config.pairs, vec!["EUR/USD", "AUD/USD"]);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = Config::from_lookup(lookup_from(&[
            ("FXLENS_TIMEFRAME", "2h"),
            ("RECONNECT_DELAY_MS", "soon"),
            ("RSI_PERIOD", "0"),
            ("SMA_PERIOD", "50"),
        ]));
        assert_eq!(config.timeframe, Timeframe::OneDay);
        assert_eq!(config.reconnect_delay_ms, 5_000);
        assert_eq!(config.indicators.rsi_period, 14);
        assert_eq!(config.indicators.sma_period, 50);
    }
}
