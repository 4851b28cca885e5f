//! Finnhub WebSocket transport for real-time forex ticks.
//!
//! Finnhub streams forex through broker symbols such as `OANDA:EUR_USD`.
//! This transport maps them to and from canonical pairs (`EUR/USD`).

use super::{ControlMessage, TickTransport, TransportEvent};
use crate::error::{AppError, Result};
use crate::types::Tick;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info};

const FINNHUB_WS_URL: &str = "wss://ws.finnhub.io";

/// Broker prefix for forex symbols.
const FOREX_BROKER: &str = "OANDA";

const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Finnhub WebSocket subscribe message.
#[derive(Debug, Serialize)]
struct SubscribeMessage {
    #[serde(rename = "type")]
    msg_type: String,
    symbol: String,
}

/// Finnhub trade data.
#[derive(Debug, Deserialize)]
struct TradeData {
    /// Symbol
    s: String,
    /// Price
    p: f64,
    /// Volume
    #[serde(default)]
    v: f64,
    /// Timestamp (milliseconds)
    t: i64,
}

/// Finnhub WebSocket message.
#[derive(Debug, Deserialize)]
struct FinnhubMessage {
    #[serde(rename = "type")]
    msg_type: String,
    #[serde(default)]
    data: Vec<TradeData>,
}

/// Finnhub WebSocket tick transport.
pub struct FinnhubWs {
    api_key: String,
    stream: Option<WebSocketStream<MaybeTlsStream<TcpStream>>>,
    pending: VecDeque<Tick>,
}

impl FinnhubWs {
    /// Create a new Finnhub WebSocket transport.
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            stream: None,
            pending: VecDeque::new(),
        }
    }

    /// "EUR/USD" -> "OANDA:EUR_USD"
    pub fn to_finnhub_symbol(pair: &str) -> String {
        format!("{}:{}", FOREX_BROKER, pair.replace('/', "_"))
    }

    /// "OANDA:EUR_USD" -> "EUR/USD"
    pub fn from_finnhub_symbol(symbol: &str) -> String {
        let bare = symbol.split_once(':').map(|(_, s)| s).unwrap_or(symbol);
        bare.replace('_', "/").to_uppercase()
    }

    /// Decode a text frame into ticks. Non-trade frames yield nothing.
    fn parse_ticks(text: &str) -> Vec<Tick> {
        let msg: FinnhubMessage = match serde_json::from_str(text) {
            Ok(m) => m,
            Err(_) => return Vec::new(),
        };

        if msg.msg_type != "trade" {
            return Vec::new();
        }

        msg.data
            .into_iter()
            .filter(|trade| trade.p.is_finite() && trade.p > 0.0)
            .map(|trade| Tick::new(Self::from_finnhub_symbol(&trade.s), trade.p, trade.t, trade.v))
            .collect()
    }
}

#[async_trait]
impl TickTransport for FinnhubWs {
    async fn connect(&mut self) -> Result<()> {
        let url = format!("{}?token={}", FINNHUB_WS_URL, self.api_key);
        info!("Connecting to Finnhub WebSocket");

        let (ws_stream, _) = connect_async(&url).await?;
        self.stream = Some(ws_stream);
        self.pending.clear();

        info!("Connected to Finnhub WebSocket");
        Ok(())
    }

    async fn send(&mut self, message: ControlMessage) -> Result<()> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| AppError::Transport("Finnhub WebSocket not connected".to_string()))?;

        let (msg_type, symbols) = match message {
            ControlMessage::Subscribe(symbols) => ("subscribe", symbols),
            ControlMessage::Unsubscribe(symbols) => ("unsubscribe", symbols),
        };

        for symbol in &symbols {
            let msg = SubscribeMessage {
                msg_type: msg_type.to_string(),
                symbol: Self::to_finnhub_symbol(symbol),
            };
            let json = serde_json::to_string(&msg)?;
            stream.send(Message::Text(json)).await?;
        }

        debug!("Sent Finnhub {} for {} symbols", msg_type, symbols.len());
        Ok(())
    }

    async fn next_event(&mut self) -> TransportEvent {
        loop {
            if let Some(tick) = self.pending.pop_front() {
                return TransportEvent::Tick(tick);
            }

            let stream = match self.stream.as_mut() {
                Some(s) => s,
                None => return TransportEvent::Closed(Some("not connected".to_string())),
            };

            tokio::select! {
                msg = stream.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.pending.extend(Self::parse_ticks(&text));
                        }
                        Some(Ok(Message::Ping(data))) => {
                            let _ = stream.send(Message::Pong(data)).await;
                        }
                        Some(Ok(Message::Close(_))) => {
                            info!("Finnhub WebSocket closed");
                            self.stream = None;
                            return TransportEvent::Closed(Some("closed by server".to_string()));
                        }
                        Some(Err(e)) => {
                            error!("Finnhub WebSocket read error: {}", e);
                            self.stream = None;
                            return TransportEvent::Closed(Some(e.to_string()));
                        }
                        None => {
                            self.stream = None;
                            return TransportEvent::Closed(None);
                        }
                        _ => {}
                    }
                }
                // Send ping every 30 seconds to keep connection alive
                _ = tokio::time::sleep(PING_INTERVAL) => {
                    let _ = stream.send(Message::Ping(vec![])).await;
                }
            }
        }
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.close(None).await;
        }
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_mapping() {
        assert_eq!(FinnhubWs::to_finnhub_symbol("EUR/USD"), "OANDA:EUR_USD");
        assert_eq!(FinnhubWs::from_finnhub_symbol("OANDA:EUR_USD"), "EUR/USD");
        assert_eq!(FinnhubWs::from_finnhub_symbol("gbp_usd"), "GBP/USD");
    }

    #[test]
    fn test_parse_trade_message() {
        let text = r#"{"type":"trade","data":[
            {"s":"OANDA:EUR_USD","p":1.0851,"v":0,"t":1704189601000},
            {"s":"OANDA:USD_JPY","p":144.12,"t":1704189601500}
        ]}"#;
        let ticks = FinnhubWs::parse_ticks(text);
        assert_eq!(ticks.len(), 2);
        assert_eq!(ticks[0].symbol, "EUR/USD");
        assert_eq!(ticks[1].price, 144.12);
        assert_eq!(ticks[1].volume, 0.0);
    }

    #[test]
    fn test_parse_ignores_pings_and_garbage() {
        assert!(FinnhubWs::parse_ticks(r#"{"type":"ping"}"#).is_empty());
        assert!(FinnhubWs::parse_ticks("not json").is_empty());
    }

    #[test]
    fn test_parse_drops_non_positive_prices() {
        let text = r#"{"type":"trade","data":[{"s":"OANDA:EUR_USD","p":0,"t":1}]}"#;
        assert!(FinnhubWs::parse_ticks(text).is_empty());
    }

    #[test]
    fn test_subscribe_message_serialization() {
        let msg = SubscribeMessage {
            msg_type: "subscribe".to_string(),
            symbol: FinnhubWs::to_finnhub_symbol("EUR/USD"),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"subscribe","symbol":"OANDA:EUR_USD"}"#);
    }

    #[tokio::test]
    async fn test_send_before_connect_fails() {
        let mut ws = FinnhubWs::new("key".to_string());
        let result = ws
            .send(ControlMessage::Subscribe(vec!["EUR/USD".to_string()]))
            .await;
        assert!(matches!(result, Err(AppError::Transport(_))));
    }
}
