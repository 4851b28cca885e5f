//! Tick transport that polls spot quotes over HTTP.
//!
//! Used when no streaming feed is configured. Each interval the watched
//! symbols are quoted concurrently and emitted as ticks.

use super::{ControlMessage, QuoteSource, TickTransport, TransportEvent};
use crate::error::{AppError, Result};
use crate::types::Tick;
use async_trait::async_trait;
use futures_util::future::join_all;
use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

/// Default quote polling interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

pub struct PollingTransport<Q> {
    source: Arc<Q>,
    interval: Duration,
    symbols: BTreeSet<String>,
    pending: VecDeque<Tick>,
    next_poll: Option<Instant>,
    connected: bool,
}

impl<Q: QuoteSource> PollingTransport<Q> {
    pub fn new(source: Arc<Q>) -> Self {
        Self::with_interval(source, DEFAULT_POLL_INTERVAL)
    }

    pub fn with_interval(source: Arc<Q>, interval: Duration) -> Self {
        Self {
            source,
            interval,
            symbols: BTreeSet::new(),
            pending: VecDeque::new(),
            next_poll: None,
            connected: false,
        }
    }

    /// Symbols currently being polled.
    pub fn symbols(&self) -> Vec<String> {
        self.symbols.iter().cloned().collect()
    }

    /// Quote every watched symbol once.
    ///
    /// Returns the error of the last failure when no quote succeeded.
    async fn poll_once(&self) -> Result<Vec<Tick>> {
        let results = join_all(self.symbols.iter().map(|s| self.source.quote(s))).await;

        let mut ticks = Vec::with_capacity(results.len());
        let mut last_error = None;
        for (symbol, result) in self.symbols.iter().zip(results) {
            match result {
                Ok(tick) => ticks.push(tick),
                Err(e) => {
                    warn!("Quote poll failed for {}: {}", symbol, e);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if ticks.is_empty() => Err(e),
            _ => Ok(ticks),
        }
    }
}

#[async_trait]
impl<Q: QuoteSource + 'static> TickTransport for PollingTransport<Q> {
    async fn connect(&mut self) -> Result<()> {
        self.pending.clear();
        self.next_poll = Some(Instant::now());
        self.connected = true;
        debug!("Quote polling started every {:?}", self.interval);
        Ok(())
    }

    async fn send(&mut self, message: ControlMessage) -> Result<()> {
        if !self.connected {
            return Err(AppError::Transport("polling transport not started".to_string()));
        }
        match message {
            ControlMessage::Subscribe(symbols) => self.symbols.extend(symbols),
            ControlMessage::Unsubscribe(symbols) => {
                for symbol in &symbols {
                    self.symbols.remove(symbol);
                }
                self.pending.retain(|t| !symbols.contains(&t.symbol));
            }
        }
        Ok(())
    }

    async fn next_event(&mut self) -> TransportEvent {
        loop {
            if let Some(tick) = self.pending.pop_front() {
                return TransportEvent::Tick(tick);
            }
            let deadline = match (self.connected, self.next_poll) {
                (true, Some(deadline)) => deadline,
                _ => return TransportEvent::Closed(Some("not connected".to_string())),
            };

            sleep_until(deadline).await;

            // Deadline only advances once a poll completes, so a cancelled
            // poll is retried immediately on the next call.
            let polled = self.poll_once().await;
            self.next_poll = Some(Instant::now() + self.interval);

            match polled {
                Ok(ticks) => self.pending.extend(ticks),
                Err(e) => {
                    self.connected = false;
                    return TransportEvent::Closed(Some(e.to_string()));
                }
            }
        }
    }

    async fn close(&mut self) {
        self.connected = false;
        self.next_poll = None;
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingQuotes {
        calls: AtomicUsize,
        failing: bool,
    }

    impl CountingQuotes {
        fn new(failing: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                failing,
            })
        }
    }

    #[async_trait]
    impl QuoteSource for CountingQuotes {
        async fn quote(&self, symbol: &str) -> Result<Tick> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing {
                return Err(AppError::ExternalApi("rate limited".to_string()));
            }
            Ok(Tick::new(symbol, 1.0 + n as f64 / 1000.0, n as i64, 0.0))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_watched_symbols_on_interval() {
        let quotes = CountingQuotes::new(false);
        let mut transport = PollingTransport::with_interval(quotes.clone(), Duration::from_secs(10));
        transport.connect().await.unwrap();
        transport
            .send(ControlMessage::Subscribe(vec!["EUR/USD".to_string()]))
            .await
            .unwrap();

        let start = Instant::now();
        assert!(matches!(transport.next_event().await, TransportEvent::Tick(_)));
        assert_eq!(quotes.calls.load(Ordering::SeqCst), 1);

        match transport.next_event().await {
            TransportEvent::Tick(tick) => assert_eq!(tick.symbol, "EUR/USD"),
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(quotes.calls.load(Ordering::SeqCst), 2);
        assert!(start.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsubscribe_stops_polling_symbol() {
        let quotes = CountingQuotes::new(false);
        let mut transport = PollingTransport::new(quotes.clone());
        transport.connect().await.unwrap();
        transport
            .send(ControlMessage::Subscribe(vec![
                "EUR/USD".to_string(),
                "GBP/USD".to_string(),
            ]))
            .await
            .unwrap();
        transport
            .send(ControlMessage::Unsubscribe(vec!["GBP/USD".to_string()]))
            .await
            .unwrap();

        assert_eq!(transport.symbols(), vec!["EUR/USD".to_string()]);
        transport.next_event().await;
        assert_eq!(quotes.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_quotes_failing_closes() {
        let quotes = CountingQuotes::new(true);
        let mut transport = PollingTransport::new(quotes);
        transport.connect().await.unwrap();
        transport
            .send(ControlMessage::Subscribe(vec!["EUR/USD".to_string()]))
            .await
            .unwrap();

        assert!(matches!(transport.next_event().await, TransportEvent::Closed(Some(_))));
    }

    #[tokio::test]
    async fn test_send_before_connect_fails() {
        let mut transport = PollingTransport::new(CountingQuotes::new(false));
        let result = transport
            .send(ControlMessage::Subscribe(vec!["EUR/USD".to_string()]))
            .await;
        assert!(matches!(result, Err(AppError::Transport(_))));
    }
}
