//! In-process tick transport backed by tokio channels.
//!
//! Lets an embedding application (or a test) push ticks and close events
//! into a tick hub, and observe the control messages the hub sends back.

use super::{ControlMessage, TickTransport, TransportEvent};
use crate::error::{AppError, Result};
use crate::types::Tick;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Transport half owned by the hub.
pub struct ChannelTransport {
    events: mpsc::UnboundedReceiver<TransportEvent>,
    sent: mpsc::UnboundedSender<ControlMessage>,
    connects: Arc<AtomicUsize>,
    refuse: Arc<AtomicBool>,
    connected: bool,
}

/// Feed half kept by the producer.
pub struct ChannelHandle {
    events: mpsc::UnboundedSender<TransportEvent>,
    sent: mpsc::UnboundedReceiver<ControlMessage>,
    connects: Arc<AtomicUsize>,
    refuse: Arc<AtomicBool>,
}

impl ChannelTransport {
    /// Create a connected transport/handle pair.
    pub fn pair() -> (Self, ChannelHandle) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        let connects = Arc::new(AtomicUsize::new(0));
        let refuse = Arc::new(AtomicBool::new(false));

        (
            Self {
                events: events_rx,
                sent: sent_tx,
                connects: connects.clone(),
                refuse: refuse.clone(),
                connected: false,
            },
            ChannelHandle {
                events: events_tx,
                sent: sent_rx,
                connects,
                refuse,
            },
        )
    }
}

#[async_trait]
impl TickTransport for ChannelTransport {
    async fn connect(&mut self) -> Result<()> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.refuse.load(Ordering::SeqCst) {
            return Err(AppError::Transport("connection refused".to_string()));
        }

        // Anything queued while disconnected belongs to the old connection.
        while self.events.try_recv().is_ok() {}
        self.connected = true;
        Ok(())
    }

    async fn send(&mut self, message: ControlMessage) -> Result<()> {
        if !self.connected {
            return Err(AppError::Transport("not connected".to_string()));
        }
        self.sent
            .send(message)
            .map_err(|_| AppError::Transport("control receiver dropped".to_string()))
    }

    async fn next_event(&mut self) -> TransportEvent {
        match self.events.recv().await {
            Some(TransportEvent::Closed(reason)) => {
                self.connected = false;
                TransportEvent::Closed(reason)
            }
            Some(event) => event,
            None => {
                self.connected = false;
                TransportEvent::Closed(Some("feed handle dropped".to_string()))
            }
        }
    }

    async fn close(&mut self) {
        self.connected = false;
    }
}

impl ChannelHandle {
    /// Push a tick; returns false once the transport is gone.
    pub fn push_tick(&self, tick: Tick) -> bool {
        self.events.send(TransportEvent::Tick(tick)).is_ok()
    }

    /// Simulate the remote end closing the connection.
    pub fn close_connection(&self, reason: &str) -> bool {
        self.events
            .send(TransportEvent::Closed(Some(reason.to_string())))
            .is_ok()
    }

    /// Make subsequent connect attempts fail (or succeed again).
    pub fn refuse_connections(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Number of connect attempts so far.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Next control message sent by the hub.
    pub async fn next_control(&mut self) -> Option<ControlMessage> {
        self.sent.recv().await
    }

    /// Control message already sent by the hub, without waiting.
    pub fn try_next_control(&mut self) -> Option<ControlMessage> {
        self.sent.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_discards_stale_events() {
        let (mut transport, handle) = ChannelTransport::pair();
        handle.push_tick(Tick::new("EUR/USD", 1.0, 1, 0.0));
        transport.connect().await.unwrap();

        handle.push_tick(Tick::new("EUR/USD", 2.0, 2, 0.0));
        match transport.next_event().await {
            TransportEvent::Tick(tick) => assert_eq!(tick.price, 2.0),
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(handle.connect_count(), 1);
    }

    #[tokio::test]
    async fn test_send_requires_connection() {
        let (mut transport, mut handle) = ChannelTransport::pair();
        let msg = ControlMessage::Subscribe(vec!["EUR/USD".to_string()]);
        assert!(transport.send(msg.clone()).await.is_err());

        transport.connect().await.unwrap();
        transport.send(msg.clone()).await.unwrap();
        assert_eq!(handle.try_next_control(), Some(msg));
    }

    #[tokio::test]
    async fn test_refused_connection() {
        let (mut transport, handle) = ChannelTransport::pair();
        handle.refuse_connections(true);
        assert!(matches!(transport.connect().await, Err(AppError::Transport(_))));
        assert_eq!(handle.connect_count(), 1);
    }
}
