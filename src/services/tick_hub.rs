//! Live tick fan-out with automatic reconnection.
//!
//! One run task owns the transport. It connects, re-subscribes every watched
//! symbol, pumps ticks to registered listeners and reconnects after a policy
//! delay whenever the transport is lost.

use crate::error::{AppError, Result};
use crate::sources::{normalize_pair, ControlMessage, TickTransport, TransportEvent};
use crate::types::{ConnectionState, PriceUpdate, Tick};
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Default wait before each reconnect attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Receives every tick delivered by a [`TickHub`].
pub trait TickListener: Send + Sync {
    fn on_tick(&self, update: &PriceUpdate) -> anyhow::Result<()>;
}

impl<F> TickListener for F
where
    F: Fn(&PriceUpdate) -> anyhow::Result<()> + Send + Sync,
{
    fn on_tick(&self, update: &PriceUpdate) -> anyhow::Result<()> {
        self(update)
    }
}

/// Registration token returned by [`TickHub::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(Uuid);

impl ListenerId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Decides how long to wait before reconnect attempt `attempt` (1-based).
/// `None` stops reconnecting.
pub trait ReconnectPolicy: Send + Sync {
    fn delay(&self, attempt: u32) -> Option<Duration>;
}

/// Same delay before every attempt, retrying forever.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay(pub Duration);

impl Default for FixedDelay {
    fn default() -> Self {
        Self(DEFAULT_RECONNECT_DELAY)
    }
}

impl ReconnectPolicy for FixedDelay {
    fn delay(&self, _attempt: u32) -> Option<Duration> {
        Some(self.0)
    }
}

/// How a connected session ended.
enum SessionEnd {
    Lost(Option<String>),
    Shutdown,
}

/// Resolves once the shutdown flag is set.
async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    loop {
        let stop = *shutdown.borrow_and_update();
        if stop || shutdown.changed().await.is_err() {
            return;
        }
    }
}

type ListenerEntry = (ListenerId, Arc<dyn TickListener>);

/// Fan-out hub for live ticks.
pub struct TickHub {
    listeners: RwLock<Vec<ListenerEntry>>,
    /// Last delivered price per symbol, for change fields.
    last_prices: DashMap<String, f64>,
    symbols: RwLock<BTreeSet<String>>,
    state_tx: watch::Sender<ConnectionState>,
    shutdown_tx: watch::Sender<bool>,
    commands_tx: mpsc::UnboundedSender<ControlMessage>,
    /// Taken by the run task; empty once the hub has been run.
    commands_rx: Mutex<Option<mpsc::UnboundedReceiver<ControlMessage>>>,
    policy: Arc<dyn ReconnectPolicy>,
}

impl TickHub {
    /// Create a hub with the given reconnect policy.
    pub fn new(policy: Arc<dyn ReconnectPolicy>) -> Arc<Self> {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (shutdown_tx, _) = watch::channel(false);
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();

        Arc::new(Self {
            listeners: RwLock::new(Vec::new()),
            last_prices: DashMap::new(),
            symbols: RwLock::new(BTreeSet::new()),
            state_tx,
            shutdown_tx,
            commands_tx,
            commands_rx: Mutex::new(Some(commands_rx)),
            policy,
        })
    }

    /// Create a hub that waits `delay` before every reconnect.
    pub fn with_fixed_delay(delay: Duration) -> Arc<Self> {
        Self::new(Arc::new(FixedDelay(delay)))
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Observe connection state changes.
    pub fn state_watch(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Register a listener.
    pub fn subscribe(&self, listener: Arc<dyn TickListener>) -> ListenerId {
        let id = ListenerId::new();
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, listener));
        debug!("Listener {} subscribed", id);
        id
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        before != listeners.len()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn is_registered(&self, id: ListenerId) -> bool {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|(existing, _)| *existing == id)
    }

    /// Add a symbol to the subscription set.
    /// Subscribes on the live connection right away when connected.
    pub fn watch(&self, symbol: &str) -> bool {
        let symbol = normalize_pair(symbol);
        let added = self
            .symbols
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(symbol.clone());
        if added && self.state() == ConnectionState::Connected {
            let _ = self.commands_tx.send(ControlMessage::Subscribe(vec![symbol]));
        }
        added
    }

    /// Remove a symbol from the subscription set.
    pub fn unwatch(&self, symbol: &str) -> bool {
        let symbol = normalize_pair(symbol);
        let removed = self
            .symbols
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&symbol);
        if removed {
            self.last_prices.remove(&symbol);
            if self.state() == ConnectionState::Connected {
                let _ = self.commands_tx.send(ControlMessage::Unsubscribe(vec![symbol]));
            }
        }
        removed
    }

    /// Watched symbols in sorted order.
    pub fn watched(&self) -> Vec<String> {
        self.symbols
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Last delivered price for `symbol` on the current connection.
    pub fn last_price(&self, symbol: &str) -> Option<f64> {
        self.last_prices.get(&normalize_pair(symbol)).map(|p| *p)
    }

    fn is_shutdown(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            debug!("Tick hub {} -> {}", previous, state);
        }
    }

    /// Stop the run task and drop every listener and cached price.
    /// Ticks arriving afterwards are never delivered.
    pub fn disconnect(&self) {
        self.shutdown_tx.send_replace(true);
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.last_prices.clear();
        self.set_state(ConnectionState::Disconnected);
        info!("Tick hub disconnected");
    }

    /// Spawn [`TickHub::run`] on the tokio runtime.
    pub fn spawn<T>(self: &Arc<Self>, transport: T) -> JoinHandle<Result<()>>
    where
        T: TickTransport + 'static,
    {
        tokio::spawn(self.clone().run(transport))
    }

    /// Drive `transport` until [`TickHub::disconnect`] is called or the
    /// reconnect policy gives up. A hub runs at most once.
    pub async fn run<T: TickTransport>(self: Arc<Self>, mut transport: T) -> Result<()> {
        let mut commands = self
            .commands_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(AppError::AlreadyRunning)?;
        let mut shutdown = self.shutdown_tx.subscribe();
        let shutdown = &mut shutdown;
        let mut attempt: u32 = 0;

        while !self.is_shutdown() {
            self.set_state(ConnectionState::Connecting);

            let connected = tokio::select! {
                result = transport.connect() => result,
                _ = stopped(shutdown) => break,
            };

            match connected {
                Ok(()) => {
                    attempt = 0;
                    let end = self.session(&mut transport, &mut commands, shutdown).await;
                    self.set_state(ConnectionState::Disconnected);
                    self.last_prices.clear();
                    match end {
                        SessionEnd::Shutdown => break,
                        SessionEnd::Lost(reason) => warn!(
                            "Tick transport lost ({}), reconnecting...",
                            reason.as_deref().unwrap_or("no reason")
                        ),
                    }
                }
                Err(e) => {
                    self.set_state(ConnectionState::Disconnected);
                    if e.is_transport() {
                        warn!("Tick transport connect failed: {}, reconnecting...", e);
                    } else {
                        error!("Tick transport connect failed: {}, reconnecting...", e);
                    }
                }
            }

            attempt = attempt.saturating_add(1);
            let delay = match self.policy.delay(attempt) {
                Some(delay) => delay,
                None => {
                    warn!("Giving up on tick transport after {} attempts", attempt);
                    break;
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = stopped(shutdown) => break,
            }
        }

        transport.close().await;
        self.set_state(ConnectionState::Disconnected);
        self.last_prices.clear();
        Ok(())
    }

    /// One connected session: subscribe, then pump until loss or shutdown.
    async fn session<T: TickTransport>(
        &self,
        transport: &mut T,
        commands: &mut mpsc::UnboundedReceiver<ControlMessage>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> SessionEnd {
        // Queued commands are superseded by the full subscribe below.
        while commands.try_recv().is_ok() {}
        self.set_state(ConnectionState::Connected);

        let symbols = self.watched();
        info!("Tick transport connected, subscribing to {} symbols", symbols.len());
        if !symbols.is_empty() {
            if let Err(e) = transport.send(ControlMessage::Subscribe(symbols)).await {
                return SessionEnd::Lost(Some(e.to_string()));
            }
        }

        loop {
            tokio::select! {
                event = transport.next_event() => match event {
                    TransportEvent::Tick(tick) => self.deliver(tick),
                    TransportEvent::Closed(reason) => return SessionEnd::Lost(reason),
                },
                Some(message) = commands.recv() => {
                    if let Err(e) = transport.send(message).await {
                        return SessionEnd::Lost(Some(e.to_string()));
                    }
                }
                _ = stopped(shutdown) => return SessionEnd::Shutdown,
            }
        }
    }

    /// Derive the update for `tick` and hand it to every listener.
    fn deliver(&self, mut tick: Tick) {
        if self.state() != ConnectionState::Connected || self.is_shutdown() {
            return;
        }
        if !tick.price.is_finite() {
            warn!("Dropping non-finite tick for {}", tick.symbol);
            return;
        }

        tick.symbol = normalize_pair(&tick.symbol);
        let previous = self.last_prices.insert(tick.symbol.clone(), tick.price);
        let update = PriceUpdate::from_tick(tick, previous);

        let snapshot: Vec<ListenerEntry> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for (id, listener) in snapshot {
            // Removed by an earlier listener during this delivery.
            if !self.is_registered(id) {
                continue;
            }
            match catch_unwind(AssertUnwindSafe(|| listener.on_tick(&update))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Listener {} failed on {}: {}", id, update.symbol, e),
                Err(_) => error!("Listener {} panicked on {}", id, update.symbol),
            }
        }
    }
}
