/**
 * Tick Hub Tests
 *
 * Tests for live tick fan-out through the public API:
 * - Change fields across multiple listeners
 * - Reconnect timing under a paused clock
 * - Shutdown semantics
 */

use fxlens::services::TickHub;
use fxlens::sources::{ChannelHandle, ChannelTransport, ControlMessage};
use fxlens::{ConnectionState, PriceUpdate, Tick};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

mod common {
    use super::*;

    pub fn recorder() -> (
        Arc<dyn fxlens::TickListener>,
        mpsc::UnboundedReceiver<PriceUpdate>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let listener = move |update: &PriceUpdate| -> anyhow::Result<()> {
            tx.send(update.clone())?;
            Ok(())
        };
        (Arc::new(listener), rx)
    }

    pub async fn connected(hub: &Arc<TickHub>) -> (ChannelHandle, JoinHandle<fxlens::Result<()>>) {
        let (transport, handle) = ChannelTransport::pair();
        let task = hub.spawn(transport);
        hub.state_watch()
            .wait_for(|s| *s == ConnectionState::Connected)
            .await
            .unwrap();
        (handle, task)
    }

    pub fn tick(price: f64) -> Tick {
        Tick::new("EUR/USD", price, chrono::Utc::now().timestamp_millis(), 0.0)
    }
}

#[tokio::test]
async fn test_fan_out_change_fields() {
    let hub = TickHub::with_fixed_delay(Duration::from_secs(5));
    let (first, mut first_rx) = common::recorder();
    let (second, mut second_rx) = common::recorder();
    hub.subscribe(first);
    hub.subscribe(second);

    let (handle, _task) = common::connected(&hub).await;
    for price in [100.0, 101.0, 99.0] {
        handle.push_tick(common::tick(price));
    }

    for rx in [&mut first_rx, &mut second_rx] {
        let updates = [
            rx.recv().await.unwrap(),
            rx.recv().await.unwrap(),
            rx.recv().await.unwrap(),
        ];
        let changes: Vec<f64> = updates.iter().map(|u| u.change).collect();
        assert_eq!(changes, vec![0.0, 1.0, -2.0]);
        assert_eq!(updates[0].change_percent, 0.0);
        assert!((updates[1].change_percent - 1.0).abs() < 1e-9);
        assert!((updates[2].change_percent - (-1.98)).abs() < 0.01);
        assert_eq!(updates[2].previous_price, Some(101.0));
    }
    hub.disconnect();
}

#[tokio::test(start_paused = true)]
async fn test_single_reconnect_after_delay() {
    let hub = TickHub::with_fixed_delay(Duration::from_secs(5));
    hub.watch("EUR/USD");
    let (listener, mut rx) = common::recorder();
    hub.subscribe(listener);

    let (mut handle, _task) = common::connected(&hub).await;
    assert_eq!(
        handle.next_control().await,
        Some(ControlMessage::Subscribe(vec!["EUR/USD".to_string()]))
    );

    handle.close_connection("reset by peer");
    handle.push_tick(common::tick(1.2));

    tokio::time::sleep(Duration::from_millis(4_900)).await;
    assert_eq!(handle.connect_count(), 1);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(handle.connect_count(), 2);
    assert_eq!(hub.state(), ConnectionState::Connected);

    // Watched symbols are subscribed again on the new connection.
    assert_eq!(
        handle.next_control().await,
        Some(ControlMessage::Subscribe(vec!["EUR/USD".to_string()]))
    );

    // Nothing from the gap was delivered.
    assert!(rx.try_recv().is_err());

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(handle.connect_count(), 2);
    hub.disconnect();
}

#[tokio::test]
async fn test_disconnect_ends_run_task() {
    let hub = TickHub::with_fixed_delay(Duration::from_secs(5));
    let (listener, _rx) = common::recorder();
    hub.subscribe(listener);

    let (_handle, task) = common::connected(&hub).await;
    hub.disconnect();

    tokio_test::assert_ok!(task.await.unwrap());
    assert_eq!(hub.state(), ConnectionState::Disconnected);
    assert_eq!(hub.listener_count(), 0);
}
