// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use foreman_core::BusEvent;

fn log_event(n: usize) -> BusEvent {
    BusEvent::JobLog {
        job_id: "ab12cd34".into(),
        line: format!("line {n}"),
    }
}

#[tokio::test]
async fn subscriber_receives_in_publish_order() {
    let bus = EventBus::new();
    let mut rx = bus.subscribe();
    for n in 0..3 {
        bus.publish(log_event(n));
    }
    for n in 0..3 {
        let event = rx.recv().await.unwrap();
        assert_eq!(event, log_event(n));
    }
}

#[tokio::test]
async fn publish_without_subscribers_is_fine() {
    let bus = EventBus::new();
    bus.publish(log_event(0));
    assert_eq!(bus.subscriber_count(), 0);
}

#[tokio::test]
async fn slow_subscriber_drops_oldest_and_recovers() {
    let bus = EventBus::new();
    let mut rx = bus.subscribe();
    // Overflow the per-subscriber buffer without ever receiving.
    for n in 0..600 {
        bus.publish(log_event(n));
    }
    // First recv reports the lag; the next delivers the oldest retained.
    match rx.recv().await {
        Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
            assert!(missed > 0);
        }
        other => panic!("expected lag, got {other:?}"),
    }
    let event = rx.recv().await.unwrap();
    assert_eq!(event, log_event(600 - 256));
}

#[tokio::test]
async fn late_subscriber_misses_earlier_events() {
    let bus = EventBus::new();
    bus.publish(log_event(0));
    let mut rx = bus.subscribe();
    bus.publish(log_event(1));
    assert_eq!(rx.recv().await.unwrap(), log_event(1));
}
