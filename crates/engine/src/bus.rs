// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process event bus.
//!
//! A thin wrapper over a tokio broadcast channel. Publishing never
//! blocks: with no subscribers the event is dropped, and a subscriber
//! that falls more than the channel capacity behind loses the oldest
//! messages (it observes a `Lagged` error and keeps going). There is no
//! replay — clients reconcile against the store after a gap.

use foreman_core::BusEvent;
use tokio::sync::broadcast;

/// Per-subscriber buffer size before old events are dropped.
const BUS_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<BusEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self { tx }
    }

    /// Register a new subscriber. Events published before this call are
    /// not delivered.
    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.tx.subscribe()
    }

    /// Publish fire-and-forget. An error from the channel only means
    /// nobody is listening, which is fine.
    pub fn publish(&self, event: BusEvent) {
        let _ = self.tx.send(event);
    }

    /// Number of live subscribers, used by tests and the dashboard.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
