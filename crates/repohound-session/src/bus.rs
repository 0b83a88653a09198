//! Fan-out delivery of progress events.
//!
//! Every subscriber owns its own broadcast receiver, so each one observes
//! every event published after it subscribed. A subscriber that falls more
//! than the channel capacity behind skips what it missed and keeps reading.

use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError};

use crate::error::BusError;
use crate::event::ProgressEvent;
use crate::session::{OperationKind, SessionSnapshot};

/// Events buffered per kind before slow subscribers start lagging.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Idle interval after which a subscriber synthesizes a heartbeat.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

/// One broadcast channel per operation kind.
#[derive(Debug)]
pub struct ProgressBus {
    scan: broadcast::Sender<ProgressEvent>,
    pull: broadcast::Sender<ProgressEvent>,
}

impl Default for ProgressBus {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (scan, _) = broadcast::channel(capacity);
        let (pull, _) = broadcast::channel(capacity);
        Self { scan, pull }
    }

    fn sender(&self, kind: OperationKind) -> &broadcast::Sender<ProgressEvent> {
        match kind {
            OperationKind::Scan => &self.scan,
            OperationKind::Pull => &self.pull,
        }
    }

    /// Deliver `event` to every current subscriber of its kind.
    ///
    /// Never blocks. Returns how many subscribers received it; with none
    /// listening the event is dropped.
    pub fn publish(&self, event: ProgressEvent) -> usize {
        let kind = event.snapshot.kind;
        self.sender(kind).send(event).unwrap_or(0)
    }

    /// Register a new subscriber for `kind`.
    pub fn subscribe(&self, kind: OperationKind) -> Subscription {
        Subscription {
            receiver: self.sender(kind).subscribe(),
            last: SessionSnapshot::idle(kind),
        }
    }

    pub fn subscriber_count(&self, kind: OperationKind) -> usize {
        self.sender(kind).receiver_count()
    }
}

/// A subscriber's private view of one kind's events.
#[derive(Debug)]
pub struct Subscription {
    receiver: broadcast::Receiver<ProgressEvent>,
    last: SessionSnapshot,
}

impl Subscription {
    /// Seed the snapshot repeated by heartbeats until the first event arrives.
    pub fn with_snapshot(mut self, snapshot: SessionSnapshot) -> Self {
        self.last = snapshot;
        self
    }

    pub fn kind(&self) -> OperationKind {
        self.last.kind
    }

    /// Latest snapshot seen by this subscriber.
    pub fn last_snapshot(&self) -> &SessionSnapshot {
        &self.last
    }

    /// Wait for the next event.
    pub async fn recv(&mut self) -> Result<ProgressEvent, BusError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Ok(self.observe(event)),
                Err(RecvError::Lagged(skipped)) => self.lagged(skipped),
                Err(RecvError::Closed) => return Err(BusError::Closed),
            }
        }
    }

    /// Wait up to `timeout` for the next event, returning a heartbeat if none arrives.
    pub async fn poll(&mut self, timeout: Duration) -> Result<ProgressEvent, BusError> {
        loop {
            match tokio::time::timeout(timeout, self.receiver.recv()).await {
                Ok(Ok(event)) => return Ok(self.observe(event)),
                Ok(Err(RecvError::Lagged(skipped))) => self.lagged(skipped),
                Ok(Err(RecvError::Closed)) => return Err(BusError::Closed),
                Err(_) => return Ok(ProgressEvent::heartbeat(self.last.clone())),
            }
        }
    }

    fn observe(&mut self, event: ProgressEvent) -> ProgressEvent {
        self.last = event.snapshot.clone();
        event
    }

    fn lagged(&self, skipped: u64) {
        tracing::warn!(kind = %self.last.kind, skipped, "progress subscriber lagged");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;

    fn event(kind: OperationKind, n: u64) -> ProgressEvent {
        let mut snapshot = SessionSnapshot::idle(kind);
        snapshot.processed_count = n;
        snapshot.message = format!("event {n}");
        ProgressEvent::new(EventKind::Progress, snapshot.message.clone(), snapshot)
    }

    #[tokio::test]
    async fn test_every_subscriber_sees_every_event() {
        let bus = ProgressBus::new();
        let mut first = bus.subscribe(OperationKind::Scan);
        let mut second = bus.subscribe(OperationKind::Scan);

        for n in 1..=3 {
            assert_eq!(bus.publish(event(OperationKind::Scan, n)), 2);
        }

        for sub in [&mut first, &mut second] {
            for n in 1..=3 {
                assert_eq!(sub.recv().await.unwrap().snapshot.processed_count, n);
            }
        }
    }

    #[tokio::test]
    async fn test_kinds_do_not_mix() {
        let bus = ProgressBus::new();
        let mut pulls = bus.subscribe(OperationKind::Pull);

        assert_eq!(bus.publish(event(OperationKind::Scan, 1)), 0);
        bus.publish(event(OperationKind::Pull, 2));

        let received = pulls.recv().await.unwrap();
        assert_eq!(received.snapshot.kind, OperationKind::Pull);
        assert_eq!(received.snapshot.processed_count, 2);
    }

    #[tokio::test]
    async fn test_heartbeat_repeats_last_snapshot() {
        let bus = ProgressBus::new();
        let mut sub = bus.subscribe(OperationKind::Scan);
        bus.publish(event(OperationKind::Scan, 7));

        let first = sub.poll(Duration::from_millis(50)).await.unwrap();
        assert_eq!(first.kind, EventKind::Progress);

        let beat = sub.poll(Duration::from_millis(20)).await.unwrap();
        assert_eq!(beat.kind, EventKind::Heartbeat);
        assert_eq!(beat.snapshot.processed_count, 7);
        assert_eq!(beat.message, "event 7");
    }

    #[tokio::test]
    async fn test_lagged_subscriber_skips_ahead() {
        let bus = ProgressBus::with_capacity(2);
        let mut sub = bus.subscribe(OperationKind::Scan);
        for n in 1..=5 {
            bus.publish(event(OperationKind::Scan, n));
        }

        assert_eq!(sub.recv().await.unwrap().snapshot.processed_count, 4);
        assert_eq!(sub.recv().await.unwrap().snapshot.processed_count, 5);
    }

    #[tokio::test]
    async fn test_closed_bus() {
        let bus = ProgressBus::new();
        let mut sub = bus.subscribe(OperationKind::Pull);
        drop(bus);

        assert_eq!(sub.poll(Duration::from_millis(10)).await, Err(BusError::Closed));
    }
}
