//! Broadcast channel carrying committed version changes.
//!
//! The manager publishes from the thread that ran the operation, after its
//! transaction committed. Publishing never waits on subscribers: each one has
//! a bounded backlog, and a subscriber that falls further behind loses the
//! oldest events. The loss is counted, not reported as an error.

use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

use crate::events::VersionLifecycleEvent;

/// Backlog each subscriber may accumulate before it starts losing events.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Publishing side of the change feed. Clones share one channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<VersionLifecycleEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Bus whose subscribers keep at most `capacity` unread events (at least 1).
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Start observing. Only events published from now on are seen.
    pub fn subscribe(&self) -> EventSubscriber {
        EventSubscriber {
            receiver: self.sender.subscribe(),
            missed: 0,
        }
    }

    /// Hand `event` to every current subscriber and return how many there
    /// were. With nobody subscribed the event is dropped.
    pub fn publish(&self, event: VersionLifecycleEvent) -> usize {
        let event_type = event.event_type();
        let record_id = event.record_id();
        let reached = self.sender.send(event).unwrap_or(0);
        tracing::trace!(event_type, record_id = %record_id, reached, "Published version event");
        reached
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving side of the change feed.
pub struct EventSubscriber {
    receiver: broadcast::Receiver<VersionLifecycleEvent>,
    missed: u64,
}

impl EventSubscriber {
    /// Next unread event, without waiting. `None` when caught up.
    pub fn try_recv(&mut self) -> Option<VersionLifecycleEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(skipped)) => self.missed += skipped,
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    /// Every unread event, oldest first.
    pub fn drain(&mut self) -> Vec<VersionLifecycleEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    /// Wait for the next event. `None` once every bus handle is gone.
    pub async fn recv(&mut self) -> Option<VersionLifecycleEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => self.missed += skipped,
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Events lost so far because this subscriber fell behind.
    pub fn missed(&self) -> u64 {
        self.missed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{SnapshotCreatedEvent, VersionsTrimmedEvent};
    use crate::types::RecordId;

    fn trimmed(id: i64) -> VersionLifecycleEvent {
        VersionLifecycleEvent::VersionsTrimmed(VersionsTrimmedEvent::new(RecordId(id), 1, 2))
    }

    #[test]
    fn test_publish_reaches_every_subscriber() {
        let bus = EventBus::new();
        let mut first = bus.subscribe();
        let mut second = bus.clone().subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        assert_eq!(bus.publish(trimmed(1)), 2);

        assert_eq!(first.try_recv().map(|e| e.record_id()), Some(RecordId(1)));
        assert_eq!(second.try_recv().map(|e| e.record_id()), Some(RecordId(1)));
        assert!(first.try_recv().is_none());
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new();
        assert_eq!(bus.publish(trimmed(1)), 0);

        // Late subscribers do not see earlier events
        let mut late = bus.subscribe();
        assert!(late.try_recv().is_none());
    }

    #[test]
    fn test_lagging_subscriber_counts_missed_events() {
        let bus = EventBus::with_capacity(2);
        let mut sub = bus.subscribe();
        for id in 1..=5 {
            bus.publish(trimmed(id));
        }

        let ids: Vec<RecordId> = sub.drain().iter().map(|e| e.record_id()).collect();
        assert_eq!(ids, vec![RecordId(4), RecordId(5)]);
        assert_eq!(sub.missed(), 3);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let bus = EventBus::with_capacity(0);
        let mut sub = bus.subscribe();
        bus.publish(trimmed(7));
        assert_eq!(sub.drain().len(), 1);
    }

    #[tokio::test]
    async fn test_recv_waits_for_event() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe();

        let publisher = bus.clone();
        let handle = tokio::spawn(async move {
            publisher.publish(VersionLifecycleEvent::SnapshotCreated(
                SnapshotCreatedEvent::new(RecordId(1), RecordId(2), 0),
            ));
        });

        let event = sub.recv().await.unwrap();
        assert_eq!(event.event_type(), "version.snapshot_created");
        handle.await.unwrap();

        drop(bus);
        assert!(sub.recv().await.is_none());
    }
}
