//! Cache change feed.
//!
//! Every store write, invalidation, and rollback publishes an epoch-stamped
//! event; view-layer subscribers use the feed to decide what to re-render.

use std::sync::atomic::{AtomicU64, Ordering};

use time::OffsetDateTime;
use tokio::sync::broadcast;
use tracing::debug;

use super::keys::QueryKey;

/// Monotonic epoch for ordering events within this process.
pub type Epoch = u64;

/// Why a cache entry changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeReason {
    /// A fetch or an optimistic write stored a new value.
    Updated,
    /// The entry was dropped; the next read refetches.
    Invalidated,
    /// A failed mutation restored the pre-mutation value.
    RolledBack,
}

/// One cache change, stamped for ordering.
#[derive(Debug, Clone)]
pub struct CacheEvent {
    pub epoch: Epoch,
    pub key: QueryKey,
    pub reason: ChangeReason,
    pub timestamp: OffsetDateTime,
}

/// Broadcast feed of cache changes.
///
/// Slow subscribers miss events rather than block writers; a lagged receiver
/// should re-read the entries it cares about.
pub struct ChangeFeed {
    sender: broadcast::Sender<CacheEvent>,
    epochs: AtomicU64,
}

impl ChangeFeed {
    /// Create a feed whose ring buffer holds `buffer` events.
    pub fn new(buffer: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer.max(1));
        Self {
            sender,
            epochs: AtomicU64::new(0),
        }
    }

    /// Next epoch number.
    pub fn next_epoch(&self) -> Epoch {
        self.epochs.fetch_add(1, Ordering::SeqCst)
    }

    /// Subscribe to future cache changes.
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.sender.subscribe()
    }

    /// Publish a change event.
    pub fn publish(&self, key: QueryKey, reason: ChangeReason) -> Epoch {
        let epoch = self.next_epoch();
        let event = CacheEvent {
            epoch,
            key,
            reason,
            timestamp: OffsetDateTime::now_utc(),
        };

        debug!(
            event_epoch = event.epoch,
            event_key = ?event.key,
            event_reason = ?event.reason,
            "Cache change published"
        );

        // A send error only means nobody is subscribed right now.
        let _ = self.sender.send(event);
        epoch
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[test]
    fn epoch_monotonicity() {
        let feed = ChangeFeed::new(8);

        let e1 = feed.next_epoch();
        let e2 = feed.next_epoch();
        let e3 = feed.next_epoch();

        assert!(e1 < e2);
        assert!(e2 < e3);
    }

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let feed = ChangeFeed::new(8);
        let mut rx = feed.subscribe();

        feed.publish(QueryKey::User(Uuid::nil()), ChangeReason::Updated);
        feed.publish(QueryKey::User(Uuid::nil()), ChangeReason::Invalidated);

        let first = rx.recv().await.expect("first event");
        let second = rx.recv().await.expect("second event");

        assert_eq!(first.reason, ChangeReason::Updated);
        assert_eq!(second.reason, ChangeReason::Invalidated);
        assert!(first.epoch < second.epoch);
    }

    #[test]
    fn publish_without_subscribers_does_not_fail() {
        let feed = ChangeFeed::new(8);
        assert_eq!(feed.subscriber_count(), 0);
        feed.publish(QueryKey::Feed(Uuid::nil()), ChangeReason::Updated);
    }
}
