//! Broadcast fan-out of change notifications.
//!
//! Every connection needs to observe every notification, so the channel is a
//! [`tokio::sync::broadcast`] rather than a queue with consumption semantics.
//! Each [`Subscription`] has its own read position.
//!
//! Publishing never blocks the change source. A subscriber that falls more
//! than `capacity` notifications behind is not an error: since a notification
//! only means "re-read the file", the missed ones are coalesced into the most
//! recent one.

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

use crate::events::ChangeNotification;

/// Sending side of the notification channel.
///
/// Cheap to clone; all clones publish into the same channel.
///
/// # Examples
///
/// ```
/// use peek_watcher::{ChangeNotification, Notifier};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let notifier = Notifier::new(16);
/// let mut first = notifier.subscribe();
/// let mut second = notifier.subscribe();
///
/// notifier.publish(ChangeNotification::initial("/tmp/a.svg".into()));
///
/// assert!(first.next().await.is_some());
/// assert!(second.next().await.is_some());
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<ChangeNotification>,
}

impl Notifier {
    /// Creates a notifier retaining up to `capacity` unread notifications per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publishes a notification to every current subscriber.
    ///
    /// Returns the number of subscribers reached. Zero is normal when no
    /// viewer is connected.
    pub fn publish(&self, change: ChangeNotification) -> usize {
        self.tx.send(change).unwrap_or(0)
    }

    /// Creates a subscription that sees every notification published from now on.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
        }
    }

    /// Returns the number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// One subscriber's view of the notification stream.
#[derive(Debug)]
pub struct Subscription {
    rx: broadcast::Receiver<ChangeNotification>,
}

impl Subscription {
    /// Waits for the next notification.
    ///
    /// If this subscriber lagged behind, the backlog collapses into the most
    /// recent retained notification. Returns `None` once every [`Notifier`]
    /// clone has been dropped.
    ///
    /// Cancel safe: dropping the future before it resolves loses nothing.
    pub async fn next(&mut self) -> Option<ChangeNotification> {
        loop {
            match self.rx.recv().await {
                Ok(change) => return Some(change),
                Err(RecvError::Closed) => return None,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Subscriber lagged, coalescing notifications");
                    if let Some(latest) = self.drain_latest() {
                        return Some(latest);
                    }
                }
            }
        }
    }

    /// Consumes everything currently buffered and returns the newest entry.
    fn drain_latest(&mut self) -> Option<ChangeNotification> {
        let mut latest = None;
        loop {
            match self.rx.try_recv() {
                Ok(change) => latest = Some(change),
                Err(TryRecvError::Lagged(_)) => {}
                Err(TryRecvError::Empty | TryRecvError::Closed) => return latest,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ChangeKind;
    use camino::Utf8PathBuf;
    use std::time::Duration;

    fn change(kind: ChangeKind) -> ChangeNotification {
        ChangeNotification::new(Utf8PathBuf::from("/tmp/a.svg"), kind)
    }

    #[test]
    fn test_publish_without_subscribers() {
        let notifier = Notifier::new(4);
        assert_eq!(notifier.subscriber_count(), 0);
        assert_eq!(notifier.publish(change(ChangeKind::Initial)), 0);
    }

    #[tokio::test]
    async fn test_every_subscriber_sees_every_notification() {
        let notifier = Notifier::new(8);
        let mut a = notifier.subscribe();
        let mut b = notifier.subscribe();
        assert_eq!(notifier.subscriber_count(), 2);

        assert_eq!(notifier.publish(change(ChangeKind::Written)), 2);
        assert_eq!(notifier.publish(change(ChangeKind::Created)), 2);

        for sub in [&mut a, &mut b] {
            assert_eq!(sub.next().await.map(|c| c.kind()), Some(ChangeKind::Written));
            assert_eq!(sub.next().await.map(|c| c.kind()), Some(ChangeKind::Created));
        }
    }

    #[tokio::test]
    async fn test_late_subscriber_misses_earlier_notifications() {
        let notifier = Notifier::new(8);
        notifier.publish(change(ChangeKind::Initial));

        let mut late = notifier.subscribe();
        notifier.publish(change(ChangeKind::Written));

        assert_eq!(late.next().await.map(|c| c.kind()), Some(ChangeKind::Written));
    }

    #[tokio::test]
    async fn test_lagging_subscriber_is_coalesced() {
        let notifier = Notifier::new(2);
        let mut slow = notifier.subscribe();

        for _ in 0..5 {
            notifier.publish(change(ChangeKind::Written));
        }
        notifier.publish(change(ChangeKind::Created));

        // One wake-up for the whole backlog, carrying the newest trigger.
        assert_eq!(slow.next().await.map(|c| c.kind()), Some(ChangeKind::Created));

        let nothing_left = tokio::time::timeout(Duration::from_millis(50), slow.next()).await;
        assert!(nothing_left.is_err());
    }

    #[tokio::test]
    async fn test_subscription_ends_when_notifier_dropped() {
        let notifier = Notifier::new(2);
        let mut sub = notifier.subscribe();
        drop(notifier);
        assert!(sub.next().await.is_none());
    }

    #[test]
    fn test_dropped_subscription_is_not_counted() {
        let notifier = Notifier::new(2);
        let sub = notifier.subscribe();
        assert_eq!(notifier.subscriber_count(), 1);
        drop(sub);
        assert_eq!(notifier.subscriber_count(), 0);
    }
}
