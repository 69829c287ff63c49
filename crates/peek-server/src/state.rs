//! Shared application state passed to the axum handlers.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use peek_core::WatchedPath;
use peek_watcher::Notifier;
use tokio_util::sync::CancellationToken;

/// Process-unique identifier of a viewer connection, used in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Wraps a raw id.
    #[inline]
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the numeric value.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Everything a connection needs, cloned into every handler invocation.
///
/// Nothing here is mutated per connection except the id counter.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The file every viewer sees.
    pub watched: Arc<WatchedPath>,

    /// Source of change notifications.
    pub notifier: Notifier,

    /// Absolute lifetime of one connection.
    pub session_timeout: Duration,

    /// Server-wide shutdown. Each connection runs on a child token.
    pub shutdown: CancellationToken,

    next_id: Arc<AtomicU64>,
}

impl AppState {
    /// Creates the state shared by all handlers.
    #[must_use]
    pub fn new(
        watched: Arc<WatchedPath>,
        notifier: Notifier,
        session_timeout: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            watched,
            notifier,
            session_timeout,
            shutdown,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Allocates the id for a new connection.
    pub fn next_connection_id(&self) -> ConnectionId {
        ConnectionId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the number of connections currently subscribed to changes.
    #[must_use]
    pub fn viewer_count(&self) -> usize {
        self.notifier.subscriber_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> AppState {
        let dir = std::env::temp_dir();
        let watched = WatchedPath::resolve(dir.join("peek-state-test.svg")).expect("resolve");
        AppState::new(
            Arc::new(watched),
            Notifier::new(4),
            Duration::from_secs(600),
            CancellationToken::new(),
        )
    }

    #[test]
    fn test_connection_ids_are_unique_across_clones() {
        let state = state();
        let clone = state.clone();
        let a = state.next_connection_id();
        let b = clone.next_connection_id();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn test_connection_id_display() {
        let state = state();
        let id = state.next_connection_id();
        assert_eq!(id.to_string(), format!("conn-{}", id.get()));
    }

    #[test]
    fn test_viewer_count_tracks_subscriptions() {
        let state = state();
        assert_eq!(state.viewer_count(), 0);
        let sub = state.notifier.subscribe();
        assert_eq!(state.viewer_count(), 1);
        drop(sub);
        assert_eq!(state.viewer_count(), 0);
    }
}
