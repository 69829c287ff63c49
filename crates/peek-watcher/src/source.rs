//! The change source task.
//!
//! [`ChangeSource`] pumps notifications from a [`FileWatcher`] into a
//! [`Notifier`]. Before reading its first event it publishes one synthetic
//! [`ChangeKind::Initial`](crate::ChangeKind::Initial) notification,
//! whether or not the watched file exists yet.
//!
//! The source is not restartable: once `run` returns, the watcher has been
//! stopped and a new one must be created.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::WatchError;
use crate::events::ChangeNotification;
use crate::notifier::Notifier;
use crate::watcher::FileWatcher;

/// Pumps filtered file events into the notification channel.
#[derive(Debug)]
pub struct ChangeSource {
    watcher: FileWatcher,
    notifier: Notifier,
    initial: ChangeNotification,
}

impl ChangeSource {
    /// Creates a change source for `watcher`.
    ///
    /// `initial` is published once when the source starts; it should name the
    /// watched file.
    #[must_use]
    pub const fn new(watcher: FileWatcher, notifier: Notifier, initial: ChangeNotification) -> Self {
        Self {
            watcher,
            notifier,
            initial,
        }
    }

    /// Spawns [`run`](Self::run) on the current runtime.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<Result<(), WatchError>> {
        tokio::spawn(self.run(cancel))
    }

    /// Runs until `cancel` fires or the watcher stops delivering events.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::ChannelClosed`] if the watcher's event stream ends
    /// without cancellation.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<(), WatchError> {
        let reached = self.notifier.publish(self.initial.clone());
        tracing::debug!(path = %self.initial.path(), subscribers = reached, "Published initial notification");

        let result = loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    tracing::debug!("Change source cancelled");
                    break Ok(());
                }
                change = self.watcher.recv() => {
                    let Some(change) = change else {
                        tracing::error!("File watcher stream ended");
                        break Err(WatchError::ChannelClosed);
                    };
                    let reached = self.notifier.publish(change.clone());
                    tracing::info!(
                        path = %change.path(),
                        kind = %change.kind(),
                        subscribers = reached,
                        "File changed"
                    );
                }
            }
        };

        self.watcher.stop();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ChangeKind;
    use peek_core::{WatchConfig, WatchedPath};
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    const WAIT: Duration = Duration::from_secs(5);

    fn setup() -> (TempDir, WatchedPath, FileWatcher) {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let watched = WatchedPath::resolve(dir.path().join("a.svg")).expect("resolve");
        let watcher = FileWatcher::new(&watched, &WatchConfig::default()).expect("watcher");
        (dir, watched, watcher)
    }

    #[tokio::test]
    async fn test_initial_notification_is_published_first() {
        let (_dir, watched, watcher) = setup();
        let notifier = Notifier::new(8);
        let mut sub = notifier.subscribe();

        let cancel = CancellationToken::new();
        let initial = ChangeNotification::initial(watched.file().to_owned());
        let handle = ChangeSource::new(watcher, notifier, initial).spawn(cancel.clone());

        // The file does not exist; the initial trigger is sent anyway.
        let first = tokio::time::timeout(WAIT, sub.next())
            .await
            .expect("Timed out waiting for initial notification")
            .expect("Channel closed");
        assert!(first.is_initial());
        assert_eq!(first.path(), watched.file());

        cancel.cancel();
        let result = tokio::time::timeout(WAIT, handle)
            .await
            .expect("Change source did not stop")
            .expect("Change source panicked");
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_file_change_is_broadcast() {
        let (_dir, watched, watcher) = setup();
        let notifier = Notifier::new(8);
        let mut first_viewer = notifier.subscribe();
        let mut second_viewer = notifier.subscribe();

        let cancel = CancellationToken::new();
        let initial = ChangeNotification::initial(watched.file().to_owned());
        let _handle = ChangeSource::new(watcher, notifier, initial).spawn(cancel.clone());

        for sub in [&mut first_viewer, &mut second_viewer] {
            let n = tokio::time::timeout(WAIT, sub.next()).await.expect("initial");
            assert_eq!(n.map(|n| n.kind()), Some(ChangeKind::Initial));
        }

        fs::write(watched.file(), "<svg/>").expect("Failed to write file");

        for sub in [&mut first_viewer, &mut second_viewer] {
            let n = tokio::time::timeout(WAIT, sub.next())
                .await
                .expect("Timed out waiting for change")
                .expect("Channel closed");
            assert!(!n.is_initial());
            assert_eq!(n.path(), watched.file());
        }

        cancel.cancel();
    }

    #[tokio::test]
    async fn test_cancel_stops_source_and_closes_channel() {
        let (_dir, watched, watcher) = setup();
        let notifier = Notifier::new(8);
        let mut sub = notifier.subscribe();

        let cancel = CancellationToken::new();
        let initial = ChangeNotification::initial(watched.file().to_owned());
        let handle = ChangeSource::new(watcher, notifier, initial).spawn(cancel.clone());
        cancel.cancel();

        let result = tokio::time::timeout(WAIT, handle).await.expect("stop");
        assert!(result.expect("join").is_ok());

        // The source owned the only notifier, so the subscription drains and ends.
        let mut seen = 0;
        while tokio::time::timeout(WAIT, sub.next())
            .await
            .expect("subscription should end")
            .is_some()
        {
            seen += 1;
        }
        assert!(seen <= 1);
    }
}
