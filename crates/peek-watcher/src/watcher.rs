//! File watcher with async event streaming.
//!
//! This module provides the [`FileWatcher`] type that bridges the synchronous
//! `notify` watcher to the async tokio runtime.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    notify watcher thread                        │
//! │  ┌───────────────────┐    ┌──────────────────────────────┐      │
//! │  │ RecommendedWatcher│ -> │ Callback (EventFilter)       │      │
//! │  │ (parent dir)      │    │ discards other paths / kinds │      │
//! │  └───────────────────┘    └──────────────┬───────────────┘      │
//! └──────────────────────────────────────────│──────────────────────┘
//!                                            │ blocking_send
//!                                            ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Async Runtime (tokio)                        │
//! │  ┌──────────────────┐    ┌────────────────┐                     │
//! │  │ FileWatcher      │    │ mpsc::Receiver │ -> ChangeSource     │
//! │  └──────────────────┘    └────────────────┘                     │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The subscription is established synchronously in [`FileWatcher::new`], so
//! a directory that cannot be watched is reported to the caller at startup
//! rather than from a background task.
//!
//! The event channel is bounded. When it is full the callback blocks the
//! notify thread until the consumer catches up; this is the only point of
//! backpressure in the pipeline.

use camino::{Utf8Path, Utf8PathBuf};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use peek_core::{WatchConfig, WatchedPath};

use crate::error::WatchError;
use crate::events::ChangeNotification;
use crate::filter::{EventFilter, WatchedFileFilter};

/// A single-directory watcher that streams filtered notifications.
///
/// # Lifecycle
///
/// 1. **Creation**: `FileWatcher::new()` validates the directory, creates the
///    channel and subscribes to OS events (non-recursive).
///
/// 2. **Event Reception**: `recv()` yields notifications already filtered to
///    the watched file.
///
/// 3. **Shutdown**: `stop()` or dropping the watcher ends the subscription;
///    `recv()` then returns `None` once the queue is drained.
///
/// # Examples
///
/// ```no_run
/// use peek_core::{WatchConfig, WatchedPath};
/// use peek_watcher::FileWatcher;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let watched = WatchedPath::resolve("drawing.svg")?;
/// let mut watcher = FileWatcher::new(&watched, &WatchConfig::default())?;
///
/// while let Some(change) = watcher.recv().await {
///     println!("{} {}", change.kind(), change.path());
/// }
/// # Ok(())
/// # }
/// ```
pub struct FileWatcher {
    /// The notify watcher. `None` once stopped.
    watcher: Option<RecommendedWatcher>,

    /// Filtered notifications from the watcher thread.
    event_rx: mpsc::Receiver<ChangeNotification>,

    /// The directory being watched.
    watch_dir: Utf8PathBuf,
}

impl std::fmt::Debug for FileWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWatcher")
            .field("watch_dir", &self.watch_dir)
            .field("is_running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl FileWatcher {
    /// Subscribes to changes of the watched file.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::PathNotFound`] if the parent directory no longer exists.
    /// Returns [`WatchError::Subscribe`] if the OS subscription fails.
    pub fn new(watched: &WatchedPath, config: &WatchConfig) -> Result<Self, WatchError> {
        let filter = WatchedFileFilter::new(watched.file().to_owned());
        Self::with_filter(watched.dir(), config.channel_capacity, filter)
    }

    /// Subscribes to `dir` and forwards whatever `filter` accepts.
    ///
    /// # Arguments
    ///
    /// * `dir` - The directory to watch (must exist, not recursive)
    /// * `channel_capacity` - Capacity of the event channel (at least 1)
    /// * `filter` - Decides which events become notifications
    pub fn with_filter<F: EventFilter>(
        dir: &Utf8Path,
        channel_capacity: usize,
        filter: F,
    ) -> Result<Self, WatchError> {
        if !dir.is_dir() {
            return Err(WatchError::path_not_found(dir));
        }

        let (event_tx, event_rx) = mpsc::channel(channel_capacity.max(1));

        let mut watcher = notify::recommended_watcher(
            move |res: notify::Result<notify::Event>| match res {
                Ok(event) => {
                    let Some(change) = filter.classify(&event) else {
                        tracing::trace!(kind = ?event.kind, paths = ?event.paths, "Filtered out file event");
                        return;
                    };
                    if event_tx.blocking_send(change).is_err() {
                        tracing::debug!("Event channel closed, dropping file event");
                    }
                }
                Err(error) => {
                    let error = WatchError::from(error);
                    tracing::warn!(error = %error, "File watcher error, continuing");
                }
            },
        )
        .map_err(|e| WatchError::subscribe(dir, e))?;

        watcher
            .watch(dir.as_std_path(), RecursiveMode::NonRecursive)
            .map_err(|e| WatchError::subscribe(dir, e))?;

        tracing::info!(path = %dir, "File watcher started");

        Ok(Self {
            watcher: Some(watcher),
            event_rx,
            watch_dir: dir.to_owned(),
        })
    }

    /// Receives the next notification.
    ///
    /// Returns `None` once the watcher has stopped and the queue is empty.
    pub async fn recv(&mut self) -> Option<ChangeNotification> {
        self.event_rx.recv().await
    }

    /// Returns `true` until the watcher is stopped.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.watcher.is_some()
    }

    /// Ends the OS subscription. Idempotent.
    pub fn stop(&mut self) {
        if self.watcher.take().is_some() {
            tracing::info!(path = %self.watch_dir, "File watcher stopped");
        }
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}
