//! Error types for the peek-watcher crate.
//!
//! This module provides the [`WatchError`] type for errors that can occur
//! while establishing or running the change source.

use camino::Utf8PathBuf;

/// Errors that can occur during file watching operations.
///
/// # Error Recovery Strategy
///
/// - **Subscription errors** ([`WatchError::Subscribe`]): Fatal - the process
///   has nothing to serve without the watch
/// - **Path not found** ([`WatchError::PathNotFound`]): Fatal - the watched
///   directory must exist
/// - **Channel closed** ([`WatchError::ChannelClosed`]): Fatal - the OS watcher
///   stopped feeding events
/// - **Event errors** ([`WatchError::Event`]): Recoverable - logged, the watch
///   continues
///
/// # Examples
///
/// ```
/// use peek_watcher::WatchError;
///
/// fn handle_error(err: &WatchError) {
///     if err.is_fatal() {
///         eprintln!("Fatal watcher error: {err}");
///     } else {
///         eprintln!("Warning: {err}");
///     }
/// }
/// ```
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// The OS-level watch subscription could not be established.
    #[error("failed to subscribe to {path}: {source}")]
    Subscribe {
        /// The directory that could not be watched.
        path: Utf8PathBuf,
        /// The underlying notify error.
        #[source]
        source: notify::Error,
    },

    /// The watcher reported an error after the subscription was established.
    #[error("file watcher error: {0}")]
    Event(#[from] notify::Error),

    /// The specified path does not exist.
    #[error("path does not exist: {0}")]
    PathNotFound(Utf8PathBuf),

    /// The raw event channel closed while the change source was running.
    #[error("event channel closed unexpectedly")]
    ChannelClosed,
}

impl WatchError {
    /// Creates a new [`WatchError::PathNotFound`] error.
    #[inline]
    pub fn path_not_found(path: impl Into<Utf8PathBuf>) -> Self {
        Self::PathNotFound(path.into())
    }

    /// Creates a new [`WatchError::Subscribe`] error.
    #[inline]
    pub fn subscribe(path: impl Into<Utf8PathBuf>, source: notify::Error) -> Self {
        Self::Subscribe {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` if this error is recoverable (watching can continue).
    #[inline]
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Event(_))
    }

    /// Returns `true` if this error is fatal (watching should stop).
    #[inline]
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !self.is_recoverable()
    }

    /// Returns the path associated with this error, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Utf8PathBuf> {
        match self {
            Self::PathNotFound(path) | Self::Subscribe { path, .. } => Some(path),
            Self::Event(_) | Self::ChannelClosed => None,
        }
    }
}
