//! Change notification types.
//!
//! A [`ChangeNotification`] is a trigger, not a data carrier: it says "the
//! watched file may have new contents" and receivers re-read the file.
//!
//! # Event Flow
//!
//! ```text
//! File System Change
//!        │
//!        ▼
//!   notify (parent directory, non-recursive)
//!        │
//!        ▼
//!   EventFilter::classify ──► discarded (other path / other kind)
//!        │
//!        ▼
//!   ChangeNotification ──► Notifier ──► every connection
//! ```

use std::fmt;
use std::time::Instant;

use camino::{Utf8Path, Utf8PathBuf};

/// Why a notification was emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// Synthetic notification emitted once when the change source starts.
    Initial,
    /// The file contents were written in place.
    Written,
    /// The file was created, or renamed into place by an atomic save.
    Created,
}

impl ChangeKind {
    /// Returns a short lowercase label for logging.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Written => "written",
            Self::Created => "created",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A "file changed" trigger for the watched path.
///
/// # Examples
///
/// ```
/// use peek_watcher::{ChangeKind, ChangeNotification};
/// use camino::Utf8PathBuf;
///
/// let n = ChangeNotification::new(Utf8PathBuf::from("/tmp/a.svg"), ChangeKind::Written);
/// assert_eq!(n.path().as_str(), "/tmp/a.svg");
/// assert!(!n.is_initial());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeNotification {
    /// The path of the file that changed. Always the watched path.
    path: Utf8PathBuf,

    /// What triggered the notification.
    kind: ChangeKind,

    /// When the event left the watcher. Push latency is measured from here.
    timestamp: Instant,
}

impl ChangeNotification {
    /// Creates a notification stamped with the current instant.
    #[inline]
    #[must_use]
    pub fn new(path: Utf8PathBuf, kind: ChangeKind) -> Self {
        Self {
            path,
            kind,
            timestamp: Instant::now(),
        }
    }

    /// Creates the synthetic startup notification.
    #[inline]
    #[must_use]
    pub fn initial(path: Utf8PathBuf) -> Self {
        Self::new(path, ChangeKind::Initial)
    }

    /// Returns the changed path.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Returns what triggered the notification.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> ChangeKind {
        self.kind
    }

    /// Returns when the notification was created.
    #[inline]
    #[must_use]
    pub const fn timestamp(&self) -> Instant {
        self.timestamp
    }

    /// Returns `true` for the synthetic startup notification.
    #[inline]
    #[must_use]
    pub fn is_initial(&self) -> bool {
        self.kind == ChangeKind::Initial
    }
}
