//! Event filtering for the change source.
//!
//! The OS watcher subscribes to the watched file's parent directory, so it
//! reports activity on every sibling too. Filtering happens on the watcher
//! thread, before anything reaches the event channel.
//!
//! # Design
//!
//! The [`EventFilter`] trait turns a raw [`notify::Event`] into an optional
//! [`ChangeNotification`]. [`WatchedFileFilter`] is the filter peek runs with:
//!
//! - the event path must equal the watched path exactly
//! - the event kind must be a write or a create ([`classify_kind`])
//!
//! # Examples
//!
//! ```
//! use peek_watcher::{EventFilter, WatchedFileFilter};
//! use notify::event::{CreateKind, EventKind};
//! use notify::Event;
//!
//! let filter = WatchedFileFilter::new("/tmp/a.svg".into());
//!
//! let ours = Event::new(EventKind::Create(CreateKind::File)).add_path("/tmp/a.svg".into());
//! assert!(filter.classify(&ours).is_some());
//!
//! let sibling = Event::new(EventKind::Create(CreateKind::File)).add_path("/tmp/b.svg".into());
//! assert!(filter.classify(&sibling).is_none());
//! ```

use camino::{Utf8Path, Utf8PathBuf};
use notify::event::{EventKind, ModifyKind, RenameMode};
use notify::Event;

use crate::events::{ChangeKind, ChangeNotification};

/// A filter deciding which raw events become change notifications.
///
/// # Thread Safety
///
/// Filters must be [`Send`] and [`Sync`] because they run inside the notify
/// callback on the watcher's own thread. They must also be `'static` to be
/// moved into that callback.
pub trait EventFilter: Send + Sync + 'static {
    /// Returns the notification to forward for `event`, or `None` to discard it.
    fn classify(&self, event: &Event) -> Option<ChangeNotification>;
}

/// Maps a raw event kind to the change kinds peek forwards.
///
/// Data writes are [`ChangeKind::Written`]. Creates, and renames whose
/// destination may be the watched file, are [`ChangeKind::Created`].
/// Removals, metadata-only changes, access events and renames away from a
/// path yield `None`.
///
/// # Examples
///
/// ```
/// use peek_watcher::{classify_kind, ChangeKind};
/// use notify::event::{DataChange, EventKind, MetadataKind, ModifyKind, RemoveKind};
///
/// assert_eq!(
///     classify_kind(&EventKind::Modify(ModifyKind::Data(DataChange::Content))),
///     Some(ChangeKind::Written),
/// );
/// assert_eq!(classify_kind(&EventKind::Modify(ModifyKind::Metadata(MetadataKind::Any))), None);
/// assert_eq!(classify_kind(&EventKind::Remove(RemoveKind::File)), None);
/// ```
#[must_use]
pub const fn classify_kind(kind: &EventKind) -> Option<ChangeKind> {
    match kind {
        EventKind::Create(_) => Some(ChangeKind::Created),
        EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any | ModifyKind::Other) => {
            Some(ChangeKind::Written)
        }
        // Backends that cannot tell rename direction report `Any`.
        EventKind::Modify(ModifyKind::Name(RenameMode::To | RenameMode::Both | RenameMode::Any)) => {
            Some(ChangeKind::Created)
        }
        _ => None,
    }
}

/// Forwards write/create events for exactly one file.
///
/// For a two-path rename (`RenameMode::Both`, paths `[from, to]`) only the
/// destination is compared, so renaming the watched file away is ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedFileFilter {
    /// The absolute path of the watched file.
    target: Utf8PathBuf,
}

impl WatchedFileFilter {
    /// Creates a filter for `target`.
    ///
    /// `target` must be spelled the way the OS watcher reports it, i.e. under
    /// the canonical parent directory (see `peek_core::WatchedPath`).
    #[must_use]
    pub const fn new(target: Utf8PathBuf) -> Self {
        Self { target }
    }

    /// Returns the path this filter forwards events for.
    #[must_use]
    pub fn target(&self) -> &Utf8Path {
        &self.target
    }

    fn concerns_target(&self, event: &Event) -> bool {
        let target = self.target.as_std_path();
        match event.kind {
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                event.paths.last().is_some_and(|p| p == target)
            }
            _ => event.paths.iter().any(|p| p == target),
        }
    }
}

impl EventFilter for WatchedFileFilter {
    fn classify(&self, event: &Event) -> Option<ChangeNotification> {
        let kind = classify_kind(&event.kind)?;
        if !self.concerns_target(event) {
            return None;
        }
        Some(ChangeNotification::new(self.target.clone(), kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{
        AccessKind, AccessMode, CreateKind, DataChange, MetadataKind, RemoveKind,
    };
    use std::path::PathBuf;

    const TARGET: &str = "/srv/art/a.svg";

    fn filter() -> WatchedFileFilter {
        WatchedFileFilter::new(Utf8PathBuf::from(TARGET))
    }

    fn event(kind: EventKind, path: &str) -> Event {
        Event::new(kind).add_path(PathBuf::from(path))
    }

    fn write() -> EventKind {
        EventKind::Modify(ModifyKind::Data(DataChange::Content))
    }

    #[test]
    fn test_forwards_write_on_target() {
        let n = filter().classify(&event(write(), TARGET)).expect("forwarded");
        assert_eq!(n.path().as_str(), TARGET);
        assert_eq!(n.kind(), ChangeKind::Written);
    }

    #[test]
    fn test_forwards_create_on_target() {
        let n = filter()
            .classify(&event(EventKind::Create(CreateKind::File), TARGET))
            .expect("forwarded");
        assert_eq!(n.kind(), ChangeKind::Created);
    }

    #[test]
    fn test_forwards_rename_into_target() {
        let to = event(EventKind::Modify(ModifyKind::Name(RenameMode::To)), TARGET);
        assert_eq!(filter().classify(&to).map(|n| n.kind()), Some(ChangeKind::Created));

        let both = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(PathBuf::from("/srv/art/.a.svg.swp"))
            .add_path(PathBuf::from(TARGET));
        assert!(filter().classify(&both).is_some());
    }

    #[test]
    fn test_ignores_rename_away_from_target() {
        let from = event(EventKind::Modify(ModifyKind::Name(RenameMode::From)), TARGET);
        assert!(filter().classify(&from).is_none());

        let both = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(PathBuf::from(TARGET))
            .add_path(PathBuf::from("/srv/art/a.svg.bak"));
        assert!(filter().classify(&both).is_none());
    }

    #[test]
    fn test_ignores_other_kinds_on_target() {
        let kinds = [
            EventKind::Remove(RemoveKind::File),
            EventKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions)),
            EventKind::Access(AccessKind::Close(AccessMode::Write)),
            EventKind::Any,
            EventKind::Other,
        ];
        for kind in kinds {
            let label = format!("{kind:?}");
            assert!(filter().classify(&event(kind, TARGET)).is_none(), "{label}");
        }
    }

    #[test]
    fn test_ignores_sibling_and_prefix_paths() {
        let f = filter();
        assert!(f.classify(&event(write(), "/srv/art/b.svg")).is_none());
        assert!(f.classify(&event(write(), "/srv/art/a.svg~")).is_none());
        assert!(f.classify(&event(write(), "/srv/art")).is_none());
        assert!(f.classify(&event(write(), "/srv/other/a.svg")).is_none());
    }

    #[test]
    fn test_one_notification_per_qualifying_event() {
        let f = filter();
        let events = vec![
            event(write(), TARGET),
            event(write(), "/srv/art/b.svg"),
            event(EventKind::Create(CreateKind::File), TARGET),
            event(EventKind::Remove(RemoveKind::File), TARGET),
            event(EventKind::Create(CreateKind::File), "/srv/art/c.svg"),
            event(write(), TARGET),
            event(EventKind::Modify(ModifyKind::Metadata(MetadataKind::Any)), TARGET),
        ];

        let forwarded: Vec<ChangeKind> = events
            .iter()
            .filter_map(|e| f.classify(e))
            .map(|n| n.kind())
            .collect();

        assert_eq!(
            forwarded,
            vec![ChangeKind::Written, ChangeKind::Created, ChangeKind::Written]
        );
    }

    #[test]
    fn test_target_accessor() {
        assert_eq!(filter().target().as_str(), TARGET);
    }
}
