//! The watched file path.
//!
//! peek watches exactly one file for its whole lifetime. [`WatchedPath`] is
//! resolved once at startup and then shared read-only with the change source
//! and every connection.
//!
//! The parent directory is canonicalized (symlinks resolved) because the OS
//! watcher reports event paths relative to the directory it was handed; the
//! file itself is not required to exist yet.

use std::fmt;
use std::io;
use std::path::Path;

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::ConfigError;

/// An absolute file path plus the directory that must be watched to observe it.
///
/// # Examples
///
/// ```
/// use peek_core::WatchedPath;
///
/// let dir = tempfile::tempdir().unwrap();
/// let file = dir.path().join("drawing.svg");
///
/// let watched = WatchedPath::resolve(&file).unwrap();
/// assert_eq!(watched.file_name(), "drawing.svg");
/// assert!(watched.file().is_absolute());
/// assert_eq!(watched.file().parent(), Some(watched.dir()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WatchedPath {
    /// Absolute path of the watched file.
    file: Utf8PathBuf,

    /// Canonical parent directory of `file`.
    dir: Utf8PathBuf,
}

impl WatchedPath {
    /// Resolves a user-supplied path into a [`WatchedPath`].
    ///
    /// Relative paths are resolved against the current working directory.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::NonUtf8Path`] if the path is not valid UTF-8
    /// - [`ConfigError::InvalidPath`] if the path has no file name or names a directory
    /// - [`ConfigError::MissingDirectory`] if the parent directory does not exist
    pub fn resolve(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let path = Utf8Path::from_path(path)
            .ok_or_else(|| ConfigError::NonUtf8Path(path.to_path_buf()))?;

        let absolute = if path.is_absolute() {
            path.to_owned()
        } else {
            let cwd = std::env::current_dir()?;
            Utf8PathBuf::from_path_buf(cwd)
                .map_err(ConfigError::NonUtf8Path)?
                .join(path)
        };

        let Some(file_name) = absolute.file_name().map(str::to_owned) else {
            return Err(ConfigError::InvalidPath {
                path: absolute,
                reason: "path has no file name".to_owned(),
            });
        };

        let parent = absolute.parent().unwrap_or(Utf8Path::new("/"));
        let dir = match parent.canonicalize_utf8() {
            Ok(dir) => dir,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(ConfigError::MissingDirectory(parent.to_owned()));
            }
            Err(err) => return Err(ConfigError::Io(err)),
        };

        if !dir.is_dir() {
            return Err(ConfigError::InvalidPath {
                path: absolute,
                reason: format!("{dir} is not a directory"),
            });
        }

        let file = dir.join(file_name);
        if file.is_dir() {
            return Err(ConfigError::InvalidPath {
                path: file,
                reason: "path is a directory, expected a file".to_owned(),
            });
        }

        Ok(Self { file, dir })
    }

    /// Returns the absolute path of the watched file.
    #[inline]
    #[must_use]
    pub fn file(&self) -> &Utf8Path {
        &self.file
    }

    /// Returns the directory the OS watcher subscribes to.
    #[inline]
    #[must_use]
    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    /// Returns the file name component.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.file.file_name().unwrap_or_default()
    }
}

impl fmt::Display for WatchedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.file, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_dir() -> TempDir {
        TempDir::new().expect("Failed to create temp directory")
    }

    #[test]
    fn test_resolve_existing_file() {
        let dir = temp_dir();
        let file = dir.path().join("a.svg");
        std::fs::write(&file, "<svg/>").expect("write");

        let watched = WatchedPath::resolve(&file).expect("resolve");
        let canonical = file.canonicalize().expect("canonicalize");
        assert_eq!(watched.file().as_std_path(), canonical);
        assert_eq!(watched.file_name(), "a.svg");
    }

    #[test]
    fn test_resolve_missing_file_is_allowed() {
        let dir = temp_dir();
        let watched = WatchedPath::resolve(dir.path().join("not-yet.svg")).expect("resolve");
        assert_eq!(watched.file_name(), "not-yet.svg");
        assert!(!watched.file().exists());
    }

    #[test]
    fn test_resolve_normalizes_dot_components() {
        let dir = temp_dir();
        let watched =
            WatchedPath::resolve(dir.path().join(".").join("b.svg")).expect("resolve");
        let expected = dir.path().canonicalize().expect("canonicalize").join("b.svg");
        assert_eq!(watched.file().as_std_path(), expected);
    }

    #[test]
    fn test_resolve_missing_directory() {
        let err = WatchedPath::resolve("/nonexistent/peek/dir/a.svg").unwrap_err();
        match err {
            ConfigError::MissingDirectory(dir) => {
                assert_eq!(dir.as_str(), "/nonexistent/peek/dir");
            }
            other => panic!("Expected MissingDirectory, got {other:?}"),
        }
    }

    #[test]
    fn test_resolve_rejects_directory() {
        let dir = temp_dir();
        std::fs::create_dir(dir.path().join("sub")).expect("mkdir");
        let err = WatchedPath::resolve(dir.path().join("sub")).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPath { .. }));
    }

    #[test]
    fn test_resolve_rejects_root() {
        let err = WatchedPath::resolve("/").unwrap_err();
        assert!(err.to_string().contains("no file name"));
    }

    #[test]
    fn test_display_is_file_path() {
        let dir = temp_dir();
        let watched = WatchedPath::resolve(dir.path().join("c.svg")).expect("resolve");
        assert_eq!(watched.to_string(), watched.file().as_str());
    }
}
