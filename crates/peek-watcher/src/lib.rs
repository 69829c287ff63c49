//! Single-file change source with broadcast fan-out.
//!
//! This crate detects changes of one file via the `notify` crate and fans a
//! "file changed" trigger out to any number of async subscribers.
//!
//! # Overview
//!
//! - [`FileWatcher`] subscribes to the watched file's *parent directory*
//!   (editors often replace files instead of writing in place) and filters
//!   events down to write/create events on the exact watched path.
//! - [`ChangeSource`] publishes one synthetic initial notification, then
//!   forwards every filtered event.
//! - [`Notifier`] / [`Subscription`] form the broadcast channel. Every
//!   subscriber observes every notification independently.
//!
//! # Architecture
//!
//! ```text
//! notify thread ──► FileWatcher (mpsc, bounded) ──► ChangeSource task
//!                                                        │ publish
//!                                                        ▼
//!                                           Notifier (broadcast)
//!                                          ┌──────┼──────┐
//!                                          ▼      ▼      ▼
//!                                   Subscription per connection
//! ```
//!
//! # Crate Dependencies
//!
//! ```text
//! peek-cli ──► peek-server ──► peek-watcher ──► peek-core
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use peek_core::{WatchConfig, WatchedPath};
//! use peek_watcher::{ChangeNotification, ChangeSource, FileWatcher, Notifier};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = WatchConfig::default();
//! let watched = WatchedPath::resolve("drawing.svg")?;
//!
//! let notifier = Notifier::new(config.broadcast_capacity);
//! let mut viewer = notifier.subscribe();
//!
//! let watcher = FileWatcher::new(&watched, &config)?;
//! let initial = ChangeNotification::initial(watched.file().to_owned());
//! let cancel = CancellationToken::new();
//! ChangeSource::new(watcher, notifier, initial).spawn(cancel.clone());
//!
//! while let Some(change) = viewer.next().await {
//!     println!("re-read {} ({})", change.path(), change.kind());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! Failing to establish the OS subscription is returned from
//! [`FileWatcher::new`] and is fatal to the caller. Errors the OS watcher
//! reports afterwards are logged and watching continues
//! ([`WatchError::is_recoverable`]).

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod error;
pub mod events;
pub mod filter;
pub mod notifier;
pub mod source;
pub mod watcher;

// Re-export error types
pub use error::WatchError;

// Re-export event types
pub use events::{ChangeKind, ChangeNotification};

// Re-export filter types
pub use filter::{EventFilter, WatchedFileFilter, classify_kind};

// Re-export channel types
pub use notifier::{Notifier, Subscription};

// Re-export source and watcher types
pub use source::ChangeSource;
pub use watcher::FileWatcher;
