//! WebSocket live-view server.
//!
//! Serves one watched file to any number of viewers: every connection gets the
//! full file contents right after the handshake and again after every change
//! the [`Notifier`](peek_watcher::Notifier) reports.
//!
//! # Architecture
//!
//! ```text
//! GET /ws ──► router::ws_handler ──► connection::serve (one task per viewer)
//!                                        │
//!                        ┌───────────────┴───────────────┐
//!                        ▼                               ▼
//!              delivery::run                    connection::drain_inbound
//!              (read file, send message)        (discard inbound frames)
//! ```
//!
//! A connection ends on session timeout, server shutdown, peer close, or the
//! first failed read or write. Failures never affect other connections.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use peek_core::{Config, WatchedPath};
//! use peek_server::{AppState, start};
//! use peek_watcher::Notifier;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let watched = Arc::new(WatchedPath::resolve("drawing.svg")?);
//! let notifier = Notifier::new(config.watch.broadcast_capacity);
//! let shutdown = CancellationToken::new();
//!
//! let state = AppState::new(watched, notifier, config.server.session_timeout(), shutdown);
//! let handle = start(&config.server, state).await?;
//! println!("listening on {}", handle.local_addr());
//! handle.wait().await?;
//! # Ok(())
//! # }
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod connection;
pub mod delivery;
pub mod error;
pub mod router;
pub mod server;
pub mod state;

pub use connection::{ConnectionContext, EndReason};
pub use delivery::DeliveryState;
pub use error::{DeliveryError, ServerError};
pub use router::build_router;
pub use server::{ServerHandle, start};
pub use state::{AppState, ConnectionId};
