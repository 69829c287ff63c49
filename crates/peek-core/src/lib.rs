//! Core types, configuration, and errors for peek.
//!
//! This crate provides the foundational types used across the workspace:
//!
//! - [`WatchedPath`] - the single file peek watches, resolved once at startup
//! - Configuration structures ([`Config`], [`WatchConfig`], [`ServerConfig`])
//! - [`ConfigError`] for startup validation failures
//!
//! # Crate Dependencies
//!
//! ```text
//! peek-cli ──► peek-server ──► peek-watcher ──► peek-core
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod path;

pub use config::{Config, ServerConfig, WatchConfig};
pub use error::ConfigError;
pub use path::WatchedPath;
