//! Error types for the peek-server crate.
//!
//! - [`ServerError`]: listener and serve-loop failures. Fatal.
//! - [`DeliveryError`]: a single connection could not push the file. Ends
//!   that connection only.

use std::io;
use std::net::SocketAddr;

use camino::Utf8PathBuf;

/// Errors from binding or running the HTTP server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The listener could not bind its address.
    #[error("failed to listen on {addr}: {source}")]
    Bind {
        /// The address that was requested.
        addr: SocketAddr,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// An I/O error from the listener after binding.
    #[error("server I/O error: {0}")]
    Io(#[from] io::Error),

    /// The serve task panicked or was aborted.
    #[error("server task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Errors that end one viewer connection.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The watched file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// The watched file.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The message could not be written to the transport.
    #[error("failed to write message: {0}")]
    Write(String),
}

impl DeliveryError {
    /// Returns `true` when the failure came from the local file rather than the peer.
    #[inline]
    #[must_use]
    pub const fn is_read(&self) -> bool {
        matches!(self, Self::Read { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_error_display() {
        let err = ServerError::Bind {
            addr: "127.0.0.1:8080".parse().expect("addr"),
            source: io::Error::new(io::ErrorKind::AddrInUse, "address in use"),
        };
        let msg = err.to_string();
        assert!(msg.contains("127.0.0.1:8080"));
        assert!(msg.contains("address in use"));
    }

    #[test]
    fn test_read_error_display() {
        let err = DeliveryError::Read {
            path: Utf8PathBuf::from("/tmp/a.svg"),
            source: io::Error::new(io::ErrorKind::NotFound, "not found"),
        };
        assert!(err.is_read());
        assert!(err.to_string().contains("/tmp/a.svg"));
    }

    #[test]
    fn test_write_error_display() {
        let err = DeliveryError::Write("connection reset".to_owned());
        assert!(!err.is_read());
        assert_eq!(err.to_string(), "failed to write message: connection reset");
    }
}
