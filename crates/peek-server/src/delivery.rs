//! The per-connection delivery loop.
//!
//! One push is one full read of the watched file sent as one message. The loop
//! never compares contents with what was sent before, so a change that leaves
//! the file identical still produces a message.
//!
//! ```text
//! Waiting ──notification──► ReadingFile ──► WritingMessage ──► Waiting
//!    │                          │                 │
//!    └── ctx done ──────────────┴── failure ──────┴──────────► Closed
//! ```

use std::fmt;
use std::time::Instant;

use axum::extract::ws::Message;
use camino::Utf8Path;
use futures_util::{Sink, SinkExt};
use peek_watcher::Subscription;
use tracing::{debug, trace};

use crate::connection::{ConnectionContext, EndReason};
use crate::error::DeliveryError;

/// Where a delivery loop currently is. Only used for tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    /// Blocked on the next notification.
    Waiting,
    /// Reading the watched file.
    ReadingFile,
    /// Sending the file contents.
    WritingMessage,
    /// Finished.
    Closed,
}

impl DeliveryState {
    /// Returns a short label for logs.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::ReadingFile => "reading-file",
            Self::WritingMessage => "writing-message",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for DeliveryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Wraps file contents in a frame: text when valid UTF-8, binary otherwise.
#[must_use]
pub fn encode(bytes: Vec<u8>) -> Message {
    match String::from_utf8(bytes) {
        Ok(text) => Message::Text(text.into()),
        Err(err) => Message::Binary(err.into_bytes().into()),
    }
}

/// Milliseconds since `since`, saturating.
fn latency_ms(since: Instant) -> u64 {
    u64::try_from(since.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Runs the delivery loop until the context ends or a push fails.
///
/// Pushes the file once immediately, then once per notification. Never
/// returns [`EndReason::Shutdown`] or [`EndReason::ClientClosed`]; the caller
/// refines [`EndReason::Cancelled`] into those.
pub async fn run<S>(
    sink: &mut S,
    subscription: &mut Subscription,
    path: &Utf8Path,
    ctx: &ConnectionContext,
) -> EndReason
where
    S: Sink<Message> + Unpin,
    S::Error: fmt::Display,
{
    let id = ctx.id();

    let initial = tokio::select! {
        biased;
        reason = ctx.done() => Err(reason),
        pushed = deliver(sink, path, ctx) => pushed.map_err(EndReason::Failed),
    };
    if let Err(reason) = initial {
        trace!(conn = %id, state = %DeliveryState::Closed, "Delivery finished before first push");
        return reason;
    }

    let reason = loop {
        trace!(conn = %id, state = %DeliveryState::Waiting);
        tokio::select! {
            biased;
            reason = ctx.done() => break reason,
            change = subscription.next() => {
                let Some(change) = change else {
                    break EndReason::ChannelClosed;
                };
                let pushed = tokio::select! {
                    biased;
                    reason = ctx.done() => Err(reason),
                    pushed = deliver(sink, path, ctx) => pushed.map_err(EndReason::Failed),
                };
                if let Err(reason) = pushed {
                    break reason;
                }
                debug!(
                    conn = %id,
                    kind = %change.kind(),
                    latency_ms = latency_ms(change.timestamp()),
                    "Pushed change"
                );
            }
        }
    };

    trace!(conn = %id, state = %DeliveryState::Closed, reason = %reason);
    reason
}

/// Reads `path` and sends its full contents as one message.
async fn deliver<S>(sink: &mut S, path: &Utf8Path, ctx: &ConnectionContext) -> Result<(), DeliveryError>
where
    S: Sink<Message> + Unpin,
    S::Error: fmt::Display,
{
    trace!(conn = %ctx.id(), state = %DeliveryState::ReadingFile);
    let bytes = tokio::fs::read(path).await.map_err(|source| DeliveryError::Read {
        path: path.to_owned(),
        source,
    })?;

    let len = bytes.len();
    trace!(conn = %ctx.id(), state = %DeliveryState::WritingMessage, len);
    let message = encode(bytes);
    if matches!(message, Message::Binary(_)) {
        debug!(conn = %ctx.id(), path = %path, len, "Contents are not UTF-8, sending binary frame");
    }
    sink.send(message)
        .await
        .map_err(|err| DeliveryError::Write(err.to_string()))
}
