//! Connection lifecycle.
//!
//! Every accepted WebSocket runs through [`serve`]:
//!
//! ```text
//!            ┌──────────────── ConnectionContext ────────────────┐
//!            │  child of the shutdown token + absolute deadline  │
//!            └───────┬───────────────────────────────┬───────────┘
//!                    │                               │
//!          delivery loop (this task)        drain task (spawned)
//!          writes file contents             reads and discards frames,
//!                    │                      cancels on peer close
//!                    ▼
//!          close_transport (exactly once, status from EndReason)
//! ```
//!
//! The viewer never sends application messages, but inbound frames still have
//! to be read: an unread socket stops answering pings and close handshakes.

use std::fmt;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use camino::Utf8Path;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use peek_watcher::Subscription;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::delivery;
use crate::error::DeliveryError;
use crate::state::{AppState, ConnectionId};

/// Why a connection ended.
#[derive(Debug)]
pub enum EndReason {
    /// The session timeout elapsed.
    Timeout,
    /// The context was cancelled by someone other than the peer or the server.
    Cancelled,
    /// The server is shutting down.
    Shutdown,
    /// The peer closed the connection or the transport read failed.
    ClientClosed,
    /// The notification channel closed.
    ChannelClosed,
    /// Reading the file or writing the message failed.
    Failed(DeliveryError),
}

impl EndReason {
    /// Returns the close frame to send, or `None` when the peer is already gone.
    #[must_use]
    pub fn close_frame(&self) -> Option<CloseFrame> {
        let code = match self {
            Self::Timeout | Self::Cancelled | Self::Shutdown => close_code::NORMAL,
            Self::ChannelClosed | Self::Failed(_) => close_code::ERROR,
            Self::ClientClosed => return None,
        };
        Some(CloseFrame {
            code,
            reason: "".into(),
        })
    }

    /// Returns `true` for endings caused by an unexpected failure.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::ChannelClosed | Self::Failed(_))
    }
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => f.write_str("session timeout"),
            Self::Cancelled => f.write_str("cancelled"),
            Self::Shutdown => f.write_str("server shutdown"),
            Self::ClientClosed => f.write_str("client closed"),
            Self::ChannelClosed => f.write_str("notification channel closed"),
            Self::Failed(err) => write!(f, "{err}"),
        }
    }
}

/// Per-connection cancellable lifetime with an absolute deadline.
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    id: ConnectionId,
    token: CancellationToken,
    deadline: Instant,
}

impl ConnectionContext {
    /// Creates a context that ends when `token` is cancelled or `timeout` elapses.
    #[must_use]
    pub fn new(id: ConnectionId, token: CancellationToken, timeout: Duration) -> Self {
        Self {
            id,
            token,
            deadline: Instant::now() + timeout,
        }
    }

    /// Returns the connection id.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns the token shared with the drain task.
    #[inline]
    #[must_use]
    pub const fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Ends the context.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Resolves once the context is cancelled or its deadline passes.
    ///
    /// Returns [`EndReason::Cancelled`] or [`EndReason::Timeout`].
    pub async fn done(&self) -> EndReason {
        tokio::select! {
            () = self.token.cancelled() => EndReason::Cancelled,
            () = tokio::time::sleep_until(self.deadline) => EndReason::Timeout,
        }
    }
}

/// How the drain task finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// The peer sent a close frame, hung up, or the read failed.
    PeerClosed,
    /// The context was cancelled first.
    Cancelled,
}

/// Reads and discards inbound frames until the peer leaves or `token` fires.
///
/// Cancels `token` when the peer leaves so the delivery loop stops too.
pub async fn drain_inbound<R, E>(mut stream: R, token: CancellationToken, id: ConnectionId) -> DrainOutcome
where
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: fmt::Display,
{
    loop {
        tokio::select! {
            biased;
            () = token.cancelled() => return DrainOutcome::Cancelled,
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Close(frame))) => {
                    debug!(conn = %id, code = ?frame.map(|f| f.code), "Viewer sent close");
                    token.cancel();
                    return DrainOutcome::PeerClosed;
                }
                Some(Ok(_)) => trace!(conn = %id, "Discarding inbound frame"),
                Some(Err(error)) => {
                    debug!(conn = %id, error = %error, "Inbound read failed");
                    token.cancel();
                    return DrainOutcome::PeerClosed;
                }
                None => {
                    token.cancel();
                    return DrainOutcome::PeerClosed;
                }
            },
        }
    }
}

/// Upper bound on sending the close frame and flushing the transport.
pub const CLOSE_GRACE: Duration = Duration::from_secs(5);

/// Sends the close frame for `reason` (if any) and closes the sink.
///
/// Consumes the sink, so a transport can only be closed once. A peer that
/// stops reading gets [`CLOSE_GRACE`]; after that the sink is dropped.
pub async fn close_transport<S>(sink: S, reason: &EndReason, id: ConnectionId)
where
    S: Sink<Message> + Unpin,
    S::Error: fmt::Display,
{
    close_transport_within(sink, reason, id, CLOSE_GRACE).await;
}

async fn close_transport_within<S>(mut sink: S, reason: &EndReason, id: ConnectionId, grace: Duration)
where
    S: Sink<Message> + Unpin,
    S::Error: fmt::Display,
{
    let closing = async {
        if let Some(frame) = reason.close_frame() {
            let code = frame.code;
            if let Err(error) = sink.send(Message::Close(Some(frame))).await {
                debug!(conn = %id, code, error = %error, "Failed to send close frame");
            }
        }
        if let Err(error) = sink.close().await {
            debug!(conn = %id, error = %error, "Failed to close transport");
        }
    };

    if tokio::time::timeout(grace, closing).await.is_err() {
        debug!(conn = %id, grace = ?grace, "Peer not reading, dropping transport");
    }
}

/// Runs one connection from first push to close.
///
/// `shutdown` is the server-wide token `ctx` descends from; it is only used to
/// tell a server shutdown apart from other cancellations.
pub async fn run_connection<S, R, E>(
    mut sink: S,
    stream: R,
    mut subscription: Subscription,
    path: &Utf8Path,
    ctx: ConnectionContext,
    shutdown: &CancellationToken,
) -> EndReason
where
    S: Sink<Message> + Unpin,
    S::Error: fmt::Display,
    R: Stream<Item = Result<Message, E>> + Unpin + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    let id = ctx.id();
    let drain = tokio::spawn(drain_inbound(stream, ctx.token().clone(), id));

    let reason = delivery::run(&mut sink, &mut subscription, path, &ctx).await;
    ctx.cancel();

    let drained = match drain.await {
        Ok(outcome) => outcome,
        Err(error) => {
            warn!(conn = %id, error = %error, "Drain task failed");
            DrainOutcome::Cancelled
        }
    };

    let reason = match reason {
        EndReason::Cancelled if shutdown.is_cancelled() => EndReason::Shutdown,
        EndReason::Cancelled if drained == DrainOutcome::PeerClosed => EndReason::ClientClosed,
        other => other,
    };

    close_transport(sink, &reason, id).await;
    reason
}

/// Serves one upgraded WebSocket until it ends.
pub async fn serve(socket: WebSocket, state: AppState) {
    let id = state.next_connection_id();
    let ctx = ConnectionContext::new(id, state.shutdown.child_token(), state.session_timeout);

    // Subscribe before the initial read so no change can fall in between.
    let subscription = state.notifier.subscribe();
    let (sink, stream) = socket.split();

    info!(conn = %id, viewers = state.viewer_count(), "Viewer connected");
    let opened = Instant::now();

    let reason = run_connection(
        sink,
        stream,
        subscription,
        state.watched.file(),
        ctx,
        &state.shutdown,
    )
    .await;

    let elapsed_ms = u64::try_from(opened.elapsed().as_millis()).unwrap_or(u64::MAX);
    if reason.is_failure() {
        warn!(conn = %id, reason = %reason, elapsed_ms, "Viewer disconnected");
    } else {
        info!(conn = %id, reason = %reason, elapsed_ms, "Viewer disconnected");
    }
}
