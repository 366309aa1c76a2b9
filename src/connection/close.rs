//! Close handshake and teardown.

use std::{io, panic::AssertUnwindSafe};

use futures::FutureExt;
use log::{info, warn};
use tokio::time::timeout;

use super::{Connection, ConnectionShared, ConnectionState, Writer, report_panic};
use crate::{
    error::{ConnectionError, Result},
    hooks::ConnectionHooks,
    message::{CloseFrame, CloseStatus},
    metrics,
};

/// Why the receive loop stopped.
#[derive(Debug)]
pub(super) enum Ending {
    /// The peer sent a close frame or the stream ended.
    Remote(CloseFrame),
    /// The cancellation scope fired: a local close or endpoint shutdown.
    Cancelled,
    /// A receive error or handler panic.
    Failed(ConnectionError),
}

impl ConnectionShared {
    /// Write `frame` ahead of queued sends and wait for the transport to
    /// finish the handshake, bounded by the drain timeout.
    pub(super) async fn handshake(&self, frame: CloseFrame) -> Result<()> {
        let handle = self.queue.bypass(move |writer: &mut Writer| {
            async move { writer.close(&frame).await }.boxed()
        });
        match timeout(self.config.drain_wait(), handle).await {
            Ok(result) => result.map_err(ConnectionError::from),
            Err(_) => Err(ConnectionError::Transport(io::Error::new(
                io::ErrorKind::TimedOut,
                "close handshake timed out",
            ))),
        }
    }
}

/// Take the connection from wherever the receive loop stopped to `Closed`.
///
/// Exactly one close handshake is attempted per connection: the echo of a
/// remote close, the frame of a local [`Connection::close`], a going-away
/// frame on shutdown, or an error status. Afterwards queued sends are drained,
/// the connection leaves the registry and the close callbacks run.
pub(super) async fn teardown(conn: &Connection, hooks: &mut ConnectionHooks, ending: Ending) {
    let shared = &conn.shared;
    let outgoing = match ending {
        Ending::Remote(frame) => Some((frame.clone(), frame)),
        // A local close already performed its own handshake.
        Ending::Cancelled if shared.state.load() != ConnectionState::Open => None,
        Ending::Cancelled => {
            let frame = CloseFrame::new(CloseStatus::GOING_AWAY, "endpoint shutting down");
            Some((frame.clone(), frame))
        }
        Ending::Failed(err) => {
            // After a local close the error belongs to a connection that is
            // already going away; only the close callbacks report it.
            if shared.state.load() == ConnectionState::Open {
                warn!("connection error: id={}, error={err}", conn.id());
                metrics::inc_errors();
                if let Err(panic) =
                    std::panic::catch_unwind(AssertUnwindSafe(|| hooks.fire_error(conn, &err)))
                {
                    report_panic(conn.id(), panic.as_ref());
                }
            }
            let sent = CloseFrame::new(err.close_status(), err.to_string());
            let reported = if err.is_transport() {
                CloseFrame::new(CloseStatus::ABNORMAL, err.to_string())
            } else {
                sent.clone()
            };
            Some((sent, reported))
        }
    };

    if let Some((sent, reported)) = outgoing
        && shared.state.begin_closing()
    {
        let _ = shared.close_frame.set(reported);
        if let Err(e) = shared.handshake(sent).await {
            tracing::debug!(id = %conn.id(), error = %e, "close handshake failed");
        }
    }
    shared.cancel.cancel();

    if timeout(shared.config.drain_wait(), shared.queue.drain())
        .await
        .is_err()
    {
        warn!(
            "send queue drain timed out: id={}, pending={}",
            conn.id(),
            shared.queue.size()
        );
    }
    shared.state.finish();
    shared.registry.remove(&conn.id());

    let frame = conn.close_frame().unwrap_or_else(CloseFrame::empty);
    info!(
        "connection closed: id={}, status={}, reason={}",
        conn.id(),
        frame.status,
        frame.reason
    );
    if let Err(panic) = AssertUnwindSafe(hooks.fire_close(conn, &frame))
        .catch_unwind()
        .await
    {
        report_panic(conn.id(), panic.as_ref());
    }
}
