//! Per-connection engine.
//!
//! A [`Connection`] is a cheap, cloneable handle to one upgraded socket. The
//! receive loop runs on a dedicated task owned by the endpoint; outbound
//! traffic from any task goes through the connection's
//! [`OrderedSendQueue`], whose worker exclusively owns the socket writer.

use std::{
    io,
    panic::AssertUnwindSafe,
    sync::{Arc, OnceLock, Weak},
};

use bytes::Bytes;
use futures::{FutureExt, future::BoxFuture};
use log::{error, info};
use tokio_util::sync::CancellationToken;

use crate::{
    config::ConnectionConfig,
    error::{ConnectionError, Result},
    hooks::ConnectionHooks,
    message::{CloseFrame, CloseStatus, MessageKind},
    metrics::{self, Direction},
    panic::describe_panic,
    queue::{OrderedSendQueue, SendError, SendHandle},
    request::{RequestMeta, RouteArguments},
    session::{ConnectionId, SessionRegistry},
    transport::{SocketReader, SocketWriter},
};

mod close;
mod counter;
mod receive;
mod state;

use close::Ending;
pub use counter::active_connection_count;
use counter::ActiveConnection;
pub(crate) use state::AtomicState;
pub use state::ConnectionState;

/// Socket writer as owned by the send worker.
pub(crate) type Writer = Box<dyn SocketWriter>;

fn write_fragment(
    writer: &mut Writer,
    (payload, kind, end_of_message): (Bytes, MessageKind, bool),
) -> BoxFuture<'_, io::Result<()>> {
    async move { writer.write_fragment(&payload, kind, end_of_message).await }.boxed()
}

/// State shared by every handle to one connection.
pub(crate) struct ConnectionShared {
    pub(crate) id: ConnectionId,
    pub(crate) request: RequestMeta,
    pub(crate) arguments: RouteArguments,
    pub(crate) config: ConnectionConfig,
    pub(crate) state: AtomicState,
    pub(crate) queue: OrderedSendQueue<Writer>,
    pub(crate) cancel: CancellationToken,
    pub(crate) close_frame: OnceLock<CloseFrame>,
    pub(crate) registry: Arc<SessionRegistry>,
}

/// Handle to one open (or formerly open) connection.
///
/// Clones refer to the same connection. Handles stay valid after the
/// connection closed; sends then resolve to [`SendError::Closed`].
#[derive(Clone)]
pub struct Connection {
    shared: Arc<ConnectionShared>,
}

impl Connection {
    pub(crate) fn from_shared(shared: Arc<ConnectionShared>) -> Self { Self { shared } }

    pub(crate) fn downgrade(&self) -> Weak<ConnectionShared> { Arc::downgrade(&self.shared) }

    /// Identifier assigned by the endpoint.
    #[must_use]
    pub fn id(&self) -> ConnectionId { self.shared.id }

    /// Current lifecycle stage.
    #[must_use]
    pub fn state(&self) -> ConnectionState { self.shared.state.load() }

    /// Returns `true` while the connection is `Open` and accepts sends.
    #[must_use]
    pub fn is_available(&self) -> bool { self.state() == ConnectionState::Open }

    /// Metadata of the upgrade request.
    #[must_use]
    pub fn request(&self) -> &RequestMeta { &self.shared.request }

    /// Arguments captured by the routing layer.
    #[must_use]
    pub fn arguments(&self) -> &RouteArguments { &self.shared.arguments }

    /// Largest message the receive loop will deliver.
    #[must_use]
    pub fn max_message_size(&self) -> usize { self.shared.config.message_size_limit() }

    /// Number of sends accepted but not yet completed.
    #[must_use]
    pub fn send_queue_depth(&self) -> usize { self.shared.queue.size() }

    /// Close status sent or received, once the connection started closing.
    #[must_use]
    pub fn close_frame(&self) -> Option<CloseFrame> { self.shared.close_frame.get().cloned() }

    /// Queue one fragment of a message.
    ///
    /// Fragments of one message must be sent with the same `kind`; the last
    /// one sets `end_of_message`. The handle resolves when the write finished
    /// and fails with [`SendError::Closed`] when the connection is not open or
    /// [`SendError::Backlog`] when the send queue is full.
    pub fn send(
        &self,
        payload: impl Into<Bytes>,
        kind: MessageKind,
        end_of_message: bool,
    ) -> SendHandle {
        if !self.is_available() {
            return SendHandle::ready(Err(SendError::Closed));
        }
        let payload = payload.into();
        let queue = &self.shared.queue;
        match queue.enqueue(write_fragment, (payload, kind, end_of_message)) {
            Some(handle) => {
                if end_of_message {
                    metrics::inc_messages(Direction::Outbound);
                }
                handle
            }
            None => SendHandle::ready(Err(SendError::Backlog {
                limit: queue.max_depth().unwrap_or_default(),
            })),
        }
    }

    /// Queue a complete text message.
    pub fn send_text(&self, text: impl Into<String>) -> SendHandle {
        self.send(Bytes::from(text.into()), MessageKind::Text, true)
    }

    /// Queue a complete binary message.
    pub fn send_binary(&self, data: impl Into<Bytes>) -> SendHandle {
        self.send(data, MessageKind::Binary, true)
    }

    /// Start the close handshake from this side.
    ///
    /// The close frame is written ahead of any queued sends and the call
    /// waits for the transport to acknowledge it, bounded by the configured
    /// drain timeout. The receive loop then stops and `on_close` reports
    /// `status` and `reason`. Closing an already closing connection is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Transport`] when the close frame could not
    /// be delivered. The connection is torn down regardless.
    pub async fn close(&self, status: CloseStatus, reason: impl Into<String>) -> Result<()> {
        if !self.shared.state.begin_closing() {
            return Ok(());
        }
        let frame = CloseFrame::new(status, reason);
        let _ = self.shared.close_frame.set(frame.clone());
        let result = self.shared.handshake(frame).await;
        self.shared.cancel.cancel();
        result
    }

    /// Ping frames are handled by the transport.
    ///
    /// # Errors
    ///
    /// Always returns [`ConnectionError::Unsupported`].
    pub fn send_ping(&self, _payload: &[u8]) -> Result<()> {
        Err(ConnectionError::Unsupported("ping"))
    }

    /// Pong frames are handled by the transport.
    ///
    /// # Errors
    ///
    /// Always returns [`ConnectionError::Unsupported`].
    pub fn send_pong(&self, _payload: &[u8]) -> Result<()> {
        Err(ConnectionError::Unsupported("pong"))
    }

    /// Drive the connection from `Open` to `Closed`.
    ///
    /// Runs the open callbacks, the receive loop and teardown. A panic in a
    /// callback ends the connection with [`ConnectionError::HandlerPanicked`]
    /// instead of unwinding into the caller.
    pub(crate) async fn run<R: SocketReader>(self, mut reader: R, mut hooks: ConnectionHooks) {
        let _active = ActiveConnection::enter(self.id());
        info!(
            "connection opened: id={}, path={}, peer_addr={:?}",
            self.id(),
            self.request().path(),
            self.request().peer_addr()
        );
        let session = AssertUnwindSafe(async {
            hooks.fire_open(&self).await;
            receive::receive_loop(&self, &mut reader, &mut hooks).await
        })
        .catch_unwind()
        .await;
        let ending = match session {
            Ok(ending) => ending,
            Err(panic) => Ending::Failed(ConnectionError::HandlerPanicked(
                report_panic(self.id(), panic.as_ref()),
            )),
        };
        drop(reader);
        close::teardown(&self, &mut hooks, ending).await;
    }
}

/// Log and count a panic caught from a connection callback.
pub(super) fn report_panic(id: ConnectionId, panic: &(dyn std::any::Any + Send)) -> String {
    metrics::inc_connection_panics();
    let panic_msg = describe_panic(panic);
    error!("connection handler panicked: id={id}, panic={panic_msg}");
    tracing::error!(id = %id, panic = %panic_msg, "connection handler panicked");
    panic_msg
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id())
            .field("state", &self.state())
            .field("path", &self.request().path())
            .finish_non_exhaustive()
    }
}

impl From<SendError> for ConnectionError {
    fn from(err: SendError) -> Self {
        match err {
            SendError::Write(e) => Self::Transport(e),
            SendError::Panicked(msg) => {
                Self::Transport(io::Error::other(format!("socket writer panicked: {msg}")))
            }
            SendError::Backlog { .. } | SendError::Closed | SendError::Abandoned => Self::NotOpen,
        }
    }
}
