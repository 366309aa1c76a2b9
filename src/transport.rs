//! Contracts between the engine and the host-provided socket.
//!
//! The engine never frames bytes itself. A host adapter performs the HTTP
//! upgrade and hands over a [`Socket`] that already speaks the WebSocket wire
//! protocol; the engine only sees fragments, message kinds and close frames.

use std::io;

use async_trait::async_trait;

use crate::message::{CloseFrame, MessageKind};

/// Result of a single read from the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Fragment {
    /// `len` bytes were written to the start of the supplied buffer.
    Data {
        /// Number of bytes read.
        len: usize,
        /// Kind of the message this fragment belongs to.
        kind: MessageKind,
        /// Whether this fragment completes the message.
        end_of_message: bool,
    },
    /// The peer sent a close frame, or the stream ended cleanly.
    Close(CloseFrame),
}

/// Receiving half of a socket, driven only by the receive loop.
#[async_trait]
pub trait SocketReader: Send + 'static {
    /// Read the next fragment into `buf`.
    ///
    /// When the pending fragment is longer than `buf`, only `buf.len()`
    /// bytes are consumed and the remainder is returned by subsequent calls
    /// with `end_of_message` unset. A stream that ends without a close frame
    /// is reported as [`Fragment::Close`] with [`CloseFrame::empty`].
    ///
    /// Implementations must be cancellation-safe: the engine drops a pending
    /// read when the connection is torn down.
    async fn read_fragment(&mut self, buf: &mut [u8]) -> io::Result<Fragment>;
}

/// Sending half of a socket, owned by the connection's send queue.
#[async_trait]
pub trait SocketWriter: Send + 'static {
    /// Write one fragment of a message.
    async fn write_fragment(
        &mut self,
        payload: &[u8],
        kind: MessageKind,
        end_of_message: bool,
    ) -> io::Result<()>;

    /// Perform the close handshake, resolving once the peer acknowledged it
    /// or the transport gave up.
    async fn close(&mut self, frame: &CloseFrame) -> io::Result<()>;
}

/// An upgraded, full-duplex WebSocket.
pub trait Socket: Send + 'static {
    /// Receiving half.
    type Reader: SocketReader;
    /// Sending half.
    type Writer: SocketWriter;

    /// Split the socket so reads and writes can proceed independently.
    fn split(self) -> (Self::Reader, Self::Writer);
}

/// Why the engine refused an upgrade.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rejection {
    /// An authentication predicate returned `false`.
    Unauthorized,
    /// The endpoint is shutting down.
    Unavailable,
}

/// A pending upgrade supplied by the host adapter.
///
/// Exactly one of [`accept`](Self::accept) or [`reject`](Self::reject) is
/// called for every upgrade.
#[async_trait]
pub trait Upgrade: Send + 'static {
    /// Socket produced by a successful upgrade.
    type Socket: Socket;

    /// Complete the upgrade and return the socket.
    async fn accept(self) -> io::Result<Self::Socket>;

    /// Refuse the upgrade at the transport level.
    async fn reject(self, reason: Rejection) -> io::Result<()>;
}
