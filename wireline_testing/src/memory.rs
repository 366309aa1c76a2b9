//! In-memory socket and upgrade for exercising connections without I/O.
//!
//! The server half ([`MemorySocket`]) implements the `wireline` transport
//! traits. The client half ([`PeerClient`]) plays the remote peer: it injects
//! fragments, close frames and read failures, and observes everything the
//! server writes.

use std::{
    collections::VecDeque,
    io,
    sync::{Arc, Mutex, PoisonError},
};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::sync::{mpsc, watch};
use wireline::{
    CloseFrame,
    CloseStatus,
    Fragment,
    Message,
    MessageKind,
    Rejection,
    Socket,
    SocketReader,
    SocketWriter,
    Upgrade,
};

/// What the peer sends towards the server.
#[derive(Debug)]
enum Inbound {
    Data(Bytes, MessageKind, bool),
    Close(CloseFrame),
    Fail(io::ErrorKind),
}

/// A single write observed by the peer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outbound {
    /// One message fragment.
    Fragment {
        /// Fragment payload.
        payload: Bytes,
        /// Message kind.
        kind: MessageKind,
        /// Whether the fragment completes its message.
        end_of_message: bool,
    },
    /// The server's close frame.
    Close(CloseFrame),
}

/// A reassembled event observed by the peer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PeerEvent {
    /// A complete message.
    Message(Message),
    /// The server closed the connection.
    Close(CloseFrame),
}

#[derive(Default)]
struct UpgradeState {
    accepted: bool,
    rejection: Option<Rejection>,
}

/// Server half of the in-memory socket.
pub struct MemorySocket {
    reader: MemoryReader,
    writer: MemoryWriter,
}

/// Receiving half of [`MemorySocket`].
pub struct MemoryReader {
    rx: mpsc::UnboundedReceiver<Inbound>,
    pending: VecDeque<Inbound>,
}

/// Sending half of [`MemorySocket`].
pub struct MemoryWriter {
    tx: mpsc::UnboundedSender<Outbound>,
    paused: watch::Receiver<bool>,
    failing: watch::Receiver<bool>,
    closed: bool,
}

/// Pending upgrade backed by a [`MemorySocket`].
pub struct MemoryUpgrade {
    socket: MemorySocket,
    state: Arc<Mutex<UpgradeState>>,
}

/// Client half of the in-memory socket.
pub struct PeerClient {
    tx: Option<mpsc::UnboundedSender<Inbound>>,
    rx: mpsc::UnboundedReceiver<Outbound>,
    pause: watch::Sender<bool>,
    fail: watch::Sender<bool>,
    state: Arc<Mutex<UpgradeState>>,
}

/// Create a pending upgrade and the peer that drives it.
#[must_use]
pub fn memory_upgrade() -> (MemoryUpgrade, PeerClient) {
    let (in_tx, in_rx) = mpsc::unbounded_channel();
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let (pause, paused) = watch::channel(false);
    let (fail, failing) = watch::channel(false);
    let state = Arc::new(Mutex::new(UpgradeState::default()));
    let socket = MemorySocket {
        reader: MemoryReader {
            rx: in_rx,
            pending: VecDeque::new(),
        },
        writer: MemoryWriter {
            tx: out_tx,
            paused,
            failing,
            closed: false,
        },
    };
    let upgrade = MemoryUpgrade {
        socket,
        state: Arc::clone(&state),
    };
    let peer = PeerClient {
        tx: Some(in_tx),
        rx: out_rx,
        pause,
        fail,
        state,
    };
    (upgrade, peer)
}

impl Socket for MemorySocket {
    type Reader = MemoryReader;
    type Writer = MemoryWriter;

    fn split(self) -> (Self::Reader, Self::Writer) { (self.reader, self.writer) }
}

#[async_trait]
impl SocketReader for MemoryReader {
    async fn read_fragment(&mut self, buf: &mut [u8]) -> io::Result<Fragment> {
        let next = match self.pending.pop_front() {
            Some(item) => Some(item),
            None => self.rx.recv().await,
        };
        match next {
            None => Ok(Fragment::Close(CloseFrame::empty())),
            Some(Inbound::Close(frame)) => Ok(Fragment::Close(frame)),
            Some(Inbound::Fail(kind)) => Err(io::Error::new(kind, "injected read failure")),
            Some(Inbound::Data(mut payload, kind, end)) => {
                let len = payload.len().min(buf.len());
                buf[..len].copy_from_slice(&payload.split_to(len));
                let finished = end && payload.is_empty();
                if !payload.is_empty() {
                    self.pending.push_front(Inbound::Data(payload, kind, end));
                }
                Ok(Fragment::Data {
                    len,
                    kind,
                    end_of_message: finished,
                })
            }
        }
    }
}

impl MemoryWriter {
    async fn ready(&mut self) -> io::Result<()> {
        if self.closed {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "socket closed"));
        }
        if self.paused.wait_for(|paused| !*paused).await.is_err() {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer gone"));
        }
        if *self.failing.borrow() {
            return Err(io::Error::new(io::ErrorKind::ConnectionReset, "injected write failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl SocketWriter for MemoryWriter {
    async fn write_fragment(
        &mut self,
        payload: &[u8],
        kind: MessageKind,
        end_of_message: bool,
    ) -> io::Result<()> {
        self.ready().await?;
        self.tx
            .send(Outbound::Fragment {
                payload: Bytes::copy_from_slice(payload),
                kind,
                end_of_message,
            })
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "peer gone"))
    }

    async fn close(&mut self, frame: &CloseFrame) -> io::Result<()> {
        self.ready().await?;
        self.closed = true;
        self.tx
            .send(Outbound::Close(frame.clone()))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "peer gone"))
    }
}

#[async_trait]
impl Upgrade for MemoryUpgrade {
    type Socket = MemorySocket;

    async fn accept(self) -> io::Result<MemorySocket> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .accepted = true;
        Ok(self.socket)
    }

    async fn reject(self, reason: Rejection) -> io::Result<()> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .rejection = Some(reason);
        Ok(())
    }
}

impl PeerClient {
    fn push(&self, item: Inbound) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(item);
        }
    }

    /// Send a complete text message.
    pub fn send_text(&self, text: &str) {
        self.send_fragment(text.as_bytes(), MessageKind::Text, true);
    }

    /// Send a complete binary message.
    pub fn send_binary(&self, data: &[u8]) {
        self.send_fragment(data, MessageKind::Binary, true);
    }

    /// Send one fragment of a message.
    pub fn send_fragment(&self, payload: &[u8], kind: MessageKind, end_of_message: bool) {
        self.push(Inbound::Data(
            Bytes::copy_from_slice(payload),
            kind,
            end_of_message,
        ));
    }

    /// Send a close frame.
    pub fn close(&self, status: CloseStatus, reason: &str) {
        self.push(Inbound::Close(CloseFrame::new(status, reason)));
    }

    /// Make the server's next read fail with `kind`.
    pub fn fail_read(&self, kind: io::ErrorKind) { self.push(Inbound::Fail(kind)); }

    /// End the stream without a close frame.
    pub fn disconnect(&mut self) { self.tx = None; }

    /// Hold every server write until [`resume_writes`](Self::resume_writes).
    pub fn pause_writes(&self) { self.pause.send_replace(true); }

    /// Release writes held by [`pause_writes`](Self::pause_writes).
    pub fn resume_writes(&self) { self.pause.send_replace(false); }

    /// Make every subsequent server write fail.
    pub fn fail_writes(&self) { self.fail.send_replace(true); }

    /// Returns `true` once the upgrade was accepted.
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .accepted
    }

    /// Reason the upgrade was refused, if it was.
    #[must_use]
    pub fn rejection(&self) -> Option<Rejection> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .rejection
    }

    /// Next raw write from the server, or `None` once the server dropped its
    /// writer.
    pub async fn next_write(&mut self) -> Option<Outbound> { self.rx.recv().await }

    /// Next reassembled message or close frame.
    pub async fn next_event(&mut self) -> Option<PeerEvent> {
        let mut buf = BytesMut::new();
        let mut kind = None;
        loop {
            match self.rx.recv().await? {
                Outbound::Close(frame) => return Some(PeerEvent::Close(frame)),
                Outbound::Fragment {
                    payload,
                    kind: fragment_kind,
                    end_of_message,
                } => {
                    buf.extend_from_slice(&payload);
                    let kind = *kind.get_or_insert(fragment_kind);
                    if end_of_message {
                        let data = buf.freeze();
                        let message = match kind {
                            MessageKind::Text => {
                                Message::Text(String::from_utf8_lossy(&data).into_owned())
                            }
                            MessageKind::Binary => Message::Binary(data),
                        };
                        return Some(PeerEvent::Message(message));
                    }
                }
            }
        }
    }

    /// Next text message; `None` if the server closed or sent binary.
    pub async fn recv_text(&mut self) -> Option<String> {
        match self.next_event().await? {
            PeerEvent::Message(Message::Text(text)) => Some(text),
            _ => None,
        }
    }

    /// Skip messages until the server's close frame arrives.
    pub async fn recv_close(&mut self) -> Option<CloseFrame> {
        loop {
            if let PeerEvent::Close(frame) = self.next_event().await? {
                return Some(frame);
            }
        }
    }

    /// Collect messages already written, without waiting.
    pub fn drain_messages(&mut self) -> Vec<Message> {
        let mut messages = Vec::new();
        let mut partial: Option<(MessageKind, BytesMut)> = None;
        while let Ok(write) = self.rx.try_recv() {
            if let Outbound::Fragment {
                payload,
                kind,
                end_of_message,
            } = write
            {
                let (kind, buf) = partial.get_or_insert_with(|| (kind, BytesMut::new()));
                buf.extend_from_slice(&payload);
                if end_of_message {
                    let data = std::mem::take(buf).freeze();
                    messages.push(match kind {
                        MessageKind::Text => {
                            Message::Text(String::from_utf8_lossy(&data).into_owned())
                        }
                        MessageKind::Binary => Message::Binary(data),
                    });
                    partial = None;
                }
            }
        }
        messages
    }
}
