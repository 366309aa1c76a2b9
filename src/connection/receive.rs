//! Receive loop and fragment reassembly.

use bytes::Bytes;

use super::{Connection, close::Ending};
use crate::{
    error::ConnectionError,
    hooks::ConnectionHooks,
    message::{CloseFrame, Message, MessageKind},
    metrics::{self, Direction},
    transport::{Fragment, SocketReader},
};

/// Outcome of reading one logical message.
#[derive(Debug, PartialEq, Eq)]
pub(super) enum Inbound {
    Message(Message),
    /// A complete message with no payload; never dispatched.
    Empty,
    Close(CloseFrame),
}

/// Read and dispatch messages until the peer closes, an error occurs or the
/// connection is cancelled.
///
/// Dispatch is sequential: the next read starts only after both message
/// callbacks returned.
pub(super) async fn receive_loop<R: SocketReader>(
    conn: &Connection,
    reader: &mut R,
    hooks: &mut ConnectionHooks,
) -> Ending {
    let max = conn.max_message_size();
    let mut buf = vec![0_u8; max];
    let cancel = conn.shared.cancel.clone();
    loop {
        let inbound = tokio::select! {
            biased;

            () = cancel.cancelled() => return Ending::Cancelled,
            res = read_message(reader, &mut buf) => res,
        };
        match inbound {
            Ok(Inbound::Message(message)) => {
                metrics::inc_messages(Direction::Inbound);
                hooks.fire_message(conn, message).await;
            }
            Ok(Inbound::Empty) => {}
            Ok(Inbound::Close(frame)) => return Ending::Remote(frame),
            Err(e) => return Ending::Failed(e),
        }
    }
}

/// Reassemble fragments into `buf` until end of message.
///
/// The message kind is taken from the first fragment. When `buf` fills up
/// before the message ends, a single-byte lookahead read distinguishes a message of
/// exactly `buf.len()` bytes from an oversized one.
pub(super) async fn read_message<R: SocketReader>(
    reader: &mut R,
    buf: &mut [u8],
) -> Result<Inbound, ConnectionError> {
    let max = buf.len();
    let mut filled = 0;
    let mut kind = None;
    loop {
        let fragment = if filled < max {
            reader.read_fragment(&mut buf[filled..]).await?
        } else {
            let mut lookahead = [0_u8; 1];
            let fragment = reader.read_fragment(&mut lookahead).await?;
            if let Fragment::Data { len, .. } = fragment
                && len > 0
            {
                return Err(ConnectionError::MessageTooLarge {
                    size: filled + len,
                    max,
                });
            }
            fragment
        };
        match fragment {
            Fragment::Close(frame) => return Ok(Inbound::Close(frame)),
            Fragment::Data {
                len,
                kind: fragment_kind,
                end_of_message,
            } => {
                if len > max - filled {
                    return Err(ConnectionError::MessageTooLarge {
                        size: filled + len,
                        max,
                    });
                }
                filled += len;
                let kind = *kind.get_or_insert(fragment_kind);
                if end_of_message {
                    return decode(kind, &buf[..filled]);
                }
            }
        }
    }
}

fn decode(kind: MessageKind, payload: &[u8]) -> Result<Inbound, ConnectionError> {
    if payload.is_empty() {
        return Ok(Inbound::Empty);
    }
    let message = match kind {
        MessageKind::Text => Message::Text(
            std::str::from_utf8(payload)
                .map_err(|_| ConnectionError::InvalidUtf8)?
                .to_owned(),
        ),
        MessageKind::Binary => Message::Binary(Bytes::copy_from_slice(payload)),
    };
    Ok(Inbound::Message(message))
}
