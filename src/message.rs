//! Message and close-status types exchanged with the transport and handlers.
//!
//! A [`Message`] is always a complete, reassembled payload. Individual wire
//! fragments are described by [`crate::transport::Fragment`] and never reach
//! application callbacks.

use std::fmt;

use bytes::Bytes;

/// Kind tag carried by every fragment and message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// UTF-8 text payload.
    Text,
    /// Opaque binary payload.
    Binary,
}

impl MessageKind {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Binary => "binary",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// A complete logical message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Message {
    /// A decoded text message.
    Text(String),
    /// A binary message.
    Binary(Bytes),
}

impl Message {
    /// Return the kind tag for this message.
    #[must_use]
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Text(_) => MessageKind::Text,
            Self::Binary(_) => MessageKind::Binary,
        }
    }

    /// Length of the payload in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary(bytes) => bytes.len(),
        }
    }

    /// Returns `true` when the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Convert the message into raw payload bytes.
    #[must_use]
    pub fn into_bytes(self) -> Bytes {
        match self {
            Self::Text(text) => Bytes::from(text),
            Self::Binary(bytes) => bytes,
        }
    }
}

impl From<String> for Message {
    fn from(value: String) -> Self { Self::Text(value) }
}

impl From<&str> for Message {
    fn from(value: &str) -> Self { Self::Text(value.to_owned()) }
}

impl From<Bytes> for Message {
    fn from(value: Bytes) -> Self { Self::Binary(value) }
}

impl From<Vec<u8>> for Message {
    fn from(value: Vec<u8>) -> Self { Self::Binary(Bytes::from(value)) }
}

/// Status code carried by a close frame.
///
/// Codes follow the WebSocket registry. Any `u16` can be represented so
/// application-defined codes in the 4000 range pass through unchanged.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CloseStatus(u16);

impl CloseStatus {
    /// Normal closure; the purpose of the connection has been fulfilled.
    pub const NORMAL: Self = Self(1000);
    /// The endpoint is going away, for example a server shutting down.
    pub const GOING_AWAY: Self = Self(1001);
    /// The peer violated the protocol.
    pub const PROTOCOL_ERROR: Self = Self(1002);
    /// The peer sent a data type that cannot be accepted.
    pub const UNSUPPORTED_DATA: Self = Self(1003);
    /// A close frame arrived without a status code.
    pub const NO_STATUS: Self = Self(1005);
    /// The connection dropped without a close frame.
    pub const ABNORMAL: Self = Self(1006);
    /// A text message did not contain valid UTF-8.
    pub const INVALID_PAYLOAD: Self = Self(1007);
    /// A message violated the endpoint's policy.
    pub const POLICY_VIOLATION: Self = Self(1008);
    /// A message exceeded the configured size limit.
    pub const MESSAGE_TOO_BIG: Self = Self(1009);
    /// The endpoint hit an unexpected condition.
    pub const INTERNAL_ERROR: Self = Self(1011);

    /// Wrap a raw status code.
    #[must_use]
    pub const fn new(code: u16) -> Self { Self(code) }

    /// Return the numeric code.
    #[must_use]
    pub const fn code(self) -> u16 { self.0 }

    /// Returns `true` for the "no status received" marker.
    #[must_use]
    pub const fn is_empty(self) -> bool { self.0 == Self::NO_STATUS.0 }
}

impl From<u16> for CloseStatus {
    fn from(value: u16) -> Self { Self(value) }
}

impl fmt::Display for CloseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// Status and description observed or sent during the close handshake.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CloseFrame {
    /// Close status code.
    pub status: CloseStatus,
    /// Human readable reason; may be empty.
    pub reason: String,
}

impl CloseFrame {
    /// Create a close frame from a status and reason.
    #[must_use]
    pub fn new(status: CloseStatus, reason: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason.into(),
        }
    }

    /// A frame with no status and an empty description.
    #[must_use]
    pub fn empty() -> Self { Self::new(CloseStatus::NO_STATUS, String::new()) }
}
