#![doc(html_root_url = "https://docs.rs/wireline/latest")]
//! Public API for the `wireline` library.
//!
//! `wireline` drives server-side WebSocket connections on top of a socket
//! supplied by a host adapter: the receive loop with fragment reassembly and
//! size limits, the close handshake, application lifecycle callbacks and an
//! ordered, bounded send queue per connection.

pub mod config;
pub mod connection;
#[cfg(not(loom))]
pub mod endpoint;
pub mod error;
/// Result type alias re-exported for convenience in connection callbacks.
pub use error::Result;
pub mod hooks;
pub mod message;
pub mod metrics;
pub mod panic;
pub mod queue;
pub mod request;
pub mod resolver;
pub mod session;
pub mod transport;

pub use config::{ConfigError, ConnectionConfig};
pub use connection::{Connection, ConnectionState, active_connection_count};
#[cfg(not(loom))]
pub use endpoint::Endpoint;
pub use error::{AcceptError, ConnectionError};
pub use hooks::{ConnectionHooks, Handler};
pub use message::{CloseFrame, CloseStatus, Message, MessageKind};
pub use metrics::{CONNECTIONS_ACTIVE, Direction, ERRORS_TOTAL, MESSAGES_TOTAL};
pub use queue::{OrderedSendQueue, SendError, SendHandle};
pub use request::{RequestMeta, RouteArguments};
pub use resolver::Resolver;
pub use session::{ConnectionId, SessionRegistry};
pub use transport::{Fragment, Rejection, Socket, SocketReader, SocketWriter, Upgrade};
