//! Utilities for driving `wireline` connections in tests.
//!
//! [`memory_upgrade`] produces an in-memory upgrade whose socket is driven by
//! a [`PeerClient`] standing in for the remote browser, so tests exercise the
//! real endpoint, receive loop and send queue without any network I/O.
//!
//! ```rust
//! use wireline::{ConnectionHooks, ConnectionId, Endpoint, RequestMeta, RouteArguments};
//! use wireline_testing::memory_upgrade;
//!
//! # async fn example() {
//! let endpoint = Endpoint::new(|_id: ConnectionId| {
//!     ConnectionHooks::new().on_text(|conn, text| {
//!         let _ = conn.send_text(text);
//!     })
//! });
//! let (upgrade, mut peer) = memory_upgrade();
//! endpoint
//!     .accept(upgrade, RequestMeta::new("/echo"), RouteArguments::empty())
//!     .await
//!     .unwrap();
//! peer.send_text("hi");
//! assert_eq!(peer.recv_text().await.as_deref(), Some("hi"));
//! # }
//! ```

pub mod journal;
pub mod logging;
pub mod macros;
pub mod memory;

pub use journal::Journal;
pub use logging::{LoggerHandle, logger};
pub use memory::{
    MemoryReader,
    MemorySocket,
    MemoryUpgrade,
    MemoryWriter,
    Outbound,
    PeerClient,
    PeerEvent,
    memory_upgrade,
};

/// Result type used by integration tests.
pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error + Send + Sync>>;
