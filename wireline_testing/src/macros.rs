//! Assertion macros shared by integration tests.

/// Await a [`SendHandle`](wireline::SendHandle) and yield its value.
///
/// A failed send panics with the call site and the [`SendError`]
/// (`wireline::SendError`) that ended it.
#[macro_export]
macro_rules! send_expect {
    ($handle:expr) => {{
        match $handle.await {
            Ok(sent) => sent,
            Err(err) => panic!("send failed at {}:{}: {err}", file!(), line!()),
        }
    }};
}

/// Await a [`PeerClient`](crate::PeerClient) receive and yield what arrived.
///
/// Panics with the call site when the connection ended first.
#[macro_export]
macro_rules! recv_expect {
    ($recv:expr) => {{
        match $recv.await {
            Some(received) => received,
            None => panic!(
                "connection ended before the peer received anything at {}:{}",
                file!(),
                line!()
            ),
        }
    }};
}

pub use crate::{recv_expect, send_expect};
