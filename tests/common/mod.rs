//! Shared utilities for integration tests.
//!
//! Provides a helper that upgrades an in-memory peer against an endpoint and
//! hooks that record every callback into a [`Journal`].

// Items in this shared module may not be used by all test binaries that import it.
#![allow(
    dead_code,
    reason = "shared test utilities are not used by all test binaries"
)]

use wireline::{
    Connection,
    ConnectionHooks,
    Endpoint,
    Message,
    RequestMeta,
    Resolver,
    RouteArguments,
};
use wireline_testing::{Journal, PeerClient, TestResult, memory_upgrade};

/// Upgrade a fresh in-memory peer against `endpoint` at `path`.
pub async fn connect<R: Resolver>(
    endpoint: &Endpoint<R>,
    path: &str,
) -> TestResult<(Connection, PeerClient)> {
    let (upgrade, peer) = memory_upgrade();
    let conn = endpoint
        .accept(upgrade, RequestMeta::new(path), RouteArguments::empty())
        .await?;
    Ok((conn, peer))
}

/// Hooks recording each callback as a short entry:
/// `open`, `text:<payload>`, `binary:<len>`, `error:<message>` and
/// `close:<code>:<reason>`.
pub fn journaling_hooks(journal: &Journal) -> ConnectionHooks {
    let open = journal.clone();
    let text = journal.clone();
    let binary = journal.clone();
    let error = journal.clone();
    let close = journal.clone();
    ConnectionHooks::new()
        .on_open(move |_| open.push("open"))
        .on_text(move |_, t| text.push(format!("text:{t}")))
        .on_binary(move |_, b| binary.push(format!("binary:{}", b.len())))
        .on_error(move |_, e| error.push(format!("error:{e}")))
        .on_close(move |_, f| close.push(format!("close:{}:{}", f.status, f.reason)))
}

/// Render a message the way [`journaling_hooks`] records it.
pub fn describe(message: &Message) -> String {
    match message {
        Message::Text(t) => format!("text:{t}"),
        Message::Binary(b) => format!("binary:{}", b.len()),
    }
}
