#![cfg(not(loom))]
//! Tests for the authenticate-then-accept gate.

mod common;

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use common::journaling_hooks;
use rstest::rstest;
use wireline::{
    AcceptError,
    ConnectionHooks,
    ConnectionId,
    Endpoint,
    Rejection,
    RequestMeta,
    RouteArguments,
};
use wireline_testing::{Journal, TestResult, memory_upgrade};

#[tokio::test]
async fn refused_upgrade_never_opens() -> TestResult {
    let journal = Journal::new();
    let hooks_journal = journal.clone();
    let endpoint = Endpoint::new(move |_id: ConnectionId| {
        journaling_hooks(&hooks_journal).authenticate(|_| false)
    });
    let (upgrade, peer) = memory_upgrade();

    let result = endpoint
        .accept(upgrade, RequestMeta::new("/"), RouteArguments::empty())
        .await;

    assert!(matches!(result, Err(AcceptError::Unauthorized)));
    assert!(!peer.is_accepted());
    assert_eq!(peer.rejection(), Some(Rejection::Unauthorized));
    assert!(endpoint.registry().is_empty());
    assert!(journal.entries().is_empty());
    Ok(())
}

#[tokio::test]
async fn granted_upgrade_opens_exactly_once_before_messages() -> TestResult {
    let journal = Journal::new();
    let hooks_journal = journal.clone();
    let endpoint = Endpoint::new(move |_id: ConnectionId| {
        journaling_hooks(&hooks_journal)
            .authenticate(|_| true)
            .authenticate_async(|_| async { true })
    });
    let (upgrade, peer) = memory_upgrade();
    let conn = endpoint
        .accept(upgrade, RequestMeta::new("/"), RouteArguments::empty())
        .await?;
    assert!(conn.is_available());

    peer.send_text("first");
    peer.send_text("second");
    let entries = journal.wait_for_len(3).await;
    assert_eq!(entries, ["open", "text:first", "text:second"]);
    Ok(())
}

#[rstest]
#[case::matching_origin("https://example.test", true)]
#[case::foreign_origin("https://evil.test", false)]
#[tokio::test]
async fn predicates_see_request_metadata(
    #[case] origin: &str,
    #[case] admitted: bool,
) -> TestResult {
    let endpoint = Endpoint::new(|_id: ConnectionId| {
        ConnectionHooks::new()
            .authenticate(|request| request.origin() == Some("https://example.test"))
    });
    let (upgrade, _peer) = memory_upgrade();
    let request = RequestMeta::new("/chat").with_header("Sec-WebSocket-Origin", origin);
    let result = endpoint
        .accept(upgrade, request, RouteArguments::empty())
        .await;
    assert_eq!(result.is_ok(), admitted);
    Ok(())
}

#[tokio::test]
async fn async_refusal_rejects_even_when_sync_grants() -> TestResult {
    let endpoint = Endpoint::new(|_id: ConnectionId| {
        ConnectionHooks::new()
            .authenticate(|_| true)
            .authenticate_async(|request| async move { request.path() != "/admin" })
    });
    let (upgrade, peer) = memory_upgrade();
    let result = endpoint
        .accept(upgrade, RequestMeta::new("/admin"), RouteArguments::empty())
        .await;
    assert!(matches!(result, Err(AcceptError::Unauthorized)));
    assert_eq!(peer.rejection(), Some(Rejection::Unauthorized));
    Ok(())
}

#[tokio::test]
async fn refused_upgrades_still_consume_ids() -> TestResult {
    let resolved = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&resolved);
    let endpoint = Endpoint::new(move |id: ConnectionId| {
        counter.fetch_add(1, Ordering::SeqCst);
        ConnectionHooks::new().authenticate(move |_| id.as_u64() != 2)
    });

    let mut ids = Vec::new();
    for _ in 0..3 {
        let (upgrade, _peer) = memory_upgrade();
        if let Ok(conn) = endpoint
            .accept(upgrade, RequestMeta::new("/"), RouteArguments::empty())
            .await
        {
            ids.push(conn.id().as_u64());
        }
    }
    assert_eq!(ids, [1, 3]);
    assert_eq!(resolved.load(Ordering::SeqCst), 3);
    Ok(())
}
