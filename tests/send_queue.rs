#![cfg(not(loom))]
//! Tests for the ordered send queue, both standalone and behind a connection.

mod common;

use std::sync::{Arc, Mutex, PoisonError};

use common::connect;
use futures::FutureExt;
use proptest::prelude::*;
use tracing_test::traced_test;
use wireline::{
    ConnectionConfig,
    ConnectionHooks,
    ConnectionId,
    Endpoint,
    MessageKind,
    OrderedSendQueue,
    SendError,
};
use wireline_testing::{Outbound, TestResult, recv_expect, send_expect};

type Log = Arc<Mutex<Vec<u32>>>;

fn record(log: &mut Log, value: u32) -> futures::future::BoxFuture<'_, std::io::Result<()>> {
    async move {
        log.lock().unwrap_or_else(PoisonError::into_inner).push(value);
        Ok(())
    }
    .boxed()
}

proptest! {
    #[test]
    fn accepted_sends_run_in_order_up_to_the_limit(
        values in proptest::collection::vec(any::<u32>(), 0..64),
        limit in proptest::option::of(1_usize..16),
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime");
        let log: Log = Arc::default();
        let (queue, worker) = OrderedSendQueue::new(Arc::clone(&log), limit);

        // Nothing runs until the worker is polled, so the backlog fills.
        let accepted: Vec<u32> = values
            .iter()
            .copied()
            .filter(|&v| queue.enqueue(record, v).is_some())
            .collect();
        let expected_len = limit.map_or(values.len(), |l| values.len().min(l));
        prop_assert_eq!(accepted.len(), expected_len);
        prop_assert_eq!(&accepted[..], &values[..expected_len]);
        prop_assert_eq!(queue.size(), expected_len);

        drop(queue);
        rt.block_on(worker.run());
        let executed = log.lock().unwrap_or_else(PoisonError::into_inner).clone();
        prop_assert_eq!(executed, accepted);
    }
}

fn bounded_endpoint(depth: usize) -> Endpoint<impl wireline::Resolver> {
    Endpoint::new(|_id: ConnectionId| ConnectionHooks::new())
        .with_config(ConnectionConfig::default().max_send_queue_depth(Some(depth)))
}

#[tokio::test]
async fn full_backlog_rejects_until_writes_resume() -> TestResult {
    let endpoint = bounded_endpoint(2);
    let (conn, mut peer) = connect(&endpoint, "/").await?;
    peer.pause_writes();

    let first = conn.send_text("one");
    let second = conn.send_text("two");
    let refused = conn.send_text("three");
    assert!(refused.is_immediate());
    assert!(matches!(refused.await, Err(SendError::Backlog { limit: 2 })));
    assert_eq!(conn.send_queue_depth(), 2);

    peer.resume_writes();
    send_expect!(first);
    send_expect!(second);
    send_expect!(conn.send_text("four"));
    assert_eq!(recv_expect!(peer.recv_text()), "one");
    assert_eq!(recv_expect!(peer.recv_text()), "two");
    assert_eq!(recv_expect!(peer.recv_text()), "four");
    Ok(())
}

#[traced_test]
#[tokio::test]
async fn backlog_refusal_is_logged() -> TestResult {
    let endpoint = bounded_endpoint(1);
    let (conn, peer) = connect(&endpoint, "/").await?;
    peer.pause_writes();

    let _held = conn.send_text("held");
    let _ = conn.send_text("refused").await;
    assert!(logs_contain("send rejected: backlog limit reached"));
    Ok(())
}

#[tokio::test]
async fn write_failure_fails_the_send_but_not_the_queue() -> TestResult {
    let endpoint = bounded_endpoint(4);
    let (conn, peer) = connect(&endpoint, "/").await?;
    peer.fail_writes();

    for _ in 0..2 {
        let result = conn.send_text("lost").await;
        assert!(matches!(result, Err(SendError::Write(_))));
    }
    assert!(conn.is_available());
    assert_eq!(conn.send_queue_depth(), 0);
    Ok(())
}

#[tokio::test]
async fn fragmented_sends_reach_the_peer_in_order() -> TestResult {
    let endpoint = bounded_endpoint(8);
    let (conn, mut peer) = connect(&endpoint, "/").await?;

    let handles = [
        conn.send(&b"frag"[..], MessageKind::Binary, false),
        conn.send(&b"ment"[..], MessageKind::Binary, true),
    ];
    for handle in handles {
        send_expect!(handle);
    }

    let mut writes = Vec::new();
    for _ in 0..2 {
        writes.push(peer.next_write().await.ok_or("peer stream ended")?);
    }
    assert_eq!(
        writes,
        [
            Outbound::Fragment {
                payload: bytes::Bytes::from_static(b"frag"),
                kind: MessageKind::Binary,
                end_of_message: false,
            },
            Outbound::Fragment {
                payload: bytes::Bytes::from_static(b"ment"),
                kind: MessageKind::Binary,
                end_of_message: true,
            },
        ]
    );
    Ok(())
}

#[tokio::test]
async fn concurrent_producers_keep_per_task_order() -> TestResult {
    let endpoint = Endpoint::new(|_id: ConnectionId| ConnectionHooks::new());
    let (conn, mut peer) = connect(&endpoint, "/").await?;

    let producers: Vec<_> = (0..4)
        .map(|task| {
            let conn = conn.clone();
            tokio::spawn(async move {
                for n in 0..10 {
                    let _ = conn.send_text(format!("{task}:{n}")).await;
                }
            })
        })
        .collect();
    for producer in producers {
        producer.await?;
    }

    let mut seen = vec![Vec::new(); 4];
    for _ in 0..40 {
        let text = recv_expect!(peer.recv_text());
        let (task, n) = text.split_once(':').ok_or("malformed message")?;
        seen[task.parse::<usize>()?].push(n.parse::<u32>()?);
    }
    for per_task in seen {
        assert_eq!(per_task, (0..10).collect::<Vec<_>>());
    }
    Ok(())
}

#[tokio::test]
#[should_panic(expected = "connection is not open")]
async fn send_expect_names_the_failed_send() {
    let endpoint = Endpoint::new(|_id: ConnectionId| ConnectionHooks::new());
    let (conn, _peer) = connect(&endpoint, "/").await.expect("upgrade");
    conn.close(wireline::CloseStatus::NORMAL, "")
        .await
        .expect("close handshake");
    send_expect!(conn.send_text("late"));
}
