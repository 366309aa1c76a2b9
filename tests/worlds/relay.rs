//! Test world for the relay scenarios.
//!
//! Provides [`RelayWorld`], which drives an endpoint whose handler admits odd
//! connection ids and relays text to every other open connection.

use std::{fmt, sync::Arc};

use cucumber::World;
use wireline::{
    AcceptError,
    CloseFrame,
    CloseStatus,
    Connection,
    ConnectionHooks,
    ConnectionId,
    Endpoint,
    Handler,
    RequestMeta,
    Resolver,
    RouteArguments,
    SessionRegistry,
};
use wireline_testing::{Journal, PeerClient, PeerEvent, memory_upgrade};

pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

struct Relay {
    id: ConnectionId,
    journal: Journal,
    registry: Arc<SessionRegistry>,
}

impl Handler for Relay {
    fn authenticate(&self, _request: &RequestMeta) -> bool {
        let admitted = self.id.as_u64() % 2 == 1;
        self.journal.push(format!("Auth {}: {admitted}", self.id));
        admitted
    }

    fn on_open(&self, conn: &Connection) { self.journal.push(format!("Open: {}", conn.id())); }

    fn on_text(&self, conn: &Connection, text: &str) {
        let line = format!("User {}: {text}", conn.id());
        let _ = self.registry.broadcast_text(&line, Some(conn.id()));
    }

    fn on_close(&self, conn: &Connection, _frame: &CloseFrame) {
        self.journal.push(format!("Close: {}", conn.id()));
    }
}

struct RelayResolver {
    journal: Journal,
    registry: Arc<SessionRegistry>,
}

impl Resolver for RelayResolver {
    fn resolve(&self, id: ConnectionId) -> ConnectionHooks {
        ConnectionHooks::from_handler(&Arc::new(Relay {
            id,
            journal: self.journal.clone(),
            registry: Arc::clone(&self.registry),
        }))
    }
}

#[derive(Default, World)]
pub struct RelayWorld {
    journal: Journal,
    endpoint: Option<Endpoint<RelayResolver>>,
    outcomes: Vec<Result<Connection, AcceptError>>,
    peers: Vec<PeerClient>,
}

impl fmt::Debug for RelayWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayWorld")
            .field("journal", &self.journal.entries())
            .field("outcomes", &self.outcomes)
            .finish_non_exhaustive()
    }
}

impl RelayWorld {
    fn endpoint(&self) -> TestResult<&Endpoint<RelayResolver>> {
        self.endpoint
            .as_ref()
            .ok_or_else(|| "endpoint not started".into())
    }

    fn peer(&mut self, id: u64) -> TestResult<&mut PeerClient> {
        let index = usize::try_from(id)?
            .checked_sub(1)
            .ok_or("connection ids start at 1")?;
        self.peers
            .get_mut(index)
            .ok_or_else(|| format!("no client {id}").into())
    }

    /// Start an endpoint with a fresh registry.
    pub fn start(&mut self) {
        let registry = Arc::new(SessionRegistry::new());
        let resolver = RelayResolver {
            journal: self.journal.clone(),
            registry: Arc::clone(&registry),
        };
        self.endpoint = Some(Endpoint::new(resolver).with_registry(registry));
    }

    /// Upgrade `count` clients in sequence.
    pub async fn connect(&mut self, count: usize) -> TestResult {
        for _ in 0..count {
            let (upgrade, peer) = memory_upgrade();
            let outcome = self
                .endpoint()?
                .accept(upgrade, RequestMeta::new("/relay"), RouteArguments::empty())
                .await;
            self.outcomes.push(outcome);
            self.peers.push(peer);
        }
        Ok(())
    }

    /// Check which upgrades were admitted.
    pub fn verify_admitted(&self, admitted: &[u64], refused: &[u64]) -> TestResult {
        for (index, outcome) in self.outcomes.iter().enumerate() {
            let id = u64::try_from(index)? + 1;
            match outcome {
                Ok(conn) if admitted.contains(&id) => assert_eq!(conn.id().as_u64(), id),
                Err(AcceptError::Unauthorized) if refused.contains(&id) => {}
                other => return Err(format!("client {id}: unexpected outcome {other:?}").into()),
            }
        }
        let expected: Vec<_> = admitted.iter().copied().map(ConnectionId::new).collect();
        assert_eq!(self.endpoint()?.registry().active_ids(), expected);
        Ok(())
    }

    /// Send text from client `id`.
    pub fn send(&mut self, id: u64, text: &str) -> TestResult {
        self.peer(id)?.send_text(text);
        Ok(())
    }

    /// Wait for client `id` to receive `expected`.
    pub async fn expect_text(&mut self, id: u64, expected: &str) -> TestResult {
        let received = self.peer(id)?.recv_text().await.ok_or("connection ended")?;
        assert_eq!(received, expected);
        Ok(())
    }

    /// Close clients in the given order, waiting for each teardown.
    pub async fn close_in_order(&mut self, ids: &[u64]) -> TestResult {
        for &id in ids {
            self.peer(id)?.close(CloseStatus::NORMAL, "");
            self.journal.wait_for(&format!("Close: {id}")).await;
        }
        Ok(())
    }

    /// Check close notifications arrived in `ids` order.
    pub fn verify_close_order(&self, ids: &[u64]) {
        let closes: Vec<_> = self
            .journal
            .entries()
            .into_iter()
            .filter(|e| e.starts_with("Close"))
            .collect();
        let expected: Vec<_> = ids.iter().map(|id| format!("Close: {id}")).collect();
        assert_eq!(closes, expected);
    }

    /// Check client `id` saw only the close frame.
    pub async fn verify_nothing_relayed(&mut self, id: u64) -> TestResult {
        let event = self.peer(id)?.next_event().await;
        assert!(
            matches!(event, Some(PeerEvent::Close(_))),
            "unexpected event {event:?}"
        );
        Ok(())
    }

    /// Shut the endpoint down.
    pub async fn shutdown(&mut self) -> TestResult {
        self.endpoint()?.shutdown().await;
        Ok(())
    }

    /// Check the close status seen by each of `ids`.
    pub async fn verify_close_status(&mut self, ids: &[u64], status: u16) -> TestResult {
        for &id in ids {
            let frame = self.peer(id)?.recv_close().await.ok_or("no close frame")?;
            assert_eq!(frame.status.code(), status);
        }
        Ok(())
    }
}
