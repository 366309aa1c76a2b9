//! Upgrade acceptance and connection task management.
//!
//! An [`Endpoint`] turns pending upgrades into running connections: it
//! allocates an id, resolves hooks, runs the authentication gate, accepts the
//! socket and spawns the connection task. All tasks are tracked so
//! [`Endpoint::shutdown`] can close every connection and wait for them.

use std::{
    panic::AssertUnwindSafe,
    sync::{
        Arc,
        OnceLock,
        atomic::{AtomicU64, Ordering},
    },
};

use futures::FutureExt;
use log::{error, warn};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::{
    config::ConnectionConfig,
    connection::{AtomicState, Connection, ConnectionShared, ConnectionState, Writer},
    error::AcceptError,
    hooks::ConnectionHooks,
    metrics,
    panic::describe_panic,
    queue::OrderedSendQueue,
    request::{RequestMeta, RouteArguments},
    resolver::Resolver,
    session::{ConnectionId, SessionRegistry},
    transport::{Rejection, Socket, SocketReader, Upgrade},
};

/// Accepts upgrades for one route and owns the resulting connection tasks.
pub struct Endpoint<R> {
    resolver: R,
    config: ConnectionConfig,
    registry: Arc<SessionRegistry>,
    next_id: AtomicU64,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl<R: Resolver> Endpoint<R> {
    /// Create an endpoint resolving hooks with `resolver`.
    #[must_use]
    pub fn new(resolver: R) -> Self {
        Self {
            resolver,
            config: ConnectionConfig::default(),
            registry: Arc::new(SessionRegistry::new()),
            next_id: AtomicU64::new(1),
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    /// Apply `config` to connections accepted from now on.
    #[must_use]
    pub fn with_config(mut self, config: ConnectionConfig) -> Self {
        self.config = config;
        self
    }

    /// Register connections in `registry` instead of a private one.
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<SessionRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Registry of this endpoint's live connections.
    #[must_use]
    pub fn registry(&self) -> &Arc<SessionRegistry> { &self.registry }

    /// Configuration applied to new connections.
    #[must_use]
    pub fn config(&self) -> &ConnectionConfig { &self.config }

    /// Token cancelled when the endpoint shuts down.
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken { self.shutdown.clone() }

    /// Authenticate and accept `upgrade`, then start its connection task.
    ///
    /// Ids are allocated sequentially from 1, including for refused
    /// upgrades. The returned connection is already `Open`; its open
    /// callbacks run on the spawned task.
    ///
    /// # Errors
    ///
    /// Returns [`AcceptError::Unauthorized`] after refusing the upgrade when
    /// authentication fails, [`AcceptError::ShuttingDown`] once
    /// [`shutdown`](Self::shutdown) began, [`AcceptError::Config`] for an
    /// invalid configuration and [`AcceptError::Upgrade`] when the host
    /// adapter fails.
    pub async fn accept<U: Upgrade>(
        &self,
        upgrade: U,
        request: RequestMeta,
        arguments: RouteArguments,
    ) -> Result<Connection, AcceptError> {
        self.config.validate()?;
        if self.shutdown.is_cancelled() {
            upgrade.reject(Rejection::Unavailable).await?;
            return Err(AcceptError::ShuttingDown);
        }

        let id = ConnectionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut hooks = self.resolver.resolve(id);
        if !hooks.authorize(&request).await {
            warn!("upgrade rejected: id={id}, path={}", request.path());
            metrics::inc_upgrades_rejected();
            upgrade.reject(Rejection::Unauthorized).await?;
            return Err(AcceptError::Unauthorized);
        }

        let (reader, writer) = upgrade.accept().await?.split();
        let (queue, worker) =
            OrderedSendQueue::new(Box::new(writer) as Writer, self.config.send_queue_limit());
        let shared = Arc::new(ConnectionShared {
            id,
            request,
            arguments,
            config: self.config.clone(),
            state: AtomicState::new(),
            queue,
            cancel: self.shutdown.child_token(),
            close_frame: OnceLock::new(),
            registry: Arc::clone(&self.registry),
        });
        shared.state.transition(ConnectionState::Created, ConnectionState::Open);
        let conn = Connection::from_shared(shared);
        self.registry.insert(&conn);

        let finished = CancellationToken::new();
        self.tracker.spawn(worker.run_until(finished.clone()));
        spawn_connection_task(&self.tracker, conn.clone(), reader, hooks, finished);
        Ok(conn)
    }

    /// Close every connection with a going-away status and wait for their
    /// tasks to finish. New upgrades are refused from now on.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}

/// Spawn the task driving `conn`, logging and discarding any panics that
/// escape the connection's own handling.
fn spawn_connection_task<Rd: SocketReader>(
    tracker: &TaskTracker,
    conn: Connection,
    reader: Rd,
    hooks: ConnectionHooks,
    finished: CancellationToken,
) {
    let id = conn.id();
    tracker.spawn(async move {
        let fut = AssertUnwindSafe(conn.run(reader, hooks)).catch_unwind();
        if let Err(panic) = fut.await {
            metrics::inc_connection_panics();
            let panic_msg = describe_panic(panic.as_ref());
            // Emit via both `log` and `tracing` for tests that capture either.
            error!("connection task panicked: id={id}, panic={panic_msg}");
            tracing::error!(%id, panic = %panic_msg, "connection task panicked");
        }
        finished.cancel();
    });
}
