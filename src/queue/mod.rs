//! Strictly ordered, optionally bounded send queue.
//!
//! Operations run one at a time in the order they were accepted. The queue is
//! an actor: a [`SendWorker`] owns the context (for connections, the socket
//! writer) and executes jobs from two lanes. The ordered lane carries normal
//! sends and is subject to the backlog limit. The urgent lane is polled first
//! and carries control operations such as the close handshake, which must not
//! wait behind a stalled backlog but must not interleave with an in-flight
//! write either.

use std::{
    io,
    panic::AssertUnwindSafe,
    sync::{Mutex, PoisonError},
};

use futures::{FutureExt, future::BoxFuture};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::panic::describe_panic;

mod backlog;
mod errors;
mod handle;

pub use backlog::{Backlog, BacklogSlot};
pub use errors::SendError;
pub use handle::SendHandle;

type Job<C> = Box<dyn for<'a> FnOnce(&'a mut C) -> BoxFuture<'a, ()> + Send>;

fn job<C, F>(f: F) -> Job<C>
where
    F: for<'a> FnOnce(&'a mut C) -> BoxFuture<'a, ()> + Send + 'static,
{
    Box::new(f)
}

/// Producer side of the queue.
///
/// Safe to call from any task; enqueue decisions are linearised against
/// [`drain`](Self::drain) so no operation is accepted once draining began.
pub struct OrderedSendQueue<C> {
    ordered_tx: mpsc::UnboundedSender<Job<C>>,
    urgent_tx: mpsc::UnboundedSender<Job<C>>,
    backlog: Backlog,
    drained: Mutex<bool>,
}

/// Consumer side of the queue, owning the execution context.
pub struct SendWorker<C> {
    context: C,
    ordered_rx: mpsc::UnboundedReceiver<Job<C>>,
    urgent_rx: mpsc::UnboundedReceiver<Job<C>>,
}

impl<C: Send + 'static> OrderedSendQueue<C> {
    /// Create a queue and the worker that will execute its operations.
    ///
    /// Nothing runs until [`SendWorker::run`] is polled. `max_depth` of
    /// `None` leaves the queue unbounded.
    #[must_use]
    pub fn new(context: C, max_depth: Option<usize>) -> (Self, SendWorker<C>) {
        let (ordered_tx, ordered_rx) = mpsc::unbounded_channel();
        let (urgent_tx, urgent_rx) = mpsc::unbounded_channel();
        let queue = Self {
            ordered_tx,
            urgent_tx,
            backlog: Backlog::new(max_depth),
            drained: Mutex::new(false),
        };
        let worker = SendWorker {
            context,
            ordered_rx,
            urgent_rx,
        };
        (queue, worker)
    }

    /// Create a queue and spawn its worker on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    #[must_use]
    pub fn spawn(context: C, max_depth: Option<usize>) -> Self {
        let (queue, worker) = Self::new(context, max_depth);
        tokio::spawn(worker.run());
        queue
    }

    /// Accept `op` for ordered execution with `state` as its input.
    ///
    /// Returns `None` when the backlog limit has been reached; nothing is
    /// queued in that case. After [`drain`](Self::drain) the operation is
    /// discarded and an already-completed handle is returned.
    pub fn enqueue<S, F>(&self, op: F, state: S) -> Option<SendHandle>
    where
        S: Send + 'static,
        F: for<'a> FnOnce(&'a mut C, S) -> BoxFuture<'a, io::Result<()>> + Send + 'static,
    {
        let drained = self.drained.lock().unwrap_or_else(PoisonError::into_inner);
        if *drained {
            return Some(SendHandle::completed());
        }
        let Some(slot) = self.backlog.try_reserve() else {
            debug!(
                limit = ?self.backlog.limit(),
                "send rejected: backlog limit reached"
            );
            return None;
        };
        let (tx, rx) = oneshot::channel();
        let work = job(move |ctx: &mut C| {
            async move {
                let outcome = AssertUnwindSafe(async move { op(ctx, state).await })
                    .catch_unwind()
                    .await;
                drop(slot);
                let _ = tx.send(settle(outcome));
            }
            .boxed()
        });
        match self.ordered_tx.send(work) {
            Ok(()) => Some(SendHandle::pending(rx)),
            Err(_) => Some(SendHandle::ready(Err(SendError::Abandoned))),
        }
    }

    /// Run `op` ahead of every queued operation but after the one in flight.
    ///
    /// Bypass operations are not counted against the backlog and are still
    /// accepted after draining began.
    pub fn bypass<F>(&self, op: F) -> SendHandle
    where
        F: for<'a> FnOnce(&'a mut C) -> BoxFuture<'a, io::Result<()>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let work = job(move |ctx: &mut C| {
            async move {
                let outcome = AssertUnwindSafe(async move { op(ctx).await })
                    .catch_unwind()
                    .await;
                let _ = tx.send(settle(outcome));
            }
            .boxed()
        });
        match self.urgent_tx.send(work) {
            Ok(()) => SendHandle::pending(rx),
            Err(_) => SendHandle::ready(Err(SendError::Abandoned)),
        }
    }

    /// Stop accepting operations.
    ///
    /// The returned handle resolves once every operation accepted before the
    /// call has finished. Calling `drain` again is harmless.
    pub fn drain(&self) -> SendHandle {
        let mut drained = self.drained.lock().unwrap_or_else(PoisonError::into_inner);
        *drained = true;
        let (tx, rx) = oneshot::channel();
        let marker = job(move |_: &mut C| {
            async move {
                let _ = tx.send(Ok(()));
            }
            .boxed()
        });
        match self.ordered_tx.send(marker) {
            Ok(()) => SendHandle::pending(rx),
            // Worker gone means nothing is left to wait for.
            Err(_) => SendHandle::completed(),
        }
    }

    /// Number of accepted operations that have not yet finished.
    #[must_use]
    pub fn size(&self) -> usize { self.backlog.len() }

    /// Configured backlog limit.
    #[must_use]
    pub fn max_depth(&self) -> Option<usize> { self.backlog.limit() }

    /// Returns `true` once [`drain`](Self::drain) has been called.
    #[must_use]
    pub fn is_drained(&self) -> bool {
        *self.drained.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn settle(
    outcome: Result<io::Result<()>, Box<dyn std::any::Any + Send>>,
) -> Result<(), SendError> {
    match outcome {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => {
            debug!(error = %e, "queued send failed");
            Err(SendError::Write(e))
        }
        Err(payload) => {
            let message = describe_panic(payload.as_ref());
            tracing::warn!(panic = %message, "queued send panicked");
            Err(SendError::Panicked(message))
        }
    }
}

impl<C: Send + 'static> SendWorker<C> {
    /// Execute operations until every producer handle has been dropped.
    ///
    /// The urgent lane is always checked first; ordered operations run
    /// strictly one after another.
    pub async fn run(self) { self.execute(None).await }

    /// Execute operations until `stop` is cancelled or every producer handle
    /// has been dropped.
    ///
    /// After `stop` fires, an operation that does not complete on its first
    /// poll is dropped, and so is everything still queued.
    pub async fn run_until(self, stop: CancellationToken) { self.execute(Some(stop)).await }

    async fn execute(self, stop: Option<CancellationToken>) {
        let Self {
            mut context,
            mut ordered_rx,
            mut urgent_rx,
        } = self;
        let mut urgent_open = true;
        let mut ordered_open = true;
        loop {
            let work = tokio::select! {
                biased;

                res = urgent_rx.recv(), if urgent_open => match res {
                    Some(work) => work,
                    None => {
                        urgent_open = false;
                        continue;
                    }
                },
                res = ordered_rx.recv(), if ordered_open => match res {
                    Some(work) => work,
                    None => {
                        ordered_open = false;
                        continue;
                    }
                },
                () = stopped(stop.as_ref()), if stop.is_some() => break,
                else => break,
            };
            // Once stopped, an operation still in flight is abandoned rather
            // than awaited; its handle resolves to `SendError::Abandoned`.
            tokio::select! {
                biased;

                () = work(&mut context) => {}
                () = stopped(stop.as_ref()), if stop.is_some() => {
                    debug!("send worker stopped with an operation in flight");
                    break;
                }
            }
        }
        debug!("send worker stopped");
    }
}

async fn stopped(token: Option<&CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}
