//! Completion handle for a single queued operation.

use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use tokio::sync::oneshot;

use super::SendError;

enum State {
    Pending(oneshot::Receiver<Result<(), SendError>>),
    Ready(Option<Result<(), SendError>>),
}

/// Resolves once the associated operation has finished on the transport.
///
/// The operation is already queued when the handle is returned; dropping the
/// handle does not cancel it.
pub struct SendHandle {
    state: State,
}

impl SendHandle {
    pub(crate) fn pending(rx: oneshot::Receiver<Result<(), SendError>>) -> Self {
        Self {
            state: State::Pending(rx),
        }
    }

    /// A handle that resolves immediately with `result`.
    #[must_use]
    pub fn ready(result: Result<(), SendError>) -> Self {
        Self {
            state: State::Ready(Some(result)),
        }
    }

    /// A handle that resolves immediately with success.
    #[must_use]
    pub fn completed() -> Self { Self::ready(Ok(())) }

    /// Returns `true` if the handle resolves without waiting.
    #[must_use]
    pub fn is_immediate(&self) -> bool { matches!(self.state, State::Ready(_)) }
}

impl Future for SendHandle {
    type Output = Result<(), SendError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().state {
            State::Pending(rx) => Pin::new(rx)
                .poll(cx)
                .map(|res| res.unwrap_or(Err(SendError::Abandoned))),
            State::Ready(result) => Poll::Ready(result.take().unwrap_or(Ok(()))),
        }
    }
}

impl std::fmt::Debug for SendHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SendHandle")
            .field("immediate", &self.is_immediate())
            .finish()
    }
}
