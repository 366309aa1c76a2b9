//! Per-connection handler resolution.
//!
//! An [`Endpoint`](crate::endpoint::Endpoint) asks its resolver for a fresh
//! set of [`ConnectionHooks`] for every upgrade, before authentication runs.
//! There is no global registry: the resolver is passed to the endpoint
//! explicitly.

use std::sync::Arc;

use crate::{
    hooks::{ConnectionHooks, Handler},
    session::ConnectionId,
};

/// Produces the hooks for a new connection.
///
/// Resolution is synchronous and completes before the connection starts.
pub trait Resolver: Send + Sync + 'static {
    /// Build hooks for the connection that will be assigned `id`.
    fn resolve(&self, id: ConnectionId) -> ConnectionHooks;
}

impl<F> Resolver for F
where
    F: Fn(ConnectionId) -> ConnectionHooks + Send + Sync + 'static,
{
    fn resolve(&self, id: ConnectionId) -> ConnectionHooks { self(id) }
}

/// Share one handler instance across every connection.
///
/// ```
/// use std::sync::Arc;
///
/// use wireline::{Handler, resolver::{self, Resolver}, session::ConnectionId};
///
/// struct Noop;
/// impl Handler for Noop {}
///
/// let resolver = resolver::shared(Arc::new(Noop));
/// let _hooks = resolver.resolve(ConnectionId::new(1));
/// ```
pub fn shared<H>(handler: Arc<H>) -> impl Resolver
where
    H: Handler + ?Sized,
{
    move |_id: ConnectionId| ConnectionHooks::from_handler(&handler)
}

/// Construct a new handler for each connection.
pub fn per_connection<H, F>(factory: F) -> impl Resolver
where
    H: Handler,
    F: Fn(ConnectionId) -> H + Send + Sync + 'static,
{
    move |id: ConnectionId| ConnectionHooks::from_handler(&Arc::new(factory(id)))
}
