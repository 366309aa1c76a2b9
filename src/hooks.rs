//! Application callbacks invoked by the connection task.
//!
//! [`ConnectionHooks`] stores optional callbacks for every lifecycle and data
//! event, while [`Handler`] is the trait-based interface applications can
//! implement instead of registering closures one by one. Every slot may be
//! absent; a missing callback is a no-op.
//!
//! Each event has a synchronous and an awaitable slot. When both are set the
//! synchronous callback runs first and the awaitable one is awaited before the
//! connection moves on.

use std::{future::Future, sync::Arc};

use async_trait::async_trait;
use bytes::Bytes;
use futures::{FutureExt, future::BoxFuture};

use crate::{
    connection::Connection,
    error::ConnectionError,
    message::{CloseFrame, Message},
    request::RequestMeta,
};

/// Trait encapsulating an application's reaction to one connection.
///
/// All methods have no-op defaults, and both authentication predicates grant
/// access by default.
///
/// ```
/// use std::sync::Arc;
///
/// use wireline::{Connection, Handler, hooks::ConnectionHooks};
///
/// struct Echo;
///
/// #[async_trait::async_trait]
/// impl Handler for Echo {
///     fn on_text(&self, conn: &Connection, text: &str) {
///         let _ = conn.send_text(text);
///     }
/// }
///
/// let hooks = ConnectionHooks::from_handler(&Arc::new(Echo));
/// # drop(hooks);
/// ```
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    /// Called once after the upgrade was accepted.
    fn on_open(&self, _conn: &Connection) {}

    /// Awaited once after [`on_open`](Self::on_open).
    async fn on_open_async(&self, _conn: &Connection) {}

    /// Called for every complete text message.
    fn on_text(&self, _conn: &Connection, _text: &str) {}

    /// Awaited for every complete text message.
    async fn on_text_async(&self, _conn: &Connection, _text: &str) {}

    /// Called for every complete binary message.
    fn on_binary(&self, _conn: &Connection, _data: &[u8]) {}

    /// Awaited for every complete binary message.
    async fn on_binary_async(&self, _conn: &Connection, _data: &[u8]) {}

    /// Called once when the connection reached `Closed`.
    fn on_close(&self, _conn: &Connection, _frame: &CloseFrame) {}

    /// Awaited once after [`on_close`](Self::on_close).
    async fn on_close_async(&self, _conn: &Connection, _frame: &CloseFrame) {}

    /// Called when a receive error ends the connection.
    fn on_error(&self, _conn: &Connection, _error: &ConnectionError) {}

    /// Decide whether the upgrade for `request` may proceed.
    fn authenticate(&self, _request: &RequestMeta) -> bool { true }

    /// Awaitable variant of [`authenticate`](Self::authenticate).
    async fn authenticate_async(&self, _request: &RequestMeta) -> bool { true }
}

type OpenHook = Box<dyn FnMut(&Connection) + Send + 'static>;
type OpenAsyncHook = Box<dyn FnMut(Connection) -> BoxFuture<'static, ()> + Send + 'static>;
type TextHook = Box<dyn FnMut(&Connection, &str) + Send + 'static>;
type TextAsyncHook = Box<dyn FnMut(Connection, String) -> BoxFuture<'static, ()> + Send + 'static>;
type BinaryHook = Box<dyn FnMut(&Connection, &[u8]) + Send + 'static>;
type BinaryAsyncHook = Box<dyn FnMut(Connection, Bytes) -> BoxFuture<'static, ()> + Send + 'static>;
type CloseHook = Box<dyn FnMut(&Connection, &CloseFrame) + Send + 'static>;
type CloseAsyncHook =
    Box<dyn FnMut(Connection, CloseFrame) -> BoxFuture<'static, ()> + Send + 'static>;
type ErrorHook = Box<dyn FnMut(&Connection, &ConnectionError) + Send + 'static>;
type AuthHook = Box<dyn FnMut(&RequestMeta) -> bool + Send + 'static>;
type AuthAsyncHook = Box<dyn FnMut(RequestMeta) -> BoxFuture<'static, bool> + Send + 'static>;

/// Callbacks for a single connection.
///
/// ```
/// use wireline::hooks::ConnectionHooks;
///
/// let hooks = ConnectionHooks::new()
///     .on_text(|conn, text| {
///         let _ = conn.send_text(format!("echo: {text}"));
///     })
///     .authenticate(|request| request.path() == "/chat");
/// # drop(hooks);
/// ```
#[derive(Default)]
pub struct ConnectionHooks {
    open: Option<OpenHook>,
    open_async: Option<OpenAsyncHook>,
    text: Option<TextHook>,
    text_async: Option<TextAsyncHook>,
    binary: Option<BinaryHook>,
    binary_async: Option<BinaryAsyncHook>,
    close: Option<CloseHook>,
    close_async: Option<CloseAsyncHook>,
    error: Option<ErrorHook>,
    auth: Option<AuthHook>,
    auth_async: Option<AuthAsyncHook>,
}

impl ConnectionHooks {
    /// Hooks with every slot empty.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Register the synchronous open callback.
    #[must_use]
    pub fn on_open<F>(mut self, f: F) -> Self
    where
        F: FnMut(&Connection) + Send + 'static,
    {
        self.open = Some(Box::new(f));
        self
    }

    /// Register the awaitable open callback.
    #[must_use]
    pub fn on_open_async<F, Fut>(mut self, mut f: F) -> Self
    where
        F: FnMut(Connection) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.open_async = Some(Box::new(move |conn| f(conn).boxed()));
        self
    }

    /// Register the synchronous text message callback.
    #[must_use]
    pub fn on_text<F>(mut self, f: F) -> Self
    where
        F: FnMut(&Connection, &str) + Send + 'static,
    {
        self.text = Some(Box::new(f));
        self
    }

    /// Register the awaitable text message callback.
    #[must_use]
    pub fn on_text_async<F, Fut>(mut self, mut f: F) -> Self
    where
        F: FnMut(Connection, String) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.text_async = Some(Box::new(move |conn, text| f(conn, text).boxed()));
        self
    }

    /// Register the synchronous binary message callback.
    #[must_use]
    pub fn on_binary<F>(mut self, f: F) -> Self
    where
        F: FnMut(&Connection, &[u8]) + Send + 'static,
    {
        self.binary = Some(Box::new(f));
        self
    }

    /// Register the awaitable binary message callback.
    #[must_use]
    pub fn on_binary_async<F, Fut>(mut self, mut f: F) -> Self
    where
        F: FnMut(Connection, Bytes) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.binary_async = Some(Box::new(move |conn, data| f(conn, data).boxed()));
        self
    }

    /// Register the synchronous close callback.
    #[must_use]
    pub fn on_close<F>(mut self, f: F) -> Self
    where
        F: FnMut(&Connection, &CloseFrame) + Send + 'static,
    {
        self.close = Some(Box::new(f));
        self
    }

    /// Register the awaitable close callback.
    #[must_use]
    pub fn on_close_async<F, Fut>(mut self, mut f: F) -> Self
    where
        F: FnMut(Connection, CloseFrame) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.close_async = Some(Box::new(move |conn, frame| f(conn, frame).boxed()));
        self
    }

    /// Register the receive error callback.
    #[must_use]
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: FnMut(&Connection, &ConnectionError) + Send + 'static,
    {
        self.error = Some(Box::new(f));
        self
    }

    /// Register the synchronous authentication predicate.
    #[must_use]
    pub fn authenticate<F>(mut self, f: F) -> Self
    where
        F: FnMut(&RequestMeta) -> bool + Send + 'static,
    {
        self.auth = Some(Box::new(f));
        self
    }

    /// Register the awaitable authentication predicate.
    #[must_use]
    pub fn authenticate_async<F, Fut>(mut self, mut f: F) -> Self
    where
        F: FnMut(RequestMeta) -> Fut + Send + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        self.auth_async = Some(Box::new(move |request| f(request).boxed()));
        self
    }

    /// Ping callbacks are not supported; control frames are answered by the
    /// transport.
    ///
    /// # Errors
    ///
    /// Always returns [`ConnectionError::Unsupported`].
    pub fn on_ping<F>(self, _f: F) -> Result<Self, ConnectionError>
    where
        F: FnMut(&Connection, &[u8]) + Send + 'static,
    {
        Err(ConnectionError::Unsupported("ping callbacks"))
    }

    /// Pong callbacks are not supported; control frames are answered by the
    /// transport.
    ///
    /// # Errors
    ///
    /// Always returns [`ConnectionError::Unsupported`].
    pub fn on_pong<F>(self, _f: F) -> Result<Self, ConnectionError>
    where
        F: FnMut(&Connection, &[u8]) + Send + 'static,
    {
        Err(ConnectionError::Unsupported("pong callbacks"))
    }

    /// Build hooks that forward every event to `handler`.
    pub fn from_handler<H>(handler: &Arc<H>) -> Self
    where
        H: Handler + ?Sized,
    {
        let h = Arc::clone(handler);
        let open = Box::new(move |conn: &Connection| h.on_open(conn)) as OpenHook;

        let h = Arc::clone(handler);
        let open_async = Box::new(move |conn: Connection| {
            let h = Arc::clone(&h);
            async move { h.on_open_async(&conn).await }.boxed()
        }) as OpenAsyncHook;

        let h = Arc::clone(handler);
        let text = Box::new(move |conn: &Connection, text: &str| h.on_text(conn, text)) as TextHook;

        let h = Arc::clone(handler);
        let text_async = Box::new(move |conn: Connection, text: String| {
            let h = Arc::clone(&h);
            async move { h.on_text_async(&conn, &text).await }.boxed()
        }) as TextAsyncHook;

        let h = Arc::clone(handler);
        let binary =
            Box::new(move |conn: &Connection, data: &[u8]| h.on_binary(conn, data)) as BinaryHook;

        let h = Arc::clone(handler);
        let binary_async = Box::new(move |conn: Connection, data: Bytes| {
            let h = Arc::clone(&h);
            async move { h.on_binary_async(&conn, &data).await }.boxed()
        }) as BinaryAsyncHook;

        let h = Arc::clone(handler);
        let close =
            Box::new(move |conn: &Connection, frame: &CloseFrame| h.on_close(conn, frame))
                as CloseHook;

        let h = Arc::clone(handler);
        let close_async = Box::new(move |conn: Connection, frame: CloseFrame| {
            let h = Arc::clone(&h);
            async move { h.on_close_async(&conn, &frame).await }.boxed()
        }) as CloseAsyncHook;

        let h = Arc::clone(handler);
        let error = Box::new(move |conn: &Connection, error: &ConnectionError| {
            h.on_error(conn, error);
        }) as ErrorHook;

        let h = Arc::clone(handler);
        let auth = Box::new(move |request: &RequestMeta| h.authenticate(request)) as AuthHook;

        let h = Arc::clone(handler);
        let auth_async = Box::new(move |request: RequestMeta| {
            let h = Arc::clone(&h);
            async move { h.authenticate_async(&request).await }.boxed()
        }) as AuthAsyncHook;

        Self {
            open: Some(open),
            open_async: Some(open_async),
            text: Some(text),
            text_async: Some(text_async),
            binary: Some(binary),
            binary_async: Some(binary_async),
            close: Some(close),
            close_async: Some(close_async),
            error: Some(error),
            auth: Some(auth),
            auth_async: Some(auth_async),
        }
    }

    /// Evaluate the authentication predicates.
    ///
    /// Both must grant access. The synchronous predicate runs first and a
    /// refusal skips the awaitable one. With neither registered access is
    /// granted.
    pub async fn authorize(&mut self, request: &RequestMeta) -> bool {
        if let Some(hook) = &mut self.auth
            && !hook(request)
        {
            return false;
        }
        match &mut self.auth_async {
            Some(hook) => hook(request.clone()).await,
            None => true,
        }
    }

    pub(crate) async fn fire_open(&mut self, conn: &Connection) {
        if let Some(hook) = &mut self.open {
            hook(conn);
        }
        if let Some(hook) = &mut self.open_async {
            hook(conn.clone()).await;
        }
    }

    pub(crate) async fn fire_message(&mut self, conn: &Connection, message: Message) {
        match message {
            Message::Text(text) => {
                if let Some(hook) = &mut self.text {
                    hook(conn, &text);
                }
                if let Some(hook) = &mut self.text_async {
                    hook(conn.clone(), text).await;
                }
            }
            Message::Binary(data) => {
                if let Some(hook) = &mut self.binary {
                    hook(conn, &data);
                }
                if let Some(hook) = &mut self.binary_async {
                    hook(conn.clone(), data).await;
                }
            }
        }
    }

    pub(crate) async fn fire_close(&mut self, conn: &Connection, frame: &CloseFrame) {
        if let Some(hook) = &mut self.close {
            hook(conn, frame);
        }
        if let Some(hook) = &mut self.close_async {
            hook(conn.clone(), frame.clone()).await;
        }
    }

    pub(crate) fn fire_error(&mut self, conn: &Connection, error: &ConnectionError) {
        if let Some(hook) = &mut self.error {
            hook(conn, error);
        }
    }
}
