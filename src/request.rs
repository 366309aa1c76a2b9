//! Inbound request metadata and route arguments.
//!
//! Both are produced by the host adapter and routing layer before a
//! connection is created and are treated as opaque, immutable inputs.

use std::{collections::HashMap, net::SocketAddr};

const ORIGIN: &str = "Origin";
const LEGACY_ORIGIN: &str = "Sec-WebSocket-Origin";
const SUB_PROTOCOL: &str = "Sec-WebSocket-Protocol";
const COOKIE: &str = "Cookie";

/// Metadata describing the upgrade request that produced a connection.
///
/// ```
/// use wireline::request::RequestMeta;
///
/// let request = RequestMeta::new("/chat")
///     .with_header("Host", "example.test")
///     .with_header("Sec-WebSocket-Origin", "https://example.test");
/// assert_eq!(request.origin(), Some("https://example.test"));
/// assert_eq!(request.host(), Some("example.test"));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestMeta {
    path: String,
    headers: Vec<(String, String)>,
    peer_addr: Option<SocketAddr>,
}

impl RequestMeta {
    /// Create metadata for a request to `path`.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Append a header. Repeated names keep every value in order.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Record the remote address of the peer.
    #[must_use]
    pub fn with_peer_addr(mut self, addr: SocketAddr) -> Self {
        self.peer_addr = Some(addr);
        self
    }

    /// Request path.
    #[must_use]
    pub fn path(&self) -> &str { &self.path }

    /// Remote address if the host adapter supplied one.
    #[must_use]
    pub fn peer_addr(&self) -> Option<SocketAddr> { self.peer_addr }

    /// All headers in arrival order.
    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// First value for `name`, compared case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// `Host` header value.
    #[must_use]
    pub fn host(&self) -> Option<&str> { self.header("Host") }

    /// Request origin, falling back to the legacy `Sec-WebSocket-Origin`.
    #[must_use]
    pub fn origin(&self) -> Option<&str> {
        self.header(ORIGIN).or_else(|| self.header(LEGACY_ORIGIN))
    }

    /// Requested sub-protocol list, verbatim.
    #[must_use]
    pub fn sub_protocol(&self) -> Option<&str> { self.header(SUB_PROTOCOL) }

    /// Cookies parsed from every `Cookie` header. Later values win.
    #[must_use]
    pub fn cookies(&self) -> HashMap<String, String> {
        self.headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(COOKIE))
            .flat_map(|(_, v)| v.split(';'))
            .filter_map(|pair| {
                let (name, value) = pair.split_once('=')?;
                let name = name.trim();
                (!name.is_empty()).then(|| (name.to_owned(), value.trim().to_owned()))
            })
            .collect()
    }
}

/// Named captures extracted by the routing layer, in capture-group order.
///
/// Empty when the connection was matched by a static route.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RouteArguments(Vec<(String, String)>);

impl RouteArguments {
    /// Arguments for a static route.
    #[must_use]
    pub fn empty() -> Self { Self::default() }

    /// Look up the value captured for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Iterate over `(name, value)` pairs in capture order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of captured arguments.
    #[must_use]
    pub fn len(&self) -> usize { self.0.len() }

    /// Returns `true` when nothing was captured.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl<K, V> FromIterator<(K, V)> for RouteArguments
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
