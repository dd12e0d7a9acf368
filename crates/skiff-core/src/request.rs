//! HTTP request types.

use std::collections::HashMap;
use std::fmt;

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET method.
    Get,
    /// POST method.
    Post,
    /// PUT method.
    Put,
    /// PATCH method.
    Patch,
    /// DELETE method.
    Delete,
    /// OPTIONS method.
    Options,
    /// HEAD method.
    Head,
    /// TRACE method.
    Trace,
}

impl Method {
    /// Parse a method from the raw token on the request line.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        match bytes {
            b"GET" => Some(Self::Get),
            b"POST" => Some(Self::Post),
            b"PUT" => Some(Self::Put),
            b"PATCH" => Some(Self::Patch),
            b"DELETE" => Some(Self::Delete),
            b"OPTIONS" => Some(Self::Options),
            b"HEAD" => Some(Self::Head),
            b"TRACE" => Some(Self::Trace),
            _ => None,
        }
    }

    /// The canonical uppercase method name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Options => "OPTIONS",
            Self::Head => "HEAD",
            Self::Trace => "TRACE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP header collection.
///
/// Names are stored lowercased; lookups are case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct Headers {
    inner: HashMap<String, String>,
}

impl Headers {
    /// Create an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a header value by name (case-insensitive).
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Insert a header, replacing any previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.inner
            .insert(name.into().to_ascii_lowercase(), value.into());
    }

    /// Check whether a header is present (case-insensitive).
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.inner.contains_key(&name.to_ascii_lowercase())
    }

    /// Iterate over all headers as (name, value) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Number of headers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// True when no headers are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// A parsed HTTP request as it came off the wire.
///
/// This is the wire-level view produced by the parser. Handlers see a
/// [`RequestContext`] instead, which adds the route parameters extracted
/// during matching.
#[derive(Debug)]
pub struct Request {
    /// Request method.
    pub method: Method,
    /// Request path with the query string stripped.
    pub path: String,
    /// Query parameters. Values are taken verbatim from the wire; no
    /// percent-decoding is applied.
    pub query: HashMap<String, String>,
    /// Request headers.
    pub headers: Headers,
    /// Raw body bytes.
    pub body: Vec<u8>,
}

impl Request {
    /// Create a request with the given method and path and nothing else.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: HashMap::new(),
            headers: Headers::new(),
            body: Vec::new(),
        }
    }
}

/// Per-request state handed to route handlers.
///
/// Built from a [`Request`] once routing has decided where it goes. The
/// parser fills everything except `params`; the router fills `params` from
/// the matched pattern. A context lives for exactly one request and is never
/// shared.
#[derive(Debug)]
pub struct RequestContext {
    /// Request method.
    pub method: Method,
    /// Request path with the query string stripped.
    pub path: String,
    /// Path parameters captured by the matched route pattern.
    pub params: HashMap<String, String>,
    /// Query parameters, verbatim from the wire.
    pub query: HashMap<String, String>,
    /// Request body decoded as a string. Invalid UTF-8 sequences are
    /// replaced, not rejected.
    pub body: String,
}

impl RequestContext {
    /// Build a context from a parsed request. `params` starts empty.
    #[must_use]
    pub fn from_request(request: &Request) -> Self {
        Self {
            method: request.method,
            path: request.path.clone(),
            params: HashMap::new(),
            query: request.query.clone(),
            body: String::from_utf8_lossy(&request.body).into_owned(),
        }
    }

    /// Look up a path parameter by name.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Look up a query parameter by name.
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }
}
