//! HTTP response types and helper constructors.

use std::collections::HashMap;
use std::fmt;

/// HTTP status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusCode(u16);

impl StatusCode {
    /// 200 OK
    pub const OK: Self = Self(200);
    /// 201 Created
    pub const CREATED: Self = Self(201);
    /// 204 No Content
    pub const NO_CONTENT: Self = Self(204);
    /// 301 Moved Permanently
    pub const MOVED_PERMANENTLY: Self = Self(301);
    /// 302 Found
    pub const FOUND: Self = Self(302);
    /// 303 See Other
    pub const SEE_OTHER: Self = Self(303);
    /// 304 Not Modified
    pub const NOT_MODIFIED: Self = Self(304);
    /// 307 Temporary Redirect
    pub const TEMPORARY_REDIRECT: Self = Self(307);
    /// 308 Permanent Redirect
    pub const PERMANENT_REDIRECT: Self = Self(308);
    /// 400 Bad Request
    pub const BAD_REQUEST: Self = Self(400);
    /// 401 Unauthorized
    pub const UNAUTHORIZED: Self = Self(401);
    /// 403 Forbidden
    pub const FORBIDDEN: Self = Self(403);
    /// 404 Not Found
    pub const NOT_FOUND: Self = Self(404);
    /// 405 Method Not Allowed
    pub const METHOD_NOT_ALLOWED: Self = Self(405);
    /// 500 Internal Server Error
    pub const INTERNAL_SERVER_ERROR: Self = Self(500);
    /// 502 Bad Gateway
    pub const BAD_GATEWAY: Self = Self(502);
    /// 503 Service Unavailable
    pub const SERVICE_UNAVAILABLE: Self = Self(503);

    /// Create a status code from its numeric value.
    #[must_use]
    pub const fn from_u16(code: u16) -> Self {
        Self(code)
    }

    /// The numeric value.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// True for 4xx and 5xx codes. Error responses force the connection
    /// closed regardless of what the request asked for.
    #[must_use]
    pub const fn is_error(self) -> bool {
        self.0 >= 400
    }

    /// The reason phrase for the status line.
    ///
    /// Codes outside the table render as `"Unknown"`.
    #[must_use]
    pub const fn reason(self) -> &'static str {
        match self.0 {
            200 => "OK",
            201 => "Created",
            204 => "No Content",
            301 => "Moved Permanently",
            302 => "Found",
            303 => "See Other",
            304 => "Not Modified",
            305 => "Use Proxy",
            306 => "Switch Proxy",
            307 => "Temporary Redirect",
            308 => "Permanent Redirect",
            400 => "Bad Request",
            401 => "Unauthorized",
            403 => "Forbidden",
            404 => "Not Found",
            405 => "Method Not Allowed",
            500 => "Internal Server Error",
            502 => "Bad Gateway",
            503 => "Service Unavailable",
            _ => "Unknown",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.0, self.reason())
    }
}

/// What kind of payload a response carries.
///
/// The kind selects the default `Content-Type` when the response has not set
/// one explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// HTML document.
    Html,
    /// JSON payload, already serialized.
    Json,
    /// Plain text.
    Plaintext,
    /// Opaque bytes.
    Blob,
    /// Redirect; carries no payload, only a `Location` header.
    Redirect,
}

impl ContentKind {
    /// Default `Content-Type` for this kind. Redirects have none.
    #[must_use]
    pub const fn default_content_type(self) -> Option<&'static str> {
        match self {
            Self::Html => Some("text/html"),
            Self::Json => Some("application/json"),
            Self::Plaintext => Some("text/plain"),
            Self::Blob => Some("application/octet-stream"),
            Self::Redirect => None,
        }
    }
}

/// An HTTP response.
///
/// Built by handlers via the helper constructors and the `status`/`header`
/// builder methods:
///
/// ```
/// use skiff_core::{Response, StatusCode};
///
/// let created = Response::json(r#"{"id":7}"#).status(StatusCode::CREATED);
/// let page = Response::html("<h1>hi</h1>").header("X-Frame-Options", "DENY");
/// ```
#[derive(Debug, Clone)]
pub struct Response {
    kind: ContentKind,
    status: StatusCode,
    headers: HashMap<String, String>,
    body: Vec<u8>,
}

impl Response {
    fn with_kind(kind: ContentKind, body: Vec<u8>) -> Self {
        Self {
            kind,
            status: StatusCode::OK,
            headers: HashMap::new(),
            body,
        }
    }

    /// An HTML response (200, `text/html`).
    #[must_use]
    pub fn html(body: impl Into<String>) -> Self {
        Self::with_kind(ContentKind::Html, body.into().into_bytes())
    }

    /// A JSON response (200, `application/json`). The body is taken as
    /// already-serialized JSON text.
    #[must_use]
    pub fn json(body: impl Into<String>) -> Self {
        Self::with_kind(ContentKind::Json, body.into().into_bytes())
    }

    /// A plain-text response (200, `text/plain`).
    #[must_use]
    pub fn text(body: impl Into<String>) -> Self {
        Self::with_kind(ContentKind::Plaintext, body.into().into_bytes())
    }

    /// An opaque byte response (200, `application/octet-stream` unless a
    /// `Content-Type` header is set).
    #[must_use]
    pub fn blob(body: impl Into<Vec<u8>>) -> Self {
        Self::with_kind(ContentKind::Blob, body.into())
    }

    /// A redirect to `location` with the given status code.
    #[must_use]
    pub fn redirect(location: impl Into<String>, status: StatusCode) -> Self {
        let mut response = Self::with_kind(ContentKind::Redirect, Vec::new());
        response.status = status;
        response
            .headers
            .insert("Location".to_string(), location.into());
        response
    }

    /// A 301 Moved Permanently redirect.
    #[must_use]
    pub fn permanent_redirect(location: impl Into<String>) -> Self {
        Self::redirect(location, StatusCode::MOVED_PERMANENTLY)
    }

    /// A 302 Found redirect.
    #[must_use]
    pub fn temporary_redirect(location: impl Into<String>) -> Self {
        Self::redirect(location, StatusCode::FOUND)
    }

    /// A 303 See Other redirect.
    #[must_use]
    pub fn see_other(location: impl Into<String>) -> Self {
        Self::redirect(location, StatusCode::SEE_OTHER)
    }

    /// Replace the status code.
    #[must_use]
    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Add a header. Header names keep the casing they were given; lookups
    /// are case-insensitive.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// The payload kind.
    #[must_use]
    pub fn kind(&self) -> ContentKind {
        self.kind
    }

    /// The status code.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    /// The body bytes.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// All headers, in no particular order.
    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Look up a header value case-insensitively.
    #[must_use]
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// The effective `Content-Type`: an explicit header wins, otherwise the
    /// kind's default. Redirects have none.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header_value("Content-Type")
            .or_else(|| self.kind.default_content_type())
    }
}

/// MIME type for a file extension (already lowercased extensions match
/// directly; lookups lowercase first). Unknown extensions fall back to
/// `application/octet-stream`.
#[must_use]
pub fn mime_type_for_extension(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "json" | "map" => "application/json",
        "xml" => "application/xml",
        "txt" => "text/plain; charset=utf-8",
        "csv" => "text/csv; charset=utf-8",
        "md" => "text/markdown; charset=utf-8",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "tar" => "application/x-tar",
        "wasm" => "application/wasm",
        "mp3" => "audio/mpeg",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        _ => "application/octet-stream",
    }
}
