//! HTTP/1.1 response serialization.
//!
//! Emits exactly one response in this shape:
//!
//! ```text
//! HTTP/1.1 <code> <message>\r\n
//! Content-Type: <ct>\r\n
//! Content-Length: <n>\r\n
//! <additional headers, one per line>\r\n
//! Connection: <keep-alive|close>\r\n
//! \r\n
//! <payload bytes>
//! ```
//!
//! Redirects replace the Content-Type line with `Location` immediately after
//! the status line and never send payload bytes.

use skiff_core::{ContentKind, Response, StatusCode};
use std::io::{self, Write};

/// The keep-alive gate: a connection persists only when the request asked
/// for it and the response is not an error (status < 400).
#[must_use]
pub fn connection_persists(keep_alive_requested: bool, status: StatusCode) -> bool {
    keep_alive_requested && !status.is_error()
}

/// Serialize a response.
///
/// `persist` selects the `Connection` header value. `include_body` is false
/// for HEAD requests: the header block (including Content-Length) is emitted
/// as usual but the payload bytes stay off the wire.
#[must_use]
pub fn serialize_response(response: &Response, persist: bool, include_body: bool) -> Vec<u8> {
    let status = response.status_code();
    let mut out = Vec::with_capacity(256 + response.body().len());
    out.extend_from_slice(
        format!("HTTP/1.1 {} {}\r\n", status.as_u16(), status.reason()).as_bytes(),
    );

    let redirect = response.kind() == ContentKind::Redirect;
    if redirect {
        let location = response.header_value("Location").unwrap_or("");
        out.extend_from_slice(format!("Location: {location}\r\n").as_bytes());
        out.extend_from_slice(b"Content-Length: 0\r\n");
    } else {
        if let Some(content_type) = response.content_type() {
            out.extend_from_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
        }
        out.extend_from_slice(format!("Content-Length: {}\r\n", response.body().len()).as_bytes());
    }

    for (name, value) in response.headers() {
        if name.eq_ignore_ascii_case("content-type")
            || name.eq_ignore_ascii_case("content-length")
            || name.eq_ignore_ascii_case("connection")
            || (redirect && name.eq_ignore_ascii_case("location"))
        {
            continue;
        }
        out.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
    }

    let connection = if persist { "keep-alive" } else { "close" };
    out.extend_from_slice(format!("Connection: {connection}\r\n\r\n").as_bytes());

    if include_body && !redirect {
        out.extend_from_slice(response.body());
    }
    out
}

/// Serialize and write a response to the stream.
pub fn write_response(
    stream: &mut impl Write,
    response: &Response,
    persist: bool,
    include_body: bool,
) -> io::Result<()> {
    let bytes = serialize_response(response, persist, include_body);
    stream.write_all(&bytes)?;
    stream.flush()
}
