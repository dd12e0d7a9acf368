//! HTTP/1.1 request parser.
//!
//! One request is read per call: the parser fills a fixed 8 KiB buffer until
//! the `\r\n\r\n` header terminator appears, parses the request line, query
//! string and headers, then honours `Content-Length` by continuing to read
//! until the declared body has arrived (the body is not bounded by the
//! header buffer). Requests without `Content-Length` keep whatever body
//! bytes arrived alongside the headers.
//!
//! Query values are taken verbatim from the wire; they are not
//! percent-decoded.

use skiff_core::{Headers, Method, Request};
use std::collections::HashMap;
use std::fmt;
use std::io::Read;

/// Size of the per-connection header buffer. Headers that do not fit are a
/// parse error.
pub const HEADER_BUFFER_SIZE: usize = 8 * 1024;

/// Malformed input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Request line is not `METHOD TARGET HTTP/x.y`.
    InvalidRequestLine,
    /// Unrecognized method token.
    InvalidMethod,
    /// A header line without a colon, or non-UTF-8 header bytes.
    InvalidHeader,
    /// The header block exceeds the fixed buffer.
    HeadersTooLarge,
    /// `Content-Length` is present but not a number.
    InvalidContentLength,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRequestLine => write!(f, "invalid request line"),
            Self::InvalidMethod => write!(f, "invalid HTTP method"),
            Self::InvalidHeader => write!(f, "invalid header line"),
            Self::HeadersTooLarge => write!(f, "header block exceeds buffer"),
            Self::InvalidContentLength => write!(f, "invalid content-length"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Why a request could not be produced.
///
/// Both variants end the connection silently; the distinction only matters
/// for logging.
#[derive(Debug)]
pub enum ReadError {
    /// The peer closed (or the socket failed) before a full request arrived.
    Closed,
    /// The bytes that arrived were not a valid request.
    Parse(ParseError),
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "connection closed before a full request"),
            Self::Parse(e) => write!(f, "parse error: {e}"),
        }
    }
}

impl std::error::Error for ReadError {}

impl From<ParseError> for ReadError {
    fn from(e: ParseError) -> Self {
        Self::Parse(e)
    }
}

/// Read and parse one request from the stream.
pub fn read_request(stream: &mut impl Read) -> Result<Request, ReadError> {
    let mut buf = [0u8; HEADER_BUFFER_SIZE];
    let mut filled = 0;

    let header_end = loop {
        if let Some(pos) = find_terminator(&buf[..filled]) {
            break pos;
        }
        if filled == buf.len() {
            return Err(ParseError::HeadersTooLarge.into());
        }
        match stream.read(&mut buf[filled..]) {
            Ok(0) | Err(_) => return Err(ReadError::Closed),
            Ok(n) => filled += n,
        }
    };

    let header_block =
        std::str::from_utf8(&buf[..header_end]).map_err(|_| ParseError::InvalidHeader)?;
    let mut lines = header_block.split("\r\n");
    let request_line = lines.next().ok_or(ParseError::InvalidRequestLine)?;
    let (method, path, query) = parse_request_line(request_line)?;
    let headers = parse_headers(lines)?;

    // Body: whatever arrived past the terminator, extended to Content-Length
    // when the request declares one.
    let mut body = buf[header_end + 4..filled].to_vec();
    if let Some(value) = headers.get("content-length") {
        let declared: usize = value
            .trim()
            .parse()
            .map_err(|_| ParseError::InvalidContentLength)?;
        if body.len() > declared {
            body.truncate(declared);
        }
        while body.len() < declared {
            let mut chunk = [0u8; 8 * 1024];
            let want = (declared - body.len()).min(chunk.len());
            match stream.read(&mut chunk[..want]) {
                Ok(0) | Err(_) => return Err(ReadError::Closed),
                Ok(n) => body.extend_from_slice(&chunk[..n]),
            }
        }
    }

    Ok(Request {
        method,
        path,
        query,
        headers,
        body,
    })
}

fn find_terminator(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

fn parse_request_line(
    line: &str,
) -> Result<(Method, String, HashMap<String, String>), ParseError> {
    let mut parts = line.splitn(3, ' ');
    let method_token = parts.next().ok_or(ParseError::InvalidRequestLine)?;
    let target = parts.next().ok_or(ParseError::InvalidRequestLine)?;
    let version = parts.next().ok_or(ParseError::InvalidRequestLine)?;
    if !version.starts_with("HTTP/") {
        return Err(ParseError::InvalidRequestLine);
    }

    let method = Method::from_bytes(method_token.as_bytes()).ok_or(ParseError::InvalidMethod)?;

    let (path, raw_query) = match target.split_once('?') {
        Some((path, raw_query)) => (path, raw_query),
        None => (target, ""),
    };

    Ok((method, path.to_string(), parse_query(raw_query)))
}

/// Split a raw query string into pairs. Tokens without `=` get an empty
/// value; values are not percent-decoded.
fn parse_query(raw: &str) -> HashMap<String, String> {
    let mut query = HashMap::new();
    for token in raw.split('&') {
        if token.is_empty() {
            continue;
        }
        match token.split_once('=') {
            Some((key, value)) => query.insert(key.to_string(), value.to_string()),
            None => query.insert(token.to_string(), String::new()),
        };
    }
    query
}

fn parse_headers<'a>(lines: impl Iterator<Item = &'a str>) -> Result<Headers, ParseError> {
    let mut headers = Headers::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        let (name, value) = line.split_once(':').ok_or(ParseError::InvalidHeader)?;
        headers.insert(name.trim(), value.trim());
    }
    Ok(headers)
}

/// Whether the request asked to keep the connection open.
///
/// True iff the `Connection` header carries a `keep-alive` token
/// (case-insensitive).
#[must_use]
pub fn keep_alive_requested(request: &Request) -> bool {
    connection_tokens(request).any(|token| token.eq_ignore_ascii_case("keep-alive"))
}

/// Whether the request asks for a WebSocket upgrade
/// (`Upgrade: websocket`, case-insensitive).
#[must_use]
pub fn upgrade_requested(request: &Request) -> bool {
    request
        .headers
        .get("upgrade")
        .map(|value| {
            value
                .split(',')
                .any(|token| token.trim().eq_ignore_ascii_case("websocket"))
        })
        .unwrap_or(false)
}

fn connection_tokens(request: &Request) -> impl Iterator<Item = &str> {
    request
        .headers
        .get("connection")
        .unwrap_or("")
        .split(',')
        .map(str::trim)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// A reader that hands out its chunks one `read` call at a time,
    /// simulating data trickling in across several socket reads.
    struct ChunkReader {
        chunks: Vec<Vec<u8>>,
        next: usize,
    }

    impl ChunkReader {
        fn new(chunks: &[&[u8]]) -> Self {
            Self {
                chunks: chunks.iter().map(|c| c.to_vec()).collect(),
                next: 0,
            }
        }
    }

    impl Read for ChunkReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.next >= self.chunks.len() {
                return Ok(0);
            }
            let chunk = &self.chunks[self.next];
            let n = chunk.len().min(buf.len());
            buf[..n].copy_from_slice(&chunk[..n]);
            if n == chunk.len() {
                self.next += 1;
            } else {
                self.chunks[self.next] = chunk[n..].to_vec();
            }
            Ok(n)
        }
    }

    #[test]
    fn parses_simple_get() {
        let mut input = Cursor::new(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n".to_vec());
        let request = read_request(&mut input).unwrap();
        assert_eq!(request.method, Method::Get);
        assert_eq!(request.path, "/");
        assert!(request.query.is_empty());
        assert_eq!(request.headers.get("host"), Some("x"));
        assert!(request.body.is_empty());
    }

    #[test]
    fn splits_target_into_path_and_query() {
        let mut input = Cursor::new(b"GET /search?q=foo&page=2 HTTP/1.1\r\n\r\n".to_vec());
        let request = read_request(&mut input).unwrap();
        assert_eq!(request.path, "/search");
        assert_eq!(request.query.get("q").map(String::as_str), Some("foo"));
        assert_eq!(request.query.get("page").map(String::as_str), Some("2"));
    }

    #[test]
    fn query_token_without_equals_gets_empty_value() {
        let mut input = Cursor::new(b"GET /x?flag&a=1 HTTP/1.1\r\n\r\n".to_vec());
        let request = read_request(&mut input).unwrap();
        assert_eq!(request.query.get("flag").map(String::as_str), Some(""));
        assert_eq!(request.query.get("a").map(String::as_str), Some("1"));
    }

    #[test]
    fn query_values_are_not_percent_decoded() {
        let mut input = Cursor::new(b"GET /x?q=a%20b HTTP/1.1\r\n\r\n".to_vec());
        let request = read_request(&mut input).unwrap();
        assert_eq!(request.query.get("q").map(String::as_str), Some("a%20b"));
    }

    #[test]
    fn body_present_in_first_read() {
        let mut input = Cursor::new(
            b"POST /api/users HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello".to_vec(),
        );
        let request = read_request(&mut input).unwrap();
        assert_eq!(request.body, b"hello");
    }

    #[test]
    fn body_is_read_to_content_length_across_reads() {
        let mut input = ChunkReader::new(&[
            b"POST /up HTTP/1.1\r\nContent-Length: 10\r\n\r\n12345",
            b"678",
            b"90",
        ]);
        let request = read_request(&mut input).unwrap();
        assert_eq!(request.body, b"1234567890");
    }

    #[test]
    fn headers_split_across_reads() {
        let mut input = ChunkReader::new(&[b"GET / HT", b"TP/1.1\r\nHost: ", b"x\r\n\r\n"]);
        let request = read_request(&mut input).unwrap();
        assert_eq!(request.headers.get("host"), Some("x"));
    }

    #[test]
    fn body_truncated_to_content_length() {
        let mut input =
            Cursor::new(b"POST /x HTTP/1.1\r\nContent-Length: 2\r\n\r\nhello".to_vec());
        let request = read_request(&mut input).unwrap();
        assert_eq!(request.body, b"he");
    }

    #[test]
    fn eof_before_headers_is_closed() {
        let mut input = Cursor::new(b"GET / HTTP/1.1\r\nHost".to_vec());
        assert!(matches!(read_request(&mut input), Err(ReadError::Closed)));
    }

    #[test]
    fn eof_mid_body_is_closed() {
        let mut input =
            Cursor::new(b"POST /x HTTP/1.1\r\nContent-Length: 50\r\n\r\nshort".to_vec());
        assert!(matches!(read_request(&mut input), Err(ReadError::Closed)));
    }

    #[test]
    fn oversized_header_block_is_a_parse_error() {
        let mut raw = b"GET / HTTP/1.1\r\n".to_vec();
        raw.extend_from_slice(format!("X-Pad: {}\r\n", "a".repeat(HEADER_BUFFER_SIZE)).as_bytes());
        raw.extend_from_slice(b"\r\n");
        let mut input = Cursor::new(raw);
        assert!(matches!(
            read_request(&mut input),
            Err(ReadError::Parse(ParseError::HeadersTooLarge))
        ));
    }

    #[test]
    fn unknown_method_is_a_parse_error() {
        let mut input = Cursor::new(b"BREW /pot HTTP/1.1\r\n\r\n".to_vec());
        assert!(matches!(
            read_request(&mut input),
            Err(ReadError::Parse(ParseError::InvalidMethod))
        ));
    }

    #[test]
    fn bad_content_length_is_a_parse_error() {
        let mut input =
            Cursor::new(b"POST /x HTTP/1.1\r\nContent-Length: ten\r\n\r\n".to_vec());
        assert!(matches!(
            read_request(&mut input),
            Err(ReadError::Parse(ParseError::InvalidContentLength))
        ));
    }

    #[test]
    fn keep_alive_detection_is_token_based() {
        let mut request = Request::new(Method::Get, "/");
        assert!(!keep_alive_requested(&request));

        request.headers.insert("Connection", "keep-alive");
        assert!(keep_alive_requested(&request));

        request.headers.insert("Connection", "Keep-Alive, Upgrade");
        assert!(keep_alive_requested(&request));

        request.headers.insert("Connection", "close");
        assert!(!keep_alive_requested(&request));
    }

    #[test]
    fn upgrade_detection_is_case_insensitive() {
        let mut request = Request::new(Method::Get, "/ws");
        assert!(!upgrade_requested(&request));
        request.headers.insert("Upgrade", "WebSocket");
        assert!(upgrade_requested(&request));
    }
}
