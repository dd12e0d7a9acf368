//! WebSocket support (RFC 6455): upgrade handshake, connections, routes.
//!
//! The handshake computes `Sec-WebSocket-Accept` with local SHA-1 and Base64
//! implementations; the frame layer lives in [`crate::frame`]. After an
//! upgrade the socket belongs to one dedicated worker thread for the life of
//! the connection and never returns to the request/response path.

use crate::frame::{read_frame, write_frame, FrameError, Opcode};
use skiff_core::routing::RoutePattern;
use skiff_core::{log_debug, log_warn};
use std::collections::HashMap;
use std::fmt;
use std::net::{Shutdown, TcpStream};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Handshake GUID fixed by RFC 6455.
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Normal closure code for [`WebSocketConnection::close`].
pub const CLOSE_NORMAL: u16 = 1000;

/// Why an upgrade request could not be completed.
///
/// A failed handshake is not fatal: the request falls through to normal
/// HTTP handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    /// No `Sec-WebSocket-Key` header.
    MissingKey,
    /// The key is not base64, or does not decode to 16 bytes.
    InvalidKey,
}

impl fmt::Display for HandshakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingKey => write!(f, "missing Sec-WebSocket-Key header"),
            Self::InvalidKey => write!(f, "malformed Sec-WebSocket-Key header"),
        }
    }
}

impl std::error::Error for HandshakeError {}

/// Compute the `Sec-WebSocket-Accept` value for a client key.
pub fn accept_key(key: &str) -> Result<String, HandshakeError> {
    let key = key.trim();
    if key.is_empty() {
        return Err(HandshakeError::MissingKey);
    }
    let decoded = base64_decode(key).ok_or(HandshakeError::InvalidKey)?;
    if decoded.len() != 16 {
        return Err(HandshakeError::InvalidKey);
    }

    let mut input = Vec::with_capacity(key.len() + WS_GUID.len());
    input.extend_from_slice(key.as_bytes());
    input.extend_from_slice(WS_GUID.as_bytes());
    Ok(base64_encode(&sha1(&input)))
}

/// The literal 101 response completing the handshake.
#[must_use]
pub fn handshake_response(accept: &str) -> String {
    format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {accept}\r\n\r\n"
    )
}

/// Callback invoked when a connection opens.
pub type ConnectCallback = Arc<dyn Fn(&mut WebSocketConnection) + Send + Sync>;
/// Callback for each complete text message.
pub type TextCallback = Arc<dyn Fn(&mut WebSocketConnection, &str) + Send + Sync>;
/// Callback for each complete binary message.
pub type BinaryCallback = Arc<dyn Fn(&mut WebSocketConnection, &[u8]) + Send + Sync>;
/// Callback invoked exactly once when the connection ends.
pub type CloseCallback = Arc<dyn Fn(&mut WebSocketConnection) + Send + Sync>;

/// The four optional callbacks of a WebSocket route.
///
/// ```
/// use skiff_http::websocket::WebSocketHandlers;
///
/// let handlers = WebSocketHandlers::new()
///     .on_connect(|conn| conn.send_text("welcome"))
///     .on_message(|conn, text| conn.send_text(text));
/// ```
#[derive(Clone, Default)]
pub struct WebSocketHandlers {
    pub(crate) on_connect: Option<ConnectCallback>,
    pub(crate) on_message: Option<TextCallback>,
    pub(crate) on_binary: Option<BinaryCallback>,
    pub(crate) on_close: Option<CloseCallback>,
}

impl WebSocketHandlers {
    /// No callbacks registered.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Called once after the upgrade completes.
    #[must_use]
    pub fn on_connect<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut WebSocketConnection) + Send + Sync + 'static,
    {
        self.on_connect = Some(Arc::new(f));
        self
    }

    /// Called for each text message.
    #[must_use]
    pub fn on_message<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut WebSocketConnection, &str) + Send + Sync + 'static,
    {
        self.on_message = Some(Arc::new(f));
        self
    }

    /// Called for each binary message.
    #[must_use]
    pub fn on_binary<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut WebSocketConnection, &[u8]) + Send + Sync + 'static,
    {
        self.on_binary = Some(Arc::new(f));
        self
    }

    /// Called exactly once when the connection ends, however it ends.
    #[must_use]
    pub fn on_close<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut WebSocketConnection) + Send + Sync + 'static,
    {
        self.on_close = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for WebSocketHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebSocketHandlers")
            .field("on_connect", &self.on_connect.is_some())
            .field("on_message", &self.on_message.is_some())
            .field("on_binary", &self.on_binary.is_some())
            .field("on_close", &self.on_close.is_some())
            .finish()
    }
}

/// A registered WebSocket route: the same compiled pattern the HTTP router
/// uses, plus the callbacks.
#[derive(Debug)]
pub struct WebSocketRoute {
    /// Compiled path pattern.
    pub pattern: RoutePattern,
    /// Route callbacks.
    pub handlers: WebSocketHandlers,
}

/// Find the first route matching `path`, with its extracted parameters.
#[must_use]
pub fn find_route<'a>(
    routes: &'a [WebSocketRoute],
    path: &str,
) -> Option<(&'a WebSocketRoute, Vec<(String, String)>)> {
    routes
        .iter()
        .find_map(|route| route.pattern.match_params(path).map(|params| (route, params)))
}

/// One upgraded connection, owned exclusively by its worker thread.
///
/// Once `open` drops to false no further frames are sent; send methods
/// become no-ops. I/O failures during a send are not surfaced — they mark
/// the connection closed instead.
#[derive(Debug)]
pub struct WebSocketConnection {
    stream: TcpStream,
    open: bool,
    params: HashMap<String, String>,
}

impl WebSocketConnection {
    /// Wrap an upgraded socket. `params` are the captures from the matched
    /// route pattern.
    #[must_use]
    pub fn new(stream: TcpStream, params: HashMap<String, String>) -> Self {
        Self {
            stream,
            open: true,
            params,
        }
    }

    /// Whether the connection is still open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Path parameter captured at upgrade time.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// All path parameters captured at upgrade time.
    #[must_use]
    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    /// Send one TEXT frame. No-op once closed.
    pub fn send_text(&mut self, text: &str) {
        self.send_frame(Opcode::Text, text.as_bytes());
    }

    /// Send one BINARY frame. No-op once closed.
    pub fn send_binary(&mut self, payload: &[u8]) {
        self.send_frame(Opcode::Binary, payload);
    }

    /// Send a PING. Rejects payloads over 125 bytes.
    pub fn ping(&mut self, payload: &[u8]) -> Result<(), FrameError> {
        self.send_control(Opcode::Ping, payload)
    }

    /// Send a PONG. Rejects payloads over 125 bytes.
    pub fn pong(&mut self, payload: &[u8]) -> Result<(), FrameError> {
        self.send_control(Opcode::Pong, payload)
    }

    /// Close with code 1000 and no reason.
    pub fn close(&mut self) {
        self.close_with(CLOSE_NORMAL, "");
    }

    /// Send a CLOSE frame carrying `code` and `reason`, then shut the socket
    /// down. Idempotent: later calls do nothing.
    pub fn close_with(&mut self, code: u16, reason: &str) {
        if !self.open {
            return;
        }
        // Control frames cap the payload at 125 bytes: 2 for the code, the
        // rest for the reason.
        let reason = truncate_utf8(reason, 123);
        let mut payload = Vec::with_capacity(2 + reason.len());
        payload.extend_from_slice(&code.to_be_bytes());
        payload.extend_from_slice(reason.as_bytes());
        let _ = write_frame(&mut self.stream, Opcode::Close, &payload);
        self.teardown();
    }

    /// Echo a CLOSE frame received from the peer and shut down.
    fn acknowledge_close(&mut self, payload: &[u8]) {
        if !self.open {
            return;
        }
        let _ = write_frame(&mut self.stream, Opcode::Close, payload);
        self.teardown();
    }

    /// Mark closed without sending anything (error paths).
    fn abort(&mut self) {
        if self.open {
            self.teardown();
        }
    }

    fn teardown(&mut self) {
        self.open = false;
        let _ = self.stream.shutdown(Shutdown::Both);
    }

    fn send_frame(&mut self, opcode: Opcode, payload: &[u8]) {
        if !self.open {
            return;
        }
        if write_frame(&mut self.stream, opcode, payload).is_err() {
            self.teardown();
        }
    }

    fn send_control(&mut self, opcode: Opcode, payload: &[u8]) -> Result<(), FrameError> {
        if payload.len() > 125 {
            return Err(FrameError::Protocol(
                "control frame payload exceeds 125 bytes",
            ));
        }
        self.send_frame(opcode, payload);
        Ok(())
    }
}

fn truncate_utf8(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Drive one upgraded connection until it ends.
///
/// Runs on its own thread. Frames are dispatched by opcode: text and binary
/// messages reach the callbacks, pings are answered automatically, pongs and
/// continuations are ignored, and a peer CLOSE is echoed before the socket
/// shuts down. The close callback runs exactly once no matter how the loop
/// ended, including callback panics.
pub fn run_websocket(mut conn: WebSocketConnection, handlers: &WebSocketHandlers) {
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        if let Some(cb) = &handlers.on_connect {
            cb(&mut conn);
        }
        message_loop(&mut conn, handlers);
    }));
    if outcome.is_err() {
        log_warn!("websocket callback panicked; closing connection");
    }

    conn.abort();
    if let Some(cb) = &handlers.on_close {
        let close_outcome = catch_unwind(AssertUnwindSafe(|| cb(&mut conn)));
        if close_outcome.is_err() {
            log_warn!("websocket close callback panicked");
        }
    }
}

fn message_loop(conn: &mut WebSocketConnection, handlers: &WebSocketHandlers) {
    while conn.is_open() {
        let frame = match read_frame(&mut conn.stream) {
            Ok(frame) => frame,
            Err(e) => {
                log_debug!("websocket receive failed: {e}");
                return;
            }
        };
        match frame.opcode {
            Opcode::Text => {
                let Ok(text) = std::str::from_utf8(&frame.payload) else {
                    log_debug!("websocket text frame with invalid utf-8");
                    return;
                };
                if let Some(cb) = &handlers.on_message {
                    cb(conn, text);
                }
            }
            Opcode::Binary => {
                if let Some(cb) = &handlers.on_binary {
                    cb(conn, &frame.payload);
                }
            }
            Opcode::Ping => {
                // Answered here; never delivered to the application.
                let _ = conn.pong(&frame.payload);
            }
            Opcode::Pong | Opcode::Continuation => {}
            Opcode::Close => {
                conn.acknowledge_close(&frame.payload);
                return;
            }
        }
    }
}

// ============================================================================
// SHA-1 (RFC 3174), local implementation for the handshake only
// ============================================================================

fn sha1(data: &[u8]) -> [u8; 20] {
    let mut state: [u32; 5] = [
        0x6745_2301,
        0xEFCD_AB89,
        0x98BA_DCFE,
        0x1032_5476,
        0xC3D2_E1F0,
    ];

    let bit_len = (data.len() as u64) * 8;
    let mut message = data.to_vec();
    message.push(0x80);
    while message.len() % 64 != 56 {
        message.push(0);
    }
    message.extend_from_slice(&bit_len.to_be_bytes());

    for block in message.chunks_exact(64) {
        sha1_compress(&mut state, block);
    }

    let mut digest = [0u8; 20];
    for (i, word) in state.iter().enumerate() {
        digest[i * 4..i * 4 + 4].copy_from_slice(&word.to_be_bytes());
    }
    digest
}

fn sha1_compress(state: &mut [u32; 5], block: &[u8]) {
    let mut schedule = [0u32; 80];
    for (i, word) in schedule.iter_mut().take(16).enumerate() {
        *word = u32::from_be_bytes([
            block[i * 4],
            block[i * 4 + 1],
            block[i * 4 + 2],
            block[i * 4 + 3],
        ]);
    }
    for i in 16..80 {
        schedule[i] =
            (schedule[i - 3] ^ schedule[i - 8] ^ schedule[i - 14] ^ schedule[i - 16]).rotate_left(1);
    }

    let [mut a, mut b, mut c, mut d, mut e] = *state;
    for (round, &word) in schedule.iter().enumerate() {
        let (f, k) = match round / 20 {
            0 => ((b & c) | (!b & d), 0x5A82_7999u32),
            1 => (b ^ c ^ d, 0x6ED9_EBA1),
            2 => ((b & c) | (b & d) | (c & d), 0x8F1B_BCDC),
            _ => (b ^ c ^ d, 0xCA62_C1D6),
        };
        let next = a
            .rotate_left(5)
            .wrapping_add(f)
            .wrapping_add(e)
            .wrapping_add(k)
            .wrapping_add(word);
        e = d;
        d = c;
        c = b.rotate_left(30);
        b = a;
        a = next;
    }

    state[0] = state[0].wrapping_add(a);
    state[1] = state[1].wrapping_add(b);
    state[2] = state[2].wrapping_add(c);
    state[3] = state[3].wrapping_add(d);
    state[4] = state[4].wrapping_add(e);
}

// ============================================================================
// Base64 (RFC 4648), local implementation for the handshake only
// ============================================================================

const B64_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

fn base64_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len().div_ceil(3) * 4);
    for chunk in data.chunks(3) {
        let mut word = u32::from(chunk[0]) << 16;
        if let Some(&b) = chunk.get(1) {
            word |= u32::from(b) << 8;
        }
        if let Some(&b) = chunk.get(2) {
            word |= u32::from(b);
        }

        out.push(B64_ALPHABET[(word >> 18) as usize & 0x3F] as char);
        out.push(B64_ALPHABET[(word >> 12) as usize & 0x3F] as char);
        out.push(if chunk.len() > 1 {
            B64_ALPHABET[(word >> 6) as usize & 0x3F] as char
        } else {
            '='
        });
        out.push(if chunk.len() > 2 {
            B64_ALPHABET[word as usize & 0x3F] as char
        } else {
            '='
        });
    }
    out
}

fn base64_decode(input: &str) -> Option<Vec<u8>> {
    let bytes = input.as_bytes();
    if bytes.len() % 4 != 0 || bytes.is_empty() {
        return None;
    }
    let padding = bytes.iter().rev().take_while(|&&b| b == b'=').count();
    if padding > 2 {
        return None;
    }

    let mut out = Vec::with_capacity(bytes.len() / 4 * 3);
    for (i, quad) in bytes.chunks_exact(4).enumerate() {
        let last = i == bytes.len() / 4 - 1;
        let mut word = 0u32;
        let mut data_bytes = 3;
        for (j, &b) in quad.iter().enumerate() {
            if b == b'=' {
                // Padding may only appear at the end.
                if !last || j < 2 || quad[j..].iter().any(|&t| t != b'=') {
                    return None;
                }
                data_bytes = j * 6 / 8;
                word <<= 6 * (4 - j) as u32;
                break;
            }
            word = (word << 6) | u32::from(b64_value(b)?);
        }
        out.push((word >> 16) as u8);
        if data_bytes > 1 {
            out.push((word >> 8) as u8);
        }
        if data_bytes > 2 {
            out.push(word as u8);
        }
    }
    Some(out)
}

fn b64_value(b: u8) -> Option<u8> {
    match b {
        b'A'..=b'Z' => Some(b - b'A'),
        b'a'..=b'z' => Some(b - b'a' + 26),
        b'0'..=b'9' => Some(b - b'0' + 52),
        b'+' => Some(62),
        b'/' => Some(63),
        _ => None,
    }
}
