//! Wire layer for the skiff application server.
//!
//! This crate owns everything that touches a socket:
//! - [`parser`] — HTTP/1.1 request parsing off a blocking stream
//! - [`writer`] — response serialization and the keep-alive gate
//! - [`frame`] — the RFC 6455 frame codec
//! - [`websocket`] — upgrade handshake, connections and routes
//! - [`pool`] — the fixed worker pool behind the accept loop
//! - [`App`] — the facade applications build against
//!
//! The concurrency model is deliberately plain: blocking I/O, one worker
//! per in-flight connection, and one dedicated thread per upgraded
//! WebSocket. Route tables and mounts are immutable once [`App::run`]
//! starts and are shared across workers without locking.

#![forbid(unsafe_code)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::missing_errors_doc)]

mod app;
mod connection;
pub mod frame;
pub mod parser;
pub mod pool;
pub mod websocket;
pub mod writer;

pub use app::{App, Handler, ServerConfig};
pub use frame::{Frame, FrameError, Opcode};
pub use parser::{ParseError, ReadError};
pub use pool::WorkerPool;
pub use websocket::{WebSocketConnection, WebSocketHandlers, WebSocketRoute};
