//! skiff — a small, self-contained HTTP/1.1 application server with
//! integrated WebSocket support.
//!
//! skiff serves HTTP with blocking I/O on a fixed worker pool: requests are
//! parsed off the wire, dispatched to handlers registered by method and
//! `:param` path pattern, and static files are served from mounted
//! directories as a fallback. Eligible requests are upgraded to RFC 6455
//! WebSockets, after which the socket belongs to a dedicated worker.
//!
//! # Quick start
//!
//! ```no_run
//! use skiff::{App, Response, WebSocketHandlers};
//!
//! let mut app = App::new(8080);
//! app.get("/", |_ctx| Response::html("<h1>hello</h1>"));
//! app.get("/users/:id", |ctx| {
//!     Response::text(format!("user {}", ctx.param("id").unwrap()))
//! });
//! app.websocket(
//!     "/echo",
//!     WebSocketHandlers::new().on_message(|conn, text| conn.send_text(text)),
//! );
//! app.use_static("/assets", "./public", false);
//! app.run().unwrap();
//! ```
//!
//! # Crate structure
//!
//! - [`skiff_core`] — requests, responses, routing, static mounts, logging
//! - [`skiff_http`] — parser, writer, frame codec, worker pool, the `App`
//!
//! Handlers may capture shared state, but skiff never serializes handler
//! invocation: wrap anything mutable in your own lock.

#![forbid(unsafe_code)]

pub use skiff_core as core;
pub use skiff_http as http;

pub use skiff_core::{
    logging, mime_type_for_extension, ContentKind, Headers, LogConfig, LogLevel, Method,
    MountTable, PatternError, Request, RequestContext, Response, RoutePattern, RouteTable,
    StatusCode,
};
pub use skiff_core::{log_debug, log_error, log_info, log_warn};
pub use skiff_http::{
    App, Frame, FrameError, Handler, Opcode, ServerConfig, WebSocketConnection,
    WebSocketHandlers,
};
