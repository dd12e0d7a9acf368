//! Application facade: configuration, registration, and the accept loop.
//!
//! ```no_run
//! use skiff_http::App;
//! use skiff_core::Response;
//!
//! let mut app = App::new(8080);
//! app.get("/", |_ctx| Response::html("<h1>hi</h1>"));
//! app.run().unwrap();
//! ```

use crate::connection::handle_connection;
use crate::pool::{ConnectionFn, WorkerPool, DEFAULT_WORKERS};
use crate::websocket::{WebSocketHandlers, WebSocketRoute};
use skiff_core::routing::RoutePattern;
use skiff_core::{log_info, log_warn};
use skiff_core::{Method, MountTable, RequestContext, Response, RouteTable};
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// A registered route handler.
pub type Handler = Arc<dyn Fn(&mut RequestContext) -> Response + Send + Sync>;

/// Listener and pool configuration. Everything is programmatic; there are
/// no environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind on all interfaces.
    pub port: u16,
    /// Worker threads consuming accepted sockets.
    pub workers: usize,
    /// Receive timeout applied to each accepted socket; bounds how long an
    /// idle keep-alive connection can hold a worker.
    pub receive_timeout: Duration,
    /// Listen backlog.
    pub backlog: i32,
    /// `SO_RCVBUF` for the listener.
    pub recv_buffer_size: usize,
    /// `SO_SNDBUF` for the listener.
    pub send_buffer_size: usize,
}

impl ServerConfig {
    /// Defaults: 8 workers, 5 s receive timeout, backlog 2048, 256 KiB
    /// socket buffers.
    #[must_use]
    pub fn new(port: u16) -> Self {
        Self {
            port,
            workers: DEFAULT_WORKERS,
            receive_timeout: Duration::from_secs(5),
            backlog: 2048,
            recv_buffer_size: 256 * 1024,
            send_buffer_size: 256 * 1024,
        }
    }

    /// Set the worker count.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the per-socket receive timeout.
    #[must_use]
    pub fn with_receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout = timeout;
        self
    }

    /// Set the listen backlog.
    #[must_use]
    pub fn with_backlog(mut self, backlog: i32) -> Self {
        self.backlog = backlog;
        self
    }
}

/// Everything the connection handler needs to route a request. Read-only
/// once `run` starts; shared freely across workers.
#[derive(Default)]
pub(crate) struct AppRouting {
    pub(crate) routes: RouteTable<Handler>,
    pub(crate) websocket_routes: Vec<WebSocketRoute>,
    pub(crate) mounts: MountTable,
}

/// The application: owns the configuration, route tables, static mounts,
/// and (once running) the listener and worker pool.
///
/// Registration methods panic on malformed patterns — a bad pattern is a
/// programmer error caught at startup, not a runtime condition.
pub struct App {
    config: ServerConfig,
    routing: AppRouting,
}

impl App {
    /// An app listening on `port` with default configuration.
    #[must_use]
    pub fn new(port: u16) -> Self {
        Self::with_config(ServerConfig::new(port))
    }

    /// An app with explicit configuration.
    #[must_use]
    pub fn with_config(config: ServerConfig) -> Self {
        Self {
            config,
            routing: AppRouting::default(),
        }
    }

    /// The configuration this app was built with.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    fn route<H>(&mut self, method: Method, path: &str, handler: H) -> &mut Self
    where
        H: Fn(&mut RequestContext) -> Response + Send + Sync + 'static,
    {
        let handler: Handler = Arc::new(handler);
        if let Err(e) = self.routing.routes.add(method, path, handler) {
            panic!("cannot register route {path:?}: {e}");
        }
        self
    }

    /// Register a GET route.
    pub fn get<H>(&mut self, path: &str, handler: H) -> &mut Self
    where
        H: Fn(&mut RequestContext) -> Response + Send + Sync + 'static,
    {
        self.route(Method::Get, path, handler)
    }

    /// Register a POST route.
    pub fn post<H>(&mut self, path: &str, handler: H) -> &mut Self
    where
        H: Fn(&mut RequestContext) -> Response + Send + Sync + 'static,
    {
        self.route(Method::Post, path, handler)
    }

    /// Register a PUT route.
    pub fn put<H>(&mut self, path: &str, handler: H) -> &mut Self
    where
        H: Fn(&mut RequestContext) -> Response + Send + Sync + 'static,
    {
        self.route(Method::Put, path, handler)
    }

    /// Register a PATCH route.
    pub fn patch<H>(&mut self, path: &str, handler: H) -> &mut Self
    where
        H: Fn(&mut RequestContext) -> Response + Send + Sync + 'static,
    {
        self.route(Method::Patch, path, handler)
    }

    /// Register a DELETE route.
    pub fn delete<H>(&mut self, path: &str, handler: H) -> &mut Self
    where
        H: Fn(&mut RequestContext) -> Response + Send + Sync + 'static,
    {
        self.route(Method::Delete, path, handler)
    }

    /// Register a WebSocket route. Upgrade requests whose path matches the
    /// pattern are handed off to a dedicated connection worker.
    pub fn websocket(&mut self, path: &str, handlers: WebSocketHandlers) -> &mut Self {
        match RoutePattern::compile(path) {
            Ok(pattern) => self
                .routing
                .websocket_routes
                .push(WebSocketRoute { pattern, handlers }),
            Err(e) => panic!("cannot register websocket route {path:?}: {e}"),
        }
        self
    }

    /// Mount a filesystem directory under a URL prefix. Consulted, in
    /// registration order, for GET requests no route claimed.
    pub fn use_static(
        &mut self,
        prefix: &str,
        root: impl Into<PathBuf>,
        list_directories: bool,
    ) -> &mut Self {
        self.routing.mounts.add(prefix, root, list_directories);
        self
    }

    /// Bind the listener and serve until the process exits.
    ///
    /// Returns only if binding fails; accept errors are logged and the loop
    /// keeps going.
    pub fn run(self) -> io::Result<()> {
        let App { config, routing } = self;
        let listener = bind_listener(&config)?;
        log_info!(
            "listening on port {} with {} workers",
            config.port,
            config.workers
        );

        let routing = Arc::new(routing);
        let connection: ConnectionFn = {
            let routing = Arc::clone(&routing);
            Arc::new(move |stream: TcpStream| handle_connection(stream, &routing))
        };
        let pool = WorkerPool::new(config.workers, connection);

        loop {
            match listener.accept() {
                Ok((stream, _peer)) => {
                    if let Err(e) = prepare_stream(&stream, &config) {
                        log_warn!("could not set socket options: {e}");
                    }
                    pool.execute(stream);
                }
                Err(e) => log_warn!("accept failed: {e}"),
            }
        }
    }
}

/// Build the listener with the documented socket options: `SO_REUSEADDR`,
/// 256 KiB receive/send buffers, and the configured backlog.
fn bind_listener(config: &ServerConfig) -> io::Result<TcpListener> {
    let address = SocketAddr::from(([0, 0, 0, 0], config.port));
    let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_recv_buffer_size(config.recv_buffer_size)?;
    socket.set_send_buffer_size(config.send_buffer_size)?;
    socket.bind(&address.into())?;
    socket.listen(config.backlog)?;
    Ok(socket.into())
}

/// Options applied to each accepted socket.
fn prepare_stream(stream: &TcpStream, config: &ServerConfig) -> io::Result<()> {
    stream.set_nodelay(true)?;
    stream.set_read_timeout(Some(config.receive_timeout))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = ServerConfig::new(8080);
        assert_eq!(config.port, 8080);
        assert_eq!(config.workers, 8);
        assert_eq!(config.receive_timeout, Duration::from_secs(5));
        assert_eq!(config.backlog, 2048);
        assert_eq!(config.recv_buffer_size, 262_144);
        assert_eq!(config.send_buffer_size, 262_144);
    }

    #[test]
    fn config_builders() {
        let config = ServerConfig::new(9000)
            .with_workers(2)
            .with_receive_timeout(Duration::from_millis(250))
            .with_backlog(16);
        assert_eq!(config.workers, 2);
        assert_eq!(config.receive_timeout, Duration::from_millis(250));
        assert_eq!(config.backlog, 16);
    }

    #[test]
    fn registration_fills_tables() {
        let mut app = App::new(0);
        app.get("/", |_| Response::text("root"))
            .post("/api", |_| Response::text("api"))
            .websocket("/ws/:room", WebSocketHandlers::new())
            .use_static("/files", ".", false);

        assert_eq!(app.routing.routes.len(), 2);
        assert_eq!(app.routing.websocket_routes.len(), 1);
        assert_eq!(app.routing.mounts.len(), 1);
    }

    #[test]
    #[should_panic(expected = "duplicate route parameter")]
    fn duplicate_params_are_rejected_at_registration() {
        let mut app = App::new(0);
        app.get("/a/:id/b/:id", |_| Response::text("never"));
    }

    #[test]
    #[should_panic(expected = "cannot register websocket route")]
    fn malformed_websocket_pattern_is_rejected() {
        let mut app = App::new(0);
        app.websocket("no-leading-slash", WebSocketHandlers::new());
    }
}
