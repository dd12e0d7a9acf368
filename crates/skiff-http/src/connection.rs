//! Per-connection state machine.
//!
//! A worker runs one connection at a time: parse a request, maybe divert
//! into the WebSocket upgrade path (after which the socket never comes
//! back), otherwise dispatch to a route handler or the static mounts, write
//! the response, and loop while keep-alive holds.

use crate::app::AppRouting;
use crate::parser::{keep_alive_requested, read_request, upgrade_requested};
use crate::websocket::{
    accept_key, find_route, handshake_response, run_websocket, WebSocketConnection,
};
use crate::writer::{connection_persists, write_response};
use skiff_core::static_files::not_found;
use skiff_core::{log_debug, log_error, log_info};
use skiff_core::{Method, Request, RequestContext, Response, StatusCode};
use std::collections::HashMap;
use std::io::Write;
use std::net::TcpStream;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// What happened to the socket when an upgrade was attempted.
enum UpgradeOutcome {
    /// The socket now belongs to a WebSocket worker (or died trying).
    Taken,
    /// No matching route or unusable key; continue as plain HTTP.
    Declined(TcpStream),
}

/// Serve one connection until it closes or is handed off.
pub(crate) fn handle_connection(stream: TcpStream, routing: &AppRouting) {
    let mut stream = stream;
    loop {
        let request = match read_request(&mut stream) {
            Ok(request) => request,
            Err(e) => {
                // Parse errors and short reads both end the connection
                // without a response.
                log_debug!("closing connection: {e}");
                return;
            }
        };
        let keep_requested = keep_alive_requested(&request);

        if upgrade_requested(&request) {
            match try_upgrade(stream, &request, routing) {
                UpgradeOutcome::Taken => return,
                UpgradeOutcome::Declined(returned) => stream = returned,
            }
        }

        let response = dispatch(&request, routing);
        let include_body = request.method != Method::Head;
        let persist = connection_persists(keep_requested, response.status_code());

        if let Err(e) = write_response(&mut stream, &response, persist, include_body) {
            log_error!(
                "write failed for {} {}: {e}",
                request.method,
                request.path
            );
            return;
        }
        log_info!(
            "{} {} -> {}",
            request.method,
            request.path,
            response.status_code().as_u16()
        );

        if !persist {
            return;
        }
    }
}

/// Attempt the RFC 6455 upgrade. On success the 101 response has been sent
/// and a dedicated thread owns the socket.
fn try_upgrade(mut stream: TcpStream, request: &Request, routing: &AppRouting) -> UpgradeOutcome {
    let Some((route, params)) = find_route(&routing.websocket_routes, &request.path) else {
        return UpgradeOutcome::Declined(stream);
    };
    let key = request.headers.get("sec-websocket-key").unwrap_or("");
    let accept = match accept_key(key) {
        Ok(accept) => accept,
        Err(e) => {
            log_debug!("websocket upgrade for {} declined: {e}", request.path);
            return UpgradeOutcome::Declined(stream);
        }
    };

    if stream
        .write_all(handshake_response(&accept).as_bytes())
        .is_err()
    {
        return UpgradeOutcome::Taken;
    }

    // Upgraded sockets are long-lived; the idle keep-alive timeout no
    // longer applies.
    let _ = stream.set_read_timeout(None);

    log_info!("websocket upgrade on {}", request.path);
    let handlers = route.handlers.clone();
    let params: HashMap<String, String> = params.into_iter().collect();
    let spawned = std::thread::Builder::new()
        .name("skiff-websocket".to_string())
        .spawn(move || {
            run_websocket(WebSocketConnection::new(stream, params), &handlers);
        });
    if spawned.is_err() {
        log_error!("failed to spawn websocket worker");
    }
    UpgradeOutcome::Taken
}

/// Route a request to its handler, falling back to static mounts on GET
/// misses.
fn dispatch(request: &Request, routing: &AppRouting) -> Response {
    let mut ctx = RequestContext::from_request(request);

    if let Some((handler, params)) = routing.routes.lookup(request.method, &request.path) {
        ctx.params.extend(params);
        return match catch_unwind(AssertUnwindSafe(|| handler(&mut ctx))) {
            Ok(response) => response,
            Err(_) => {
                log_error!("handler panicked for {} {}", request.method, request.path);
                Response::text("500 Internal Server Error")
                    .status(StatusCode::INTERNAL_SERVER_ERROR)
            }
        };
    }

    if matches!(request.method, Method::Get | Method::Head) {
        return routing.mounts.serve(&request.path).unwrap_or_else(not_found);
    }
    Response::text("404 Not Found").status(StatusCode::NOT_FOUND)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::Handler;
    use std::sync::Arc;

    fn routing_with(routes: Vec<(Method, &str, Handler)>) -> AppRouting {
        let mut routing = AppRouting::default();
        for (method, path, handler) in routes {
            routing.routes.add(method, path, handler).unwrap();
        }
        routing
    }

    #[test]
    fn dispatch_runs_matching_handler_with_params() {
        let routing = routing_with(vec![(
            Method::Get,
            "/users/:id",
            Arc::new(|ctx: &mut RequestContext| {
                Response::text(format!("user {}", ctx.param("id").unwrap()))
            }),
        )]);

        let request = Request::new(Method::Get, "/users/42");
        let response = dispatch(&request, &routing);
        assert_eq!(response.status_code(), StatusCode::OK);
        assert_eq!(response.body(), b"user 42");
    }

    #[test]
    fn dispatch_non_get_miss_is_a_plaintext_404() {
        let routing = AppRouting::default();
        let request = Request::new(Method::Post, "/nothing");
        let response = dispatch(&request, &routing);
        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(response.body(), b"404 Not Found");
    }

    #[test]
    fn dispatch_get_miss_without_mounts_is_an_empty_404() {
        let routing = AppRouting::default();
        let request = Request::new(Method::Get, "/nothing");
        let response = dispatch(&request, &routing);
        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
        assert!(response.body().is_empty());
    }

    #[test]
    fn dispatch_turns_handler_panics_into_500() {
        let routing = routing_with(vec![(
            Method::Get,
            "/boom",
            Arc::new(|_: &mut RequestContext| panic!("handler bug")),
        )]);

        let request = Request::new(Method::Get, "/boom");
        let response = dispatch(&request, &routing);
        assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.body(), b"500 Internal Server Error");
    }

    #[test]
    fn dispatch_first_registered_route_wins() {
        let routing = routing_with(vec![
            (
                Method::Get,
                "/o/:a",
                Arc::new(|_: &mut RequestContext| Response::text("first")),
            ),
            (
                Method::Get,
                "/o/:b",
                Arc::new(|_: &mut RequestContext| Response::text("second")),
            ),
        ]);

        let request = Request::new(Method::Get, "/o/x");
        assert_eq!(dispatch(&request, &routing).body(), b"first");
    }
}
