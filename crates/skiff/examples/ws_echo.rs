//! WebSocket echo with per-room greetings.
//!
//! ```bash
//! cargo run --example ws_echo
//! # then, from a browser console:
//! #   const ws = new WebSocket("ws://localhost:8080/ws/lobby");
//! #   ws.onmessage = (m) => console.log(m.data);
//! #   ws.send("hi");
//! ```

use skiff::{App, Response, WebSocketHandlers};

fn main() {
    skiff::logging::init(skiff::LogConfig::new());

    let mut app = App::new(8080);
    app.get("/", |_ctx| {
        Response::html(
            "<h1>ws_echo</h1>\
             <p>connect a WebSocket to <code>/ws/&lt;room&gt;</code></p>",
        )
    });
    app.websocket(
        "/ws/:room",
        WebSocketHandlers::new()
            .on_connect(|conn| {
                let room = conn.param("room").unwrap_or("?").to_string();
                conn.send_text(&format!("welcome to {room}"));
            })
            .on_message(|conn, text| {
                if text == "/quit" {
                    conn.close();
                } else {
                    conn.send_text(text);
                }
            })
            .on_binary(|conn, bytes| conn.send_binary(bytes))
            .on_close(|conn| {
                let room = conn.param("room").unwrap_or("?");
                skiff::log_info!("connection to {room} closed");
            }),
    );

    if let Err(e) = app.run() {
        eprintln!("server failed to start: {e}");
        std::process::exit(1);
    }
}
