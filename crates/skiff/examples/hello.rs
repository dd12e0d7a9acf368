//! Minimal skiff application: a few routes, a path parameter, a redirect.
//!
//! ```bash
//! cargo run --example hello
//! curl http://localhost:8080/
//! curl http://localhost:8080/greet/world?loud=1
//! ```

use skiff::{App, LogConfig, LogLevel, Response};

fn main() {
    skiff::logging::init(LogConfig::new().level(LogLevel::Debug));

    let mut app = App::new(8080);
    app.get("/", |_ctx| {
        Response::html("<h1>hello from skiff</h1><p>try <a href=\"/greet/world\">/greet/world</a></p>")
    });
    app.get("/greet/:name", |ctx| {
        let name = ctx.param("name").unwrap_or("stranger");
        let greeting = if ctx.query_param("loud").is_some() {
            format!("HELLO, {}!", name.to_uppercase())
        } else {
            format!("hello, {name}")
        };
        Response::text(greeting)
    });
    app.get("/home", |_ctx| Response::permanent_redirect("/"));

    if let Err(e) = app.run() {
        eprintln!("server failed to start: {e}");
        std::process::exit(1);
    }
}
