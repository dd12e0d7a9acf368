//! Static file server with directory listings.
//!
//! Serves the current directory under `/files` and falls back to a small
//! landing page. Paths that try to escape the mount root get a 403.
//!
//! ```bash
//! cargo run --example file_server
//! curl http://localhost:8080/files/
//! ```

use skiff::{App, Response};

fn main() {
    skiff::logging::init(skiff::LogConfig::new());

    let mut app = App::new(8080);
    app.get("/", |_ctx| {
        Response::html("<h1>file server</h1><p>browse <a href=\"/files\">/files</a></p>")
    });
    app.use_static("/files", ".", true);

    if let Err(e) = app.run() {
        eprintln!("server failed to start: {e}");
        std::process::exit(1);
    }
}
