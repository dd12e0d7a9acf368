//! In-memory REST API.
//!
//! Handlers run concurrently on the worker pool, so the shared store lives
//! behind a lock owned by the application — skiff does not serialize
//! handler invocation.
//!
//! ```bash
//! cargo run --example rest_api
//! curl -X POST -d 'ada' http://localhost:8080/users
//! curl http://localhost:8080/users/1
//! ```

use parking_lot::Mutex;
use serde::Serialize;
use skiff::{App, Response, StatusCode};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
struct User {
    id: u64,
    name: String,
}

#[derive(Default)]
struct Store {
    next_id: u64,
    users: Vec<User>,
}

fn main() {
    skiff::logging::init(skiff::LogConfig::new());

    let store = Arc::new(Mutex::new(Store::default()));
    let mut app = App::new(8080);

    {
        let store = Arc::clone(&store);
        app.get("/users", move |_ctx| {
            let store = store.lock();
            Response::json(serde_json::to_string(&store.users).unwrap_or_default())
        });
    }

    {
        let store = Arc::clone(&store);
        app.post("/users", move |ctx| {
            let name = ctx.body.trim();
            if name.is_empty() {
                return Response::json(r#"{"error":"empty name"}"#)
                    .status(StatusCode::BAD_REQUEST);
            }
            let mut store = store.lock();
            store.next_id += 1;
            let user = User {
                id: store.next_id,
                name: name.to_string(),
            };
            store.users.push(user.clone());
            Response::json(serde_json::to_string(&user).unwrap_or_default())
                .status(StatusCode::CREATED)
        });
    }

    {
        let store = Arc::clone(&store);
        app.get("/users/:id", move |ctx| {
            let id: u64 = match ctx.param("id").and_then(|v| v.parse().ok()) {
                Some(id) => id,
                None => {
                    return Response::json(r#"{"error":"bad id"}"#)
                        .status(StatusCode::BAD_REQUEST)
                }
            };
            let store = store.lock();
            match store.users.iter().find(|u| u.id == id) {
                Some(user) => {
                    Response::json(serde_json::to_string(user).unwrap_or_default())
                }
                None => Response::json(r#"{"error":"no such user"}"#)
                    .status(StatusCode::NOT_FOUND),
            }
        });
    }

    {
        let store = Arc::clone(&store);
        app.delete("/users/:id", move |ctx| {
            let id: Option<u64> = ctx.param("id").and_then(|v| v.parse().ok());
            let mut store = store.lock();
            let before = store.users.len();
            if let Some(id) = id {
                store.users.retain(|u| u.id != id);
            }
            if store.users.len() < before {
                Response::text("").status(StatusCode::NO_CONTENT)
            } else {
                Response::json(r#"{"error":"no such user"}"#).status(StatusCode::NOT_FOUND)
            }
        });
    }

    if let Err(e) = app.run() {
        eprintln!("server failed to start: {e}");
        std::process::exit(1);
    }
}
