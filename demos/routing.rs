//! Routing example
//!
//! Shows the pattern syntax and groups:
//! - Static routes
//! - Named parameters (`:name`)
//! - Catch-all parameters (`*filepath`)
//! - Route groups sharing a prefix

use serde::{Deserialize, Serialize};
use trellis::{json, Engine, Method, ServerError};

#[derive(Serialize, Deserialize)]
struct User {
    name: String,
    role: String,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut app = Engine::default();

    app.get("/", |ctx| {
        ctx.string(200, "Welcome to the trellis demo server!");
        Ok(())
    });

    // Route with path parameter
    app.get("/users/:id", |ctx| {
        let body = format!("User ID: {}", ctx.param("id"));
        ctx.string(200, body);
        Ok(())
    });

    // POST request with JSON body
    app.post("/users", |ctx| {
        let user: User = ctx
            .request()
            .body
            .json()
            .ok_or_else(|| ServerError::BadRequest("Invalid JSON body".to_string()))?;
        ctx.json(201, &user);
        Ok(())
    });

    let mut v1 = app.group("/v1");
    v1.get("/status", |ctx| {
        ctx.json(200, &json!({ "status": "operational", "version": "1.0.0" }));
        Ok(())
    });
    v1.get("/assets/*filepath", |ctx| {
        let file = ctx.param("filepath").to_string();
        ctx.json(200, &json!({ "filepath": file }));
        Ok(())
    });

    for node in app.routes(Method::GET) {
        tracing::info!(pattern = node.pattern(), "GET route");
    }

    app.listen("127.0.0.1:3000")
        .expect("Server failed to start")
}
