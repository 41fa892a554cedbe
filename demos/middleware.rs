//! Middleware example
//!
//! - Request timing on every route
//! - Token check on the `/api` group only
//! - Recovery turning a panic into a 500

use std::time::Instant;
use trellis::middleware::{from_fn, Middleware, Next, Recovery};
use trellis::{json, Context, Engine, HandlerResult};

// Adds the time spent downstream as a response header
struct Timing;

impl Middleware for Timing {
    fn call(&self, ctx: &mut Context, next: Next) -> HandlerResult {
        let start = Instant::now();
        let result = next.handle(ctx);
        let micros = start.elapsed().as_micros().to_string();
        ctx.set_header("X-Response-Time-Us", &micros);
        result
    }
}

fn main() {
    tracing_subscriber::fmt().init();

    let mut app = Engine::new();
    app.middleware(Timing).middleware(Recovery);

    app.get("/public", |ctx| {
        ctx.string(200, "This is a public endpoint");
        Ok(())
    });

    app.get("/panic", |ctx| {
        let names = vec!["trellis"];
        ctx.string(200, names[100]);
        Ok(())
    });

    let mut protected = app.group("/api");
    protected.middleware(from_fn(|ctx: &mut Context, next: Next| {
        match ctx.request().get_header("Authorization") {
            Some(token) if token.starts_with("Bearer ") => next.handle(ctx),
            _ => {
                ctx.fail(401, "Authentication required");
                Ok(())
            }
        }
    }));
    protected.get("/profile", |ctx| {
        ctx.json(200, &json!({ "name": "User", "email": "user@example.com" }));
        Ok(())
    });

    app.listen("127.0.0.1:3000")
        .expect("Server failed to start");
}
