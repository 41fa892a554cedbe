//! A minimal "Hello, World!" server.
//!
//! Responds with "Hello, World!" on `/` and 404 everywhere else.

use trellis::Engine;

fn main() {
    tracing_subscriber::fmt().init();

    let mut app = Engine::default();

    app.get("/", |ctx| {
        ctx.string(200, "Hello, World!");
        Ok(())
    });

    app.listen("127.0.0.1:3000")
        .expect("Server failed to start");
}
