//! # Trellis
//!
//! A small HTTP routing and middleware-dispatch core.
//!
//! ## Features
//!
//! - Per-method trie router with `:name` and `*name` segments
//! - Route groups sharing a path prefix and a middleware list
//! - Explicit-continuation middleware chains with short-circuiting
//! - Panic recovery at a single, explicit boundary
//! - Text, JSON, raw and templated responses
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use trellis::Engine;
//!
//! let mut engine = Engine::default();
//!
//! engine.get("/hello/:name", |ctx| {
//!     let body = format!("hello {}\n", ctx.param("name"));
//!     ctx.string(200, body);
//!     Ok(())
//! });
//!
//! let mut v1 = engine.group("/v1");
//! v1.get("/assets/*filepath", |ctx| {
//!     let file = ctx.param("filepath").to_string();
//!     ctx.json(200, &trellis::json!({ "file": file }));
//!     Ok(())
//! });
//!
//! engine.listen("127.0.0.1:9999").unwrap();
//! ```

pub mod app;
pub mod config;
pub mod context;
pub mod error;
pub mod handler;
pub mod http;
pub mod middleware;
pub mod render;
pub mod router;

pub use app::Engine;
pub use config::ServerConfig;
pub use context::Context;
pub use error::{ConfigError, ServerError, ServerResult};
pub use handler::{Handler, HandlerResult};
pub use http::{Body, Method, Request, Response};
pub use router::{Node, Router, RouterGroup};

pub use serde_json::{json, Value};
