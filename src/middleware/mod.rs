//! Middleware and the explicit continuation they receive.
//!
//! A middleware sits in front of the route handler in a request's chain. It
//! receives the request [`Context`] and a [`Next`] token; calling
//! [`Next::handle`] runs the rest of the chain, not calling it short-circuits
//! the request. Work done after `next.handle(ctx)` returns wraps the
//! downstream handlers.
//!
//! ```rust
//! use trellis::middleware::{from_fn, Next};
//! use trellis::{Context, Engine};
//!
//! let mut engine = Engine::new();
//! engine.middleware(from_fn(|ctx: &mut Context, next: Next| {
//!     if ctx.request().get_header("authorization").is_none() {
//!         ctx.fail(401, "Authentication required");
//!         return Ok(());
//!     }
//!     next.handle(ctx)
//! }));
//! ```

mod logger;
mod recovery;

pub use logger::Logger;
pub use recovery::{catch_panic, Recovery};

use crate::context::Context;
use crate::handler::HandlerResult;

/// Continuation into the remainder of the chain.
///
/// Consumed on use, so a middleware can run its downstream at most once.
pub struct Next {
    _private: (),
}

impl Next {
    pub(crate) fn new() -> Self {
        Self { _private: () }
    }

    pub fn handle(self, ctx: &mut Context) -> HandlerResult {
        ctx.next()
    }
}

pub trait Middleware: Send + Sync + 'static {
    fn call(&self, ctx: &mut Context, next: Next) -> HandlerResult;
}

/// Middleware built from a closure, see [`from_fn`].
pub struct FromFn<F> {
    f: F,
}

impl<F> Middleware for FromFn<F>
where
    F: Fn(&mut Context, Next) -> HandlerResult + Send + Sync + 'static,
{
    fn call(&self, ctx: &mut Context, next: Next) -> HandlerResult {
        (self.f)(ctx, next)
    }
}

pub fn from_fn<F>(f: F) -> FromFn<F>
where
    F: Fn(&mut Context, Next) -> HandlerResult + Send + Sync + 'static,
{
    FromFn { f }
}
