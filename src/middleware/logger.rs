use std::time::Instant;

use crate::context::Context;
use crate::handler::HandlerResult;
use crate::middleware::{Middleware, Next};

/// Logs one line per request once the downstream chain has finished.
#[derive(Clone, Copy, Debug, Default)]
pub struct Logger;

impl Middleware for Logger {
    fn call(&self, ctx: &mut Context, next: Next) -> HandlerResult {
        let start = Instant::now();
        let result = next.handle(ctx);
        let elapsed = start.elapsed();

        match &result {
            Ok(()) => tracing::info!(
                status = ctx.status_code(),
                method = %ctx.method(),
                path = %ctx.path(),
                elapsed = ?elapsed,
                "request completed"
            ),
            Err(err) => tracing::warn!(
                status = err.status_code(),
                method = %ctx.method(),
                path = %ctx.path(),
                elapsed = ?elapsed,
                error = %err,
                "request failed"
            ),
        }
        result
    }
}
