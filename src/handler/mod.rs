use crate::context::Context;
use crate::error::ServerResult;

/// Outcome of running a handler or a middleware.
///
/// `Ok(())` means the handler wrote whatever response it wanted. An `Err`
/// that escapes the whole chain is turned into an error response by the
/// dispatcher.
pub type HandlerResult = ServerResult<()>;

/// The final entry of a request's chain.
pub trait Handler: Send + Sync + 'static {
    fn handle(&self, ctx: &mut Context) -> HandlerResult;
}

impl<F> Handler for F
where
    F: Fn(&mut Context) -> HandlerResult + Send + Sync + 'static,
{
    fn handle(&self, ctx: &mut Context) -> HandlerResult {
        (self)(ctx)
    }
}
