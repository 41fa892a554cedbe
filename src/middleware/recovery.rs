use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::context::Context;
use crate::error::{ServerError, ServerResult};
use crate::handler::HandlerResult;
use crate::middleware::{Middleware, Next};

/// Runs `f`, turning a panic into [`ServerError::PanicError`].
pub fn catch_panic<T, F>(f: F) -> ServerResult<T>
where
    F: FnOnce() -> T,
{
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| ServerError::PanicError(panic_message(payload.as_ref())))
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "Unknown panic".to_string()
    }
}

/// Fault boundary for everything downstream of it.
///
/// A panic raised further down the chain is logged with its message and
/// answered with `500 {"message":"Internal Server Error"}`; the panic detail
/// never reaches the client. Headers already set when the chain reached
/// `Recovery` are kept, anything written downstream is dropped.
#[derive(Clone, Copy, Debug, Default)]
pub struct Recovery;

impl Middleware for Recovery {
    fn call(&self, ctx: &mut Context, next: Next) -> HandlerResult {
        let upstream_headers = ctx.response().headers.clone();
        match catch_panic(|| next.handle(ctx)) {
            Ok(result) => result,
            Err(err) => {
                tracing::error!(
                    method = %ctx.method(),
                    path = %ctx.path(),
                    error = %err,
                    "recovered from panic in handler chain"
                );
                ctx.reset_response(upstream_headers);
                ctx.fail(500, "Internal Server Error");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catch_panic_passes_values_through() {
        assert_eq!(catch_panic(|| 41 + 1).unwrap(), 42);
    }

    #[test]
    fn catch_panic_reports_the_message() {
        let err = catch_panic(|| -> () { panic!("index out of range") }).unwrap_err();
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.to_string(), "Panic: index out of range");
    }

    #[test]
    fn recovery_answers_a_panicking_chain_with_500() {
        use crate::context::Link;
        use crate::handler::Handler;
        use crate::http::{Method, Request};
        use std::sync::Arc;

        let handler: Arc<dyn Handler> = Arc::new(|ctx: &mut Context| -> HandlerResult {
            ctx.string(200, "half written");
            let empty: Vec<u8> = Vec::new();
            ctx.data(200, &[empty[3]]);
            Ok(())
        });
        let chain = vec![Link::Middleware(Arc::new(Recovery)), Link::Handler(handler)];
        let mut ctx = Context::new(Request::new(Method::GET, "/panic"), chain, None);

        ctx.next().unwrap();

        assert!(ctx.is_aborted());
        assert_eq!(ctx.status_code(), 500);
        assert_eq!(ctx.response().body_string(), r#"{"message":"Internal Server Error"}"#);
    }

    #[test]
    fn recovery_keeps_headers_set_before_it() {
        use crate::context::Link;
        use crate::handler::Handler;
        use crate::http::{Method, Request};
        use crate::middleware::from_fn;
        use std::sync::Arc;

        let cors = from_fn(|ctx: &mut Context, next: Next| {
            ctx.set_header("Access-Control-Allow-Origin", "*");
            next.handle(ctx)
        });
        let handler: Arc<dyn Handler> = Arc::new(|ctx: &mut Context| -> HandlerResult {
            ctx.set_header("X-Partial", "yes");
            panic!("gave up halfway");
        });
        let chain = vec![
            Link::Middleware(Arc::new(cors)),
            Link::Middleware(Arc::new(Recovery)),
            Link::Handler(handler),
        ];
        let mut ctx = Context::new(Request::new(Method::GET, "/cors"), chain, None);

        ctx.next().unwrap();

        let res = ctx.response();
        assert_eq!(res.status, 500);
        assert_eq!(res.get_header("access-control-allow-origin"), Some("*"));
        assert_eq!(res.get_header("x-partial"), None);
        assert_eq!(res.get_header("content-type"), Some("application/json"));
    }

    #[test]
    fn formatted_panics_are_captured() {
        let idx = 100;
        let err = catch_panic(|| -> () { panic!("bad index {}", idx) }).unwrap_err();
        assert!(matches!(err, ServerError::PanicError(ref msg) if msg == "bad index 100"));
    }
}
