//! Per-request state and the handler chain cursor.

use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

use crate::handler::{Handler, HandlerResult};
use crate::http::{Method, Request, Response};
use crate::middleware::{Middleware, Next};
use crate::render::Renderer;

/// One entry of a request's chain.
#[derive(Clone)]
pub(crate) enum Link {
    Middleware(Arc<dyn Middleware>),
    Handler(Arc<dyn Handler>),
}

/// Everything a handler sees about the request it is serving.
///
/// A context is built by the engine for a single request and dropped once
/// the chain has finished. Its chain is the matching groups' middleware
/// followed by the route handler (or the not-found handler).
pub struct Context {
    req: Request,
    writer: Response,
    path: String,
    method: Method,
    params: HashMap<String, String>,
    handlers: Vec<Link>,
    // Position of the next chain entry to run.
    cursor: usize,
    renderer: Option<Arc<dyn Renderer>>,
}

impl Context {
    pub(crate) fn new(req: Request, handlers: Vec<Link>, renderer: Option<Arc<dyn Renderer>>) -> Self {
        Self {
            path: req.path.clone(),
            method: req.method.clone(),
            req,
            writer: Response::default(),
            params: HashMap::new(),
            handlers,
            cursor: 0,
            renderer,
        }
    }

    /// Runs the next entry of the chain, if there is one.
    ///
    /// Only one entry is run: continuing past it is that entry's decision.
    /// Once the cursor has left the chain, either because it was exhausted
    /// or because of [`Context::fail`], this is a no-op.
    pub fn next(&mut self) -> HandlerResult {
        let Some(link) = self.handlers.get(self.cursor).cloned() else {
            return Ok(());
        };
        self.cursor += 1;
        match link {
            Link::Middleware(middleware) => middleware.call(self, Next::new()),
            Link::Handler(handler) => handler.handle(self),
        }
    }

    /// True once no further chain entry will run.
    pub fn is_aborted(&self) -> bool {
        self.cursor >= self.handlers.len()
    }

    /// Stops the chain and answers with `{"message": message}`.
    pub fn fail(&mut self, code: u16, message: &str) {
        self.cursor = self.handlers.len();
        self.json(code, &json!({ "message": message }));
    }

    pub fn request(&self) -> &Request {
        &self.req
    }

    pub fn request_mut(&mut self) -> &mut Request {
        &mut self.req
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Value bound to `:key` or `*key` in the matched pattern, empty if unset.
    pub fn param(&self, key: &str) -> &str {
        self.params.get(key).map(String::as_str).unwrap_or("")
    }

    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    /// URL query value, empty if absent.
    pub fn query(&self, key: &str) -> &str {
        self.req.query.get(key).map(String::as_str).unwrap_or("")
    }

    /// Form value for `key`: the url-encoded body first, then the URL query.
    /// Empty if neither has it.
    pub fn post_form(&self, key: &str) -> String {
        self.req
            .body
            .form()
            .ok()
            .and_then(|mut form| form.remove(key))
            .or_else(|| self.req.query.get(key).cloned())
            .unwrap_or_default()
    }

    pub fn status(&mut self, code: u16) {
        self.writer.status(code);
    }

    /// Last status written to the response.
    pub fn status_code(&self) -> u16 {
        self.writer.status
    }

    pub fn set_header(&mut self, key: &str, value: &str) {
        self.writer.header(key, value);
    }

    pub fn response(&self) -> &Response {
        &self.writer
    }

    pub fn string<T: AsRef<str>>(&mut self, code: u16, body: T) {
        self.set_header("Content-Type", "text/plain");
        self.status(code);
        self.writer.write(body.as_ref().as_bytes());
    }

    /// Writes `obj` as JSON. If it cannot be encoded the response becomes a
    /// plain-text 500 carrying the encoder's error.
    pub fn json<T: Serialize + ?Sized>(&mut self, code: u16, obj: &T) {
        match serde_json::to_vec(obj) {
            Ok(bytes) => {
                self.set_header("Content-Type", "application/json");
                self.status(code);
                self.writer.write(&bytes);
            }
            Err(err) => {
                tracing::debug!(error = %err, path = %self.path, "JSON encoding failed");
                self.set_header("Content-Type", "text/plain; charset=utf-8");
                self.set_header("X-Content-Type-Options", "nosniff");
                self.status(500);
                self.writer.write(format!("{}\n", err).as_bytes());
            }
        }
    }

    pub fn data(&mut self, code: u16, data: &[u8]) {
        self.status(code);
        self.writer.write(data);
    }

    /// Renders the named template through the engine's renderer. Rendering
    /// problems are reported with [`Context::fail`].
    pub fn html<T: Serialize + ?Sized>(&mut self, code: u16, name: &str, data: &T) {
        let Some(renderer) = self.renderer.clone() else {
            self.fail(500, "no template renderer installed");
            return;
        };
        let rendered = serde_json::to_value(data)
            .map_err(Into::into)
            .and_then(|value| renderer.render(name, &value));
        match rendered {
            Ok(page) => {
                self.set_header("Content-Type", "text/html");
                self.status(code);
                self.writer.write(page.as_bytes());
            }
            Err(err) => self.fail(500, &err.to_string()),
        }
    }

    pub(crate) fn set_params(&mut self, params: HashMap<String, String>) {
        self.params = params;
    }

    pub(crate) fn push_handler(&mut self, handler: Arc<dyn Handler>) {
        self.handlers.push(Link::Handler(handler));
    }

    /// Drops status and body and puts `headers` in place of the current ones.
    pub(crate) fn reset_response(&mut self, headers: HashMap<String, String>) {
        self.writer.clear();
        self.writer.headers = headers;
    }

    pub(crate) fn into_response(self) -> Response {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ServerError, ServerResult};
    use crate::middleware::from_fn;
    use serde::ser::{Error as _, Serializer};
    use serde_json::Value;
    use std::sync::Mutex;

    fn context(handlers: Vec<Link>) -> Context {
        Context::new(Request::new(Method::GET, "/items/7?sort=asc"), handlers, None)
    }

    fn record(log: &Arc<Mutex<Vec<&'static str>>>, label: &'static str) -> Link {
        let log = Arc::clone(log);
        Link::Middleware(Arc::new(from_fn(move |ctx: &mut Context, next: Next| {
            log.lock().unwrap().push(label);
            let result = next.handle(ctx);
            log.lock().unwrap().push(label);
            result
        })))
    }

    #[test]
    fn next_runs_middleware_around_the_handler() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let inner = Arc::clone(&log);
        let handler: Arc<dyn Handler> = Arc::new(move |ctx: &mut Context| -> HandlerResult {
            inner.lock().unwrap().push("handler");
            ctx.string(200, "done");
            Ok(())
        });
        let mut ctx = context(vec![record(&log, "outer"), record(&log, "inner"), Link::Handler(handler)]);

        ctx.next().unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["outer", "inner", "handler", "inner", "outer"]);
        assert_eq!(ctx.response().body_string(), "done");
    }

    #[test]
    fn skipping_next_stops_the_chain() {
        let gate = Link::Middleware(Arc::new(from_fn(|ctx: &mut Context, _next: Next| {
            ctx.string(403, "closed");
            Ok(())
        })));
        let handler: Arc<dyn Handler> = Arc::new(|_: &mut Context| -> HandlerResult { panic!("must not run") });
        let mut ctx = context(vec![gate, Link::Handler(handler)]);

        ctx.next().unwrap();

        assert_eq!(ctx.status_code(), 403);
        assert_eq!(ctx.response().body_string(), "closed");
    }

    #[test]
    fn fail_moves_the_cursor_past_the_end() {
        let guard = Link::Middleware(Arc::new(from_fn(|ctx: &mut Context, next: Next| {
            ctx.fail(400, "bad");
            next.handle(ctx)
        })));
        let handler: Arc<dyn Handler> = Arc::new(|ctx: &mut Context| -> HandlerResult {
            ctx.string(200, "reached");
            Ok(())
        });
        let mut ctx = context(vec![guard, Link::Handler(handler)]);

        ctx.next().unwrap();

        assert!(ctx.is_aborted());
        assert_eq!(ctx.status_code(), 400);
        assert_eq!(ctx.response().body_string(), r#"{"message":"bad"}"#);
    }

    #[test]
    fn next_on_an_exhausted_chain_is_a_no_op() {
        let mut ctx = context(Vec::new());
        assert!(ctx.is_aborted());
        ctx.next().unwrap();
        assert_eq!(ctx.status_code(), 200);
        assert!(ctx.response().body.is_empty());
    }

    #[test]
    fn handler_errors_propagate_through_next() {
        let handler: Arc<dyn Handler> =
            Arc::new(|_: &mut Context| -> HandlerResult { Err(ServerError::BadRequest("nope".into())) });
        let mut ctx = context(vec![Link::Handler(handler)]);
        let err = ctx.next().unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn params_and_query_default_to_empty() {
        let mut ctx = context(Vec::new());
        ctx.set_params(HashMap::from([("id".to_string(), "7".to_string())]));
        assert_eq!(ctx.param("id"), "7");
        assert_eq!(ctx.param("missing"), "");
        assert_eq!(ctx.query("sort"), "asc");
        assert_eq!(ctx.query("page"), "");
        assert_eq!(ctx.path(), "/items/7");
    }

    #[test]
    fn post_form_reads_urlencoded_bodies() {
        let req = Request::new(Method::POST, "/login").body(crate::http::Body::with_content_type(
            "application/x-www-form-urlencoded",
            b"user=ann&pass=s%3Dcret".to_vec(),
        ));
        let ctx = Context::new(req, Vec::new(), None);
        assert_eq!(ctx.post_form("user"), "ann");
        assert_eq!(ctx.post_form("pass"), "s=cret");
        assert_eq!(ctx.post_form("other"), "");
    }

    #[test]
    fn post_form_falls_back_to_the_query() {
        let req = Request::new(Method::POST, "/login?user=query&next=%2Fhome").body(
            crate::http::Body::with_content_type("application/x-www-form-urlencoded", b"user=body".to_vec()),
        );
        let ctx = Context::new(req, Vec::new(), None);
        assert_eq!(ctx.post_form("user"), "body");
        assert_eq!(ctx.post_form("next"), "/home");
        assert_eq!(ctx.post_form("missing"), "");
    }

    struct Unencodable;

    impl Serialize for Unencodable {
        fn serialize<S: Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("cannot encode this value"))
        }
    }

    #[test]
    fn json_encoding_failure_becomes_plain_500() {
        let mut ctx = context(Vec::new());
        ctx.json(200, &Unencodable);
        assert_eq!(ctx.status_code(), 500);
        assert_eq!(ctx.response().get_header("content-type"), Some("text/plain; charset=utf-8"));
        assert_eq!(ctx.response().body_string(), "cannot encode this value\n");
    }

    #[test]
    fn json_sets_content_type() {
        let mut ctx = context(Vec::new());
        ctx.json(201, &json!({ "id": 7 }));
        assert_eq!(ctx.status_code(), 201);
        assert_eq!(ctx.response().get_header("Content-Type"), Some("application/json"));
        assert_eq!(ctx.response().body_string(), r#"{"id":7}"#);
    }

    #[test]
    fn data_writes_raw_bytes() {
        let mut ctx = context(Vec::new());
        ctx.data(206, &[0, 159, 146, 150]);
        assert_eq!(ctx.status_code(), 206);
        assert_eq!(ctx.response().body, vec![0, 159, 146, 150]);
    }

    fn greeting(name: &str, data: &Value) -> ServerResult<String> {
        match name {
            "hello.html" => Ok(format!("<p>Hello {}</p>", data["name"].as_str().unwrap_or("stranger"))),
            other => Err(ServerError::RenderError(format!("template {} not found", other))),
        }
    }

    #[test]
    fn html_renders_through_the_renderer() {
        let mut ctx = Context::new(Request::new(Method::GET, "/"), Vec::new(), Some(Arc::new(greeting)));
        ctx.html(200, "hello.html", &json!({ "name": "Ada" }));
        assert_eq!(ctx.response().get_header("Content-Type"), Some("text/html"));
        assert_eq!(ctx.response().body_string(), "<p>Hello Ada</p>");
    }

    #[test]
    fn html_failures_go_through_fail() {
        let mut ctx = Context::new(Request::new(Method::GET, "/"), Vec::new(), Some(Arc::new(greeting)));
        ctx.html(200, "missing.html", &json!({}));
        assert!(ctx.is_aborted());
        assert_eq!(ctx.status_code(), 500);
        assert_eq!(
            ctx.response().body_string(),
            r#"{"message":"Render error: template missing.html not found"}"#
        );
    }

    #[test]
    fn html_without_renderer_fails() {
        let mut ctx = context(Vec::new());
        ctx.html(200, "index.html", &json!({}));
        assert_eq!(ctx.status_code(), 500);
    }
}
