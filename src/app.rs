//! The engine ties routing, groups and the listener together.
//!
//! Routes and middleware are registered on a mutable [`Engine`]. Serving
//! consumes the engine, after which the route table is shared read-only
//! between connections.
//!
//! # Examples
//!
//! ```rust,no_run
//! use trellis::Engine;
//!
//! let mut engine = Engine::default();
//! engine.get("/", |ctx| {
//!     ctx.string(200, "hello world\n");
//!     Ok(())
//! });
//! engine.listen("127.0.0.1:9999").unwrap();
//! ```

use serde_json::json;
use std::io;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::runtime::Runtime;
use tokio::sync::Semaphore;

use crate::config::ServerConfig;
use crate::context::{Context, Link};
use crate::error::ServerError;
use crate::handler::HandlerResult;
use crate::http::{Body, Method, Request, Response};
use crate::middleware::{Logger, Middleware, Recovery};
use crate::render::Renderer;
use crate::router::group::Group;
use crate::router::{Node, Router, RouterGroup};

pub struct Engine {
    pub(crate) router: Router,
    // Every group ever created, root first, in creation order.
    pub(crate) groups: Vec<Group>,
    renderer: Option<Arc<dyn Renderer>>,
    config: ServerConfig,
}

impl Default for Engine {
    /// An engine with [`Logger`] and [`Recovery`] installed on the root group.
    fn default() -> Self {
        let mut engine = Engine::new();
        engine.middleware(Logger).middleware(Recovery);
        engine
    }
}

impl Engine {
    /// A bare engine: no middleware, an empty route table.
    pub fn new() -> Self {
        Self {
            router: Router::new(),
            groups: vec![Group::new(String::new(), None)],
            renderer: None,
            config: ServerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub(crate) fn register_group(&mut self, prefix: String, parent: Option<usize>) -> usize {
        tracing::debug!(prefix = %prefix, "Group created");
        self.groups.push(Group::new(prefix, parent));
        self.groups.len() - 1
    }

    /// The group every route and middleware registered on the engine itself
    /// belongs to. Its prefix is empty, so it matches every request.
    pub fn root(&mut self) -> RouterGroup<'_> {
        RouterGroup::new(self, 0)
    }

    pub fn group(&mut self, prefix: &str) -> RouterGroup<'_> {
        let index = self.register_group(prefix.to_string(), Some(0));
        RouterGroup::new(self, index)
    }

    /// Adds a middleware to the root group.
    pub fn middleware(&mut self, middleware: impl Middleware) -> &mut Self {
        self.root().middleware(middleware);
        self
    }

    pub fn set_renderer(&mut self, renderer: impl Renderer) -> &mut Self {
        self.renderer = Some(Arc::new(renderer));
        self
    }

    /// Replaces the handler used when no route matches.
    pub fn not_found<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) -> HandlerResult + Send + Sync + 'static,
    {
        self.router.set_not_found(Arc::new(handler));
        self
    }

    pub fn add_route<F>(&mut self, method: Method, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) -> HandlerResult + Send + Sync + 'static,
    {
        self.root().add_route(method, pattern, handler);
        self
    }

    /// Registers a GET route handler
    pub fn get<F>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) -> HandlerResult + Send + Sync + 'static,
    {
        self.add_route(Method::GET, pattern, handler)
    }

    /// Registers a POST route handler
    pub fn post<F>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) -> HandlerResult + Send + Sync + 'static,
    {
        self.add_route(Method::POST, pattern, handler)
    }

    /// Registers a PUT route handler
    pub fn put<F>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) -> HandlerResult + Send + Sync + 'static,
    {
        self.add_route(Method::PUT, pattern, handler)
    }

    /// Registers a PATCH route handler
    pub fn patch<F>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) -> HandlerResult + Send + Sync + 'static,
    {
        self.add_route(Method::PATCH, pattern, handler)
    }

    /// Registers a DELETE route handler
    pub fn delete<F>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) -> HandlerResult + Send + Sync + 'static,
    {
        self.add_route(Method::DELETE, pattern, handler)
    }

    /// Registers a HEAD route handler
    pub fn head<F>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) -> HandlerResult + Send + Sync + 'static,
    {
        self.add_route(Method::HEAD, pattern, handler)
    }

    /// Registers an OPTIONS route handler
    pub fn options<F>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) -> HandlerResult + Send + Sync + 'static,
    {
        self.add_route(Method::OPTIONS, pattern, handler)
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Registered routes of `method`, for introspection.
    pub fn routes(&self, method: Method) -> impl Iterator<Item = &Node> {
        self.router.routes(&method)
    }

    /// Runs one request through its chain and returns what was written.
    ///
    /// The chain is the middleware of every group whose prefix starts the
    /// request path, in group-creation order, followed by the route handler
    /// or the not-found handler. An error escaping the chain discards
    /// everything written so far, headers included, and answers with
    /// `{"message": ...}` and the error's status.
    pub fn handle(&self, req: Request) -> Response {
        let chain: Vec<Link> = self
            .groups
            .iter()
            .filter(|group| group.matches(&req.path))
            .flat_map(|group| group.middlewares.iter().cloned().map(Link::Middleware))
            .collect();

        let mut ctx = Context::new(req, chain, self.renderer.clone());
        if let Err(err) = self.router.handle(&mut ctx) {
            tracing::warn!(
                method = %ctx.method(),
                path = %ctx.path(),
                error = %err,
                "handler chain returned an error"
            );
            ctx.reset_response(Default::default());
            ctx.fail(err.status_code(), &err.to_string());
        }
        ctx.into_response()
    }

    /// Starts the HTTP server
    ///
    /// # Arguments
    /// * `addr` - Address to listen on (e.g. "127.0.0.1:3000")
    pub fn listen(self, addr: &str) -> Result<(), Box<dyn std::error::Error>> {
        let runtime = Runtime::new()?;
        runtime.block_on(async move {
            let listener = TcpListener::bind(addr).await?;
            self.serve(listener).await
        })?;
        Ok(())
    }

    /// Accepts connections on `listener` until the task is dropped.
    ///
    /// Fails straight away if the engine's [`ServerConfig`] does not validate.
    pub async fn serve(self, listener: TcpListener) -> io::Result<()> {
        self.config
            .validate()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let engine = Arc::new(self);
        let slots = Arc::new(Semaphore::new(engine.config.max_connections));
        tracing::info!(addr = ?listener.local_addr()?, "Server running");

        loop {
            let permit = Arc::clone(&slots)
                .acquire_owned()
                .await
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::warn!(error = %e, "Connection failed");
                    continue;
                }
            };

            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                if let Err(e) = handle_connection(engine, stream).await {
                    tracing::warn!(peer = %peer, error = %e, "Connection error");
                }
                drop(permit);
            });
        }
    }
}

async fn handle_connection<S>(engine: Arc<Engine>, mut stream: S) -> Result<(), ServerError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let config = engine.config.clone();
    let read = tokio::time::timeout(config.read_timeout(), read_request(&mut stream, config.max_body_bytes)).await;

    let request = match read {
        Ok(Ok(Some(request))) => request,
        Ok(Ok(None)) => return Ok(()),
        Ok(Err(err)) => return write_response(&mut stream, &error_response(&err)).await,
        Err(_) => {
            tracing::debug!("Client did not send a request in time");
            return Ok(());
        }
    };

    // Handlers are synchronous and may block.
    let dispatch = Arc::clone(&engine);
    let response = match tokio::task::spawn_blocking(move || dispatch.handle(request)).await {
        Ok(response) => response,
        Err(err) if err.is_panic() => {
            tracing::error!(error = %err, "Handler chain panicked outside of Recovery, closing connection");
            return Ok(());
        }
        Err(err) => return Err(ServerError::InternalError(err.to_string())),
    };

    write_response(&mut stream, &response).await
}

fn error_response(err: &ServerError) -> Response {
    let mut response = Response::new(err.status_code());
    let body = serde_json::to_vec(&json!({ "message": err.to_string() })).unwrap_or_default();
    response.header("Content-Type", "application/json").write(&body);
    response
}

async fn write_response<S>(stream: &mut S, response: &Response) -> Result<(), ServerError>
where
    S: AsyncWrite + Unpin,
{
    let date = httpdate::fmt_http_date(SystemTime::now());
    stream.write_all(&response.to_http1(&date)).await?;
    stream.flush().await?;
    Ok(())
}

/// Reads one HTTP/1.1 request. `Ok(None)` means the peer closed the
/// connection before sending anything.
async fn read_request<S>(stream: &mut S, max_body_bytes: usize) -> Result<Option<Request>, ServerError>
where
    S: AsyncRead + Unpin,
{
    let mut buf_reader = BufReader::new(stream);
    let mut request_line = String::new();
    buf_reader.read_line(&mut request_line).await?;

    if request_line.is_empty() {
        return Ok(None);
    }

    let mut parts = request_line.split_whitespace();
    let method: Method = parts
        .next()
        .ok_or_else(|| ServerError::BadRequest("empty request line".into()))?
        .parse()?;
    let target = parts
        .next()
        .ok_or_else(|| ServerError::BadRequest("missing request target".into()))?;

    let mut request = Request::new(method, target);
    loop {
        let mut line = String::new();
        buf_reader.read_line(&mut line).await?;

        if line.trim().is_empty() {
            break;
        }

        if let Some((key, value)) = line.trim().split_once(':') {
            request = request.header(key.trim(), value.trim());
        }
    }

    let content_length = match request.get_header("content-length") {
        Some(value) => value
            .parse::<usize>()
            .map_err(|_| ServerError::BadRequest(format!("invalid content-length {:?}", value)))?,
        None => 0,
    };
    if content_length > max_body_bytes {
        return Err(ServerError::PayloadTooLarge);
    }

    let mut body = Vec::with_capacity(content_length);
    buf_reader.take(content_length as u64).read_to_end(&mut body).await?;
    if body.len() < content_length {
        return Err(ServerError::BadRequest("body shorter than content-length".into()));
    }

    let content_type = request.get_header("content-type").unwrap_or("").to_string();
    Ok(Some(request.body(Body::with_content_type(&content_type, body))))
}
