use std::sync::Arc;

use crate::app::Engine;
use crate::context::Context;
use crate::handler::HandlerResult;
use crate::http::Method;
use crate::middleware::Middleware;

/// A group as stored by the engine.
pub(crate) struct Group {
    pub(crate) prefix: String,
    pub(crate) middlewares: Vec<Arc<dyn Middleware>>,
    pub(crate) parent: Option<usize>,
}

impl Group {
    pub(crate) fn new(prefix: String, parent: Option<usize>) -> Self {
        Self {
            prefix,
            middlewares: Vec::new(),
            parent,
        }
    }

    /// Byte-wise prefix test, so `/api` also covers `/apix`.
    pub(crate) fn matches(&self, path: &str) -> bool {
        path.starts_with(&self.prefix)
    }
}

/// Registration handle for a path prefix and the middleware attached to it.
///
/// Groups are created with [`Engine::group`] or [`RouterGroup::group`] and
/// borrow the engine for as long as they are used to register routes.
/// Middleware added to a group runs for every request whose path starts with
/// the group's prefix, whichever group registered the matched route.
pub struct RouterGroup<'e> {
    engine: &'e mut Engine,
    index: usize,
}

impl<'e> RouterGroup<'e> {
    pub(crate) fn new(engine: &'e mut Engine, index: usize) -> Self {
        Self { engine, index }
    }

    fn entry(&self) -> &Group {
        &self.engine.groups[self.index]
    }

    pub fn prefix(&self) -> &str {
        &self.entry().prefix
    }

    pub fn parent_prefix(&self) -> Option<&str> {
        let parent = self.entry().parent?;
        Some(&self.engine.groups[parent].prefix)
    }

    /// Nested group whose prefix is this group's prefix followed by `prefix`.
    pub fn group(&mut self, prefix: &str) -> RouterGroup<'_> {
        let prefix = format!("{}{}", self.prefix(), prefix);
        let index = self.engine.register_group(prefix, Some(self.index));
        RouterGroup::new(&mut *self.engine, index)
    }

    pub fn middleware(&mut self, middleware: impl Middleware) -> &mut Self {
        self.engine.groups[self.index].middlewares.push(Arc::new(middleware));
        self
    }

    pub fn add_route<F>(&mut self, method: Method, path: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) -> HandlerResult + Send + Sync + 'static,
    {
        let pattern = format!("{}{}", self.prefix(), path);
        tracing::debug!("Route {:>4} - {}", method.as_str(), pattern);
        self.engine.router.add_route(method, &pattern, Arc::new(handler));
        self
    }

    pub fn get<F>(&mut self, path: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) -> HandlerResult + Send + Sync + 'static,
    {
        self.add_route(Method::GET, path, handler)
    }

    pub fn post<F>(&mut self, path: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) -> HandlerResult + Send + Sync + 'static,
    {
        self.add_route(Method::POST, path, handler)
    }

    pub fn put<F>(&mut self, path: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) -> HandlerResult + Send + Sync + 'static,
    {
        self.add_route(Method::PUT, path, handler)
    }

    pub fn patch<F>(&mut self, path: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) -> HandlerResult + Send + Sync + 'static,
    {
        self.add_route(Method::PATCH, path, handler)
    }

    pub fn delete<F>(&mut self, path: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) -> HandlerResult + Send + Sync + 'static,
    {
        self.add_route(Method::DELETE, path, handler)
    }

    pub fn head<F>(&mut self, path: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) -> HandlerResult + Send + Sync + 'static,
    {
        self.add_route(Method::HEAD, path, handler)
    }

    pub fn options<F>(&mut self, path: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) -> HandlerResult + Send + Sync + 'static,
    {
        self.add_route(Method::OPTIONS, path, handler)
    }
}
