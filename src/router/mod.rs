pub(crate) mod group;
mod node;

pub use group::RouterGroup;
pub use node::{Node, Travel};

use crate::context::Context;
use crate::handler::{Handler, HandlerResult};
use crate::http::Method;
use std::collections::HashMap;
use std::sync::Arc;

/// Splits a pattern or path into its non-empty `/` segments.
///
/// Collection stops after the first catch-all (`*name`) segment; anything
/// following it is ignored.
pub fn parse_pattern(pattern: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    for segment in pattern.split('/').filter(|s| !s.is_empty()) {
        segments.push(segment);
        if segment.starts_with('*') {
            break;
        }
    }
    segments
}

fn not_found(ctx: &mut Context) -> HandlerResult {
    let body = format!("404 NOT FOUND: {}\n", ctx.path());
    ctx.string(404, body);
    Ok(())
}

/// Route table: one tree per method plus the handler of every pattern.
pub struct Router {
    roots: HashMap<Method, Node>,
    handlers: HashMap<String, Arc<dyn Handler>>,
    not_found: Arc<dyn Handler>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        Self {
            roots: HashMap::new(),
            handlers: HashMap::new(),
            not_found: Arc::new(not_found),
        }
    }

    fn handler_key(method: &Method, pattern: &str) -> String {
        format!("{}-{}", method, pattern)
    }

    pub fn add_route(&mut self, method: Method, pattern: &str, handler: Arc<dyn Handler>) {
        let segments = parse_pattern(pattern);
        self.handlers.insert(Self::handler_key(&method, pattern), handler);
        self.roots.entry(method).or_default().insert(pattern, &segments);
    }

    /// Finds the route for `path` and binds its parameters.
    ///
    /// Parameters are read off the matched node's pattern: `:name` takes the
    /// path segment at the same position, `*name` takes every remaining
    /// segment joined with `/`.
    pub fn resolve(&self, method: &Method, path: &str) -> Option<(&Node, HashMap<String, String>)> {
        let root = self.roots.get(method)?;
        let search = parse_pattern(path);
        let node = root.search(&search)?;

        let mut params = HashMap::new();
        for (index, segment) in parse_pattern(node.pattern()).into_iter().enumerate() {
            if let Some(name) = segment.strip_prefix(':') {
                if let Some(value) = search.get(index) {
                    params.insert(name.to_string(), value.to_string());
                }
            } else if let Some(name) = segment.strip_prefix('*') {
                if !name.is_empty() {
                    params.insert(name.to_string(), search.get(index..).unwrap_or_default().join("/"));
                }
                break;
            }
        }
        Some((node, params))
    }

    /// Handler registered for the route that `path` resolves to.
    pub fn lookup(&self, method: &Method, path: &str) -> Option<(Arc<dyn Handler>, HashMap<String, String>)> {
        let (node, params) = self.resolve(method, path)?;
        let handler = self.handlers.get(&Self::handler_key(method, node.pattern()))?;
        Some((Arc::clone(handler), params))
    }

    /// Every registered route of `method`, in no particular order.
    pub fn routes(&self, method: &Method) -> impl Iterator<Item = &Node> {
        self.roots.get(method).into_iter().flat_map(Node::travel)
    }

    pub(crate) fn set_not_found(&mut self, handler: Arc<dyn Handler>) {
        self.not_found = handler;
    }

    /// Appends the route handler (or the not-found handler) to the chain
    /// and starts it.
    pub(crate) fn handle(&self, ctx: &mut Context) -> HandlerResult {
        match self.lookup(ctx.method(), ctx.path()) {
            Some((handler, params)) => {
                ctx.set_params(params);
                ctx.push_handler(handler);
            }
            None => ctx.push_handler(Arc::clone(&self.not_found)),
        }
        ctx.next()
    }
}
