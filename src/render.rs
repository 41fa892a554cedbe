//! Template rendering collaborator.
//!
//! The engine does not load or parse templates itself. Whatever engine the
//! application prefers is plugged in through [`Renderer`] and consulted by
//! [`Context::html`](crate::context::Context::html).

use serde_json::Value;

use crate::error::ServerResult;

pub trait Renderer: Send + Sync + 'static {
    /// Renders the template registered under `name` with `data`.
    fn render(&self, name: &str, data: &Value) -> ServerResult<String>;
}

impl<F> Renderer for F
where
    F: Fn(&str, &Value) -> ServerResult<String> + Send + Sync + 'static,
{
    fn render(&self, name: &str, data: &Value) -> ServerResult<String> {
        (self)(name, data)
    }
}
