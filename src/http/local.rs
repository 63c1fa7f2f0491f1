//! In-process handlers.
//!
//! Routes with proxying disabled, the error handler and the not-found handler
//! all resolve to a [`LocalHandler`] by name through the [`HandlerRegistry`].

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use axum::response::Response;
use futures_util::future::BoxFuture;

use crate::admin::handlers as admin;
use crate::http::request::InboundRequest;
use crate::http::response;
use crate::http::server::AppState;
use crate::routing::{Captures, HostParts};

/// Everything a local handler gets to see.
pub struct LocalRequest {
    pub state: AppState,
    pub inbound: InboundRequest,
    pub host: HostParts,
    pub captures: Captures,
    /// Matched route, if any.
    pub route: Option<String>,
}

pub trait LocalHandler: Send + Sync {
    fn call(&self, request: LocalRequest) -> BoxFuture<'static, Response>;
}

impl<F, Fut> LocalHandler for F
where
    F: Fn(LocalRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Response> + Send + 'static,
{
    fn call(&self, request: LocalRequest) -> BoxFuture<'static, Response> {
        Box::pin(self(request))
    }
}

/// A handler together with the name it was registered under.
#[derive(Clone)]
pub struct NamedHandler {
    name: String,
    handler: Arc<dyn LocalHandler>,
}

impl NamedHandler {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, request: LocalRequest) -> BoxFuture<'static, Response> {
        self.handler.call(request)
    }
}

impl fmt::Debug for NamedHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NamedHandler").field(&self.name).finish()
    }
}

/// Handlers addressable from configuration.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn LocalHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the error pages, echo and admin handlers installed.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("gateway_error", response::gateway_error);
        registry.register("not_found", response::not_found);
        registry.register("echo_captures", response::echo_captures);
        registry.register("statistics", admin::statistics_handler);
        registry.register("route_add", admin::route_add_handler);
        registry.register("route_delete", admin::route_delete_handler);
        registry
    }

    /// Register `handler` under `name`, replacing any previous one.
    pub fn register<H>(&mut self, name: impl Into<String>, handler: H)
    where
        H: LocalHandler + 'static,
    {
        self.handlers.insert(name.into(), Arc::new(handler));
    }

    pub fn get(&self, name: &str) -> Option<NamedHandler> {
        self.handlers.get(name).map(|handler| NamedHandler {
            name: name.to_string(),
            handler: handler.clone(),
        })
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_registered() {
        let registry = HandlerRegistry::with_builtins();
        assert_eq!(
            registry.names(),
            vec!["echo_captures", "gateway_error", "not_found", "route_add", "route_delete", "statistics"]
        );
        assert_eq!(registry.get("not_found").unwrap().name(), "not_found");
        assert!(registry.get("missing").is_none());
    }
}
