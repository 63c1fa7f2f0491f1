//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store compiled routes in configuration order
//! - Look up the matching route for a request
//! - Return matched route or explicit no-match
//! - Derive updated tables for hot reload (add/remove one route)
//!
//! # Design Decisions
//! - Immutable after construction; updates build a new table
//! - Unchanged routes are shared by `Arc`, so their counters survive an update
//! - O(n) scan, first match wins: route order is part of the contract
//! - Explicit NoMatch rather than silent default

use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::http::local::{HandlerRegistry, NamedHandler};
use crate::resilience::BreakerPolicy;
use crate::routing::matcher::{Captures, DomainMatcher, HostParts};
use crate::routing::router::{Route, RouteSnapshot, TableError};

/// Per-table forwarding settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSettings {
    pub max_loop_try: u32,
    pub breaker: BreakerPolicy,
}

/// A successful lookup.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub route: Arc<Route>,
    pub host: HostParts,
    pub captures: Captures,
}

/// The live set of routes plus the settings they run with.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<Arc<Route>>,
    domains: DomainMatcher,
    settings: TableSettings,
    error_handler: NamedHandler,
    not_found_handler: NamedHandler,
}

impl RouteTable {
    /// Compile a full configuration.
    pub fn build(config: &GatewayConfig, handlers: &HandlerRegistry) -> Result<Self, TableError> {
        let global = |name: &str| {
            handlers.get(name).ok_or_else(|| TableError::UnknownHandler {
                route: "<global>".to_string(),
                handler: name.to_string(),
            })
        };

        let routes = config
            .routes
            .iter()
            .map(|r| Route::compile(r, handlers).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            routes,
            domains: DomainMatcher::new(&config.routing.domain_pattern),
            settings: TableSettings {
                max_loop_try: config.circuit_breaker.max_loop_try,
                breaker: BreakerPolicy::from(&config.circuit_breaker),
            },
            error_handler: global(&config.routing.error_handler)?,
            not_found_handler: global(&config.routing.not_found_handler)?,
        })
    }

    pub fn routes(&self) -> &[Arc<Route>] {
        &self.routes
    }

    pub fn settings(&self) -> &TableSettings {
        &self.settings
    }

    pub fn error_handler(&self) -> &NamedHandler {
        &self.error_handler
    }

    pub fn not_found_handler(&self) -> &NamedHandler {
        &self.not_found_handler
    }

    pub fn find(&self, name: &str) -> Option<&Arc<Route>> {
        self.routes.iter().find(|r| r.name() == name)
    }

    /// Split a host with the table's domain pattern.
    pub fn host_parts(&self, host: &str) -> Option<HostParts> {
        self.domains.extract(host)
    }

    /// First route whose domain and path rule both match.
    pub fn lookup(&self, host: &str, method: &str, path: &str) -> Option<RouteMatch> {
        let Some(parts) = self.domains.extract(host) else {
            tracing::debug!(host = %host, "Host does not match the domain pattern");
            return None;
        };

        self.routes.iter().find_map(|route| {
            route.matches(host, method, path).map(|captures| RouteMatch {
                route: route.clone(),
                host: parts.clone(),
                captures,
            })
        })
    }

    /// Copy of this table with `route` appended.
    pub fn with_route(&self, route: Route) -> Self {
        let mut next = self.clone();
        next.routes.push(Arc::new(route));
        next
    }

    /// Copy of this table without the route called `name`.
    pub fn without_route(&self, name: &str) -> Self {
        let mut next = self.clone();
        next.routes.retain(|r| r.name() != name);
        next
    }

    pub fn snapshot(&self) -> Vec<RouteSnapshot> {
        self.routes.iter().map(|r| r.snapshot()).collect()
    }
}
