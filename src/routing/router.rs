//! Compiled routes.
//!
//! # Responsibilities
//! - Compile a RouteConfig into matchers plus a target
//! - Resolve handler names against the handler registry
//! - Keep per-route runtime state (backend pool, local handler usage)
//!
//! # Design Decisions
//! - A proxy route always owns a non-empty pool
//! - The source RouteConfig is kept for statistics and re-serialization

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::config::{DomainConfig, PathConfig, RouteConfig};
use crate::http::local::{HandlerRegistry, NamedHandler};
use crate::load_balancer::{BackendPool, BackendSnapshot};
use crate::routing::matcher::{Captures, DomainRule, PathRule};

/// Failure to compile configuration into a route table.
#[derive(Debug, Error, PartialEq)]
pub enum TableError {
    #[error("route '{route}' refers to unknown handler '{handler}'")]
    UnknownHandler { route: String, handler: String },

    #[error("route '{0}' has proxying enabled but no backends")]
    EmptyPool(String),

    #[error("route '{0}' has proxying disabled but no handler")]
    MissingHandler(String),
}

/// Usage counters of a local handler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageStats {
    pub used_successfully: u64,
    pub total_time: Duration,
}

/// A route served in-process.
#[derive(Debug)]
pub struct LocalEndpoint {
    handler: NamedHandler,
    usage: Mutex<UsageStats>,
}

impl LocalEndpoint {
    pub fn handler(&self) -> &NamedHandler {
        &self.handler
    }

    pub fn record_use(&self, elapsed: Duration) {
        let mut usage = self.usage.lock().unwrap_or_else(PoisonError::into_inner);
        usage.used_successfully += 1;
        usage.total_time += elapsed;
    }

    pub fn usage(&self) -> UsageStats {
        *self.usage.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Where a matched request goes.
#[derive(Debug)]
pub enum RouteTarget {
    Proxy(BackendPool),
    Local(LocalEndpoint),
}

/// A compiled route.
#[derive(Debug)]
pub struct Route {
    config: RouteConfig,
    domain: DomainRule,
    path: PathRule,
    target: RouteTarget,
    error_handler: Option<NamedHandler>,
}

impl Route {
    pub fn compile(config: &RouteConfig, handlers: &HandlerRegistry) -> Result<Self, TableError> {
        let resolve = |name: &str| {
            handlers.get(name).ok_or_else(|| TableError::UnknownHandler {
                route: config.name.clone(),
                handler: name.to_string(),
            })
        };

        let target = if config.proxy_enable {
            if config.proxy_servers.is_empty() {
                return Err(TableError::EmptyPool(config.name.clone()));
            }
            RouteTarget::Proxy(BackendPool::from_config(&config.proxy_servers))
        } else {
            let name = config
                .handler
                .as_deref()
                .filter(|h| !h.is_empty())
                .ok_or_else(|| TableError::MissingHandler(config.name.clone()))?;
            RouteTarget::Local(LocalEndpoint {
                handler: resolve(name)?,
                usage: Mutex::new(UsageStats::default()),
            })
        };

        let error_handler = config
            .domain
            .error_handler
            .as_deref()
            .filter(|h| !h.is_empty())
            .map(resolve)
            .transpose()?;

        Ok(Self {
            config: config.clone(),
            domain: DomainRule::new(&config.domain),
            path: PathRule::new(&config.path, &config.name),
            target,
            error_handler,
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &RouteConfig {
        &self.config
    }

    pub fn target(&self) -> &RouteTarget {
        &self.target
    }

    pub fn pool(&self) -> Option<&BackendPool> {
        match &self.target {
            RouteTarget::Proxy(pool) => Some(pool),
            RouteTarget::Local(_) => None,
        }
    }

    pub fn is_proxy(&self) -> bool {
        self.pool().is_some()
    }

    /// Route-specific error handler, if the domain names one.
    pub fn error_handler(&self) -> Option<&NamedHandler> {
        self.error_handler.as_ref()
    }

    /// Host first, then method and path. Returns the path captures.
    pub fn matches(&self, host: &str, method: &str, path: &str) -> Option<Captures> {
        if !self.domain.matches(host) {
            return None;
        }
        self.path.matches(method, path)
    }

    pub fn snapshot(&self) -> RouteSnapshot {
        let (handler, proxy_servers) = match &self.target {
            RouteTarget::Proxy(pool) => (None, pool.snapshot()),
            RouteTarget::Local(endpoint) => {
                let usage = endpoint.usage();
                let handler = HandlerSnapshot {
                    name: endpoint.handler.name().to_string(),
                    total_time: usage.total_time.as_nanos() as u64,
                    used_successfully: usage.used_successfully,
                };
                (Some(handler), Vec::new())
            }
        };

        RouteSnapshot {
            name: self.config.name.clone(),
            domain: self.config.domain.clone(),
            path: self.config.path.clone(),
            proxy_enable: self.config.proxy_enable,
            handler,
            proxy_servers,
        }
    }
}

/// Local handler counters as reported by `statistics`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HandlerSnapshot {
    pub name: String,
    pub total_time: u64,
    pub used_successfully: u64,
}

/// A route and its counters as reported by `statistics`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RouteSnapshot {
    pub name: String,
    pub domain: DomainConfig,
    pub path: PathConfig,
    pub proxy_enable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handler: Option<HandlerSnapshot>,
    pub proxy_servers: Vec<BackendSnapshot>,
}
