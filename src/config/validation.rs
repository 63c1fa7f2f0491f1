//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (breaker values > 0, bind address parses)
//! - Check the domain pattern compiles and exposes the expected groups
//! - Check every route is usable: named, unique, pool or handler present
//! - Backend urls must be forwardable (`http` scheme with a host)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system
//! - `validate_route` is shared with the admin `route_add` operation

use std::collections::HashSet;
use std::net::SocketAddr;

use regex::Regex;
use thiserror::Error;

use crate::config::schema::{GatewayConfig, RouteConfig};
use crate::http::proxy::{ForwardError, Target};

/// A single semantic problem in a configuration or route object.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("invalid bind address '{0}'")]
    BindAddress(String),

    #[error("{field} must be greater than zero")]
    NotPositive { field: &'static str },

    #[error("invalid domain pattern: {0}")]
    DomainPattern(String),

    #[error("domain pattern is missing the named group '{0}'")]
    DomainPatternGroup(&'static str),

    #[error("every route must have a name")]
    RouteName,

    #[error("route name '{0}' is used more than once")]
    DuplicateRoute(String),

    #[error("route '{0}' must have at least one backend")]
    EmptyPool(String),

    #[error("every backend of route '{0}' must have a name")]
    BackendName(String),

    #[error("the backend '{backend}' has an invalid url: {reason}")]
    BackendUrl { backend: String, reason: String },

    #[error("local route '{0}' must name a handler")]
    MissingHandler(String),
}

/// Validate a full configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    let breaker = &config.circuit_breaker;
    if breaker.max_loop_try == 0 {
        errors.push(ValidationError::NotPositive { field: "max_loop_try" });
    }
    if breaker.consecutive_errors_to_disable == 0 {
        errors.push(ValidationError::NotPositive { field: "consecutive_errors_to_disable" });
    }
    if breaker.time_to_verify_disabled_secs == 0 {
        errors.push(ValidationError::NotPositive { field: "time_to_verify_disabled_secs" });
    }

    errors.extend(validate_domain_pattern(&config.routing.domain_pattern));

    let mut seen = HashSet::new();
    for route in &config.routes {
        if !route.name.is_empty() && !seen.insert(route.name.as_str()) {
            errors.push(ValidationError::DuplicateRoute(route.name.clone()));
        }
        errors.extend(validate_route(route));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Check a single route object.
pub fn validate_route(route: &RouteConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if route.name.is_empty() {
        errors.push(ValidationError::RouteName);
    }

    if !route.proxy_enable {
        if route.handler.as_deref().map_or(true, str::is_empty) {
            errors.push(ValidationError::MissingHandler(route.name.clone()));
        }
        return errors;
    }

    if route.proxy_servers.is_empty() {
        errors.push(ValidationError::EmptyPool(route.name.clone()));
    }

    for backend in &route.proxy_servers {
        if backend.name.is_empty() {
            errors.push(ValidationError::BackendName(route.name.clone()));
            continue;
        }
        if let Err(e) = Target::parse(&backend.url) {
            let reason = match e {
                ForwardError::MalformedUrl { reason, .. } => reason,
                other => other.to_string(),
            };
            errors.push(ValidationError::BackendUrl {
                backend: backend.name.clone(),
                reason,
            });
        }
    }

    errors
}

fn validate_domain_pattern(pattern: &str) -> Vec<ValidationError> {
    let regex = match Regex::new(pattern) {
        Ok(r) => r,
        Err(e) => return vec![ValidationError::DomainPattern(e.to_string())],
    };

    let names: HashSet<&str> = regex.capture_names().flatten().collect();
    ["subDomain", "domain", "port"]
        .into_iter()
        .filter(|group| !names.contains(group))
        .map(ValidationError::DomainPatternGroup)
        .collect()
}
