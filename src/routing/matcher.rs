//! Route matching logic.
//!
//! # Responsibilities
//! - Split the Host header into sub domain, domain and port (domain pattern)
//! - Compare the host against a route's fully-qualified domain
//! - Match method + literal path, or method + path regex with named captures
//!
//! # Design Decisions
//! - Host matching is case-insensitive
//! - Path matching is case-sensitive
//! - Empty method or empty literal path = wildcard
//! - A regex that fails to compile never matches; it is logged once at build time

use std::collections::HashMap;

use regex::Regex;
use serde::Serialize;

use crate::config::{DomainConfig, PathConfig};

/// Named path captures handed to local handlers.
pub type Captures = HashMap<String, String>;

/// Host header split by the domain pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostParts {
    pub sub_domain: String,
    pub domain: String,
    pub port: String,
}

/// Compiled domain pattern.
#[derive(Debug, Clone)]
pub struct DomainMatcher {
    pattern: Option<Regex>,
}

impl DomainMatcher {
    pub fn new(pattern: &str) -> Self {
        let pattern = match Regex::new(pattern) {
            Ok(regex) => Some(regex),
            Err(e) => {
                tracing::error!(error = %e, "Domain pattern does not compile, every request will fall through to not-found");
                None
            }
        };
        Self { pattern }
    }

    /// Split `host`, or `None` when the pattern is broken or does not match.
    pub fn extract(&self, host: &str) -> Option<HostParts> {
        let captures = self.pattern.as_ref()?.captures(host)?;
        let group = |name: &str| {
            captures
                .name(name)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default()
        };

        Some(HostParts {
            sub_domain: group("subDomain"),
            domain: group("domain"),
            port: group("port"),
        })
    }
}

/// A route's host rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainRule {
    fqdn: String,
}

impl DomainRule {
    pub fn new(config: &DomainConfig) -> Self {
        let mut fqdn = String::new();
        if !config.sub_domain.is_empty() {
            fqdn.push_str(&config.sub_domain);
            fqdn.push('.');
        }
        fqdn.push_str(&config.domain);
        if !config.port.is_empty() {
            fqdn.push(':');
            fqdn.push_str(&config.port);
        }
        Self { fqdn }
    }

    /// `sub.domain:port` with empty parts left out.
    pub fn fqdn(&self) -> &str {
        &self.fqdn
    }

    pub fn matches(&self, host: &str) -> bool {
        self.fqdn.eq_ignore_ascii_case(host)
    }
}

#[derive(Debug, Clone)]
enum PathPattern {
    Literal(String),
    Regex(Regex),
    Invalid,
}

/// A route's method + path rule.
#[derive(Debug, Clone)]
pub struct PathRule {
    method: String,
    pattern: PathPattern,
}

impl PathRule {
    pub fn new(config: &PathConfig, route: &str) -> Self {
        let pattern = if config.exp_reg.is_empty() {
            PathPattern::Literal(config.path.clone())
        } else {
            match Regex::new(&config.exp_reg) {
                Ok(regex) => PathPattern::Regex(regex),
                Err(e) => {
                    tracing::error!(route = %route, error = %e, "Path regex does not compile, route will never match");
                    PathPattern::Invalid
                }
            }
        };

        Self {
            method: config.method.to_ascii_uppercase(),
            pattern,
        }
    }

    /// Returns the non-empty named captures on a match (empty for literal rules).
    pub fn matches(&self, method: &str, path: &str) -> Option<Captures> {
        if !self.method.is_empty() && !self.method.eq_ignore_ascii_case(method) {
            return None;
        }

        match &self.pattern {
            PathPattern::Literal(literal) => {
                (literal.is_empty() || literal == path).then(Captures::new)
            }
            PathPattern::Regex(regex) => {
                let found = regex.captures(path)?;
                Some(
                    regex
                        .capture_names()
                        .flatten()
                        .filter_map(|name| {
                            found
                                .name(name)
                                .filter(|m| !m.as_str().is_empty())
                                .map(|m| (name.to_string(), m.as_str().to_string()))
                        })
                        .collect(),
                )
            }
            PathPattern::Invalid => None,
        }
    }
}
