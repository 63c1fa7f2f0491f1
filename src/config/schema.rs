//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.
//! Route objects use the same camelCase keys as the admin wire format so a
//! route copied out of `statistics` can be posted back to `route_add`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default host pattern. Splits a `Host` header into sub domain, domain and port.
pub const DEFAULT_DOMAIN_PATTERN: &str = r"^(?P<subDomain>[a-zA-Z0-9]??|[a-zA-Z0-9]?[a-zA-Z0-9.-]*?[a-zA-Z0-9]*)[.]*(?P<domain>[A-Za-z0-9]|[A-Za-z0-9][A-Za-z0-9-]*[A-Za-z0-9]):*(?P<port>[0-9]*)$";

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Host matching and global handlers.
    pub routing: RoutingConfig,

    /// Backend disable/reactivate policy and retry bound.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Outbound transport settings.
    pub transport: TransportConfig,

    /// Inbound request limits.
    pub limits: LimitsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Optional dedicated admin listener.
    pub admin: AdminConfig,

    /// Route definitions, matched in order.
    pub routes: Vec<RouteConfig>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:9999").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:9999".to_string(),
        }
    }
}

/// Host matching and fallback handlers.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Regex with `subDomain`, `domain` and `port` named groups.
    pub domain_pattern: String,

    /// Local handler invoked when a route exhausts its retries.
    pub error_handler: String,

    /// Local handler invoked when no route matches.
    pub not_found_handler: String,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            domain_pattern: DEFAULT_DOMAIN_PATTERN.to_string(),
            error_handler: "gateway_error".to_string(),
            not_found_handler: "not_found".to_string(),
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Maximum selection attempts for a single request.
    pub max_loop_try: u32,

    /// Consecutive failures after which a backend is disabled.
    pub consecutive_errors_to_disable: u64,

    /// How long a disabled backend stays out of rotation.
    pub time_to_keep_disabled_secs: u64,

    /// Interval of the reactivation sweep.
    pub time_to_verify_disabled_secs: u64,
}

impl CircuitBreakerConfig {
    pub fn time_to_keep_disabled(&self) -> Duration {
        Duration::from_secs(self.time_to_keep_disabled_secs)
    }

    pub fn time_to_verify_disabled(&self) -> Duration {
        Duration::from_secs(self.time_to_verify_disabled_secs)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            max_loop_try: 20,
            consecutive_errors_to_disable: 10,
            time_to_keep_disabled_secs: 90,
            time_to_verify_disabled_secs: 30,
        }
    }
}

/// Outbound transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Deadline for one attempt, response head and full body, in seconds.
    pub request_timeout_secs: u64,

    /// Periodic client flush while relaying, in milliseconds. 0 disables it.
    pub flush_interval_ms: u64,

    /// Largest backend body that will be buffered.
    pub max_response_body_bytes: usize,
}

impl TransportConfig {
    pub fn flush_interval(&self) -> Option<Duration> {
        (self.flush_interval_ms > 0).then(|| Duration::from_millis(self.flush_interval_ms))
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 5,
            request_timeout_secs: 30,
            flush_interval_ms: 0,
            max_response_body_bytes: 64 * 1024 * 1024,
        }
    }
}

/// Inbound request limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum inbound body size in bytes. The body is kept for replay on retry.
    pub max_request_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_request_body_bytes: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format: "pretty" or "json".
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Serve the admin router on its own address.
    pub enabled: bool,

    /// Admin bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

/// A route: domain + path rule mapped to a backend pool or a local handler.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RouteConfig {
    /// Unique route name, used in logs and by `route_delete`.
    pub name: String,

    #[serde(default)]
    pub domain: DomainConfig,

    #[serde(default)]
    pub path: PathConfig,

    /// Forward to `proxy_servers` when true, otherwise serve with `handler`.
    #[serde(default)]
    pub proxy_enable: bool,

    /// Local handler name for routes with `proxy_enable = false`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handler: Option<String>,

    #[serde(default)]
    pub proxy_servers: Vec<BackendConfig>,
}

/// Host rule. Empty parts are left out of the compared host.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct DomainConfig {
    /// Sub domain without trailing dot (`blog` for `blog.example.com`).
    pub sub_domain: String,
    pub domain: String,
    /// Port digits only, without `:`.
    pub port: String,
    /// Local handler used when this route exhausts its retries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_handler: Option<String>,
}

/// Path rule: literal path, or a regex with named captures. Method is optional.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PathConfig {
    /// Literal path. Empty matches every path on the domain.
    pub path: String,
    pub method: String,
    /// Path regex; when set it replaces the literal comparison.
    pub exp_reg: String,
}

/// A backend in a route's pool.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct BackendConfig {
    pub name: String,
    pub url: String,
}
