//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → compiled into a RouteTable
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → server stages a new RouteTable
//!     → installed atomically at the start of the next request
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AdminConfig, BackendConfig, CircuitBreakerConfig, DomainConfig, GatewayConfig,
    LimitsConfig, ListenerConfig, ObservabilityConfig, PathConfig, RouteConfig,
    RoutingConfig, TransportConfig,
};
pub use validation::{validate_config, validate_route, ValidationError};
