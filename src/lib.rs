//! Route gateway library.
//!
//! An HTTP gateway that matches requests by host, method and path, then either
//! serves them in-process or forwards them to a pool of backends with failover
//! and a per-backend circuit breaker.

pub mod admin;
pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;
pub mod resilience;
pub mod routing;

pub use config::schema::GatewayConfig;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
