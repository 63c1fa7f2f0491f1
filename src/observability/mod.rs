//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Gateway handler, pipeline, reactivator produce:
//!     → logging.rs (events tagged with request id, route, backend)
//!     → metrics.rs (request, failure, disable and recovery counters)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows through all subsystems
//! - Metrics are no-ops until an exporter is installed

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
