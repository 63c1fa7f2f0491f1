//! Health subsystem.
//!
//! # Data Flow
//! ```text
//! Passive (request path):
//!     Forwarding attempt fails
//!     → circuit breaker counts it
//!     → disabled past the consecutive-error threshold
//!
//! Reactivation (reactivator.rs):
//!     Periodic timer (time to verify disabled)
//!     → scan every backend of the live table
//!     → re-enable those disabled longer than time to keep disabled
//! ```
//!
//! # Design Decisions
//! - Health is inferred from real traffic; there are no probes
//! - Health state is per-backend, not per-pool

pub mod reactivator;

pub use reactivator::HealthReactivator;
