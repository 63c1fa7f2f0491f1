//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to backend:
//!     → timeouts.rs (enforce per-attempt deadline)
//!     → On failure: circuit_breaker.rs (count, disable past threshold)
//!     → retries.rs (charge the attempt to the request's loop budget)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Failed attempts move on to another backend rather than backing off
//! - Circuit breaker prevents hammering a failing backend

pub mod circuit_breaker;
pub mod retries;
pub mod timeouts;

pub use circuit_breaker::{BreakerPolicy, BreakerState, Transition};
pub use retries::{Exhausted, LoopBudget};
