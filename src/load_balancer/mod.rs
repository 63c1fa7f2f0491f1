//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Route matched → its BackendPool
//!     → pool.rs (snapshot enabled/round/failed flags under the round lock)
//!     → selector.rs (rank candidates by tier)
//!     → pool.rs (apply tier side effects, mark tried)
//!     → backend.rs (breaker state updated after the attempt)
//! ```
//!
//! # Design Decisions
//! - The strategy is a pure function, testable without HTTP
//! - Round flags are per pool and synchronized; failure flags are per request
//! - Health state is per backend, each behind its own lock
//! - Disabled backends are skipped; a fully disabled pool is force-enabled

pub mod backend;
pub mod pool;
pub mod selector;

pub use backend::{Backend, BackendSnapshot};
pub use pool::{BackendPool, RetryState, Selection};
pub use selector::{rank_candidates, Candidate, CandidateView, Tier};
