//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (host, method, path)
//!     → store.rs (install staged table, pin the live one)
//!     → table.rs (route lookup in configuration order)
//!     → router.rs / matcher.rs (evaluate domain and path rules)
//!     → Return: matched Route + captures, or NoMatch
//!
//! Route Compilation:
//!     RouteConfig[]
//!     → Compile matchers (domain fqdn, literal or regex path)
//!     → Resolve local handler names
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Tables are immutable; hot reload swaps whole tables
//! - Deterministic: same input always matches same route
//! - First match wins (configuration order)

pub mod matcher;
pub mod router;
pub mod store;
pub mod table;

pub use matcher::{Captures, HostParts};
pub use router::{Route, RouteSnapshot, RouteTarget, TableError};
pub use store::RouteStore;
pub use table::{RouteMatch, RouteTable, TableSettings};
