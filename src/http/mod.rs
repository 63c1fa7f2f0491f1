//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, body limit)
//!     → request.rs (host, client address, buffered body)
//!     → [routing layer picks the route]
//!     → local.rs (in-process handler)   or   forward.rs (pipeline)
//!                                               → proxy.rs (one attempt, buffered)
//!                                               → relay.rs (stream to client)
//!     → response.rs (error and not-found pages)
//! ```

pub mod forward;
pub mod local;
pub mod proxy;
pub mod relay;
pub mod request;
pub mod response;
pub mod server;

pub use local::{HandlerRegistry, LocalHandler, LocalRequest, NamedHandler};
pub use proxy::{ForwardError, ReverseProxy};
pub use request::{InboundRequest, X_REQUEST_ID};
pub use server::{AppState, GatewayServer, ServerError};
