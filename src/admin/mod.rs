//! Admin API.
//!
//! # Endpoints
//! - `GET /statistics`: every route with its backend counters
//! - `POST /routes/add`: add a reverse proxy route (JSON RouteConfig)
//! - `POST /routes/delete`: delete a reverse proxy route (`{"name": ...}`)
//!
//! # Design Decisions
//! - Served on its own listener, disabled by default
//! - Changes are staged and take effect on the next gateway request

pub mod envelope;
pub mod handlers;

use axum::routing::{get, post};
use axum::Router;

use self::handlers::*;
use crate::http::server::AppState;

pub use envelope::{Envelope, Meta};
pub use handlers::{add_route, delete_route, statistics, AdminError};

pub fn setup_admin_router(state: AppState) -> Router {
    Router::new()
        .route("/statistics", get(get_statistics))
        .route("/routes/add", post(post_route_add))
        .route("/routes/delete", post(post_route_delete))
        .with_state(state)
}
