//! Admin operations: add a proxy route, delete a proxy route, report statistics.
//!
//! Each operation exists once as a plain function over [`AppState`] and is
//! exposed twice: on the admin listener and as a local handler that routes
//! can name (`route_add`, `route_delete`, `statistics`).

use axum::body::Bytes;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use thiserror::Error;

use crate::admin::envelope::Envelope;
use crate::config::{validate_route, RouteConfig, ValidationError};
use crate::http::local::LocalRequest;
use crate::http::server::AppState;
use crate::routing::{Route, RouteSnapshot, TableError};

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("invalid request body: {0}")]
    Body(#[from] serde_json::Error),

    #[error("only reverse proxy routes can be added; set proxyEnable to true")]
    NotProxyRoute,

    #[error("invalid route: {}", join(.0))]
    Invalid(Vec<ValidationError>),

    #[error("route '{0}' already exists")]
    Duplicate(String),

    #[error("route '{0}' was not found")]
    NotFound(String),

    #[error("route '{0}' is not a reverse proxy route and cannot be deleted")]
    NotProxy(String),

    #[error(transparent)]
    Table(#[from] TableError),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Deserialize)]
pub struct DeleteRoute {
    pub name: String,
}

/// Stage a new proxy route. Returns the resulting route list.
pub fn add_route(state: &AppState, config: RouteConfig) -> Result<Vec<RouteSnapshot>, AdminError> {
    if !config.proxy_enable {
        return Err(AdminError::NotProxyRoute);
    }
    let errors = validate_route(&config);
    if !errors.is_empty() {
        return Err(AdminError::Invalid(errors));
    }

    let route = Route::compile(&config, &state.handlers)?;
    let table = state.routes.update(|latest| {
        if latest.find(&config.name).is_some() {
            return Err(AdminError::Duplicate(config.name.clone()));
        }
        Ok(latest.with_route(route))
    })?;

    tracing::info!(route = %config.name, backends = config.proxy_servers.len(), "Route added");
    Ok(table.snapshot())
}

/// Stage removal of a proxy route. Returns the resulting route list.
pub fn delete_route(state: &AppState, name: &str) -> Result<Vec<RouteSnapshot>, AdminError> {
    let table = state.routes.update(|latest| {
        let route = latest
            .find(name)
            .ok_or_else(|| AdminError::NotFound(name.to_string()))?;
        if !route.is_proxy() {
            return Err(AdminError::NotProxy(name.to_string()));
        }
        Ok(latest.without_route(name))
    })?;

    tracing::info!(route = %name, "Route deleted");
    Ok(table.snapshot())
}

/// Every route of the live table with its counters.
pub fn statistics(state: &AppState) -> Vec<RouteSnapshot> {
    state.routes.current().snapshot()
}

fn respond(result: Result<Vec<RouteSnapshot>, AdminError>) -> Response {
    match result {
        Ok(routes) => Envelope::success(&routes).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Admin operation rejected");
            Envelope::failure(e).into_response()
        }
    }
}

fn add_from_json(state: &AppState, body: &[u8]) -> Result<Vec<RouteSnapshot>, AdminError> {
    let config: RouteConfig = serde_json::from_slice(body)?;
    add_route(state, config)
}

fn delete_from_json(state: &AppState, body: &[u8]) -> Result<Vec<RouteSnapshot>, AdminError> {
    let request: DeleteRoute = serde_json::from_slice(body)?;
    delete_route(state, &request.name)
}

// Admin listener

pub async fn get_statistics(State(state): State<AppState>) -> Response {
    Envelope::success(&statistics(&state)).into_response()
}

pub async fn post_route_add(State(state): State<AppState>, body: Bytes) -> Response {
    respond(add_from_json(&state, &body))
}

pub async fn post_route_delete(State(state): State<AppState>, body: Bytes) -> Response {
    respond(delete_from_json(&state, &body))
}

// Local handlers

pub async fn statistics_handler(request: LocalRequest) -> Response {
    Envelope::success(&statistics(&request.state)).into_response()
}

pub async fn route_add_handler(request: LocalRequest) -> Response {
    respond(add_from_json(&request.state, &request.inbound.body))
}

pub async fn route_delete_handler(request: LocalRequest) -> Response {
    respond(delete_from_json(&request.state, &request.inbound.body))
}
