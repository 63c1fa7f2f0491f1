//! Responses produced by the gateway itself.
//!
//! # Responsibilities
//! - Error page when every attempt for a request has failed
//! - Not-found page when no route matches
//! - Echo of path captures, for wiring checks
//!
//! # Design Decisions
//! - Failures are 502, no match is 404
//! - Pages carry the request ID so a user report can be traced in the logs

use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::http::local::LocalRequest;
use crate::routing::{Captures, HostParts};

fn page(status: StatusCode, title: &str, detail: &str, request_id: &str) -> Response {
    let body = format!(
        "<!DOCTYPE html>\n<html>\n<head><title>{status} {title}</title></head>\n<body>\n<h1>{title}</h1>\n<p>{detail}</p>\n<p><small>request id: {request_id}</small></p>\n</body>\n</html>\n",
        status = status.as_u16(),
    );
    let mut response = (status, Html(body)).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, header::HeaderValue::from_static("no-store"));
    response
}

/// Every backend attempt failed.
pub async fn gateway_error(request: LocalRequest) -> Response {
    page(
        StatusCode::BAD_GATEWAY,
        "Bad Gateway",
        "The service is temporarily unavailable. Please try again shortly.",
        &request.inbound.request_id,
    )
}

/// No route matched the host, method and path.
pub async fn not_found(request: LocalRequest) -> Response {
    page(
        StatusCode::NOT_FOUND,
        "Not Found",
        "No route is configured for this address.",
        &request.inbound.request_id,
    )
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Echo {
    route: Option<String>,
    host: HostParts,
    method: String,
    path: String,
    captures: Captures,
}

/// Reflect what routing extracted from the request as JSON.
pub async fn echo_captures(request: LocalRequest) -> Response {
    Json(Echo {
        route: request.route,
        host: request.host,
        method: request.inbound.method().to_string(),
        path: request.inbound.path().to_string(),
        captures: request.captures,
    })
    .into_response()
}
