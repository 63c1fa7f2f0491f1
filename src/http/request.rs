//! Request handling and transformation.
//!
//! # Responsibilities
//! - Carry the request ID assigned by the request-id layer
//! - Extract routing-relevant information (host, client address)
//! - Hold the buffered inbound request so every attempt can replay it
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - The body is read once, under the configured size limit
//! - Inbound parts are kept intact; each attempt forwards a modified copy

use std::net::SocketAddr;
use std::time::Instant;

use axum::extract::ConnectInfo;
use axum::http::{header, request};
use bytes::Bytes;

pub const X_REQUEST_ID: &str = "x-request-id";

/// An inbound request with its body buffered for replay.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub parts: request::Parts,
    pub body: Bytes,
    pub client_addr: Option<SocketAddr>,
    pub request_id: String,
    pub started: Instant,
}

impl InboundRequest {
    pub fn new(parts: request::Parts, body: Bytes, started: Instant) -> Self {
        Self {
            client_addr: client_addr(&parts),
            request_id: request_id(&parts),
            parts,
            body,
            started,
        }
    }

    pub fn method(&self) -> &str {
        self.parts.method.as_str()
    }

    pub fn path(&self) -> &str {
        self.parts.uri.path()
    }
}

/// The request ID set by the request-id layer, or "unknown".
pub fn request_id(parts: &request::Parts) -> String {
    parts
        .headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

/// Host header, falling back to the URI authority (HTTP/2).
pub fn host_of(parts: &request::Parts) -> String {
    parts
        .headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| parts.uri.authority().map(|a| a.as_str()))
        .unwrap_or_default()
        .to_string()
}

/// Peer address, when the server was started with connect info.
pub fn client_addr(parts: &request::Parts) -> Option<SocketAddr> {
    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[test]
    fn test_extracts_request_metadata() {
        let mut request = Request::builder()
            .uri("/calculate?x=1")
            .header(header::HOST, "localhost:9999")
            .header(X_REQUEST_ID, "abc-123")
            .body(())
            .unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo("10.1.2.3:5555".parse::<SocketAddr>().unwrap()));
        let (parts, _) = request.into_parts();

        assert_eq!(host_of(&parts), "localhost:9999");
        let inbound = InboundRequest::new(parts, Bytes::new(), Instant::now());
        assert_eq!(inbound.request_id, "abc-123");
        assert_eq!(inbound.client_addr.unwrap().port(), 5555);
        assert_eq!(inbound.path(), "/calculate");
        assert_eq!(inbound.method(), "GET");
    }

    #[test]
    fn test_host_falls_back_to_authority() {
        let (parts, _) = Request::builder()
            .uri("http://example.com:8080/x")
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(host_of(&parts), "example.com:8080");
        assert_eq!(request_id(&parts), "unknown");
    }
}
