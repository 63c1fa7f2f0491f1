//! Reverse-proxy transport.
//!
//! # Responsibilities
//! - Rewrite the inbound URI onto a backend base URL
//! - Strip hop-by-hop headers in both directions
//! - Append the client address to X-Forwarded-For
//! - Send one attempt and buffer the whole response body
//!
//! # Design Decisions
//! - The body is read to the end before anything reaches the client, so a
//!   truncated body is a failed attempt and can be retried elsewhere
//! - Content-Length is recomputed from the buffered body
//! - Trailers are not forwarded

use std::net::IpAddr;
use std::time::Duration;

use axum::body::Body;
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::{response, Request, Response, Uri, Version};
use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use thiserror::Error;

use crate::config::TransportConfig;
use crate::http::relay;
use crate::http::request::{InboundRequest, X_REQUEST_ID};
use crate::resilience::timeouts::with_deadline;

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Headers that only make sense on a single connection.
const HOP_HEADERS: [&str; 9] = [
    "connection",
    "proxy-connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Why a single forwarding attempt failed.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("malformed backend url '{url}': {reason}")]
    MalformedUrl { url: String, reason: String },

    #[error("upstream request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),

    #[error("upstream did not answer within {0:?}")]
    Timeout(Duration),

    #[error("failed to read upstream body: {0}")]
    Body(String),

    #[error("upstream body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },
}

impl ForwardError {
    /// Retrying the same backend can never succeed.
    pub fn is_permanent(&self) -> bool {
        matches!(self, ForwardError::MalformedUrl { .. })
    }
}

/// A backend response with its body fully read.
#[derive(Debug)]
pub struct BufferedResponse {
    pub parts: response::Parts,
    pub body: Bytes,
}

/// Parsed backend base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    scheme: String,
    authority: String,
    path: String,
    query: Option<String>,
}

impl Target {
    pub fn parse(raw: &str) -> Result<Self, ForwardError> {
        let malformed = |reason: String| ForwardError::MalformedUrl {
            url: raw.to_string(),
            reason,
        };

        let url = url::Url::parse(raw).map_err(|e| malformed(e.to_string()))?;
        if url.scheme() != "http" {
            return Err(malformed(format!("unsupported scheme '{}'", url.scheme())));
        }
        let host = url
            .host_str()
            .ok_or_else(|| malformed("missing host".to_string()))?;
        let authority = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };

        Ok(Self {
            scheme: url.scheme().to_string(),
            authority,
            path: url.path().to_string(),
            query: url.query().filter(|q| !q.is_empty()).map(str::to_string),
        })
    }

    /// Join the base path with the inbound path and merge both queries.
    pub fn rewrite(&self, inbound: &Uri) -> Result<Uri, ForwardError> {
        let path = single_joining_slash(&self.path, inbound.path());
        let query = match (self.query.as_deref(), inbound.query().filter(|q| !q.is_empty())) {
            (Some(base), Some(req)) => Some(format!("{base}&{req}")),
            (Some(base), None) => Some(base.to_string()),
            (None, Some(req)) => Some(req.to_string()),
            (None, None) => None,
        };

        let mut rebuilt = format!("{}://{}{}", self.scheme, self.authority, path);
        if let Some(query) = query {
            rebuilt.push('?');
            rebuilt.push_str(&query);
        }

        rebuilt.parse::<Uri>().map_err(|e| ForwardError::MalformedUrl {
            url: rebuilt.clone(),
            reason: e.to_string(),
        })
    }
}

/// Join two path segments with exactly one slash between them.
pub fn single_joining_slash(a: &str, b: &str) -> String {
    match (a.ends_with('/'), b.starts_with('/')) {
        (true, true) => format!("{}{}", a, &b[1..]),
        (false, false) => format!("{a}/{b}"),
        _ => format!("{a}{b}"),
    }
}

/// Remove hop-by-hop headers, including any named in Connection.
pub fn strip_hop_headers(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed {
        headers.remove(name);
    }
    for name in HOP_HEADERS {
        headers.remove(name);
    }
}

/// Append `client` to any X-Forwarded-For chain already present.
pub fn append_forwarded_for(headers: &mut HeaderMap, client: IpAddr) {
    let prior: Vec<&str> = headers
        .get_all(X_FORWARDED_FOR)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();

    let chain = if prior.is_empty() {
        client.to_string()
    } else {
        format!("{}, {}", prior.join(", "), client)
    };

    if let Ok(value) = HeaderValue::from_str(&chain) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}

/// HTTP client that forwards one attempt at a time.
#[derive(Clone)]
pub struct ReverseProxy {
    client: Client<HttpConnector, Full<Bytes>>,
    request_timeout: Duration,
    max_body: usize,
    flush_interval: Option<Duration>,
}

impl ReverseProxy {
    pub fn new(config: &TransportConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(config.connect_timeout_secs)));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new()).build(connector);

        Self {
            client,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            max_body: config.max_response_body_bytes,
            flush_interval: config.flush_interval(),
        }
    }

    /// Forward `inbound` to the backend at `backend_url` and buffer the reply.
    pub async fn forward(
        &self,
        backend_url: &str,
        inbound: &InboundRequest,
    ) -> Result<BufferedResponse, ForwardError> {
        let target = Target::parse(backend_url)?;
        let uri = target.rewrite(&inbound.parts.uri)?;

        let mut headers = inbound.parts.headers.clone();
        strip_hop_headers(&mut headers);
        if let Some(addr) = inbound.client_addr {
            append_forwarded_for(&mut headers, addr.ip());
        }
        if let Ok(id) = HeaderValue::from_str(&inbound.request_id) {
            headers.insert(X_REQUEST_ID, id);
        }

        let mut request = Request::new(Full::new(inbound.body.clone()));
        *request.method_mut() = inbound.parts.method.clone();
        *request.uri_mut() = uri;
        *request.headers_mut() = headers;

        with_deadline(self.request_timeout, async {
            let response = self.client.request(request).await?;
            let (mut parts, body) = response.into_parts();

            let body = Limited::new(body, self.max_body)
                .collect()
                .await
                .map_err(|e| {
                    if e.downcast_ref::<LengthLimitError>().is_some() {
                        ForwardError::BodyTooLarge { limit: self.max_body }
                    } else {
                        ForwardError::Body(e.to_string())
                    }
                })?
                .to_bytes();

            strip_hop_headers(&mut parts.headers);
            if carries_body(parts.status.as_u16(), &inbound.parts.method) {
                parts.headers.insert(header::CONTENT_LENGTH, HeaderValue::from(body.len()));
            }
            parts.version = Version::HTTP_11;

            Ok::<_, ForwardError>(BufferedResponse { parts, body })
        })
        .await
    }

    /// Turn a buffered response into one streamed back to the client.
    pub fn relay(&self, response: BufferedResponse) -> Response<Body> {
        let BufferedResponse { parts, body } = response;
        Response::from_parts(parts, relay::spawn_relay(body, self.flush_interval))
    }
}

fn carries_body(status: u16, method: &axum::http::Method) -> bool {
    !(method == axum::http::Method::HEAD || (100..200).contains(&status) || status == 204 || status == 304)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_joining_slash() {
        assert_eq!(single_joining_slash("/", "/calc"), "/calc");
        assert_eq!(single_joining_slash("/api/", "/calc"), "/api/calc");
        assert_eq!(single_joining_slash("/api", "calc"), "/api/calc");
        assert_eq!(single_joining_slash("/api", "/calc"), "/api/calc");
    }

    #[test]
    fn test_rewrite_joins_path_and_merges_query() {
        let target = Target::parse("http://127.0.0.1:8081/base?key=1").unwrap();
        let uri: Uri = "/calculate?x=2".parse().unwrap();
        assert_eq!(
            target.rewrite(&uri).unwrap().to_string(),
            "http://127.0.0.1:8081/base/calculate?key=1&x=2"
        );

        let target = Target::parse("http://backend.local").unwrap();
        let uri: Uri = "/a/b".parse().unwrap();
        assert_eq!(target.rewrite(&uri).unwrap().to_string(), "http://backend.local/a/b");
    }

    #[test]
    fn test_malformed_urls_are_permanent() {
        for raw in ["not a url", "ftp://host/", "https://host/", "http://"] {
            let err = Target::parse(raw).unwrap_err();
            assert!(err.is_permanent(), "{raw} should be permanent");
        }
        assert!(!ForwardError::Timeout(Duration::from_secs(1)).is_permanent());
        assert!(!ForwardError::Body("reset".into()).is_permanent());
    }

    #[test]
    fn test_strip_hop_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, X-Session"));
        headers.insert("x-session", HeaderValue::from_static("abc"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(header::UPGRADE, HeaderValue::from_static("websocket"));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));

        strip_hop_headers(&mut headers);

        assert_eq!(headers.len(), 1);
        assert_eq!(headers[header::CONTENT_TYPE], "text/plain");
    }

    #[test]
    fn test_forwarded_for_appends() {
        let mut headers = HeaderMap::new();
        append_forwarded_for(&mut headers, "10.0.0.1".parse().unwrap());
        assert_eq!(headers[X_FORWARDED_FOR], "10.0.0.1");

        append_forwarded_for(&mut headers, "10.0.0.2".parse().unwrap());
        assert_eq!(headers[X_FORWARDED_FOR], "10.0.0.1, 10.0.0.2");
    }

    #[test]
    fn test_content_length_rules() {
        use axum::http::Method;
        assert!(carries_body(200, &Method::GET));
        assert!(!carries_body(200, &Method::HEAD));
        assert!(!carries_body(204, &Method::GET));
        assert!(!carries_body(304, &Method::GET));
        assert!(!carries_body(101, &Method::GET));
    }
}
