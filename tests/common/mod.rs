//! Shared utilities for integration and load testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use route_gateway::config::{BackendConfig, DomainConfig, GatewayConfig, PathConfig, RouteConfig};
use route_gateway::http::AppState;
use route_gateway::http::GatewayServer;
use route_gateway::lifecycle::Shutdown;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

/// Build a raw HTTP/1.1 response that closes the connection.
pub fn http_response(status: &str, extra_headers: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\n{}Connection: close\r\n\r\n{}",
        status,
        body.len(),
        extra_headers,
        body
    )
}

fn header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

fn content_length(head: &str) -> usize {
    head.lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse().ok())
        .unwrap_or(0)
}

/// Read one request (head and body) from `socket`.
async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        if let Some(end) = header_end(&buf) {
            let head = String::from_utf8_lossy(&buf[..end]).to_string();
            if buf.len() >= end + 4 + content_length(&head) {
                break;
            }
        }
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }

    String::from_utf8_lossy(&buf).to_string()
}

/// Start a backend on an ephemeral port. `handler` maps the raw request to raw response bytes.
pub async fn start_backend<F>(handler: F) -> SocketAddr
where
    F: Fn(String) -> String + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handler = Arc::new(handler);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let handler = handler.clone();
                    tokio::spawn(async move {
                        let request = read_request(&mut socket).await;
                        let response = handler(request);
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Backend answering 200 with `body`, counting the requests it served.
pub async fn start_counting_backend(body: &'static str) -> (SocketAddr, Arc<AtomicU32>) {
    let count = Arc::new(AtomicU32::new(0));
    let counter = count.clone();
    let addr = start_backend(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        http_response("200 OK", "", body)
    })
    .await;
    (addr, count)
}

/// Backend that promises more body than it sends, then hangs up.
pub async fn start_truncating_backend() -> SocketAddr {
    start_backend(|_| "HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\nonly part".to_string()).await
}

/// Backend that returns the request it received as the body.
pub async fn start_echo_backend(extra_headers: &'static str) -> SocketAddr {
    start_backend(move |request| http_response("200 OK", extra_headers, &request)).await
}

/// An address nothing listens on.
pub async fn dead_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// A proxy route on `gateway` for `path`, forwarding to `backends` in order.
pub fn proxy_route(name: &str, gateway: SocketAddr, path: &str, backends: &[SocketAddr]) -> RouteConfig {
    RouteConfig {
        name: name.into(),
        domain: DomainConfig {
            sub_domain: String::new(),
            domain: "127.0.0.1".into(),
            port: gateway.port().to_string(),
            error_handler: None,
        },
        path: PathConfig {
            path: path.into(),
            method: String::new(),
            exp_reg: String::new(),
        },
        proxy_enable: true,
        handler: None,
        proxy_servers: backends
            .iter()
            .enumerate()
            .map(|(i, addr)| BackendConfig {
                name: format!("b{}", i + 1),
                url: format!("http://{}", addr),
            })
            .collect(),
    }
}

/// A local-handler route on `gateway`.
pub fn local_route(name: &str, gateway: SocketAddr, method: &str, path: &str, handler: &str) -> RouteConfig {
    RouteConfig {
        name: name.into(),
        domain: DomainConfig {
            sub_domain: String::new(),
            domain: "127.0.0.1".into(),
            port: gateway.port().to_string(),
            error_handler: None,
        },
        path: PathConfig {
            path: path.into(),
            method: method.into(),
            exp_reg: String::new(),
        },
        proxy_enable: false,
        handler: Some(handler.into()),
        proxy_servers: Vec::new(),
    }
}

pub struct TestGateway {
    pub addr: SocketAddr,
    pub state: AppState,
    pub shutdown: Shutdown,
    pub updates: mpsc::UnboundedSender<GatewayConfig>,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start a gateway whose config is built once its listen address is known.
pub async fn start_gateway<F>(build: F) -> TestGateway
where
    F: FnOnce(SocketAddr) -> GatewayConfig,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let mut config = build(addr);
    config.listener.bind_address = addr.to_string();

    let server = GatewayServer::new(config).unwrap();
    let state = server.state().clone();
    let shutdown = Shutdown::new();
    let (updates, config_updates) = mpsc::unbounded_channel();

    let server_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let _ = server.run(listener, config_updates, server_shutdown).await;
    });

    tokio::time::sleep(Duration::from_millis(50)).await;

    TestGateway {
        addr,
        state,
        shutdown,
        updates,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
