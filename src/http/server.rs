//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the gateway handler as fallback
//! - Wire up middleware (tracing, request ID)
//! - Bind server to listener, with the optional admin listener beside it
//! - Dispatch requests to the routing engine, local handlers or the pipeline
//! - Apply configuration reloads and run the health reactivator
//!
//! # Design Decisions
//! - One handler for every path; routing is data, not Axum routes
//! - The route table is pinned at the start of a request and used until the end
//! - Graceful shutdown drains in-flight requests before returning

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Router;
use http_body_util::LengthLimitError;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::admin::setup_admin_router;
use crate::config::{GatewayConfig, LimitsConfig};
use crate::health::HealthReactivator;
use crate::http::forward::{run_pipeline, Outcome};
use crate::http::local::{HandlerRegistry, LocalRequest};
use crate::http::proxy::ReverseProxy;
use crate::http::request::{self, InboundRequest};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::routing::{Captures, RouteMatch, RouteStore, RouteTable, RouteTarget, TableError};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<RouteStore>,
    pub handlers: Arc<HandlerRegistry>,
    pub proxy: Arc<ReverseProxy>,
    pub limits: LimitsConfig,
}

impl AppState {
    /// Compile `config` and stage it for the next request.
    pub fn apply_config(&self, config: &GatewayConfig) -> Result<(), TableError> {
        let table = RouteTable::build(config, &self.handlers)?;
        let routes = table.routes().len();
        self.routes.stage(table);
        tracing::info!(routes, "Configuration staged");
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid route table: {0}")]
    Table(#[from] TableError),

    #[error("server i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// HTTP server for the gateway.
pub struct GatewayServer {
    state: AppState,
    config: GatewayConfig,
}

impl GatewayServer {
    /// Create a server with the built-in local handlers.
    pub fn new(config: GatewayConfig) -> Result<Self, ServerError> {
        Self::with_handlers(config, HandlerRegistry::with_builtins())
    }

    /// Create a server resolving handler names against `handlers`.
    pub fn with_handlers(config: GatewayConfig, handlers: HandlerRegistry) -> Result<Self, ServerError> {
        let table = RouteTable::build(&config, &handlers)?;

        let state = AppState {
            routes: Arc::new(RouteStore::new(table)),
            handlers: Arc::new(handlers),
            proxy: Arc::new(ReverseProxy::new(&config.transport)),
            limits: config.limits.clone(),
        };

        Ok(Self { state, config })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// The gateway router with all middleware layers.
    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Serve until `shutdown` fires, applying configs received on `config_updates`.
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
        shutdown: Shutdown,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, routes = self.state.routes.current().routes().len(), "Gateway starting");

        let reactivator = HealthReactivator::new(
            self.state.routes.clone(),
            self.config.circuit_breaker.time_to_verify_disabled(),
        );
        tokio::spawn(reactivator.run(shutdown.subscribe()));

        tokio::spawn(apply_config_updates(
            self.state.clone(),
            config_updates,
            shutdown.subscribe(),
        ));

        if self.config.admin.enabled {
            let admin_listener = TcpListener::bind(&self.config.admin.bind_address).await?;
            tracing::info!(address = %admin_listener.local_addr()?, "Admin listener starting");
            let admin = setup_admin_router(self.state.clone());
            let mut admin_shutdown = shutdown.subscribe();
            tokio::spawn(async move {
                let served = axum::serve(admin_listener, admin)
                    .with_graceful_shutdown(async move {
                        let _ = admin_shutdown.recv().await;
                    })
                    .await;
                if let Err(e) = served {
                    tracing::error!(error = %e, "Admin listener failed");
                }
            });
        }

        let app = self.router().into_make_service_with_connect_info::<SocketAddr>();
        let mut stop = shutdown.subscribe();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = stop.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("Gateway stopped");
        Ok(())
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .fallback(gateway_handler)
        .with_state(state)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

async fn apply_config_updates(
    state: AppState,
    mut updates: mpsc::UnboundedReceiver<GatewayConfig>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Some(config) => {
                    if let Err(e) = state.apply_config(&config) {
                        tracing::error!(error = %e, "Reloaded configuration rejected, keeping the current routes");
                    }
                }
                None => break,
            },
            _ = shutdown.recv() => break,
        }
    }
}

/// Entry point for every request on the gateway listener.
async fn gateway_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let started = Instant::now();
    let table = state.routes.begin_request();

    let (parts, body) = request.into_parts();
    let host = request::host_of(&parts);
    let method = parts.method.to_string();
    let request_id = request::request_id(&parts);

    let body = match axum::body::to_bytes(body, state.limits.max_request_body_bytes).await {
        Ok(body) => body,
        Err(e) => {
            let too_large = std::error::Error::source(&e).is_some_and(|s| s.is::<LengthLimitError>());
            let status = if too_large {
                StatusCode::PAYLOAD_TOO_LARGE
            } else {
                StatusCode::BAD_REQUEST
            };
            tracing::warn!(request_id = %request_id, error = %e, status = status.as_u16(), "Rejected request body");
            metrics::record_request(&method, status.as_u16(), "none", started);
            return (status, "Request body rejected").into_response();
        }
    };

    let inbound = InboundRequest::new(parts, body, started);
    let (response, route) = dispatch(&state, &table, &host, inbound).await;

    let status = response.status().as_u16();
    metrics::record_request(&method, status, &route, started);
    tracing::info!(
        request_id = %request_id,
        route = %route,
        status,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Request served"
    );
    response
}

async fn dispatch(
    state: &AppState,
    table: &RouteTable,
    host: &str,
    inbound: InboundRequest,
) -> (Response, String) {
    let Some(RouteMatch { route, host: host_parts, captures }) =
        table.lookup(host, inbound.method(), inbound.path())
    else {
        tracing::debug!(
            request_id = %inbound.request_id,
            host = %host,
            path = %inbound.path(),
            "No route matched"
        );
        let request = LocalRequest {
            state: state.clone(),
            host: table.host_parts(host).unwrap_or_default(),
            captures: Captures::new(),
            route: None,
            inbound,
        };
        return (table.not_found_handler().call(request).await, "none".to_string());
    };

    let name = route.name().to_string();
    let response = match route.target() {
        RouteTarget::Local(endpoint) => {
            let started = Instant::now();
            let request = LocalRequest {
                state: state.clone(),
                inbound,
                host: host_parts,
                captures,
                route: Some(name.clone()),
            };
            let response = endpoint.handler().call(request).await;
            endpoint.record_use(started.elapsed());
            response
        }
        RouteTarget::Proxy(pool) => {
            match run_pipeline(&state.proxy, &name, pool, table.settings(), &inbound).await {
                Outcome::Relayed { response, backend } => {
                    tracing::debug!(request_id = %inbound.request_id, route = %name, backend = %backend, "Relaying response");
                    state.proxy.relay(response)
                }
                Outcome::Exhausted { attempts } => {
                    tracing::error!(
                        request_id = %inbound.request_id,
                        route = %name,
                        attempts,
                        "All forwarding attempts failed"
                    );
                    let handler = route.error_handler().unwrap_or(table.error_handler());
                    let request = LocalRequest {
                        state: state.clone(),
                        inbound,
                        host: host_parts,
                        captures,
                        route: Some(name.clone()),
                    };
                    handler.call(request).await
                }
            }
        }
    };

    (response, name)
}
