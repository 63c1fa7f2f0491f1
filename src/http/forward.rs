//! Forwarding pipeline for proxy routes.
//!
//! # Responsibilities
//! - Walk the route's pool until one backend answers completely
//! - Feed every outcome into the backend's circuit breaker
//! - Bound the walk by the loop budget
//!
//! # Design Decisions
//! - One attempt at a time; no backoff between attempts
//! - A forced recovery of the pool is charged to the budget like a failure
//! - The pipeline never writes to the client; the caller relays or renders the error

use std::time::Instant;

use crate::http::proxy::{BufferedResponse, ReverseProxy};
use crate::http::request::InboundRequest;
use crate::load_balancer::{BackendPool, Selection};
use crate::observability::metrics;
use crate::resilience::{LoopBudget, Transition};
use crate::routing::TableSettings;

/// How a pipeline run ended.
#[derive(Debug)]
pub enum Outcome {
    /// A backend answered; relay this response.
    Relayed {
        response: BufferedResponse,
        backend: String,
    },
    /// The loop budget ran out.
    Exhausted { attempts: u32 },
}

/// Forward `inbound` through `pool` until a backend succeeds or the budget is spent.
pub async fn run_pipeline(
    proxy: &ReverseProxy,
    route: &str,
    pool: &BackendPool,
    settings: &TableSettings,
    inbound: &InboundRequest,
) -> Outcome {
    let mut retry = pool.retry_state();
    let mut budget = LoopBudget::new(settings.max_loop_try);

    loop {
        let (index, backend) = match pool.select(&mut retry) {
            Selection::Backend { index, backend, tier } => {
                tracing::debug!(
                    request_id = %inbound.request_id,
                    route = %route,
                    backend = %backend.name(),
                    tier = ?tier,
                    "Backend selected"
                );
                (index, backend)
            }
            Selection::Recovered { reenabled } => {
                tracing::warn!(
                    request_id = %inbound.request_id,
                    route = %route,
                    reenabled,
                    "Every backend was disabled, forcing the pool back on"
                );
                metrics::record_forced_recovery(route);
                if let Err(exhausted) = budget.consume() {
                    return Outcome::Exhausted { attempts: exhausted.attempts };
                }
                continue;
            }
        };

        let started = Instant::now();
        match proxy.forward(backend.url(), inbound).await {
            Ok(response) => {
                backend.record_success(started.elapsed());
                return Outcome::Relayed {
                    response,
                    backend: backend.name().to_string(),
                };
            }
            Err(e) => {
                let transition = backend.record_failure(e.is_permanent(), &settings.breaker);
                retry.mark_failed(index);
                metrics::record_backend_failure(route, backend.name());

                tracing::warn!(
                    request_id = %inbound.request_id,
                    route = %route,
                    backend = %backend.name(),
                    attempt = budget.used() + 1,
                    error = %e,
                    "Forwarding attempt failed"
                );

                match transition {
                    Transition::Counted => {}
                    Transition::Disabled => {
                        metrics::record_backend_disabled(route, backend.name());
                        tracing::error!(route = %route, backend = %backend.name(), "Backend disabled");
                    }
                    Transition::DisabledForever => {
                        metrics::record_backend_disabled(route, backend.name());
                        tracing::error!(
                            route = %route,
                            backend = %backend.name(),
                            url = %backend.url(),
                            "Backend disabled permanently, its url can never work"
                        );
                    }
                }

                if let Err(exhausted) = budget.consume() {
                    return Outcome::Exhausted { attempts: exhausted.attempts };
                }
            }
        }
    }
}
