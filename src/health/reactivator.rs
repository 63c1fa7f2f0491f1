//! Periodic re-enabling of disabled backends.
//!
//! # Responsibilities
//! - Every verify interval, scan every backend of every live route
//! - Re-enable backends whose keep-disabled period has elapsed
//!
//! # Design Decisions
//! - No probing: a backend gets traffic back purely on elapsed time, and the
//!   breaker trips again if it is still broken
//! - Permanently disabled backends are never touched

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tokio::time;

use crate::observability::metrics;
use crate::routing::RouteStore;

pub struct HealthReactivator {
    routes: Arc<RouteStore>,
    interval: Duration,
}

impl HealthReactivator {
    pub fn new(routes: Arc<RouteStore>, interval: Duration) -> Self {
        Self {
            routes,
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval_secs = self.interval.as_secs_f64(), "Health reactivator starting");

        let mut ticker = time::interval_at(time::Instant::now() + self.interval, self.interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep(Instant::now());
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health reactivator received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Re-enable every backend due at `now`. Returns how many were re-enabled.
    pub fn sweep(&self, now: Instant) -> usize {
        let table = self.routes.current();
        let keep = table.settings().breaker.time_to_keep_disabled;
        let mut reenabled = 0;

        for route in table.routes() {
            let Some(pool) = route.pool() else { continue };
            for backend in pool.backends() {
                if backend.try_reactivate(now, keep) {
                    reenabled += 1;
                    metrics::record_backend_reactivated(route.name(), backend.name());
                    tracing::info!(route = %route.name(), backend = %backend.name(), "Backend re-enabled");
                }
            }
        }

        reenabled
    }
}
