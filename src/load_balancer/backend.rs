//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single forwarding target of a route's pool
//! - Own that target's circuit breaker state behind its own lock
//! - Expose synchronized accessors; callers never touch the fields directly

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config::BackendConfig;
use crate::resilience::{BreakerPolicy, BreakerState, Transition};

/// A single backend server.
#[derive(Debug)]
pub struct Backend {
    name: String,
    url: String,
    state: Mutex<BreakerState>,
}

impl Backend {
    /// Create a new, enabled backend.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            state: Mutex::new(BreakerState::default()),
        }
    }

    pub fn from_config(config: &BackendConfig) -> Self {
        Self::new(config.name.clone(), config.url.clone())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The configured target URL, unparsed. Parsing happens per attempt.
    pub fn url(&self) -> &str {
        &self.url
    }

    // A panic while holding the lock leaves plain counters behind, still usable.
    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_enabled(&self) -> bool {
        self.lock().enabled
    }

    /// Copy of the current health state.
    pub fn state(&self) -> BreakerState {
        self.lock().clone()
    }

    /// Report a failed forward.
    pub fn record_failure(&self, permanent: bool, policy: &BreakerPolicy) -> Transition {
        self.lock().record_failure(permanent, policy, Instant::now())
    }

    /// Report a successful forward.
    pub fn record_success(&self, elapsed: Duration) {
        self.lock().record_success(elapsed);
    }

    /// Re-enable after the keep-disabled period. Returns true on transition.
    pub fn try_reactivate(&self, now: Instant, keep_disabled: Duration) -> bool {
        self.lock().try_reactivate(now, keep_disabled)
    }

    /// Forced recovery. Returns true if the backend was re-enabled.
    pub fn force_enable(&self) -> bool {
        self.lock().force_enable()
    }

    /// Serializable view for statistics.
    pub fn snapshot(&self, tried_this_round: bool) -> BackendSnapshot {
        let state = self.state();
        BackendSnapshot {
            url: self.url.clone(),
            name: self.name.clone(),
            total_time: state.total_time.as_nanos() as u64,
            used_successfully: state.used_successfully,
            enabled: state.enabled,
            forever: state.forever,
            error_counter: state.error_counter,
            error_consecutive_counter: state.error_consecutive_counter,
            disabled_since: state
                .disabled_since
                .map(|since| Instant::now().saturating_duration_since(since).as_secs()),
            tried_this_round,
        }
    }
}

/// Backend counters as reported by `statistics`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BackendSnapshot {
    pub url: String,
    pub name: String,
    /// Sum of successful attempt durations, in nanoseconds.
    pub total_time: u64,
    pub used_successfully: u64,
    pub enabled: bool,
    pub forever: bool,
    pub error_counter: u64,
    pub error_consecutive_counter: u64,
    /// Seconds since the backend was disabled; `None` while enabled.
    pub disabled_since: Option<u64>,
    pub tried_this_round: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_concurrent_updates_are_not_lost() {
        let backend = Arc::new(Backend::new("b1", "http://127.0.0.1:1"));
        let policy = BreakerPolicy {
            consecutive_errors_to_disable: u64::MAX,
            time_to_keep_disabled: Duration::from_secs(90),
        };

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let backend = backend.clone();
                thread::spawn(move || {
                    for _ in 0..500 {
                        if i % 2 == 0 {
                            backend.record_failure(false, &policy);
                        } else {
                            backend.record_success(Duration::from_micros(1));
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let state = backend.state();
        assert_eq!(state.error_counter, 2000);
        assert_eq!(state.used_successfully, 2000);
        assert_eq!(state.total_time, Duration::from_micros(2000));
    }

    #[test]
    fn test_snapshot_reports_counters() {
        let backend = Backend::new("b1", "http://127.0.0.1:1");
        backend.record_success(Duration::from_nanos(250));
        let snap = backend.snapshot(true);
        assert_eq!(snap.name, "b1");
        assert_eq!(snap.total_time, 250);
        assert_eq!(snap.used_successfully, 1);
        assert!(snap.enabled);
        assert!(snap.tried_this_round);

        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["usedSuccessfully"], 1);
        assert_eq!(json["errorConsecutiveCounter"], 0);
        assert!(json["disabledSince"].is_null());
    }

    #[test]
    fn test_snapshot_reports_disabled_since() {
        let backend = Backend::new("b1", "http://127.0.0.1:1");
        let policy = BreakerPolicy {
            consecutive_errors_to_disable: 1,
            time_to_keep_disabled: Duration::from_secs(90),
        };
        backend.record_failure(false, &policy);

        let snap = backend.snapshot(false);
        assert!(!snap.enabled);
        assert_eq!(snap.disabled_since, Some(0));

        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["disabledSince"], 0);

        backend.force_enable();
        assert_eq!(backend.snapshot(false).disabled_since, None);
    }
}
