//! Circuit breaker for backend protection.
//!
//! # States
//! - Enabled: backend takes part in selection
//! - Disabled: backend skipped until `time_to_keep_disabled` has elapsed
//! - Disabled forever: static configuration error, needs an operator fix
//!
//! # State Transitions
//! ```text
//! Enabled → Disabled: consecutive_errors >= consecutive_errors_to_disable
//! Enabled → Disabled forever: same, when the failure is permanent (bad url)
//! Disabled → Enabled: reactivation sweep after time_to_keep_disabled
//! Disabled → Enabled: forced recovery when the whole pool is down
//! ```
//!
//! # Design Decisions
//! - Per-backend state, mutated under that backend's lock only
//! - Any success resets the consecutive counter
//! - `disabled_since` is only meaningful while disabled

use std::time::{Duration, Instant};

use crate::config::CircuitBreakerConfig;

/// Thresholds driving the state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerPolicy {
    pub consecutive_errors_to_disable: u64,
    pub time_to_keep_disabled: Duration,
}

impl From<&CircuitBreakerConfig> for BreakerPolicy {
    fn from(config: &CircuitBreakerConfig) -> Self {
        Self {
            consecutive_errors_to_disable: config.consecutive_errors_to_disable,
            time_to_keep_disabled: config.time_to_keep_disabled(),
        }
    }
}

impl Default for BreakerPolicy {
    fn default() -> Self {
        Self::from(&CircuitBreakerConfig::default())
    }
}

/// What a recorded failure did to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Counters updated; enabled state unchanged.
    Counted,
    /// Disabled until reactivated by the sweep.
    Disabled,
    /// Disabled and excluded from the sweep.
    DisabledForever,
}

/// Mutable health state of one backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerState {
    pub enabled: bool,
    pub forever: bool,
    pub disabled_since: Option<Instant>,
    pub error_counter: u64,
    pub error_consecutive_counter: u64,
    pub used_successfully: u64,
    pub total_time: Duration,
}

impl Default for BreakerState {
    fn default() -> Self {
        Self {
            enabled: true,
            forever: false,
            disabled_since: None,
            error_counter: 0,
            error_consecutive_counter: 0,
            used_successfully: 0,
            total_time: Duration::ZERO,
        }
    }
}

impl BreakerState {
    /// Record a failed forward. `permanent` marks failures that cannot heal on their own.
    pub fn record_failure(&mut self, permanent: bool, policy: &BreakerPolicy, now: Instant) -> Transition {
        self.error_counter += 1;
        self.error_consecutive_counter += 1;

        if self.error_consecutive_counter < policy.consecutive_errors_to_disable {
            return Transition::Counted;
        }

        let was_enabled = self.enabled;
        if was_enabled {
            self.enabled = false;
            self.disabled_since = Some(now);
        }

        if permanent && !self.forever {
            self.forever = true;
            Transition::DisabledForever
        } else if was_enabled {
            Transition::Disabled
        } else {
            Transition::Counted
        }
    }

    /// Record a successful forward that took `elapsed`.
    pub fn record_success(&mut self, elapsed: Duration) {
        self.error_consecutive_counter = 0;
        self.used_successfully += 1;
        self.total_time += elapsed;
    }

    /// Re-enable if the keep-disabled period is over. Never touches `forever` backends.
    pub fn try_reactivate(&mut self, now: Instant, keep_disabled: Duration) -> bool {
        if self.enabled || self.forever {
            return false;
        }

        let due = self
            .disabled_since
            .map_or(true, |since| now.saturating_duration_since(since) >= keep_disabled);
        if !due {
            return false;
        }

        self.enabled = true;
        self.disabled_since = None;
        self.error_consecutive_counter = 0;
        true
    }

    /// Emergency re-enable used by forced recovery. `forever` backends stay out.
    pub fn force_enable(&mut self) -> bool {
        if self.enabled || self.forever {
            return false;
        }
        self.enabled = true;
        self.disabled_since = None;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(threshold: u64) -> BreakerPolicy {
        BreakerPolicy {
            consecutive_errors_to_disable: threshold,
            time_to_keep_disabled: Duration::from_secs(90),
        }
    }

    #[test]
    fn test_disables_at_threshold() {
        let mut state = BreakerState::default();
        let now = Instant::now();

        assert_eq!(state.record_failure(false, &policy(2), now), Transition::Counted);
        assert!(state.enabled);
        assert!(state.disabled_since.is_none());

        assert_eq!(state.record_failure(false, &policy(2), now), Transition::Disabled);
        assert!(!state.enabled);
        assert_eq!(state.disabled_since, Some(now));
        assert_eq!(state.error_counter, 2);
    }

    #[test]
    fn test_disabled_since_set_once() {
        let mut state = BreakerState::default();
        let first = Instant::now();
        assert_eq!(state.record_failure(false, &policy(1), first), Transition::Disabled);
        // Already disabled, e.g. tripped by a concurrent request.
        assert_eq!(
            state.record_failure(false, &policy(1), first + Duration::from_secs(5)),
            Transition::Counted
        );
        assert_eq!(state.disabled_since, Some(first));
        assert_eq!(state.error_consecutive_counter, 2);
    }

    #[test]
    fn test_permanent_failure_sets_forever() {
        let mut state = BreakerState::default();
        let now = Instant::now();
        assert_eq!(state.record_failure(true, &policy(1), now), Transition::DisabledForever);
        assert!(state.forever);
        assert!(!state.enabled);

        assert_eq!(state.record_failure(true, &policy(1), now), Transition::Counted);

        assert!(!state.try_reactivate(now + Duration::from_secs(3600), Duration::from_secs(90)));
        assert!(!state.force_enable());
        assert!(!state.enabled);
    }

    #[test]
    fn test_permanent_failure_on_disabled_backend_sets_forever() {
        let mut state = BreakerState::default();
        let now = Instant::now();
        assert_eq!(state.record_failure(false, &policy(1), now), Transition::Disabled);
        assert_eq!(state.record_failure(true, &policy(1), now), Transition::DisabledForever);
        assert!(state.forever);
        assert_eq!(state.disabled_since, Some(now));
    }

    #[test]
    fn test_success_resets_consecutive_counter() {
        let mut state = BreakerState::default();
        let now = Instant::now();
        state.record_failure(false, &policy(10), now);
        state.record_failure(false, &policy(10), now);

        state.record_success(Duration::from_millis(15));
        assert_eq!(state.error_consecutive_counter, 0);
        assert_eq!(state.error_counter, 2);
        assert_eq!(state.used_successfully, 1);
        assert_eq!(state.total_time, Duration::from_millis(15));
    }

    #[test]
    fn test_reactivation_waits_for_keep_period() {
        let mut state = BreakerState::default();
        let now = Instant::now();
        state.record_failure(false, &policy(1), now);

        let keep = Duration::from_secs(90);
        assert!(!state.try_reactivate(now + Duration::from_secs(89), keep));
        assert!(!state.enabled);

        assert!(state.try_reactivate(now + Duration::from_secs(90), keep));
        assert!(state.enabled);
        assert_eq!(state.error_consecutive_counter, 0);
        assert!(state.disabled_since.is_none());
    }
}
