//! Backend pool management.
//!
//! # Responsibilities
//! - Hold the ordered backends of one route
//! - Track which backends were handed out in the current round
//! - Apply the tiered strategy and its side effects atomically
//! - Force-enable the pool when every backend is down

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::BackendConfig;
use crate::load_balancer::backend::{Backend, BackendSnapshot};
use crate::load_balancer::selector::{rank_candidates, CandidateView, Tier};

/// Failures seen by one request's retry sequence. Never shared between requests.
#[derive(Debug, Clone)]
pub struct RetryState {
    failed: Vec<bool>,
}

impl RetryState {
    pub fn new(pool_len: usize) -> Self {
        Self {
            failed: vec![false; pool_len],
        }
    }

    pub fn mark_failed(&mut self, index: usize) {
        if let Some(slot) = self.failed.get_mut(index) {
            *slot = true;
        }
    }

    pub fn is_failed(&self, index: usize) -> bool {
        self.failed.get(index).copied().unwrap_or(false)
    }

    /// Forget every failure of this request.
    pub fn clear(&mut self) {
        self.failed.fill(false);
    }
}

/// Outcome of one selection.
#[derive(Debug, Clone)]
pub enum Selection {
    /// Try this backend next.
    Backend {
        index: usize,
        backend: Arc<Backend>,
        tier: Tier,
    },
    /// Nothing was enabled; the pool was force-enabled and selection should restart.
    Recovered { reenabled: usize },
}

/// The ordered backends of one route.
#[derive(Debug)]
pub struct BackendPool {
    backends: Vec<Arc<Backend>>,
    /// Tried-this-round flags, one per backend. Shared round-robin cursor of the pool.
    round: Mutex<Vec<bool>>,
}

impl BackendPool {
    pub fn new(backends: Vec<Arc<Backend>>) -> Self {
        let round = Mutex::new(vec![false; backends.len()]);
        Self { backends, round }
    }

    pub fn from_config(configs: &[BackendConfig]) -> Self {
        Self::new(configs.iter().map(|c| Arc::new(Backend::from_config(c))).collect())
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn backends(&self) -> &[Arc<Backend>] {
        &self.backends
    }

    pub fn retry_state(&self) -> RetryState {
        RetryState::new(self.backends.len())
    }

    fn round(&self) -> MutexGuard<'_, Vec<bool>> {
        self.round.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pick the next backend for a request's retry sequence.
    pub fn select(&self, retry: &mut RetryState) -> Selection {
        let mut round = self.round();

        let views: Vec<CandidateView> = self
            .backends
            .iter()
            .enumerate()
            .map(|(i, b)| CandidateView {
                enabled: b.is_enabled(),
                tried_this_round: round[i],
                failed_this_attempt: retry.is_failed(i),
            })
            .collect();

        let Some(best) = rank_candidates(&views).first().copied() else {
            let reenabled = self.backends.iter().filter(|b| b.force_enable()).count();
            return Selection::Recovered { reenabled };
        };

        match best.tier {
            Tier::Fresh => {}
            Tier::NewRound => round.fill(false),
            Tier::RetryFailed => {
                round.fill(false);
                retry.clear();
            }
        }
        round[best.index] = true;

        Selection::Backend {
            index: best.index,
            backend: self.backends[best.index].clone(),
            tier: best.tier,
        }
    }

    pub fn snapshot(&self) -> Vec<BackendSnapshot> {
        let round = self.round().clone();
        self.backends
            .iter()
            .zip(round)
            .map(|(b, tried)| b.snapshot(tried))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::BreakerPolicy;
    use std::time::Duration;

    fn pool(n: usize) -> BackendPool {
        BackendPool::new(
            (0..n)
                .map(|i| Arc::new(Backend::new(format!("b{i}"), format!("http://127.0.0.1:{}", 9000 + i))))
                .collect(),
        )
    }

    fn pick(pool: &BackendPool, retry: &mut RetryState) -> usize {
        match pool.select(retry) {
            Selection::Backend { index, .. } => index,
            Selection::Recovered { .. } => panic!("unexpected forced recovery"),
        }
    }

    fn policy(threshold: u64) -> BreakerPolicy {
        BreakerPolicy {
            consecutive_errors_to_disable: threshold,
            time_to_keep_disabled: Duration::from_secs(90),
        }
    }

    #[test]
    fn test_distinct_backends_before_repeat() {
        let pool = pool(3);
        let picks: Vec<usize> = (0..6).map(|_| pick(&pool, &mut pool.retry_state())).collect();
        assert_eq!(picks, vec![0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn test_failed_backend_is_deprioritized_within_request() {
        let pool = pool(2);
        let mut retry = pool.retry_state();

        assert_eq!(pick(&pool, &mut retry), 0);
        retry.mark_failed(0);
        assert_eq!(pick(&pool, &mut retry), 1);
        retry.mark_failed(1);

        // Both failed in this request: failures are forgotten, pool order restarts.
        let next = pool.select(&mut retry);
        assert!(matches!(next, Selection::Backend { index: 0, tier: Tier::RetryFailed, .. }));
        assert!(!retry.is_failed(1));
    }

    #[test]
    fn test_other_requests_do_not_see_failures() {
        let pool = pool(2);
        let mut first = pool.retry_state();
        assert_eq!(pick(&pool, &mut first), 0);
        first.mark_failed(0);

        // A concurrent request starts a new round and may still use backend 0.
        let mut second = pool.retry_state();
        assert_eq!(pick(&pool, &mut second), 1);
        assert_eq!(pick(&pool, &mut second), 0);
    }

    #[test]
    fn test_forced_recovery_when_all_disabled() {
        let pool = pool(3);
        for b in pool.backends() {
            b.record_failure(false, &policy(1));
        }

        let mut retry = pool.retry_state();
        assert!(matches!(pool.select(&mut retry), Selection::Recovered { reenabled: 3 }));
        assert!(pool.backends().iter().all(|b| b.is_enabled()));
        assert!(matches!(pool.select(&mut retry), Selection::Backend { .. }));
    }

    #[test]
    fn test_forced_recovery_skips_forever() {
        let pool = pool(2);
        pool.backends()[0].record_failure(true, &policy(1));
        pool.backends()[1].record_failure(false, &policy(1));

        let mut retry = pool.retry_state();
        assert!(matches!(pool.select(&mut retry), Selection::Recovered { reenabled: 1 }));
        assert_eq!(pick(&pool, &mut retry), 1);
    }

    #[test]
    fn test_disabled_backend_skipped_then_round_continues() {
        // Pool [A, B, C], A fails twice with a threshold of two.
        let pool = pool(3);
        let p = policy(2);

        let mut req = pool.retry_state();
        assert_eq!(pick(&pool, &mut req), 0);
        pool.backends()[0].record_failure(false, &p);
        req.mark_failed(0);
        assert!(pool.backends()[0].is_enabled());
        assert_eq!(pick(&pool, &mut req), 1);
        pool.backends()[1].record_success(Duration::from_millis(1));

        let mut req = pool.retry_state();
        assert_eq!(pick(&pool, &mut req), 2);
        pool.backends()[2].record_success(Duration::from_millis(1));

        let mut req = pool.retry_state();
        assert_eq!(pick(&pool, &mut req), 0);
        pool.backends()[0].record_failure(false, &p);
        req.mark_failed(0);
        assert!(!pool.backends()[0].is_enabled());
        assert!(pool.backends()[0].state().disabled_since.is_some());

        // A is out; B and C each serve once before either repeats.
        assert_eq!(pick(&pool, &mut req), 1);
        let mut req = pool.retry_state();
        assert_eq!(pick(&pool, &mut req), 2);
        let mut req = pool.retry_state();
        assert_eq!(pick(&pool, &mut req), 1);
    }

    #[test]
    fn test_snapshot_includes_round_flags() {
        let pool = pool(2);
        pick(&pool, &mut pool.retry_state());
        let snap = pool.snapshot();
        assert!(snap[0].tried_this_round);
        assert!(!snap[1].tried_this_round);
    }
}
