//! Tiered backend selection strategy.
//!
//! Pure ranking over a snapshot of the pool; no locks, no HTTP. The pool
//! applies the side effects (round reset, failure reset) for the tier that won.
//!
//! Tiers, best first:
//! 1. `Fresh`: enabled, not tried this round, not failed in this request
//! 2. `NewRound`: enabled, not failed in this request (starts a new round)
//! 3. `RetryFailed`: enabled, failed earlier in this request
//!
//! An empty ranking means every backend is disabled: forced recovery.

/// Selection tier of a candidate. Ordered best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Tier {
    Fresh,
    NewRound,
    RetryFailed,
}

/// What the strategy needs to know about one backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct CandidateView {
    pub enabled: bool,
    pub tried_this_round: bool,
    pub failed_this_attempt: bool,
}

/// A ranked candidate: position in the pool and the tier it qualified for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub index: usize,
    pub tier: Tier,
}

fn tier_of(view: &CandidateView) -> Option<Tier> {
    if !view.enabled {
        return None;
    }
    Some(match (view.failed_this_attempt, view.tried_this_round) {
        (false, false) => Tier::Fresh,
        (false, true) => Tier::NewRound,
        (true, _) => Tier::RetryFailed,
    })
}

/// Rank every enabled backend by tier, pool order breaking ties.
pub fn rank_candidates(views: &[CandidateView]) -> Vec<Candidate> {
    let mut ranked: Vec<Candidate> = views
        .iter()
        .enumerate()
        .filter_map(|(index, view)| tier_of(view).map(|tier| Candidate { index, tier }))
        .collect();
    ranked.sort_by_key(|c| c.tier);
    ranked
}
