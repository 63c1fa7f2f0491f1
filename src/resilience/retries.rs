//! Retry accounting.
//!
//! # Responsibilities
//! - Bound the selection attempts of one request to `max_loop_try`
//! - Count failed forwards and forced recoveries alike
//!
//! # Design Decisions
//! - A 4xx/5xx from a backend is a relayed answer, never a retry
//! - Retries within a request are strictly sequential
//! - No backoff: the next attempt goes to a different backend

/// Per-request attempt budget.
#[derive(Debug, Clone)]
pub struct LoopBudget {
    max: u32,
    used: u32,
}

/// Returned once the budget is spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exhausted {
    pub attempts: u32,
}

impl LoopBudget {
    pub fn new(max_loop_try: u32) -> Self {
        Self {
            max: max_loop_try.max(1),
            used: 0,
        }
    }

    /// Count one iteration. Fails when the request has used its budget.
    pub fn consume(&mut self) -> Result<(), Exhausted> {
        self.used += 1;
        if self.used >= self.max {
            Err(Exhausted { attempts: self.used })
        } else {
            Ok(())
        }
    }

    pub fn used(&self) -> u32 {
        self.used
    }
}
