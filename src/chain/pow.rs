//! Proof-of-Work Bounds
//!
//! Difficulty helpers and the budget that keeps a nonce search from
//! running forever. Besides the hard attempt cap, a search stops at an
//! optional deadline or when its cancel flag is raised from another thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{LedgerError, Result};

/// Leading zero hex digits required when nothing else is configured.
pub const DEFAULT_DIFFICULTY: usize = 4;

/// A SHA-256 hex digest has 64 digits; anything above is unsatisfiable.
pub const MAX_DIFFICULTY: usize = 64;

pub const DEFAULT_MAX_ATTEMPTS: u64 = 50_000_000;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// The deadline and cancel flag are polled once per this many attempts.
const POLL_INTERVAL: u64 = 1024;

/// Count the leading `'0'` characters of a hex digest.
pub fn leading_zero_digits(hash: &str) -> usize {
    hash.bytes().take_while(|b| *b == b'0').count()
}

/// Check a hex digest against a difficulty threshold.
pub fn meets_difficulty(hash: &str, difficulty: usize) -> bool {
    leading_zero_digits(hash) >= difficulty
}

pub fn check_difficulty(difficulty: usize) -> Result<()> {
    if difficulty > MAX_DIFFICULTY {
        return Err(LedgerError::InvalidDifficulty(difficulty));
    }
    Ok(())
}

/// Shared flag used to abort in-flight mining.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Limits applied to a single nonce search.
#[derive(Debug, Clone)]
pub struct MiningBudget {
    pub max_attempts: u64,
    pub timeout: Option<Duration>,
    pub cancel: CancelFlag,
}

impl Default for MiningBudget {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            timeout: Some(DEFAULT_TIMEOUT),
            cancel: CancelFlag::new(),
        }
    }
}

impl MiningBudget {
    pub fn new(max_attempts: u64, timeout: Option<Duration>) -> Self {
        Self {
            max_attempts,
            timeout,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub(crate) fn start(&self) -> MiningRun<'_> {
        MiningRun {
            budget: self,
            started: Instant::now(),
            attempts: 0,
        }
    }
}

/// Statistics of a finished search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MiningOutcome {
    pub attempts: u64,
    pub elapsed: Duration,
}

/// Book-keeping for one search in progress.
pub(crate) struct MiningRun<'a> {
    budget: &'a MiningBudget,
    started: Instant,
    attempts: u64,
}

impl MiningRun<'_> {
    /// Reserve the next attempt, or fail if the budget is spent.
    pub(crate) fn next_attempt(&mut self) -> Result<()> {
        if self.attempts >= self.budget.max_attempts {
            return Err(self.timeout());
        }

        if self.attempts % POLL_INTERVAL == 0 {
            if self.budget.cancel.is_cancelled() {
                return Err(LedgerError::MiningCancelled {
                    attempts: self.attempts,
                });
            }
            if let Some(limit) = self.budget.timeout {
                if self.started.elapsed() >= limit {
                    return Err(self.timeout());
                }
            }
        }

        self.attempts += 1;
        Ok(())
    }

    pub(crate) fn finish(self) -> MiningOutcome {
        MiningOutcome {
            attempts: self.attempts,
            elapsed: self.started.elapsed(),
        }
    }

    fn timeout(&self) -> LedgerError {
        LedgerError::MiningTimeout {
            attempts: self.attempts,
            elapsed_ms: self.started.elapsed().as_millis() as u64,
        }
    }
}
