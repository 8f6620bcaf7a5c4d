//! Convergence helpers.
//!
//! Small, deterministic building blocks used by the reconcilers:
//!
//! - **Scale delta**: how far the live count is from the desired count.
//! - **Removal ordering**: which resources go first when shrinking.
//! - **Retry budget**: bounded optimistic-concurrency retries.
//!
//! # Invariants
//!
//! - Decisions are deterministic given the same inputs
//! - Orderings are stable (equal priorities keep input order)
//! - A retry budget never grants more than `max_attempts` attempts

use std::time::Duration;

use thiserror::Error;

/// Reconciliation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    /// Every attempt of a retry budget was spent.
    #[error("retry budget exhausted after {attempts} attempts")]
    BudgetExhausted { attempts: u32 },
}

/// What a size reconciler has to do to converge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleAction {
    /// Add this many resources.
    Grow(u32),

    /// Remove this many resources.
    Shrink(u32),

    /// Live count already matches.
    Steady,
}

impl ScaleAction {
    /// Compute the action from a desired and a live count.
    pub fn from_counts(desired: u32, live: u32) -> Self {
        match desired.cmp(&live) {
            std::cmp::Ordering::Greater => Self::Grow(desired - live),
            std::cmp::Ordering::Less => Self::Shrink(live - desired),
            std::cmp::Ordering::Equal => Self::Steady,
        }
    }

    /// Signed delta (`desired - live`).
    pub fn delta(&self) -> i64 {
        match self {
            Self::Grow(n) => i64::from(*n),
            Self::Shrink(n) => -i64::from(*n),
            Self::Steady => 0,
        }
    }
}

/// Removal priority for live resources.
///
/// Lower values are removed first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RemovalPriority {
    /// Resource is powered off (remove first).
    PoweredOff = 0,

    /// Power state is unknown.
    Unknown = 1,

    /// Resource is suspended.
    Suspended = 2,

    /// Resource is running (remove last).
    Running = 3,
}

/// Pick `count` resources to remove, lowest priority value first.
///
/// The sort is stable: callers pass resources oldest first to make age the
/// secondary key.
pub fn select_for_removal<T, F>(resources: Vec<T>, count: usize, get_priority: F) -> Vec<T>
where
    F: Fn(&T) -> RemovalPriority,
{
    let mut with_priority: Vec<_> = resources
        .into_iter()
        .map(|r| {
            let p = get_priority(&r);
            (p, r)
        })
        .collect();

    with_priority.sort_by_key(|(p, _)| *p);
    with_priority
        .into_iter()
        .take(count)
        .map(|(_, r)| r)
        .collect()
}

/// Bounded attempt counter for compare-and-set loops.
///
/// ```
/// use berth_reconcile::RetryBudget;
///
/// let mut budget = RetryBudget::new(2);
/// assert_eq!(budget.spend(), Ok(1));
/// assert_eq!(budget.spend(), Ok(2));
/// assert!(budget.spend().is_err());
/// ```
#[derive(Debug, Clone)]
pub struct RetryBudget {
    max_attempts: u32,
    used: u32,
}

impl RetryBudget {
    /// Create a budget allowing `max_attempts` attempts (at least one).
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            used: 0,
        }
    }

    /// Take one attempt. Returns the 1-based attempt number.
    pub fn spend(&mut self) -> Result<u32, ReconcileError> {
        if self.used >= self.max_attempts {
            return Err(ReconcileError::BudgetExhausted {
                attempts: self.used,
            });
        }
        self.used += 1;
        Ok(self.used)
    }

    /// Attempts taken so far.
    pub fn used(&self) -> u32 {
        self.used
    }
}

/// Default interval between zone assignment passes.
pub const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(30);

/// Default number of compare-and-set attempts per reservation.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
