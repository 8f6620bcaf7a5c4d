//! Tag constraint evaluation.
//!
//! Candidates (resource pools, subnets, storage items) carry a set of tag
//! links. A constraint is a bag of conditions over tags; each condition is
//! either *hard* (violations disqualify a candidate) or *soft* (only used for
//! ranking), and either requires a tag (affinity) or forbids it
//! (anti-affinity).
//!
//! # Invariants
//!
//! - Evaluation is pure; callers resolve conditions to tag links first
//! - Without conditions the input order is preserved untouched
//! - Ranking is stable: equal scores keep the caller's tie-break order

mod condition;
mod evaluate;
mod memo;

pub use condition::{
    Condition, Constraint, Enforcement, Occurrence, ResolvedCondition, PLACEMENT_CONSTRAINT_KEY,
};
pub use evaluate::{filter_by_constraints, rank_by_constraints, split_conditions, Ranked, Tiebreak};
pub use memo::{memoize, Memo, Memoize, Memoized};
