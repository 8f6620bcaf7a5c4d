//! Capacity pool accessor.
//!
//! Picks the group placement that hosts a reservation:
//!
//! 1. Candidate placements: those scoped to the requester (the requester's
//!    tenant scope is a prefix of the placement's), then global ones as a
//!    fallback tier.
//! 2. Placement constraints of the description, then of each disk, then of
//!    each network description, are evaluated against the tags of every
//!    candidate's resource pool.
//! 3. Survivors are ordered by tier, priority and remaining capacity.
//! 4. An optional pre-approved list narrows the candidates.
//! 5. The first candidate with room is reserved through a compare-and-set
//!    patch; a lost race re-runs the whole selection, within a retry budget.

mod admin;
mod resolver;
mod selector;

pub use resolver::TagResolver;
pub use selector::PlacementSelector;

use std::collections::BTreeMap;

use berth_id::DocumentLink;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ValidationError;
use crate::store::StoreError;

/// Result type for placement operations.
pub type PlacementResult<T> = Result<T, PlacementError>;

/// Errors that can occur while selecting or maintaining placements.
#[derive(Debug, Error)]
pub enum PlacementError {
    /// No candidate passed the hard constraints.
    #[error("unsatisfiable: {0}")]
    Unsatisfiable(String),

    /// Candidates passed the constraints, none had room.
    #[error("no capacity for {requested} instances in {candidates} eligible placements")]
    NoCapacity { requested: u64, candidates: usize },

    /// Every compare-and-set attempt lost a race.
    #[error("gave up after {attempts} conflicting reservation attempts")]
    Contention { attempts: u32 },

    /// A referenced document does not exist.
    #[error("missing prerequisite: {0}")]
    MissingPrerequisite(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// Placement still holds allocations.
    #[error("placement {link} still has {allocated} allocated instances")]
    InUse { link: DocumentLink, allocated: u64 },

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl PlacementError {
    /// Worth retrying the whole request later.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Contention { .. } => true,
            Self::Store(e) => e.is_conflict(),
            _ => false,
        }
    }
}

impl From<ValidationError> for PlacementError {
    fn from(e: ValidationError) -> Self {
        Self::InvalidPayload(e.to_string())
    }
}

/// Input of [`PlacementSelector::select_pool`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementRequest {
    pub resource_description_link: DocumentLink,
    /// Requester scope, most specific first.
    #[serde(default)]
    pub tenant_links: Vec<String>,
    pub resource_count: u64,
    #[serde(default)]
    pub custom_properties: BTreeMap<String, String>,
    /// Extensibility override: when non-empty, only these placements may be
    /// chosen.
    #[serde(default)]
    pub approved_placement_links: Vec<DocumentLink>,
}

/// An eligible placement and the resource pool behind it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidatePool {
    pub placement_link: DocumentLink,
    pub resource_pool_link: DocumentLink,
}

/// Outcome of a successful selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub placement_link: DocumentLink,
    pub resource_pool_link: DocumentLink,
    /// Every eligible candidate, in preference order.
    pub resource_pools_per_placement: Vec<CandidatePool>,
    /// Request properties with the placement's properties filled in.
    pub custom_properties: BTreeMap<String, String>,
    /// Compare-and-set attempts it took.
    pub attempts: u32,
}

/// Fill `request` with `placement` properties; request keys win.
pub fn merge_properties(
    request: &BTreeMap<String, String>,
    placement: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut merged = request.clone();
    for (k, v) in placement {
        merged.entry(k.clone()).or_insert_with(|| v.clone());
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_properties_request_wins() {
        let request = BTreeMap::from([("flavor".to_string(), "small".to_string())]);
        let placement = BTreeMap::from([
            ("flavor".to_string(), "large".to_string()),
            ("region".to_string(), "eu".to_string()),
        ]);
        let merged = merge_properties(&request, &placement);
        assert_eq!(merged["flavor"], "small");
        assert_eq!(merged["region"], "eu");
    }

    #[test]
    fn test_transient_errors() {
        assert!(PlacementError::Contention { attempts: 5 }.is_transient());
        assert!(!PlacementError::NoCapacity {
            requested: 1,
            candidates: 1
        }
        .is_transient());
        assert!(!PlacementError::Unsatisfiable("x".into()).is_transient());
    }
}
