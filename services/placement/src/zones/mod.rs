//! Elastic placement zone assignment.
//!
//! Keeps every compute's `resource_pool_link` in line with the elastic zone
//! whose tag set it carries. Only unambiguous matches are applied; computes
//! matching no zone or several zones keep whatever pool they had.
//!
//! The reconciler only ever writes compute documents, never placements, so
//! it does not contend with reservations.

mod reconciler;
mod worker;

pub use reconciler::{
    ResourceFailure, ZoneAssignmentError, ZoneAssignmentReconciler, ZoneAssignmentStats,
};
pub use worker::{ZoneAssignmentTrigger, ZoneAssignmentWorker};
