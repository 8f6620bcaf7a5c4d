//! Reservation tasks.
//!
//! A reservation is an explicit state machine ([`ReservationTask`]) run to
//! completion by the [`ReservationService`] dispatcher:
//!
//! ```text
//! Created -> Selecting -> Allocated -> Complete
//!     \          \
//!      `----------`-----> Failed
//! ```
//!
//! Selection (and with it the counter increment) happens at most once per
//! task. Every task that reaches the dispatcher ends with exactly one
//! [`TaskCallback`] invocation and one result on its [`ReservationHandle`].

mod callback;
mod service;
mod task;

pub use callback::{ChannelCallback, LogCallback, TaskCallback};
pub use service::{ReservationHandle, ReservationService};
pub use task::{ReservationTask, TaskError, TaskStage, Transition};

use std::collections::BTreeMap;

use berth_id::{DescriptionId, DocumentLink, ReservationId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::placement::{CandidatePool, PlacementError, PlacementRequest, Selection};

/// Reservation input; identical to what the accessor consumes.
pub type ReservationRequest = PlacementRequest;

/// Service level errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReservationError {
    /// Rejected before any task was created.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// The dispatcher is gone; nothing was (or will be) reserved.
    #[error("reservation service stopped")]
    ServiceStopped,

    /// The task ran and failed.
    #[error("reservation failed: {0}")]
    Failed(ReservationFailure),
}

/// Failure classes reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    Unsatisfiable,
    NoCapacity,
    /// Lost too many races; retrying the whole request may succeed.
    Transient,
    MissingPrerequisite,
    InvalidPayload,
    Internal,
}

/// Typed failure carried by a terminal payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{kind:?}: {message}")]
pub struct ReservationFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl ReservationFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<&PlacementError> for ReservationFailure {
    fn from(e: &PlacementError) -> Self {
        let kind = match e {
            PlacementError::Unsatisfiable(_) => FailureKind::Unsatisfiable,
            PlacementError::NoCapacity { .. } => FailureKind::NoCapacity,
            PlacementError::MissingPrerequisite(_) => FailureKind::MissingPrerequisite,
            PlacementError::InvalidPayload(_) => FailureKind::InvalidPayload,
            PlacementError::Contention { .. } => FailureKind::Transient,
            PlacementError::Store(s) if s.is_conflict() => FailureKind::Transient,
            PlacementError::InUse { .. } | PlacementError::Store(_) => FailureKind::Internal,
        };
        Self::new(kind, e.to_string())
    }
}

/// Successful reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationResult {
    pub placement_link: DocumentLink,
    pub resource_pool_link: DocumentLink,
    /// Eligible placements after extensibility narrowing, preferred first.
    pub resource_pools_per_placement: Vec<CandidatePool>,
    pub custom_properties: BTreeMap<String, String>,
    pub resource_count: u64,
}

impl ReservationResult {
    pub fn from_selection(selection: &Selection, resource_count: u64) -> Self {
        Self {
            placement_link: selection.placement_link.clone(),
            resource_pool_link: selection.resource_pool_link.clone(),
            resource_pools_per_placement: selection.resource_pools_per_placement.clone(),
            custom_properties: selection.custom_properties.clone(),
            resource_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskOutcome {
    Success { result: ReservationResult },
    Failure { error: ReservationFailure },
}

/// The single terminal notification of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResultPayload {
    pub reservation_id: ReservationId,
    pub stage: TaskStage,
    pub outcome: TaskOutcome,
    pub completed_at: DateTime<Utc>,
}

impl TaskResultPayload {
    /// Payload for a task that could not run its state machine at all.
    pub fn internal_failure(reservation_id: ReservationId, message: impl Into<String>) -> Self {
        Self {
            reservation_id,
            stage: TaskStage::Failed,
            outcome: TaskOutcome::Failure {
                error: ReservationFailure::new(FailureKind::Internal, message),
            },
            completed_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, TaskOutcome::Success { .. })
    }

    pub fn into_result(self) -> Result<ReservationResult, ReservationError> {
        match self.outcome {
            TaskOutcome::Success { result } => Ok(result),
            TaskOutcome::Failure { error } => Err(ReservationError::Failed(error)),
        }
    }
}

/// Synchronous checks done before a task is queued.
pub fn validate_request(request: &ReservationRequest) -> Result<(), ReservationError> {
    if request.resource_description_link.collection() != DescriptionId::COLLECTION {
        return Err(ReservationError::InvalidPayload(format!(
            "{} is not a compute description link",
            request.resource_description_link
        )));
    }
    if request.resource_count < 1 {
        return Err(ReservationError::InvalidPayload(
            "resource_count must be at least 1".to_string(),
        ));
    }
    Ok(())
}
