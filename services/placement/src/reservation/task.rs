//! Reservation task state machine.

use berth_id::ReservationId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use super::{
    ReservationFailure, ReservationRequest, ReservationResult, TaskOutcome, TaskResultPayload,
};
use crate::placement::{PlacementSelector, Selection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStage {
    Created,
    Selecting,
    Allocated,
    Complete,
    Failed,
}

impl TaskStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

/// Inputs that move a task between stages.
#[derive(Debug, Clone)]
pub enum Transition {
    StartSelection,
    Allocated(Selection),
    Finish,
    Fail(ReservationFailure),
}

impl Transition {
    fn name(&self) -> &'static str {
        match self {
            Self::StartSelection => "start_selection",
            Self::Allocated(_) => "allocated",
            Self::Finish => "finish",
            Self::Fail(_) => "fail",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// Selection already ran for this task; it must not run twice.
    #[error("reservation {0} already went through selection")]
    AlreadySelected(ReservationId),

    #[error("invalid transition '{transition}' from {from:?}")]
    InvalidTransition {
        from: TaskStage,
        transition: &'static str,
    },
}

/// One reservation request moving through its stages.
#[derive(Debug, Clone)]
pub struct ReservationTask {
    id: ReservationId,
    request: ReservationRequest,
    stage: TaskStage,
    selection: Option<Selection>,
    failure: Option<ReservationFailure>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ReservationTask {
    pub fn new(request: ReservationRequest) -> Self {
        let now = Utc::now();
        Self {
            id: ReservationId::new(),
            request,
            stage: TaskStage::Created,
            selection: None,
            failure: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> ReservationId {
        self.id
    }

    pub fn stage(&self) -> TaskStage {
        self.stage
    }

    pub fn request(&self) -> &ReservationRequest {
        &self.request
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Apply a transition. The only place the stage changes.
    pub fn advance(&mut self, transition: Transition) -> Result<TaskStage, TaskError> {
        let next = match (self.stage, transition) {
            (TaskStage::Created, Transition::StartSelection) => TaskStage::Selecting,
            (_, Transition::StartSelection) => return Err(TaskError::AlreadySelected(self.id)),
            (TaskStage::Selecting, Transition::Allocated(selection)) => {
                self.selection = Some(selection);
                TaskStage::Allocated
            }
            (TaskStage::Allocated, Transition::Finish) => TaskStage::Complete,
            // Nothing to compensate before allocation; after it, failing
            // would orphan the counter increment.
            (TaskStage::Created | TaskStage::Selecting, Transition::Fail(failure)) => {
                self.failure = Some(failure);
                TaskStage::Failed
            }
            (from, transition) => {
                return Err(TaskError::InvalidTransition {
                    from,
                    transition: transition.name(),
                })
            }
        };

        debug!(
            reservation_id = %self.id,
            from = ?self.stage,
            to = ?next,
            "Reservation stage changed"
        );
        self.stage = next;
        self.updated_at = Utc::now();
        Ok(next)
    }

    /// Run selection once and finish the task.
    #[instrument(skip(self, selector), fields(reservation_id = %self.id))]
    pub async fn run(
        &mut self,
        selector: &PlacementSelector,
    ) -> Result<TaskResultPayload, TaskError> {
        self.advance(Transition::StartSelection)?;

        match selector.select_pool(&self.request).await {
            Ok(selection) => {
                self.advance(Transition::Allocated(selection))?;
                self.advance(Transition::Finish)?;
                info!(
                    placement = ?self.selection.as_ref().map(|s| &s.placement_link),
                    "Reservation complete"
                );
            }
            Err(e) => {
                warn!(error = %e, "Reservation failed");
                self.advance(Transition::Fail(ReservationFailure::from(&e)))?;
            }
        }

        self.payload().ok_or(TaskError::InvalidTransition {
            from: self.stage,
            transition: "payload",
        })
    }

    /// Terminal payload, `None` while the task is still running.
    pub fn payload(&self) -> Option<TaskResultPayload> {
        let outcome = match (self.stage, &self.selection, &self.failure) {
            (TaskStage::Complete, Some(selection), _) => TaskOutcome::Success {
                result: ReservationResult::from_selection(selection, self.request.resource_count),
            },
            (TaskStage::Failed, _, Some(failure)) => TaskOutcome::Failure {
                error: failure.clone(),
            },
            _ => return None,
        };
        Some(TaskResultPayload {
            reservation_id: self.id,
            stage: self.stage,
            outcome,
            completed_at: self.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placement::CandidatePool;
    use crate::reservation::FailureKind;
    use berth_id::{DescriptionId, DocumentLink};
    use std::collections::BTreeMap;

    fn task() -> ReservationTask {
        ReservationTask::new(ReservationRequest {
            resource_description_link: DescriptionId::new().link(),
            tenant_links: Vec::new(),
            resource_count: 1,
            custom_properties: BTreeMap::new(),
            approved_placement_links: Vec::new(),
        })
    }

    fn selection() -> Selection {
        let placement = DocumentLink::parse("/resources/group-placements/grp_1").unwrap();
        let pool = DocumentLink::parse("/resources/pools/rp_1").unwrap();
        Selection {
            placement_link: placement.clone(),
            resource_pool_link: pool.clone(),
            resource_pools_per_placement: vec![CandidatePool {
                placement_link: placement,
                resource_pool_link: pool,
            }],
            custom_properties: BTreeMap::new(),
            attempts: 1,
        }
    }

    #[test]
    fn test_happy_path() {
        let mut t = task();
        assert_eq!(t.stage(), TaskStage::Created);
        assert!(t.payload().is_none());

        t.advance(Transition::StartSelection).unwrap();
        t.advance(Transition::Allocated(selection())).unwrap();
        assert!(t.payload().is_none());
        assert_eq!(t.advance(Transition::Finish).unwrap(), TaskStage::Complete);

        let payload = t.payload().unwrap();
        assert!(payload.is_success());
        assert_eq!(payload.reservation_id, t.id());
    }

    #[test]
    fn test_selection_only_once() {
        let mut t = task();
        t.advance(Transition::StartSelection).unwrap();
        assert_eq!(
            t.advance(Transition::StartSelection),
            Err(TaskError::AlreadySelected(t.id()))
        );

        t.advance(Transition::Fail(ReservationFailure::new(FailureKind::NoCapacity, "full")))
            .unwrap();
        assert_eq!(
            t.advance(Transition::StartSelection),
            Err(TaskError::AlreadySelected(t.id()))
        );
    }

    #[test]
    fn test_cannot_fail_after_allocation() {
        let mut t = task();
        t.advance(Transition::StartSelection).unwrap();
        t.advance(Transition::Allocated(selection())).unwrap();

        let err = t
            .advance(Transition::Fail(ReservationFailure::new(FailureKind::Internal, "late")))
            .unwrap_err();
        assert_eq!(
            err,
            TaskError::InvalidTransition {
                from: TaskStage::Allocated,
                transition: "fail",
            }
        );
        assert_eq!(t.stage(), TaskStage::Allocated);
    }

    #[test]
    fn test_cannot_allocate_without_selecting() {
        let mut t = task();
        assert!(t.advance(Transition::Allocated(selection())).is_err());
        assert!(t.advance(Transition::Finish).is_err());
        assert!(t.selection().is_none());
    }

    #[test]
    fn test_failure_payload() {
        let mut t = task();
        t.advance(Transition::Fail(ReservationFailure::new(
            FailureKind::InvalidPayload,
            "bad",
        )))
        .unwrap();

        let payload = t.payload().unwrap();
        assert_eq!(payload.stage, TaskStage::Failed);
        match payload.into_result() {
            Err(crate::reservation::ReservationError::Failed(f)) => {
                assert_eq!(f.kind, FailureKind::InvalidPayload)
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
