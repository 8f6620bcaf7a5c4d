use axum::{
    http::{header::CONTENT_TYPE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::cluster::ClusterError;
use crate::placement::PlacementError;
use crate::reservation::{FailureKind, ReservationError, ReservationFailure};
use crate::store::StoreError;

/// Seconds a client should wait before retrying a contended reservation.
const CONTENTION_RETRY_AFTER_SECONDS: u32 = 1;

/// RFC 7807 problem document.
#[derive(Debug, Serialize, Deserialize)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub r#type: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    pub code: String,
    pub request_id: String,
    pub retryable: bool,
    pub retry_after_seconds: u32,
}

impl ProblemDetails {
    fn new(status: StatusCode, code: impl Into<String>, detail: impl Into<String>) -> Self {
        let code = code.into();
        let title = status
            .canonical_reason()
            .unwrap_or("Unknown Error")
            .to_string();
        Self {
            r#type: format!("https://berth.dev/problems/{code}"),
            title,
            status: status.as_u16(),
            detail: detail.into(),
            instance: None,
            code,
            request_id: "unknown".to_string(),
            retryable: false,
            retry_after_seconds: 0,
        }
    }

    fn set_request_id(&mut self, request_id: impl Into<String>) {
        let request_id = request_id.into();
        self.request_id = request_id.clone();
        if self.instance.is_none() {
            self.instance = Some(request_id);
        }
    }

    fn set_retry_after_seconds(&mut self, seconds: u32) {
        self.retry_after_seconds = seconds;
        if seconds > 0 {
            self.retryable = true;
        }
    }
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub problem: Box<ProblemDetails>,
}

impl ApiError {
    fn with_status(
        status: StatusCode,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let problem = Box::new(ProblemDetails::new(status, code, message));
        Self { status, problem }
    }

    pub fn bad_request(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::BAD_REQUEST, code, message)
    }

    pub fn not_found(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::NOT_FOUND, code, message)
    }

    pub fn conflict(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::CONFLICT, code, message)
    }

    pub fn unprocessable(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::UNPROCESSABLE_ENTITY, code, message)
    }

    pub fn internal(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::INTERNAL_SERVER_ERROR, code, message)
    }

    pub fn service_unavailable(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::SERVICE_UNAVAILABLE, code, message)
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.problem.set_request_id(request_id);
        self
    }

    pub fn with_retry_after_seconds(mut self, seconds: u32) -> Self {
        self.problem.set_retry_after_seconds(seconds);
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.problem)).into_response();
        response.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/problem+json"),
        );
        response
    }
}

// =============================================================================
// Domain error mapping
// =============================================================================

impl From<ReservationFailure> for ApiError {
    fn from(failure: ReservationFailure) -> Self {
        let message = failure.message;
        match failure.kind {
            FailureKind::Unsatisfiable => Self::unprocessable("unsatisfiable", message),
            FailureKind::NoCapacity => Self::conflict("no_capacity", message),
            FailureKind::Transient => Self::service_unavailable("contention", message)
                .with_retry_after_seconds(CONTENTION_RETRY_AFTER_SECONDS),
            FailureKind::MissingPrerequisite => {
                Self::unprocessable("missing_prerequisite", message)
            }
            FailureKind::InvalidPayload => Self::bad_request("invalid_payload", message),
            FailureKind::Internal => Self::internal("internal_error", message),
        }
    }
}

impl From<ReservationError> for ApiError {
    fn from(e: ReservationError) -> Self {
        match e {
            ReservationError::InvalidPayload(message) => {
                Self::bad_request("invalid_payload", message)
            }
            ReservationError::ServiceStopped => {
                Self::service_unavailable("service_stopped", "reservation service stopped")
            }
            ReservationError::Failed(failure) => failure.into(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match &e {
            StoreError::NotFound(_) => Self::not_found("not_found", e.to_string()),
            StoreError::AlreadyExists(_) => Self::conflict("already_exists", e.to_string()),
            StoreError::VersionConflict { .. } => Self::service_unavailable(
                "contention",
                e.to_string(),
            )
            .with_retry_after_seconds(CONTENTION_RETRY_AFTER_SECONDS),
            _ => Self::internal("store_error", e.to_string()),
        }
    }
}

impl From<PlacementError> for ApiError {
    fn from(e: PlacementError) -> Self {
        match e {
            e @ PlacementError::InUse { .. } => Self::conflict("placement_in_use", e.to_string()),
            PlacementError::Store(store) => store.into(),
            other => ReservationFailure::from(&other).into(),
        }
    }
}

impl From<ClusterError> for ApiError {
    fn from(e: ClusterError) -> Self {
        match e {
            ClusterError::Reservation(e) => e.into(),
            ClusterError::Placement(e) => e.into(),
            ClusterError::Store(e) => e.into(),
            ClusterError::Lifecycle(e) => Self::internal("lifecycle_failed", e.to_string()),
        }
    }
}
