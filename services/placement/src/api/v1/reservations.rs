//! Reservation endpoints.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use berth_id::{ReservationId, RequestId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::api::error::ApiError;
use crate::reservation::{ReservationRequest, ReservationResult, TaskOutcome};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/reservations", post(create_reservation))
}

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Serialize)]
pub struct ReservationResponse {
    pub reservation_id: ReservationId,

    #[serde(flatten)]
    pub result: ReservationResult,

    pub completed_at: DateTime<Utc>,
}

// =============================================================================
// Handlers
// =============================================================================

/// Run a reservation and wait for its outcome.
///
/// POST /v1/reservations
async fn create_reservation(
    State(state): State<AppState>,
    Json(req): Json<ReservationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let request_id = RequestId::new();

    let handle = state
        .reservations()
        .submit(req)
        .await
        .map_err(|e| ApiError::from(e).with_request_id(request_id.to_string()))?;
    let reservation_id = handle.id();

    let payload = handle
        .payload()
        .await
        .map_err(|e| ApiError::from(e).with_request_id(request_id.to_string()))?;

    match payload.outcome {
        TaskOutcome::Success { result } => {
            info!(
                request_id = %request_id,
                reservation_id = %reservation_id,
                placement = %result.placement_link,
                "Reservation completed"
            );
            Ok((
                StatusCode::CREATED,
                Json(ReservationResponse {
                    reservation_id,
                    result,
                    completed_at: payload.completed_at,
                }),
            ))
        }
        TaskOutcome::Failure { error } => {
            Err(ApiError::from(error).with_request_id(request_id.to_string()))
        }
    }
}
