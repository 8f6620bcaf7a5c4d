//! Zone assignment endpoints.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::Serialize;

use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/zone-assignments", post(trigger_zone_assignment))
}

#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub status: &'static str,
}

/// Request an immediate zone assignment pass.
///
/// POST /v1/zone-assignments
async fn trigger_zone_assignment(State(state): State<AppState>) -> impl IntoResponse {
    state.zone_trigger().trigger();
    (
        StatusCode::ACCEPTED,
        Json(TriggerResponse { status: "accepted" }),
    )
}
