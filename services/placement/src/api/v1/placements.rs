//! Group placement endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use berth_id::{DocumentLink, PlacementId, RequestId};
use serde::Serialize;

use crate::api::error::ApiError;
use crate::model::GroupPlacement;
use crate::state::AppState;
use crate::store::{DocumentStoreExt, Versioned};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/placements", get(list_placements).post(create_placement))
        .route(
            "/placements/{placement_id}",
            get(get_placement).delete(delete_placement),
        )
}

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Serialize)]
pub struct PlacementResponse {
    pub link: DocumentLink,

    /// Document version, bumped on every counter update.
    pub version: u64,

    #[serde(flatten)]
    pub placement: GroupPlacement,
}

impl From<Versioned<GroupPlacement>> for PlacementResponse {
    fn from(v: Versioned<GroupPlacement>) -> Self {
        Self {
            link: v.link,
            version: v.version,
            placement: v.doc,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListPlacementsResponse {
    pub items: Vec<PlacementResponse>,
}

fn parse_placement_id(raw: &str, request_id: &RequestId) -> Result<PlacementId, ApiError> {
    PlacementId::parse(raw).map_err(|e| {
        ApiError::bad_request("invalid_placement_id", e.to_string())
            .with_request_id(request_id.to_string())
    })
}

// =============================================================================
// Handlers
// =============================================================================

/// POST /v1/placements
async fn create_placement(
    State(state): State<AppState>,
    Json(req): Json<GroupPlacement>,
) -> Result<impl IntoResponse, ApiError> {
    let request_id = RequestId::new();

    let created = state
        .selector()
        .create_placement(req)
        .await
        .map_err(|e| ApiError::from(e).with_request_id(request_id.to_string()))?;

    Ok((StatusCode::CREATED, Json(PlacementResponse::from(created))))
}

/// GET /v1/placements
async fn list_placements(
    State(state): State<AppState>,
) -> Result<Json<ListPlacementsResponse>, ApiError> {
    let placements = state.store().find_all::<GroupPlacement>().await?;

    Ok(Json(ListPlacementsResponse {
        items: placements.into_iter().map(PlacementResponse::from).collect(),
    }))
}

/// GET /v1/placements/{placement_id}
async fn get_placement(
    State(state): State<AppState>,
    Path(placement_id): Path<String>,
) -> Result<Json<PlacementResponse>, ApiError> {
    let request_id = RequestId::new();
    let id = parse_placement_id(&placement_id, &request_id)?;

    let placement = state
        .store()
        .load::<GroupPlacement>(&id.link())
        .await
        .map_err(|e| ApiError::from(e).with_request_id(request_id.to_string()))?;

    Ok(Json(placement.into()))
}

/// DELETE /v1/placements/{placement_id}
///
/// Refused with 409 while the placement still has allocations.
async fn delete_placement(
    State(state): State<AppState>,
    Path(placement_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let request_id = RequestId::new();
    let id = parse_placement_id(&placement_id, &request_id)?;

    state
        .selector()
        .delete_placement(&id.link())
        .await
        .map_err(|e| ApiError::from(e).with_request_id(request_id.to_string()))?;

    Ok(StatusCode::NO_CONTENT)
}
