//! Cluster size endpoints.

use axum::{extract::State, routing::post, Json, Router};
use berth_id::{DocumentLink, RequestId};
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::cluster::ClusterReport;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/clusters/reconcile", post(reconcile_cluster))
}

#[derive(Debug, Deserialize)]
pub struct ReconcileClusterRequest {
    pub description_link: DocumentLink,

    #[serde(default)]
    pub tenant_links: Vec<String>,

    pub desired_count: u32,
}

/// Converge the live computes of a description to `desired_count`.
///
/// POST /v1/clusters/reconcile
async fn reconcile_cluster(
    State(state): State<AppState>,
    Json(req): Json<ReconcileClusterRequest>,
) -> Result<Json<ClusterReport>, ApiError> {
    let request_id = RequestId::new();

    let report = state
        .cluster()
        .reconcile(&req.description_link, req.tenant_links, req.desired_count)
        .await
        .map_err(|e| ApiError::from(e).with_request_id(request_id.to_string()))?;

    Ok(Json(report))
}
