//! Health check endpoints.
//!
//! These endpoints are used by load balancers and orchestration systems
//! to determine if the service is healthy and ready to receive traffic.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::model::GroupPlacement;
use crate::state::AppState;
use crate::store::{Document, Query};

/// Health check response.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct HealthResponse {
    /// Service status: "ok" or "degraded".
    pub status: String,

    pub service: String,

    pub version: String,

    /// Current timestamp (ISO 8601).
    pub timestamp: String,

    /// Number of group placements, reported by the readiness probe.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placements: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl HealthResponse {
    fn new(status: &str) -> Self {
        Self {
            status: status.to_string(),
            service: "placement-engine".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Utc::now().to_rfc3339(),
            placements: None,
            message: None,
        }
    }
}

/// Create health check routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/livez", get(livez))
}

/// Basic health check; does not touch the store.
async fn healthz() -> impl IntoResponse {
    Json(HealthResponse::new("ok"))
}

/// Readiness check.
///
/// Ready once the store answers queries and at least one placement exists;
/// without placements every reservation would fail.
async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let query = Query::collection(GroupPlacement::COLLECTION);
    match state.store().query(&query).await {
        Ok(placements) if !placements.is_empty() => {
            let mut response = HealthResponse::new("ok");
            response.placements = Some(placements.len());
            (StatusCode::OK, Json(response))
        }
        Ok(_) => {
            let mut response = HealthResponse::new("degraded");
            response.placements = Some(0);
            response.message = Some("no group placements configured".to_string());
            (StatusCode::SERVICE_UNAVAILABLE, Json(response))
        }
        Err(e) => {
            let mut response = HealthResponse::new("degraded");
            response.message = Some(e.to_string());
            (StatusCode::SERVICE_UNAVAILABLE, Json(response))
        }
    }
}

/// Liveness check.
async fn livez() -> impl IntoResponse {
    StatusCode::OK
}
