//! API v1 routes.

mod clusters;
mod placements;
mod reservations;
mod zones;

use axum::Router;

use crate::state::AppState;

/// Create API v1 routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(reservations::routes())
        .merge(placements::routes())
        .merge(zones::routes())
        .merge(clusters::routes())
}
