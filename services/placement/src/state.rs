//! Application state shared across request handlers.

use std::sync::Arc;

use crate::cluster::ClusterSizeReconciler;
use crate::placement::PlacementSelector;
use crate::reservation::ReservationService;
use crate::store::DocumentStore;
use crate::zones::ZoneAssignmentTrigger;

/// Shared application state.
///
/// This is passed to all request handlers via Axum's state extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    store: Arc<dyn DocumentStore>,
    selector: Arc<PlacementSelector>,
    reservations: ReservationService,
    zone_trigger: ZoneAssignmentTrigger,
    cluster: ClusterSizeReconciler,
}

impl AppState {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        selector: Arc<PlacementSelector>,
        reservations: ReservationService,
        zone_trigger: ZoneAssignmentTrigger,
        cluster: ClusterSizeReconciler,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                store,
                selector,
                reservations,
                zone_trigger,
                cluster,
            }),
        }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.inner.store
    }

    pub fn selector(&self) -> &PlacementSelector {
        &self.inner.selector
    }

    pub fn reservations(&self) -> &ReservationService {
        &self.inner.reservations
    }

    pub fn zone_trigger(&self) -> &ZoneAssignmentTrigger {
        &self.inner.zone_trigger
    }

    pub fn cluster(&self) -> &ClusterSizeReconciler {
        &self.inner.cluster
    }
}
