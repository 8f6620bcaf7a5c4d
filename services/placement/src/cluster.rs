//! Cluster size reconciler.
//!
//! Converges the number of live computes of a description to a desired
//! count. Growth goes through a reservation and then the
//! [`ResourceLifecycle`]; shrinking removes computes (powered off first,
//! then oldest) and hands their quota back to the placements they consumed.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use berth_id::DocumentLink;
use berth_reconcile::{select_for_removal, ScaleAction};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::model::{Compute, PowerState};
use crate::placement::{PlacementError, PlacementSelector};
use crate::reservation::{
    ReservationError, ReservationRequest, ReservationResult, ReservationService,
};
use crate::store::{Document, DocumentStore, DocumentStoreExt, Query, StoreError, Versioned};

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("lifecycle operation failed: {0}")]
    Failed(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Creates and destroys physical resources.
#[async_trait]
pub trait ResourceLifecycle: Send + Sync {
    /// Bring up the computes covered by `reservation`.
    async fn provision(
        &self,
        reservation: &ReservationResult,
        description_link: &DocumentLink,
    ) -> Result<Vec<DocumentLink>, LifecycleError>;

    async fn remove(&self, compute: &Versioned<Compute>) -> Result<(), LifecycleError>;
}

/// Lifecycle that only records computes as store documents.
pub struct StoreLifecycle {
    store: Arc<dyn DocumentStore>,
}

impl StoreLifecycle {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ResourceLifecycle for StoreLifecycle {
    async fn provision(
        &self,
        reservation: &ReservationResult,
        description_link: &DocumentLink,
    ) -> Result<Vec<DocumentLink>, LifecycleError> {
        let mut links = Vec::new();
        for n in 0..reservation.resource_count {
            let compute = Compute {
                name: format!("{}-{}", description_link.id(), n),
                resource_pool_link: Some(reservation.resource_pool_link.clone()),
                description_link: Some(description_link.clone()),
                group_placement_link: Some(reservation.placement_link.clone()),
                power_state: PowerState::On,
                custom_properties: reservation.custom_properties.clone(),
                ..Default::default()
            };
            links.push(self.store.insert(&compute).await?.link);
        }
        Ok(links)
    }

    async fn remove(&self, compute: &Versioned<Compute>) -> Result<(), LifecycleError> {
        self.store.delete(&compute.link, None).await?;
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error(transparent)]
    Reservation(#[from] ReservationError),

    #[error(transparent)]
    Placement(#[from] PlacementError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// What a reconcile call did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClusterReport {
    /// `desired - live` before acting.
    pub delta: i64,
    pub provisioned: Vec<DocumentLink>,
    pub removed: Vec<DocumentLink>,
    /// Placement that hosted the growth, if any.
    pub placement_link: Option<DocumentLink>,
}

pub struct ClusterSizeReconciler {
    store: Arc<dyn DocumentStore>,
    reservations: ReservationService,
    selector: Arc<PlacementSelector>,
    lifecycle: Arc<dyn ResourceLifecycle>,
}

impl ClusterSizeReconciler {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        reservations: ReservationService,
        selector: Arc<PlacementSelector>,
        lifecycle: Arc<dyn ResourceLifecycle>,
    ) -> Self {
        Self {
            store,
            reservations,
            selector,
            lifecycle,
        }
    }

    /// Live computes of a description, oldest link first.
    pub async fn live_computes(
        &self,
        description_link: &DocumentLink,
    ) -> Result<Vec<Versioned<Compute>>, StoreError> {
        let query = Query::collection(Compute::COLLECTION)
            .field_equals("description_link", description_link.as_str());
        self.store.find::<Compute>(query).await
    }

    #[instrument(skip(self, tenant_links))]
    pub async fn reconcile(
        &self,
        description_link: &DocumentLink,
        tenant_links: Vec<String>,
        desired_count: u32,
    ) -> Result<ClusterReport, ClusterError> {
        let live = self.live_computes(description_link).await?;
        let live_count = u32::try_from(live.len()).unwrap_or(u32::MAX);
        let action = ScaleAction::from_counts(desired_count, live_count);

        let mut report = ClusterReport {
            delta: action.delta(),
            ..Default::default()
        };

        match action {
            ScaleAction::Steady => {}
            ScaleAction::Grow(count) => {
                let result = self
                    .reservations
                    .reserve(ReservationRequest {
                        resource_description_link: description_link.clone(),
                        tenant_links,
                        resource_count: u64::from(count),
                        custom_properties: BTreeMap::new(),
                        approved_placement_links: Vec::new(),
                    })
                    .await?;
                let provisioned = self.lifecycle.provision(&result, description_link).await;
                report.provisioned = match provisioned {
                    Ok(links) => links,
                    Err(e) => {
                        self.release_unprovisioned(description_link, &live, &result)
                            .await;
                        return Err(e.into());
                    }
                };
                report.placement_link = Some(result.placement_link);
            }
            ScaleAction::Shrink(count) => {
                let victims = select_for_removal(live, count as usize, |c| {
                    c.doc.power_state.removal_priority()
                });

                let mut released: BTreeMap<DocumentLink, u64> = BTreeMap::new();
                for compute in &victims {
                    self.lifecycle.remove(compute).await?;
                    if let Some(placement) = &compute.doc.group_placement_link {
                        *released.entry(placement.clone()).or_default() += 1;
                    }
                    report.removed.push(compute.link.clone());
                }

                for (placement, count) in released {
                    self.selector
                        .release(&placement, description_link, count)
                        .await?;
                }
            }
        }

        info!(
            live = live_count,
            desired = desired_count,
            provisioned = report.provisioned.len(),
            removed = report.removed.len(),
            "Cluster size reconciled"
        );
        Ok(report)
    }

    /// Hand back the part of a reservation that a failed provision did not
    /// turn into computes. Computes it did create stay, and count as live.
    async fn release_unprovisioned(
        &self,
        description_link: &DocumentLink,
        before: &[Versioned<Compute>],
        reservation: &ReservationResult,
    ) {
        let on_placement = |computes: &[Versioned<Compute>]| {
            computes
                .iter()
                .filter(|c| {
                    c.doc.group_placement_link.as_ref() == Some(&reservation.placement_link)
                })
                .count() as u64
        };

        let created = match self.live_computes(description_link).await {
            Ok(after) => on_placement(&after).saturating_sub(on_placement(before)),
            Err(e) => {
                error!(error = %e, "Cannot count computes after failed provision");
                return;
            }
        };
        let unprovisioned = reservation.resource_count.saturating_sub(created);
        if unprovisioned == 0 {
            return;
        }

        match self
            .selector
            .release(&reservation.placement_link, description_link, unprovisioned)
            .await
        {
            Ok(_) => warn!(
                placement = %reservation.placement_link,
                released = unprovisioned,
                "Released quota of failed provision"
            ),
            Err(e) => error!(
                placement = %reservation.placement_link,
                error = %e,
                "Failed to release quota of failed provision"
            ),
        }
    }
}
