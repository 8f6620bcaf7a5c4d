//! Zone assignment reconciler.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use berth_id::DocumentLink;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::model::{Compute, ComputePatch, ElasticPlacementZone};
use crate::store::{Document, DocumentStore, DocumentStoreExt, Query, StoreError, Versioned};

/// Errors that abort a whole pass.
#[derive(Debug, Error)]
pub enum ZoneAssignmentError {
    #[error("failed to list {what}: {source}")]
    Listing {
        what: &'static str,
        #[source]
        source: StoreError,
    },
}

/// A compute whose update failed; the pass went on without it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceFailure {
    pub link: DocumentLink,
    pub error: String,
}

/// Matched computes and the pools of every zone they match.
type Targets = BTreeMap<DocumentLink, (Versioned<Compute>, BTreeSet<DocumentLink>)>;

/// Outcome of one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ZoneAssignmentStats {
    pub zones: usize,
    /// Zones without tags, ignored.
    pub zones_skipped: usize,
    /// Computes matching at least one zone.
    pub computes_matched: usize,
    pub assigned: usize,
    /// Already in the right pool.
    pub unchanged: usize,
    /// Matched zones pointing at different pools.
    pub conflicts: usize,
    pub failures: Vec<ResourceFailure>,
}

/// Runs zone assignment passes against the store.
pub struct ZoneAssignmentReconciler {
    store: Arc<dyn DocumentStore>,
}

impl ZoneAssignmentReconciler {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Run a single pass over every zone and every matching compute.
    #[instrument(skip(self))]
    pub async fn reconcile(&self) -> Result<ZoneAssignmentStats, ZoneAssignmentError> {
        let mut stats = ZoneAssignmentStats::default();

        let zones = self
            .store
            .find_all::<ElasticPlacementZone>()
            .await
            .map_err(|source| ZoneAssignmentError::Listing {
                what: "elastic placement zones",
                source,
            })?;
        stats.zones = zones.len();

        let targets = self.collect_targets(&zones, &mut stats).await?;
        stats.computes_matched = targets.len();

        for (link, (compute, pools)) in targets {
            if pools.len() > 1 {
                warn!(
                    compute = %link,
                    pools = ?pools,
                    "Compute matches zones of several pools, leaving its pool unchanged"
                );
                stats.conflicts += 1;
                continue;
            }
            let Some(pool) = pools.into_iter().next() else {
                continue;
            };

            match self.assign(&compute, pool).await {
                Ok(true) => stats.assigned += 1,
                Ok(false) => stats.unchanged += 1,
                Err(e) => {
                    warn!(compute = %link, error = %e, "Failed to assign compute to zone pool");
                    stats.failures.push(ResourceFailure {
                        link,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            zones = stats.zones,
            computes_matched = stats.computes_matched,
            assigned = stats.assigned,
            conflicts = stats.conflicts,
            failures = stats.failures.len(),
            "Zone assignment pass complete"
        );

        Ok(stats)
    }

    /// Every compute matching some zone, with the pools of all matching zones.
    async fn collect_targets(
        &self,
        zones: &[Versioned<ElasticPlacementZone>],
        stats: &mut ZoneAssignmentStats,
    ) -> Result<Targets, ZoneAssignmentError> {
        let mut targets = Targets::new();

        for zone in zones {
            if zone.doc.tag_links_to_match.is_empty() {
                warn!(zone = %zone.link, "Elastic placement zone has no tags, skipping");
                stats.zones_skipped += 1;
                continue;
            }

            let query = zone
                .doc
                .tag_links_to_match
                .iter()
                .fold(Query::collection(Compute::COLLECTION), |q, tag| {
                    q.contains("tag_links", tag.as_str())
                });

            let computes = self.store.find::<Compute>(query).await.map_err(|source| {
                ZoneAssignmentError::Listing {
                    what: "computes",
                    source,
                }
            })?;
            debug!(zone = %zone.link, matches = computes.len(), "Zone matched computes");

            for compute in computes {
                let pool = zone.doc.resource_pool_link.clone();
                targets
                    .entry(compute.link.clone())
                    .or_insert_with(|| (compute, BTreeSet::new()))
                    .1
                    .insert(pool);
            }
        }

        Ok(targets)
    }

    /// Point `compute` at `pool`. `Ok(false)` when it already was.
    async fn assign(
        &self,
        compute: &Versioned<Compute>,
        pool: DocumentLink,
    ) -> Result<bool, StoreError> {
        let patch = ComputePatch::assign_pool(pool);
        let (_, changed) = patch.apply(&compute.doc);
        if !changed {
            return Ok(false);
        }

        let updated = self
            .store
            .patch_doc::<Compute>(
                &compute.link,
                serde_json::to_value(&patch)?,
                Some(compute.version),
            )
            .await?;
        info!(
            compute = %updated.link,
            pool = ?updated.doc.resource_pool_link,
            "Compute assigned to zone pool"
        );
        Ok(true)
    }
}
