//! Pool selection and reservation.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::Arc;

use berth_constraints::{rank_by_constraints, Memo, ResolvedCondition};
use berth_id::DocumentLink;
use berth_reconcile::{RetryBudget, DEFAULT_MAX_ATTEMPTS};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use super::{
    merge_properties, CandidatePool, PlacementError, PlacementRequest, PlacementResult, Selection,
    TagResolver,
};
use crate::model::{
    ComputeDescription, Constrained, DiskDescription, GroupPlacement, NetworkDescription,
    ResourcePool,
};
use crate::store::{Document, DocumentStore, DocumentStoreExt, Query, StoreError, Versioned};

/// Scope tier of a candidate. Group-scoped placements always come first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Tier {
    Group,
    Global,
}

#[derive(Debug)]
struct Candidate {
    placement: Versioned<GroupPlacement>,
    tier: Tier,
    pool_tags: BTreeSet<DocumentLink>,
    score: i32,
}

impl Candidate {
    fn to_pool(&self) -> CandidatePool {
        CandidatePool {
            placement_link: self.placement.link.clone(),
            resource_pool_link: self.placement.doc.resource_pool_link.clone(),
        }
    }

    /// Remaining instances, unlimited counting as the most.
    fn headroom(&self) -> u64 {
        let p = &self.placement.doc;
        if p.is_unlimited() {
            u64::MAX
        } else {
            p.available_instances_count
        }
    }
}

/// Tier, then priority ascending, then headroom descending.
fn preference(a: &Candidate, b: &Candidate) -> Ordering {
    a.tier
        .cmp(&b.tier)
        .then(a.placement.doc.priority.cmp(&b.placement.doc.priority))
        .then_with(|| b.headroom().cmp(&a.headroom()))
}

/// A class of requirements evaluated in one filtering pass.
struct Phase {
    /// Failure message when nothing survives the pass.
    unmet: String,
    conditions: Vec<ResolvedCondition<DocumentLink>>,
}

struct Prerequisites {
    memory_bytes: u64,
    phases: Vec<Phase>,
}

/// Chooses and reserves group placements.
pub struct PlacementSelector {
    store: Arc<dyn DocumentStore>,
    max_attempts: u32,
}

impl PlacementSelector {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Compare-and-set attempts per reservation or release.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Select a placement for `request` and reserve its capacity.
    ///
    /// Counters are only mutated by the final compare-and-set; every error
    /// path leaves the store untouched.
    #[instrument(skip(self, request), fields(
        description = %request.resource_description_link,
        count = request.resource_count,
    ))]
    pub async fn select_pool(&self, request: &PlacementRequest) -> PlacementResult<Selection> {
        if request.resource_count == 0 {
            return Err(PlacementError::InvalidPayload(
                "resource_count must be at least 1".to_string(),
            ));
        }

        let prereqs = self.load_prerequisites(request).await?;
        let mut budget = RetryBudget::new(self.max_attempts);

        while let Ok(attempt) = budget.spend() {
            let candidates = self.eligible_candidates(request, &prereqs).await?;

            let Some(chosen) = candidates.iter().find(|c| {
                c.placement
                    .doc
                    .has_capacity(request.resource_count, prereqs.memory_bytes)
            }) else {
                return Err(PlacementError::NoCapacity {
                    requested: request.resource_count,
                    candidates: candidates.len(),
                });
            };

            let patch = chosen
                .placement
                .doc
                .reserve_patch(
                    &request.resource_description_link,
                    request.resource_count,
                    prereqs.memory_bytes,
                )
                .ok_or(PlacementError::NoCapacity {
                    requested: request.resource_count,
                    candidates: candidates.len(),
                })?;
            let body = serde_json::to_value(&patch).map_err(StoreError::from)?;

            let expected = Some(chosen.placement.version);
            match self
                .store
                .patch_doc::<GroupPlacement>(&chosen.placement.link, body, expected)
                .await
            {
                Ok(updated) => {
                    info!(
                        placement = %updated.link,
                        allocated = updated.doc.allocated_instances_count,
                        attempt,
                        "Reserved placement capacity"
                    );
                    return Ok(Selection {
                        placement_link: updated.link,
                        resource_pool_link: updated.doc.resource_pool_link.clone(),
                        resource_pools_per_placement: candidates
                            .iter()
                            .map(Candidate::to_pool)
                            .collect(),
                        custom_properties: merge_properties(
                            &request.custom_properties,
                            &updated.doc.custom_properties,
                        ),
                        attempts: attempt,
                    });
                }
                Err(e) if e.is_conflict() => {
                    debug!(
                        placement = %chosen.placement.link,
                        attempt,
                        "Lost reservation race, reselecting"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        warn!(attempts = budget.used(), "Reservation retry budget exhausted");
        Err(PlacementError::Contention {
            attempts: budget.used(),
        })
    }

    /// Give back `count` instances of `description_link` to a placement.
    #[instrument(skip(self))]
    pub async fn release(
        &self,
        placement_link: &DocumentLink,
        description_link: &DocumentLink,
        count: u64,
    ) -> PlacementResult<GroupPlacement> {
        if count == 0 {
            return Err(PlacementError::InvalidPayload(
                "release count must be at least 1".to_string(),
            ));
        }

        let memory_bytes = match self.store.load::<ComputeDescription>(description_link).await {
            Ok(d) => d.doc.memory_bytes,
            Err(e) if e.is_not_found() => 0,
            Err(e) => return Err(e.into()),
        };

        let mut budget = RetryBudget::new(self.max_attempts);
        while let Ok(attempt) = budget.spend() {
            let current = self
                .load_versioned::<GroupPlacement>(placement_link, "group placement")
                .await?;

            let patch = current
                .doc
                .release_patch(description_link, count, memory_bytes)
                .ok_or_else(|| {
                    PlacementError::InvalidPayload(format!(
                        "cannot release {count} instances of {description_link}: \
                         only {} reserved in {placement_link}",
                        current.doc.quota_for(description_link)
                    ))
                })?;
            let body = serde_json::to_value(&patch).map_err(StoreError::from)?;

            match self
                .store
                .patch_doc::<GroupPlacement>(placement_link, body, Some(current.version))
                .await
            {
                Ok(updated) => {
                    info!(
                        allocated = updated.doc.allocated_instances_count,
                        attempt,
                        "Released placement capacity"
                    );
                    return Ok(updated.doc);
                }
                Err(e) if e.is_conflict() => {
                    debug!(attempt, "Lost release race, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(PlacementError::Contention {
            attempts: budget.used(),
        })
    }

    /// Load a document, mapping absence to `MissingPrerequisite`.
    pub(super) async fn load_versioned<D: Document>(
        &self,
        link: &DocumentLink,
        what: &str,
    ) -> PlacementResult<Versioned<D>> {
        match self.store.load::<D>(link).await {
            Ok(doc) => Ok(doc),
            Err(e) if e.is_not_found() => Err(PlacementError::MissingPrerequisite(format!(
                "{what} {link} does not exist"
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// Descriptions and resolved conditions, loaded once per request.
    async fn load_prerequisites(
        &self,
        request: &PlacementRequest,
    ) -> PlacementResult<Prerequisites> {
        let description = self
            .load_versioned::<ComputeDescription>(
                &request.resource_description_link,
                "compute description",
            )
            .await?
            .doc;

        // Dropped with this function: tag resolutions never outlive a request.
        let mut resolver = TagResolver::new(Arc::clone(&self.store), request.tenant_links.clone());
        let mut phases = Vec::new();

        phases.push(Phase {
            unmet: format!(
                "resource pools are not properly tagged for description '{}'",
                description.name
            ),
            conditions: resolver.resolve_all(description.placement_conditions()).await?,
        });

        for link in &description.disk_description_links {
            let disk = self.load_versioned::<DiskDescription>(link, "disk description").await?.doc;
            phases.push(Phase {
                unmet: format!(
                    "no resource pool satisfies the storage requirements of disk '{}'",
                    disk.name
                ),
                conditions: resolver.resolve_all(disk.placement_conditions()).await?,
            });
        }

        for link in &description.network_description_links {
            let network = self
                .load_versioned::<NetworkDescription>(link, "network description")
                .await?
                .doc;
            phases.push(Phase {
                unmet: format!(
                    "no resource pool satisfies the network requirements of '{}'",
                    network.name
                ),
                conditions: resolver.resolve_all(network.placement_conditions()).await?,
            });
        }

        debug!(
            phases = phases.len(),
            tag_lookups = resolver.lookups(),
            "Resolved placement constraints"
        );

        Ok(Prerequisites {
            memory_bytes: description.memory_bytes,
            phases,
        })
    }

    /// Candidates passing every phase, in preference order.
    async fn eligible_candidates(
        &self,
        request: &PlacementRequest,
        prereqs: &Prerequisites,
    ) -> PlacementResult<Vec<Candidate>> {
        let mut candidates = self.scoped_candidates(&request.tenant_links).await?;
        if candidates.is_empty() {
            return Err(PlacementError::Unsatisfiable(format!(
                "no group placements available for tenant scope {:?}",
                request.tenant_links
            )));
        }

        for phase in &prereqs.phases {
            if phase.conditions.is_empty() {
                continue;
            }
            candidates = rank_by_constraints(&phase.conditions, candidates, |c| &c.pool_tags, None)
                .into_iter()
                .map(|ranked| {
                    let mut c = ranked.candidate;
                    c.score += ranked.score;
                    c
                })
                .collect();
            if candidates.is_empty() {
                return Err(PlacementError::Unsatisfiable(phase.unmet.clone()));
            }
        }

        // Constraint ranking first, so it survives as the tie-break of the
        // stable preference sort.
        candidates.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| a.placement.link.cmp(&b.placement.link))
        });
        candidates.sort_by(preference);

        if !request.approved_placement_links.is_empty() {
            candidates.retain(|c| request.approved_placement_links.contains(&c.placement.link));
            if candidates.is_empty() {
                return Err(PlacementError::Unsatisfiable(
                    "none of the approved placements is eligible".to_string(),
                ));
            }
        }

        Ok(candidates)
    }

    /// Group placements for `scope`, then global ones, with their pool tags.
    async fn scoped_candidates(&self, scope: &[String]) -> PlacementResult<Vec<Candidate>> {
        let mut placements = Vec::new();

        if let Some(first) = scope.first() {
            let query = Query::collection(GroupPlacement::COLLECTION)
                .contains("tenant_links", first.as_str());
            placements.extend(
                self.store
                    .find::<GroupPlacement>(query)
                    .await?
                    .into_iter()
                    .filter(|p| p.doc.tenant_links.starts_with(scope))
                    .map(|p| (Tier::Group, p)),
            );
        }

        let global = Query::collection(GroupPlacement::COLLECTION)
            .field_equals("tenant_links", Value::Array(Vec::new()));
        placements.extend(
            self.store
                .find::<GroupPlacement>(global)
                .await?
                .into_iter()
                .map(|p| (Tier::Global, p)),
        );

        let mut pools: Memo<DocumentLink, Option<BTreeSet<DocumentLink>>> = Memo::new();
        let mut candidates = Vec::with_capacity(placements.len());

        for (tier, placement) in placements {
            let store = Arc::clone(&self.store);
            let pool_link = placement.doc.resource_pool_link.clone();
            let tags = pools
                .get_or_try_insert_async(pool_link, |link| async move {
                    match store.load::<ResourcePool>(&link).await {
                        Ok(pool) => Ok(Some(pool.doc.tag_links)),
                        Err(e) if e.is_not_found() => Ok(None),
                        Err(e) => Err(e),
                    }
                })
                .await?;

            match tags {
                Some(tags) => candidates.push(Candidate {
                    pool_tags: tags.clone(),
                    placement,
                    tier,
                    score: 0,
                }),
                None => warn!(
                    placement = %placement.link,
                    pool = %placement.doc.resource_pool_link,
                    "Placement references a missing resource pool, skipping"
                ),
            }
        }

        Ok(candidates)
    }
}
