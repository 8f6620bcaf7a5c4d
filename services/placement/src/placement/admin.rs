//! Placement lifecycle: creation and deletion.

use berth_id::DocumentLink;
use tracing::{info, instrument};

use super::{PlacementError, PlacementResult, PlacementSelector};
use crate::model::{GroupPlacement, ResourcePool};
use crate::store::{Document, DocumentStoreExt, Versioned};

impl PlacementSelector {
    /// Validate and store a new placement with fresh counters.
    pub async fn create_placement(
        &self,
        placement: GroupPlacement,
    ) -> PlacementResult<Versioned<GroupPlacement>> {
        self.create_placement_at(GroupPlacement::new_link(), placement)
            .await
    }

    /// Same as [`create_placement`](Self::create_placement) under a caller
    /// chosen link; used by seeding.
    #[instrument(skip(self, placement), fields(name = %placement.name))]
    pub async fn create_placement_at(
        &self,
        link: DocumentLink,
        placement: GroupPlacement,
    ) -> PlacementResult<Versioned<GroupPlacement>> {
        placement.validate()?;
        self.load_versioned::<ResourcePool>(&placement.resource_pool_link, "resource pool")
            .await?;

        let created = self
            .store()
            .insert_at(link, &placement.initialized())
            .await?;
        info!(
            link = %created.link,
            priority = created.doc.priority,
            max_instances = created.doc.max_number_instances,
            "Group placement created"
        );
        Ok(created)
    }

    /// Delete a placement that holds no allocations.
    #[instrument(skip(self))]
    pub async fn delete_placement(&self, link: &DocumentLink) -> PlacementResult<()> {
        let current = self.store().load::<GroupPlacement>(link).await?;

        if current.doc.allocated_instances_count > 0 {
            return Err(PlacementError::InUse {
                link: link.clone(),
                allocated: current.doc.allocated_instances_count,
            });
        }

        self.store().delete(link, Some(current.version)).await?;
        info!("Group placement deleted");
        Ok(())
    }
}
