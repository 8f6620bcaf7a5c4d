//! Documents owned by the placement engine.
//!
//! Every type here is stored as a JSON document; see [`crate::store`]. The
//! patch types ([`GroupPlacementPatch`], [`ComputePatch`]) are explicit,
//! per-entity partial updates: `apply` merges a patch into a current value and
//! reports whether anything changed, and the serialized patch is what gets
//! sent to the store.

mod compute;
mod description;
mod placement;
mod pool;
mod tag;
mod zone;

pub use compute::{Compute, ComputePatch, PowerState};
pub use description::{ComputeDescription, Constrained, DiskDescription, NetworkDescription};
pub use placement::{
    GroupPlacement, GroupPlacementPatch, ValidationError, DEFAULT_PLACEMENT_MAX_INSTANCES,
    DEFAULT_PLACEMENT_PRIORITY, MIN_MEMORY_LIMIT, UNLIMITED_INSTANCES,
};
pub use pool::ResourcePool;
pub use tag::{ensure_tag, Tag};
pub use zone::ElasticPlacementZone;

/// Wires a model type to its typed id's collection.
macro_rules! impl_document {
    ($doc:ty, $id:ty) => {
        impl $crate::store::Document for $doc {
            const COLLECTION: &'static str = <$id>::COLLECTION;

            fn new_link() -> berth_id::DocumentLink {
                <$id>::new().link()
            }
        }
    };
}

impl_document!(Tag, berth_id::TagId);
impl_document!(ResourcePool, berth_id::ResourcePoolId);
impl_document!(GroupPlacement, berth_id::PlacementId);
impl_document!(ComputeDescription, berth_id::DescriptionId);
impl_document!(DiskDescription, berth_id::DiskDescriptionId);
impl_document!(NetworkDescription, berth_id::NetworkDescriptionId);
impl_document!(ElasticPlacementZone, berth_id::ZoneId);
impl_document!(Compute, berth_id::ComputeId);
