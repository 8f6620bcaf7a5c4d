//! Typed ID definitions for every document kind the engine touches.

use crate::define_id;

// =============================================================================
// Tagging
// =============================================================================

define_id!(TagId, "tag", "/resources/tags");

// =============================================================================
// Capacity
// =============================================================================

define_id!(ResourcePoolId, "rp", "/resources/pools");
define_id!(PlacementId, "grp", "/resources/group-placements");
define_id!(ZoneId, "epz", "/resources/elastic-placement-zones");

// =============================================================================
// Descriptions
// =============================================================================

define_id!(DescriptionId, "desc", "/resources/compute-descriptions");
define_id!(DiskDescriptionId, "disk", "/resources/disk-descriptions");
define_id!(NetworkDescriptionId, "net", "/resources/network-descriptions");

// =============================================================================
// Physical resources
// =============================================================================

define_id!(ComputeId, "cmp", "/resources/computes");

// =============================================================================
// Tasks and requests
// =============================================================================

define_id!(ReservationId, "rsv", "/tasks/reservations");
define_id!(RequestId, "req", "/requests");
