use std::collections::BTreeMap;

use berth_id::DocumentLink;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// `max_number_instances` value meaning "no cap".
pub const UNLIMITED_INSTANCES: u64 = 0;

/// Smallest accepted non-zero memory limit (4 MiB).
pub const MIN_MEMORY_LIMIT: u64 = 4 * 1024 * 1024;

pub const DEFAULT_PLACEMENT_PRIORITY: i32 = 100;
pub const DEFAULT_PLACEMENT_MAX_INSTANCES: u64 = 1_000_000;

/// Rejected placement definitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("placement name must not be empty")]
    EmptyName,

    #[error("priority must not be negative, got {0}")]
    NegativePriority(i32),

    #[error("memory limit must be 0 or at least {MIN_MEMORY_LIMIT} bytes, got {0}")]
    MemoryLimitTooLow(u64),
}

/// A quota-bounded capacity bucket (group resource placement).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupPlacement {
    pub name: String,
    /// Tenant scope, most specific first. Empty means global.
    #[serde(default)]
    pub tenant_links: Vec<String>,
    pub resource_pool_link: DocumentLink,
    /// Lower value wins.
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub max_number_instances: u64,
    #[serde(default)]
    pub allocated_instances_count: u64,
    #[serde(default)]
    pub available_instances_count: u64,
    /// Bytes, 0 means unlimited.
    #[serde(default)]
    pub memory_limit: u64,
    #[serde(default)]
    pub available_memory: u64,
    #[serde(default)]
    pub resource_quota_per_description: BTreeMap<DocumentLink, u64>,
    #[serde(default)]
    pub custom_properties: BTreeMap<String, String>,
}

impl GroupPlacement {
    pub fn new(name: impl Into<String>, resource_pool_link: DocumentLink) -> Self {
        Self {
            name: name.into(),
            tenant_links: Vec::new(),
            resource_pool_link,
            priority: 0,
            max_number_instances: UNLIMITED_INSTANCES,
            allocated_instances_count: 0,
            available_instances_count: 0,
            memory_limit: 0,
            available_memory: 0,
            resource_quota_per_description: BTreeMap::new(),
            custom_properties: BTreeMap::new(),
        }
    }

    /// The placement every tenant falls back to.
    pub fn default_global(resource_pool_link: DocumentLink) -> Self {
        Self::new("default-placement", resource_pool_link)
            .with_priority(DEFAULT_PLACEMENT_PRIORITY)
            .with_max_instances(DEFAULT_PLACEMENT_MAX_INSTANCES)
    }

    pub fn with_tenants(mut self, tenant_links: Vec<String>) -> Self {
        self.tenant_links = tenant_links;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_max_instances(mut self, max: u64) -> Self {
        self.max_number_instances = max;
        self
    }

    pub fn with_memory_limit(mut self, limit: u64) -> Self {
        self.memory_limit = limit;
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_properties.insert(key.into(), value.into());
        self
    }

    pub fn is_unlimited(&self) -> bool {
        self.max_number_instances == UNLIMITED_INSTANCES
    }

    pub fn is_global(&self) -> bool {
        self.tenant_links.is_empty()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if self.priority < 0 {
            return Err(ValidationError::NegativePriority(self.priority));
        }
        if self.memory_limit != 0 && self.memory_limit < MIN_MEMORY_LIMIT {
            return Err(ValidationError::MemoryLimitTooLow(self.memory_limit));
        }
        Ok(())
    }

    /// Reset every counter to the fresh state of a newly created placement.
    pub fn initialized(mut self) -> Self {
        self.allocated_instances_count = 0;
        self.available_instances_count = self.max_number_instances;
        self.available_memory = self.memory_limit;
        self.resource_quota_per_description.clear();
        self
    }

    /// Whether `count` more instances of `memory_per_instance` bytes fit.
    ///
    /// Counters must stay representable, so unlimited placements refuse a
    /// count that would overflow the allocated total.
    pub fn has_capacity(&self, count: u64, memory_per_instance: u64) -> bool {
        let counted = self.allocated_instances_count.checked_add(count).is_some();
        let instances_fit =
            counted && (self.is_unlimited() || self.available_instances_count >= count);
        let memory_fit = self.memory_limit == 0
            || memory_per_instance == 0
            || self.available_memory >= count.saturating_mul(memory_per_instance);
        instances_fit && memory_fit
    }

    /// Counter update for reserving `count` instances of `description`.
    ///
    /// `None` when a counter would overflow.
    pub fn reserve_patch(
        &self,
        description: &DocumentLink,
        count: u64,
        memory_per_instance: u64,
    ) -> Option<GroupPlacementPatch> {
        let allocated = self.allocated_instances_count.checked_add(count)?;
        let mut quota = self.resource_quota_per_description.clone();
        let held = quota.entry(description.clone()).or_default();
        *held = held.checked_add(count)?;

        Some(GroupPlacementPatch {
            allocated_instances_count: Some(allocated),
            available_instances_count: (!self.is_unlimited())
                .then(|| self.available_instances_count.saturating_sub(count)),
            available_memory: (self.memory_limit != 0).then(|| {
                self.available_memory
                    .saturating_sub(count.saturating_mul(memory_per_instance))
            }),
            resource_quota_per_description: Some(quota),
        })
    }

    /// Counter update for releasing `count` instances of `description`.
    ///
    /// `None` when the description holds fewer than `count` instances here.
    pub fn release_patch(
        &self,
        description: &DocumentLink,
        count: u64,
        memory_per_instance: u64,
    ) -> Option<GroupPlacementPatch> {
        let held = self
            .resource_quota_per_description
            .get(description)
            .copied()
            .unwrap_or(0);
        if count > held || count > self.allocated_instances_count {
            return None;
        }

        let mut quota = self.resource_quota_per_description.clone();
        if held == count {
            quota.remove(description);
        } else {
            quota.insert(description.clone(), held - count);
        }

        Some(GroupPlacementPatch {
            allocated_instances_count: Some(self.allocated_instances_count - count),
            available_instances_count: (!self.is_unlimited()).then(|| {
                self.available_instances_count
                    .saturating_add(count)
                    .min(self.max_number_instances)
            }),
            available_memory: (self.memory_limit != 0).then(|| {
                self.available_memory
                    .saturating_add(count.saturating_mul(memory_per_instance))
                    .min(self.memory_limit)
            }),
            resource_quota_per_description: Some(quota),
        })
    }

    /// Held instances for a description.
    pub fn quota_for(&self, description: &DocumentLink) -> u64 {
        self.resource_quota_per_description
            .get(description)
            .copied()
            .unwrap_or(0)
    }
}

/// Partial update of a placement's counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GroupPlacementPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allocated_instances_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_instances_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_memory: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_quota_per_description: Option<BTreeMap<DocumentLink, u64>>,
}

impl GroupPlacementPatch {
    /// Merge into `current`, returning the result and whether it differs.
    pub fn apply(&self, current: &GroupPlacement) -> (GroupPlacement, bool) {
        let mut updated = current.clone();
        if let Some(v) = self.allocated_instances_count {
            updated.allocated_instances_count = v;
        }
        if let Some(v) = self.available_instances_count {
            updated.available_instances_count = v;
        }
        if let Some(v) = self.available_memory {
            updated.available_memory = v;
        }
        if let Some(quota) = &self.resource_quota_per_description {
            updated.resource_quota_per_description = quota.clone();
        }
        let changed = updated != *current;
        (updated, changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    fn pool_link() -> DocumentLink {
        DocumentLink::parse("/resources/pools/rp_a").unwrap()
    }

    fn desc_link() -> DocumentLink {
        DocumentLink::parse("/resources/compute-descriptions/desc_a").unwrap()
    }

    #[rstest]
    #[case(GroupPlacement::new("", pool_link()), Err(ValidationError::EmptyName))]
    #[case(GroupPlacement::new("p", pool_link()).with_priority(-1), Err(ValidationError::NegativePriority(-1)))]
    #[case(GroupPlacement::new("p", pool_link()).with_memory_limit(1024), Err(ValidationError::MemoryLimitTooLow(1024)))]
    #[case(GroupPlacement::new("p", pool_link()).with_memory_limit(MIN_MEMORY_LIMIT), Ok(()))]
    #[case(GroupPlacement::new("p", pool_link()), Ok(()))]
    fn test_validate(#[case] placement: GroupPlacement, #[case] expected: Result<(), ValidationError>) {
        assert_eq!(placement.validate(), expected);
    }

    #[test]
    fn test_default_global() {
        let p = GroupPlacement::default_global(pool_link()).initialized();
        assert!(p.is_global());
        assert_eq!(p.priority, 100);
        assert_eq!(p.available_instances_count, 1_000_000);
    }

    #[test]
    fn test_capacity_capped() {
        let p = GroupPlacement::new("p", pool_link())
            .with_max_instances(4)
            .initialized();
        assert!(p.has_capacity(4, 0));
        assert!(!p.has_capacity(5, 0));
    }

    #[test]
    fn test_capacity_unlimited_and_memory() {
        let p = GroupPlacement::new("p", pool_link())
            .with_memory_limit(8 * MIN_MEMORY_LIMIT)
            .initialized();
        assert!(p.has_capacity(1_000, 0));
        assert!(p.has_capacity(2, 4 * MIN_MEMORY_LIMIT));
        assert!(!p.has_capacity(3, 4 * MIN_MEMORY_LIMIT));
    }

    #[test]
    fn test_reserve_then_release() {
        let p = GroupPlacement::new("p", pool_link())
            .with_max_instances(10)
            .initialized();

        let (reserved, changed) = p.reserve_patch(&desc_link(), 3, 0).unwrap().apply(&p);
        assert!(changed);
        assert_eq!(reserved.allocated_instances_count, 3);
        assert_eq!(reserved.available_instances_count, 7);
        assert_eq!(reserved.quota_for(&desc_link()), 3);

        assert!(reserved.release_patch(&desc_link(), 4, 0).is_none());

        let (released, _) = reserved
            .release_patch(&desc_link(), 3, 0)
            .unwrap()
            .apply(&reserved);
        assert_eq!(released, p);
    }

    #[test]
    fn test_unlimited_keeps_available_untouched() {
        let p = GroupPlacement::new("p", pool_link()).initialized();
        let patch = p.reserve_patch(&desc_link(), 5, 0).unwrap();
        assert_eq!(patch.available_instances_count, None);
        assert_eq!(patch.available_memory, None);
    }

    #[test]
    fn test_unlimited_counters_refuse_overflow() {
        let p = GroupPlacement::new("p", pool_link()).initialized();
        let (full, _) = p
            .reserve_patch(&desc_link(), u64::MAX, 0)
            .unwrap()
            .apply(&p);

        assert!(!full.has_capacity(1, 0));
        assert!(full.reserve_patch(&desc_link(), 1, 0).is_none());
        assert!(p.has_capacity(u64::MAX, 0));
    }

    #[test]
    fn test_empty_patch_reports_unchanged() {
        let p = GroupPlacement::new("p", pool_link()).initialized();
        let (same, changed) = GroupPlacementPatch::default().apply(&p);
        assert!(!changed);
        assert_eq!(same, p);
    }

    #[test]
    fn test_patch_json_skips_unset_fields() {
        let patch = GroupPlacementPatch {
            allocated_instances_count: Some(2),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            serde_json::json!({"allocated_instances_count": 2})
        );
    }

    proptest! {
        #[test]
        fn prop_release_undoes_reserve(
            count in 1u64..1_000,
            spare in 0u64..1_000,
            memory in 0u64..MIN_MEMORY_LIMIT,
            capped in any::<bool>(),
            memory_capped in any::<bool>(),
        ) {
            let max = if capped { count + spare } else { UNLIMITED_INSTANCES };
            let memory_limit = if memory_capped {
                (count * memory + spare).max(MIN_MEMORY_LIMIT)
            } else {
                0
            };
            let p = GroupPlacement::new("p", pool_link())
                .with_max_instances(max)
                .with_memory_limit(memory_limit)
                .initialized();
            prop_assert!(p.has_capacity(count, memory));

            let (reserved, changed) = p
                .reserve_patch(&desc_link(), count, memory)
                .unwrap()
                .apply(&p);
            prop_assert!(changed);
            prop_assert_eq!(reserved.allocated_instances_count, count);

            let (released, _) = reserved
                .release_patch(&desc_link(), count, memory)
                .unwrap()
                .apply(&reserved);
            prop_assert_eq!(released, p);
        }
    }
}
