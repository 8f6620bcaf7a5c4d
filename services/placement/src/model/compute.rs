use std::collections::{BTreeMap, BTreeSet};

use berth_id::DocumentLink;
use berth_reconcile::RemovalPriority;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PowerState {
    On,
    Off,
    Suspended,
    #[default]
    Unknown,
}

impl PowerState {
    pub fn removal_priority(self) -> RemovalPriority {
        match self {
            Self::Off => RemovalPriority::PoweredOff,
            Self::Unknown => RemovalPriority::Unknown,
            Self::Suspended => RemovalPriority::Suspended,
            Self::On => RemovalPriority::Running,
        }
    }
}

/// A physical resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Compute {
    pub name: String,
    #[serde(default)]
    pub tag_links: BTreeSet<DocumentLink>,
    /// Pool membership, maintained by the zone assignment reconciler.
    #[serde(default)]
    pub resource_pool_link: Option<DocumentLink>,
    #[serde(default)]
    pub description_link: Option<DocumentLink>,
    /// Placement whose quota this compute consumes.
    #[serde(default)]
    pub group_placement_link: Option<DocumentLink>,
    #[serde(default)]
    pub power_state: PowerState,
    #[serde(default)]
    pub custom_properties: BTreeMap<String, String>,
}

impl Compute {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = DocumentLink>) -> Self {
        self.tag_links.extend(tags);
        self
    }

    pub fn in_pool(mut self, pool: DocumentLink) -> Self {
        self.resource_pool_link = Some(pool);
        self
    }
}

/// Partial update of a compute.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ComputePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_pool_link: Option<DocumentLink>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_state: Option<PowerState>,
}

impl ComputePatch {
    pub fn assign_pool(pool: DocumentLink) -> Self {
        Self {
            resource_pool_link: Some(pool),
            ..Default::default()
        }
    }

    /// Merge into `current`, returning the result and whether it differs.
    pub fn apply(&self, current: &Compute) -> (Compute, bool) {
        let mut updated = current.clone();
        if let Some(pool) = &self.resource_pool_link {
            updated.resource_pool_link = Some(pool.clone());
        }
        if let Some(state) = self.power_state {
            updated.power_state = state;
        }
        let changed = updated != *current;
        (updated, changed)
    }
}
