use std::collections::{BTreeMap, BTreeSet};

use berth_id::DocumentLink;
use serde::{Deserialize, Serialize};

/// A physical capacity pool; its tags are what placement constraints match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcePool {
    pub name: String,
    #[serde(default)]
    pub tag_links: BTreeSet<DocumentLink>,
    #[serde(default)]
    pub custom_properties: BTreeMap<String, String>,
}

impl ResourcePool {
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
}
