use std::collections::BTreeSet;

use berth_id::DocumentLink;
use serde::{Deserialize, Serialize};

/// Declarative rule: computes carrying all of `tag_links_to_match` belong to
/// `resource_pool_link`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElasticPlacementZone {
    pub resource_pool_link: DocumentLink,
    #[serde(default)]
    pub tag_links_to_match: BTreeSet<DocumentLink>,
}

impl ElasticPlacementZone {
    pub fn new(
        resource_pool_link: DocumentLink,
        tags: impl IntoIterator<Item = DocumentLink>,
    ) -> Self {
        Self {
            resource_pool_link,
            tag_links_to_match: tags.into_iter().collect(),
        }
    }

    /// Zone tags are a subset of `tags`. Empty zones match nothing.
    pub fn matches(&self, tags: &BTreeSet<DocumentLink>) -> bool {
        !self.tag_links_to_match.is_empty() && self.tag_links_to_match.is_subset(tags)
    }
}
