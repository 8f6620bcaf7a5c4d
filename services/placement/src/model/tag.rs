use berth_id::DocumentLink;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::store::{DocumentStore, DocumentStoreExt, Query, StoreResult};

/// An immutable key/value label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub tenant_links: Vec<String>,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            tenant_links: Vec::new(),
        }
    }

    pub fn with_tenants(mut self, tenant_links: Vec<String>) -> Self {
        self.tenant_links = tenant_links;
        self
    }

    /// Visible to a reader scoped to `scope`: global tags always are,
    /// scoped tags only when every tenant entry of the tag is in `scope`.
    pub fn visible_to(&self, scope: &[String]) -> bool {
        self.tenant_links.iter().all(|t| scope.contains(t))
    }
}

/// Return the link of the tag with identical content, creating it if needed.
pub async fn ensure_tag<S>(store: &S, tag: &Tag) -> StoreResult<DocumentLink>
where
    S: DocumentStore + ?Sized,
{
    let query = Query::collection(<Tag as crate::store::Document>::COLLECTION)
        .field_equals("key", tag.key.as_str())
        .field_equals("value", tag.value.as_str());

    let existing = store.find::<Tag>(query).await?;
    if let Some(found) = existing
        .into_iter()
        .find(|t| t.doc.tenant_links == tag.tenant_links)
    {
        return Ok(found.link);
    }

    let created = store.insert(tag).await?;
    debug!(link = %created.link, key = %tag.key, value = %tag.value, "tag created");
    Ok(created.link)
}
