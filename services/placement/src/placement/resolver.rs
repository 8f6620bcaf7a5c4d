//! Condition to tag-link resolution.

use std::collections::BTreeSet;
use std::sync::Arc;

use berth_constraints::{Condition, Memo, ResolvedCondition};
use berth_id::DocumentLink;
use tracing::trace;

use crate::model::Tag;
use crate::store::{Document, DocumentStore, DocumentStoreExt, Query, StoreError, StoreResult};

type TagSelector = (String, Option<String>);

/// Resolves conditions to the tag links they refer to.
///
/// Lookups are memoized per `(key, value)` for the lifetime of the resolver.
/// Build one per selection or reconciliation pass and drop it afterwards.
pub struct TagResolver {
    store: Arc<dyn DocumentStore>,
    scope: Vec<String>,
    memo: Memo<TagSelector, BTreeSet<DocumentLink>>,
}

impl TagResolver {
    /// Tags outside `scope` are invisible to this resolver.
    pub fn new(store: Arc<dyn DocumentStore>, scope: Vec<String>) -> Self {
        Self {
            store,
            scope,
            memo: Memo::new(),
        }
    }

    pub async fn resolve(
        &mut self,
        condition: &Condition,
    ) -> StoreResult<ResolvedCondition<DocumentLink>> {
        let selector = (condition.tag_key.clone(), condition.tag_value.clone());
        let store = Arc::clone(&self.store);
        let scope = self.scope.clone();

        let matching = self
            .memo
            .get_or_try_insert_async(selector, |(key, value)| async move {
                let mut query =
                    Query::collection(Tag::COLLECTION).field_equals("key", key.as_str());
                if let Some(value) = &value {
                    query = query.field_equals("value", value.as_str());
                }
                let tags = store.find::<Tag>(query).await?;
                let links: BTreeSet<DocumentLink> = tags
                    .into_iter()
                    .filter(|t| t.doc.visible_to(&scope))
                    .map(|t| t.link)
                    .collect();
                trace!(key = %key, matches = links.len(), "resolved tag selector");
                Ok::<_, StoreError>(links)
            })
            .await?;

        Ok(ResolvedCondition::new(condition.clone(), matching.clone()))
    }

    pub async fn resolve_all(
        &mut self,
        conditions: &[Condition],
    ) -> StoreResult<Vec<ResolvedCondition<DocumentLink>>> {
        let mut resolved = Vec::with_capacity(conditions.len());
        for condition in conditions {
            resolved.push(self.resolve(condition).await?);
        }
        Ok(resolved)
    }

    /// Store lookups performed so far.
    pub fn lookups(&self) -> usize {
        self.memo.misses()
    }
}
