//! In-memory document store.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use berth_id::DocumentLink;
use serde_json::Value;
use tracing::trace;

use super::{DocumentStore, Query, StoreError, StoreResult, StoredDocument};

/// A [`DocumentStore`] backed by a mutex-guarded map.
///
/// The lock is only held for the duration of a single operation and never
/// across an `.await`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: Mutex<BTreeMap<DocumentLink, StoredDocument>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<DocumentLink, StoredDocument>> {
        self.docs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn check_version(doc: &StoredDocument, expected: Option<u64>) -> StoreResult<()> {
    match expected {
        Some(expected) if expected != doc.version => Err(StoreError::VersionConflict {
            link: doc.link.clone(),
            expected,
            actual: doc.version,
        }),
        _ => Ok(()),
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, link: &DocumentLink) -> StoreResult<StoredDocument> {
        self.lock()
            .get(link)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(link.clone()))
    }

    async fn create(&self, link: DocumentLink, body: Value) -> StoreResult<StoredDocument> {
        let mut docs = self.lock();
        if docs.contains_key(&link) {
            return Err(StoreError::AlreadyExists(link));
        }
        let doc = StoredDocument {
            link: link.clone(),
            version: 1,
            body,
        };
        docs.insert(link, doc.clone());
        trace!(link = %doc.link, "document created");
        Ok(doc)
    }

    async fn patch(
        &self,
        link: &DocumentLink,
        patch: Value,
        expected_version: Option<u64>,
    ) -> StoreResult<StoredDocument> {
        let Value::Object(fields) = patch else {
            return Err(StoreError::InvalidPatch {
                link: link.clone(),
                reason: "patch body must be an object".to_string(),
            });
        };

        let mut docs = self.lock();
        let doc = docs
            .get_mut(link)
            .ok_or_else(|| StoreError::NotFound(link.clone()))?;
        check_version(doc, expected_version)?;

        let Value::Object(body) = &mut doc.body else {
            return Err(StoreError::InvalidPatch {
                link: link.clone(),
                reason: "stored document is not an object".to_string(),
            });
        };
        body.extend(fields);
        doc.version += 1;

        trace!(link = %doc.link, version = doc.version, "document patched");
        Ok(doc.clone())
    }

    async fn delete(&self, link: &DocumentLink, expected_version: Option<u64>) -> StoreResult<()> {
        let mut docs = self.lock();
        let doc = docs
            .get(link)
            .ok_or_else(|| StoreError::NotFound(link.clone()))?;
        check_version(doc, expected_version)?;
        docs.remove(link);
        Ok(())
    }

    async fn query(&self, query: &Query) -> StoreResult<Vec<StoredDocument>> {
        Ok(self
            .lock()
            .values()
            .filter(|doc| query.matches(doc))
            .cloned()
            .collect())
    }
}
