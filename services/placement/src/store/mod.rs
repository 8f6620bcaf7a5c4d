//! Document store abstraction.
//!
//! The engine keeps no state of its own: every tag, pool, placement and
//! compute lives in a [`DocumentStore`] as a versioned JSON document. Writers
//! that care about lost updates pass the version they read to
//! [`DocumentStore::patch`]; a stale version fails with
//! [`StoreError::VersionConflict`].
//!
//! [`DocumentStoreExt`] layers typed access on top of the JSON interface.

mod error;
mod memory;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;

use async_trait::async_trait;
use berth_id::DocumentLink;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

/// A raw document as held by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub link: DocumentLink,
    /// Starts at 1, incremented by every accepted patch.
    pub version: u64,
    pub body: Value,
}

/// A single query predicate over top-level fields of a document body.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    /// `body[field] == value`.
    FieldEquals { field: String, value: Value },
    /// `body[field]` is an array holding `value`.
    CollectionContains { field: String, value: Value },
}

impl Clause {
    pub fn matches(&self, body: &Value) -> bool {
        match self {
            Self::FieldEquals { field, value } => body.get(field) == Some(value),
            Self::CollectionContains { field, value } => body
                .get(field)
                .and_then(Value::as_array)
                .is_some_and(|items| items.contains(value)),
        }
    }
}

/// Documents of one collection matching every clause.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub clauses: Vec<Clause>,
}

impl Query {
    pub fn collection(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            clauses: Vec::new(),
        }
    }

    pub fn field_equals(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.push(Clause::FieldEquals {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn contains(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.push(Clause::CollectionContains {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn matches(&self, doc: &StoredDocument) -> bool {
        doc.link.collection() == self.collection
            && self.clauses.iter().all(|c| c.matches(&doc.body))
    }
}

/// Versioned, link-addressed document storage.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, link: &DocumentLink) -> StoreResult<StoredDocument>;

    /// Create a document at `link` with version 1.
    async fn create(&self, link: DocumentLink, body: Value) -> StoreResult<StoredDocument>;

    /// Overlay the top-level keys of `patch` onto the document.
    ///
    /// With `expected_version` set the patch only applies if the stored
    /// version still matches.
    async fn patch(
        &self,
        link: &DocumentLink,
        patch: Value,
        expected_version: Option<u64>,
    ) -> StoreResult<StoredDocument>;

    async fn delete(&self, link: &DocumentLink, expected_version: Option<u64>) -> StoreResult<()>;

    /// Matching documents, ordered by link.
    async fn query(&self, query: &Query) -> StoreResult<Vec<StoredDocument>>;
}

/// A typed document kind.
pub trait Document: Serialize + DeserializeOwned + Send + Sync + 'static {
    const COLLECTION: &'static str;

    /// Allocate a fresh link in this document's collection.
    fn new_link() -> DocumentLink;
}

/// A typed document with its link and version.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<D> {
    pub link: DocumentLink,
    pub version: u64,
    pub doc: D,
}

impl<D: Document> Versioned<D> {
    pub fn from_stored(stored: StoredDocument) -> StoreResult<Self> {
        Ok(Self {
            link: stored.link,
            version: stored.version,
            doc: serde_json::from_value(stored.body)?,
        })
    }
}

/// Typed helpers over any [`DocumentStore`].
#[async_trait]
pub trait DocumentStoreExt: DocumentStore {
    async fn load<D: Document>(&self, link: &DocumentLink) -> StoreResult<Versioned<D>> {
        Versioned::from_stored(self.get(link).await?)
    }

    /// Store `doc` under a freshly allocated link.
    async fn insert<D: Document>(&self, doc: &D) -> StoreResult<Versioned<D>> {
        self.insert_at(D::new_link(), doc).await
    }

    async fn insert_at<D: Document>(
        &self,
        link: DocumentLink,
        doc: &D,
    ) -> StoreResult<Versioned<D>> {
        let body = serde_json::to_value(doc)?;
        Versioned::from_stored(self.create(link, body).await?)
    }

    async fn find<D: Document>(&self, query: Query) -> StoreResult<Vec<Versioned<D>>> {
        self.query(&query)
            .await?
            .into_iter()
            .map(Versioned::from_stored)
            .collect()
    }

    async fn find_all<D: Document>(&self) -> StoreResult<Vec<Versioned<D>>> {
        self.find(Query::collection(D::COLLECTION)).await
    }

    async fn patch_doc<D: Document>(
        &self,
        link: &DocumentLink,
        patch: Value,
        expected_version: Option<u64>,
    ) -> StoreResult<Versioned<D>> {
        Versioned::from_stored(self.patch(link, patch, expected_version).await?)
    }
}

impl<S: DocumentStore + ?Sized> DocumentStoreExt for S {}
