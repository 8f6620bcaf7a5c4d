//! Shared fixtures for the placement engine integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use berth_id::DocumentLink;
use berth_placement::model::{
    ensure_tag, ComputeDescription, ElasticPlacementZone, GroupPlacement, ResourcePool, Tag,
};
use berth_placement::placement::{PlacementRequest, PlacementSelector};
use berth_placement::store::{
    DocumentStore, DocumentStoreExt, MemoryStore, Query, StoreError, StoreResult, StoredDocument,
};
use serde_json::Value;

pub const TENANT: &str = "/tenants/acme";

/// Store, selector and document builders over an in-memory store.
pub struct Fixture {
    pub store: Arc<dyn DocumentStore>,
    pub selector: Arc<PlacementSelector>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    pub fn with_store(store: Arc<dyn DocumentStore>) -> Self {
        let selector = Arc::new(PlacementSelector::new(Arc::clone(&store)));
        Self { store, selector }
    }

    pub async fn tag(&self, key: &str, value: &str) -> DocumentLink {
        ensure_tag(self.store.as_ref(), &Tag::new(key, value))
            .await
            .unwrap()
    }

    pub async fn pool(&self, name: &str, tags: &[DocumentLink]) -> DocumentLink {
        let pool = ResourcePool::new(name).with_tags(tags.iter().cloned());
        self.store.insert(&pool).await.unwrap().link
    }

    /// A tenant scoped placement on a fresh untagged pool.
    pub async fn placement(&self, name: &str, priority: i32, max: u64) -> DocumentLink {
        let pool = self.pool(&format!("{name}-pool"), &[]).await;
        self.placement_on(pool, name, priority, max).await
    }

    pub async fn placement_on(
        &self,
        pool: DocumentLink,
        name: &str,
        priority: i32,
        max: u64,
    ) -> DocumentLink {
        let placement = GroupPlacement::new(name, pool)
            .with_tenants(vec![TENANT.to_string()])
            .with_priority(priority)
            .with_max_instances(max);
        self.selector.create_placement(placement).await.unwrap().link
    }

    pub async fn description(&self, description: ComputeDescription) -> DocumentLink {
        self.store.insert(&description).await.unwrap().link
    }

    pub async fn zone(&self, pool: &DocumentLink, tags: &[DocumentLink]) -> DocumentLink {
        let zone = ElasticPlacementZone::new(pool.clone(), tags.iter().cloned());
        self.store.insert(&zone).await.unwrap().link
    }

    pub async fn load_placement(&self, link: &DocumentLink) -> GroupPlacement {
        self.store.load::<GroupPlacement>(link).await.unwrap().doc
    }
}

pub fn request(description: &DocumentLink, count: u64) -> PlacementRequest {
    PlacementRequest {
        resource_description_link: description.clone(),
        tenant_links: vec![TENANT.to_string()],
        resource_count: count,
        custom_properties: BTreeMap::new(),
        approved_placement_links: Vec::new(),
    }
}

/// Memory store whose patches report a version conflict while
/// `conflicts` is non-zero.
pub struct ConflictingStore {
    inner: MemoryStore,
    conflicts: AtomicU32,
}

impl ConflictingStore {
    pub fn new(conflicts: u32) -> Self {
        Self {
            inner: MemoryStore::new(),
            conflicts: AtomicU32::new(conflicts),
        }
    }

    /// Start failing the next `conflicts` patches.
    pub fn fail_next(&self, conflicts: u32) {
        self.conflicts.store(conflicts, Ordering::SeqCst);
    }
}

#[async_trait]
impl DocumentStore for ConflictingStore {
    async fn get(&self, link: &DocumentLink) -> StoreResult<StoredDocument> {
        self.inner.get(link).await
    }

    async fn create(&self, link: DocumentLink, body: Value) -> StoreResult<StoredDocument> {
        self.inner.create(link, body).await
    }

    async fn patch(
        &self,
        link: &DocumentLink,
        patch: Value,
        expected_version: Option<u64>,
    ) -> StoreResult<StoredDocument> {
        let remaining = self
            .conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if remaining.is_ok() {
            let expected = expected_version.unwrap_or(0);
            return Err(StoreError::VersionConflict {
                link: link.clone(),
                expected,
                actual: expected + 1,
            });
        }
        self.inner.patch(link, patch, expected_version).await
    }

    async fn delete(&self, link: &DocumentLink, expected_version: Option<u64>) -> StoreResult<()> {
        self.inner.delete(link, expected_version).await
    }

    async fn query(&self, query: &Query) -> StoreResult<Vec<StoredDocument>> {
        self.inner.query(query).await
    }
}

/// Memory store whose patches panic once armed.
#[derive(Default)]
pub struct PanickingStore {
    inner: MemoryStore,
    armed: AtomicBool,
}

impl PanickingStore {
    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl DocumentStore for PanickingStore {
    async fn get(&self, link: &DocumentLink) -> StoreResult<StoredDocument> {
        self.inner.get(link).await
    }

    async fn create(&self, link: DocumentLink, body: Value) -> StoreResult<StoredDocument> {
        self.inner.create(link, body).await
    }

    async fn patch(
        &self,
        link: &DocumentLink,
        patch: Value,
        expected_version: Option<u64>,
    ) -> StoreResult<StoredDocument> {
        if self.armed.load(Ordering::SeqCst) {
            panic!("patch of {link} while armed");
        }
        self.inner.patch(link, patch, expected_version).await
    }

    async fn delete(&self, link: &DocumentLink, expected_version: Option<u64>) -> StoreResult<()> {
        self.inner.delete(link, expected_version).await
    }

    async fn query(&self, query: &Query) -> StoreResult<Vec<StoredDocument>> {
        self.inner.query(query).await
    }
}
