//! Startup seeding.
//!
//! The engine keeps its documents in memory, so the binary loads an initial
//! document set from a JSON file:
//!
//! ```json
//! {
//!   "tags": [{ "link": "/resources/tags/ssd", "key": "disk", "value": "ssd" }],
//!   "pools": [{ "link": "/resources/pools/fast", "name": "fast",
//!               "tag_links": ["/resources/tags/ssd"] }],
//!   "placements": [{ "name": "team-a", "tenant_links": ["/tenants/a"],
//!                    "resource_pool_link": "/resources/pools/fast",
//!                    "max_number_instances": 10 }]
//! }
//! ```
//!
//! Every entry may carry an explicit `link` so later entries can refer to it;
//! entries without one get a fresh link. Placements go through the same
//! validation as [`PlacementSelector::create_placement`].

use std::path::{Path, PathBuf};

use berth_id::DocumentLink;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, instrument};

use crate::model::{
    Compute, ComputeDescription, DiskDescription, ElasticPlacementZone, GroupPlacement,
    NetworkDescription, ResourcePool, Tag,
};
use crate::placement::{PlacementError, PlacementSelector};
use crate::store::{Document, DocumentStore, DocumentStoreExt, StoreError, Versioned};

/// Name of the pool backing the default global placement.
pub const DEFAULT_POOL_NAME: &str = "default-pool";

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("failed to read seed file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid seed document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("link {link} does not belong to collection {expected}")]
    WrongCollection {
        link: DocumentLink,
        expected: &'static str,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Placement(#[from] PlacementError),
}

/// One seeded document with an optional fixed link.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedEntry<D> {
    #[serde(default)]
    pub link: Option<DocumentLink>,
    #[serde(flatten)]
    pub doc: D,
}

impl<D: Document> SeedEntry<D> {
    fn resolve_link(&self) -> Result<DocumentLink, SeedError> {
        match &self.link {
            Some(link) if link.collection() != D::COLLECTION => Err(SeedError::WrongCollection {
                link: link.clone(),
                expected: D::COLLECTION,
            }),
            Some(link) => Ok(link.clone()),
            None => Ok(D::new_link()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Seed {
    pub tags: Vec<SeedEntry<Tag>>,
    pub pools: Vec<SeedEntry<ResourcePool>>,
    pub disk_descriptions: Vec<SeedEntry<DiskDescription>>,
    pub network_descriptions: Vec<SeedEntry<NetworkDescription>>,
    pub descriptions: Vec<SeedEntry<ComputeDescription>>,
    pub placements: Vec<SeedEntry<GroupPlacement>>,
    pub zones: Vec<SeedEntry<ElasticPlacementZone>>,
    pub computes: Vec<SeedEntry<Compute>>,
}

/// Counts of what a seed created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub documents: usize,
    pub placements: usize,
}

impl Seed {
    pub fn from_json(json: &str) -> Result<Self, SeedError> {
        Ok(serde_json::from_str(json)?)
    }

    pub async fn from_file(path: &Path) -> Result<Self, SeedError> {
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| SeedError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_json(&json)
    }

    /// Store every document, dependencies first.
    #[instrument(skip_all)]
    pub async fn apply(self, selector: &PlacementSelector) -> Result<SeedReport, SeedError> {
        let store = selector.store().as_ref();
        let mut report = SeedReport::default();

        report.documents += put_all(store, self.tags).await?;
        report.documents += put_all(store, self.pools).await?;
        report.documents += put_all(store, self.disk_descriptions).await?;
        report.documents += put_all(store, self.network_descriptions).await?;
        report.documents += put_all(store, self.descriptions).await?;

        for entry in self.placements {
            let link = entry.resolve_link()?;
            selector.create_placement_at(link, entry.doc).await?;
            report.placements += 1;
        }

        report.documents += put_all(store, self.zones).await?;
        report.documents += put_all(store, self.computes).await?;

        info!(
            documents = report.documents,
            placements = report.placements,
            "Seed applied"
        );
        Ok(report)
    }
}

async fn put_all<D: Document>(
    store: &dyn DocumentStore,
    entries: Vec<SeedEntry<D>>,
) -> Result<usize, SeedError> {
    let count = entries.len();
    for entry in entries {
        let link = entry.resolve_link()?;
        store.insert_at(link, &entry.doc).await?;
    }
    Ok(count)
}

/// Make sure a global fallback placement exists.
///
/// Returns the existing global placement when there already is one,
/// otherwise creates [`DEFAULT_POOL_NAME`] and the default placement on it.
#[instrument(skip_all)]
pub async fn ensure_default_placement(
    selector: &PlacementSelector,
) -> Result<Versioned<GroupPlacement>, SeedError> {
    let existing = selector.store().find_all::<GroupPlacement>().await?;
    if let Some(global) = existing.into_iter().find(|p| p.doc.is_global()) {
        return Ok(global);
    }

    let pool = selector
        .store()
        .insert(&ResourcePool::new(DEFAULT_POOL_NAME))
        .await?;
    let placement = selector
        .create_placement(GroupPlacement::default_global(pool.link))
        .await?;
    info!(link = %placement.link, "Default placement created");
    Ok(placement)
}
