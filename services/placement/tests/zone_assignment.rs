//! Integration tests for elastic zone assignment.

mod common;

use std::sync::Arc;
use std::time::Duration;

use berth_id::DocumentLink;
use berth_placement::model::Compute;
use berth_placement::store::{DocumentStoreExt, Versioned};
use berth_placement::zones::{ZoneAssignmentReconciler, ZoneAssignmentWorker};
use common::{ConflictingStore, Fixture};
use tokio::sync::watch;

async fn compute(fx: &Fixture, name: &str, tags: &[DocumentLink]) -> DocumentLink {
    fx.store
        .insert(&Compute::new(name).with_tags(tags.iter().cloned()))
        .await
        .unwrap()
        .link
}

async fn load(fx: &Fixture, link: &DocumentLink) -> Versioned<Compute> {
    fx.store.load::<Compute>(link).await.unwrap()
}

#[tokio::test]
async fn test_conflicting_zones_leave_pool_untouched() {
    let fx = Fixture::new();
    let t1 = fx.tag("t", "1").await;
    let t2 = fx.tag("t", "2").await;
    let t3 = fx.tag("t", "3").await;
    let t4 = fx.tag("t", "4").await;
    let rp1 = fx.pool("rp1", &[]).await;
    let rp2 = fx.pool("rp2", &[]).await;
    fx.zone(&rp1, &[t1.clone()]).await;
    fx.zone(&rp2, &[t2.clone()]).await;
    fx.zone(&rp2, &[t3.clone(), t4.clone()]).await;

    let both = compute(&fx, "both", &[t1, t2]).await;
    let exact = compute(&fx, "exact", &[t3, t4]).await;

    let reconciler = ZoneAssignmentReconciler::new(Arc::clone(&fx.store));
    let stats = reconciler.reconcile().await.unwrap();

    assert_eq!(stats.zones, 3);
    assert_eq!(stats.conflicts, 1);
    assert_eq!(stats.assigned, 1);
    assert!(stats.failures.is_empty());
    assert_eq!(load(&fx, &both).await.doc.resource_pool_link, None);
    assert_eq!(load(&fx, &exact).await.doc.resource_pool_link, Some(rp2));
}

#[tokio::test]
async fn test_conflict_keeps_existing_pool() {
    let fx = Fixture::new();
    let t1 = fx.tag("t", "1").await;
    let t2 = fx.tag("t", "2").await;
    let rp1 = fx.pool("rp1", &[]).await;
    let rp2 = fx.pool("rp2", &[]).await;
    let rp0 = fx.pool("rp0", &[]).await;
    fx.zone(&rp1, &[t1.clone()]).await;
    fx.zone(&rp2, &[t2.clone()]).await;

    let link = fx
        .store
        .insert(&Compute::new("pinned").with_tags([t1, t2]).in_pool(rp0.clone()))
        .await
        .unwrap()
        .link;

    ZoneAssignmentReconciler::new(Arc::clone(&fx.store))
        .reconcile()
        .await
        .unwrap();

    assert_eq!(load(&fx, &link).await.doc.resource_pool_link, Some(rp0));
}

#[tokio::test]
async fn test_reconcile_is_idempotent() {
    let fx = Fixture::new();
    let t1 = fx.tag("t", "1").await;
    let rp1 = fx.pool("rp1", &[]).await;
    fx.zone(&rp1, &[t1.clone()]).await;
    let link = compute(&fx, "c", &[t1]).await;

    let reconciler = ZoneAssignmentReconciler::new(Arc::clone(&fx.store));
    let first = reconciler.reconcile().await.unwrap();
    let after_first = load(&fx, &link).await;
    let second = reconciler.reconcile().await.unwrap();
    let after_second = load(&fx, &link).await;

    assert_eq!(first.assigned, 1);
    assert_eq!(second.assigned, 0);
    assert_eq!(second.unchanged, 1);
    assert_eq!(after_first, after_second);
    assert_eq!(after_second.doc.resource_pool_link, Some(rp1));
}

#[tokio::test]
async fn test_unmatched_compute_is_not_touched() {
    let fx = Fixture::new();
    let t1 = fx.tag("t", "1").await;
    let t2 = fx.tag("t", "2").await;
    let rp1 = fx.pool("rp1", &[]).await;
    let rp0 = fx.pool("rp0", &[]).await;
    // Needs both tags; the compute only has one.
    fx.zone(&rp1, &[t1.clone(), t2]).await;
    let link = fx
        .store
        .insert(&Compute::new("partial").with_tags([t1]).in_pool(rp0.clone()))
        .await
        .unwrap()
        .link;

    let stats = ZoneAssignmentReconciler::new(Arc::clone(&fx.store))
        .reconcile()
        .await
        .unwrap();

    assert_eq!(stats.computes_matched, 0);
    let after = load(&fx, &link).await;
    assert_eq!(after.version, 1);
    assert_eq!(after.doc.resource_pool_link, Some(rp0));
}

#[tokio::test]
async fn test_zones_of_the_same_pool_do_not_conflict() {
    let fx = Fixture::new();
    let t1 = fx.tag("t", "1").await;
    let t2 = fx.tag("t", "2").await;
    let rp1 = fx.pool("rp1", &[]).await;
    fx.zone(&rp1, &[t1.clone()]).await;
    fx.zone(&rp1, &[t2.clone()]).await;
    let link = compute(&fx, "c", &[t1, t2]).await;

    let stats = ZoneAssignmentReconciler::new(Arc::clone(&fx.store))
        .reconcile()
        .await
        .unwrap();

    assert_eq!(stats.conflicts, 0);
    assert_eq!(stats.assigned, 1);
    assert_eq!(load(&fx, &link).await.doc.resource_pool_link, Some(rp1));
}

#[tokio::test]
async fn test_zone_without_tags_is_skipped() {
    let fx = Fixture::new();
    let rp1 = fx.pool("rp1", &[]).await;
    fx.zone(&rp1, &[]).await;
    let link = compute(&fx, "untagged", &[]).await;

    let stats = ZoneAssignmentReconciler::new(Arc::clone(&fx.store))
        .reconcile()
        .await
        .unwrap();

    assert_eq!(stats.zones_skipped, 1);
    assert_eq!(stats.computes_matched, 0);
    assert_eq!(load(&fx, &link).await.doc.resource_pool_link, None);
}

#[tokio::test]
async fn test_per_compute_failure_does_not_abort_pass() {
    let store = Arc::new(ConflictingStore::new(0));
    let fx = Fixture::with_store(store.clone());
    let t1 = fx.tag("t", "1").await;
    let rp1 = fx.pool("rp1", &[]).await;
    fx.zone(&rp1, &[t1.clone()]).await;
    let a = compute(&fx, "a", &[t1.clone()]).await;
    let b = compute(&fx, "b", &[t1]).await;

    store.fail_next(1);
    let stats = ZoneAssignmentReconciler::new(Arc::clone(&fx.store))
        .reconcile()
        .await
        .unwrap();

    assert_eq!(stats.assigned, 1);
    assert_eq!(stats.failures.len(), 1);
    let failed = &stats.failures[0].link;
    assert!(failed == &a || failed == &b);
    assert_eq!(load(&fx, failed).await.doc.resource_pool_link, None);

    // The next pass picks up what the failed one left behind.
    let retry = ZoneAssignmentReconciler::new(Arc::clone(&fx.store))
        .reconcile()
        .await
        .unwrap();
    assert_eq!(retry.assigned, 1);
    assert_eq!(retry.unchanged, 1);
}

#[tokio::test]
async fn test_worker_runs_pass_on_trigger() {
    let fx = Fixture::new();
    let t1 = fx.tag("t", "1").await;
    let rp1 = fx.pool("rp1", &[]).await;
    fx.zone(&rp1, &[t1.clone()]).await;
    let link = compute(&fx, "c", &[t1]).await;

    let worker = Arc::new(ZoneAssignmentWorker::new(
        Arc::clone(&fx.store),
        Duration::from_secs(3600),
    ));
    let mut passes = worker.subscribe();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn({
        let worker = Arc::clone(&worker);
        async move { worker.run(shutdown_rx).await }
    });

    worker.trigger().trigger();
    tokio::time::timeout(Duration::from_secs(5), passes.changed())
        .await
        .expect("no pass after trigger")
        .unwrap();

    let stats = passes.borrow_and_update().clone().unwrap();
    assert_eq!(stats.assigned, 1);
    assert_eq!(load(&fx, &link).await.doc.resource_pool_link, Some(rp1));

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("worker did not stop")
        .unwrap();
}
