//! Integration tests for the reservation dispatcher.

mod common;

use std::sync::Arc;
use std::time::Duration;

use berth_constraints::Condition;
use berth_id::DescriptionId;
use berth_placement::model::ComputeDescription;
use berth_placement::reservation::{
    ChannelCallback, FailureKind, ReservationError, ReservationService, TaskOutcome, TaskStage,
};
use common::{request, Fixture, PanickingStore};
use tokio::sync::watch;

fn spawn_service(
    fx: &Fixture,
) -> (
    ReservationService,
    tokio::sync::mpsc::UnboundedReceiver<berth_placement::reservation::TaskResultPayload>,
    watch::Sender<bool>,
    tokio::task::JoinHandle<()>,
) {
    let (callback, payloads) = ChannelCallback::new();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (service, handle) =
        ReservationService::spawn(Arc::clone(&fx.selector), Arc::new(callback), 8, shutdown_rx);
    (service, payloads, shutdown_tx, handle)
}

#[tokio::test]
async fn test_successful_reservation_notifies_once() {
    let fx = Fixture::new();
    let placement = fx.placement("p1", 1, 10).await;
    let desc = fx.description(ComputeDescription::new("web")).await;
    let (service, mut payloads, _shutdown, _handle) = spawn_service(&fx);

    let handle = service.submit(request(&desc, 5)).await.unwrap();
    let id = handle.id();
    let payload = handle.payload().await.unwrap();

    assert_eq!(payload.reservation_id, id);
    assert_eq!(payload.stage, TaskStage::Complete);
    match &payload.outcome {
        TaskOutcome::Success { result } => {
            assert_eq!(result.placement_link, placement);
            assert_eq!(result.resource_count, 5);
        }
        other => panic!("expected success, got {other:?}"),
    }

    let notified = payloads.recv().await.unwrap();
    assert_eq!(notified, payload);
    assert!(payloads.try_recv().is_err());
    assert_eq!(fx.load_placement(&placement).await.allocated_instances_count, 5);
}

#[tokio::test]
async fn test_unsatisfiable_reservation_fails_with_kind() {
    let fx = Fixture::new();
    let placement = fx.placement("plain", 1, 10).await;
    let desc = fx
        .description(ComputeDescription::new("web").with_placement(vec![Condition::require("cap", "pci")]))
        .await;
    let (service, mut payloads, _shutdown, _handle) = spawn_service(&fx);

    let err = service.reserve(request(&desc, 1)).await.unwrap_err();

    match err {
        ReservationError::Failed(failure) => {
            assert_eq!(failure.kind, FailureKind::Unsatisfiable);
            assert!(failure.message.contains("properly tagged"));
        }
        other => panic!("expected a failed task, got {other:?}"),
    }
    let notified = payloads.recv().await.unwrap();
    assert_eq!(notified.stage, TaskStage::Failed);
    assert!(!notified.is_success());
    assert_eq!(fx.load_placement(&placement).await.allocated_instances_count, 0);
}

#[tokio::test]
async fn test_no_capacity_and_missing_description_kinds() {
    let fx = Fixture::new();
    fx.placement("tiny", 1, 1).await;
    let desc = fx.description(ComputeDescription::new("web")).await;
    let (service, _payloads, _shutdown, _handle) = spawn_service(&fx);

    let no_capacity = service.reserve(request(&desc, 2)).await.unwrap_err();
    assert!(matches!(
        no_capacity,
        ReservationError::Failed(ref f) if f.kind == FailureKind::NoCapacity
    ));

    let missing = service
        .reserve(request(&DescriptionId::new().link(), 1))
        .await
        .unwrap_err();
    assert!(matches!(
        missing,
        ReservationError::Failed(ref f) if f.kind == FailureKind::MissingPrerequisite
    ));
}

#[tokio::test]
async fn test_invalid_request_is_rejected_before_queueing() {
    let fx = Fixture::new();
    fx.placement("p1", 1, 10).await;
    let desc = fx.description(ComputeDescription::new("web")).await;
    let (service, mut payloads, _shutdown, _handle) = spawn_service(&fx);

    let zero = service.submit(request(&desc, 0)).await.unwrap_err();
    assert!(matches!(zero, ReservationError::InvalidPayload(_)));

    let not_a_description = service
        .submit(request(&fx.pool("rp", &[]).await, 1))
        .await
        .unwrap_err();
    assert!(matches!(not_a_description, ReservationError::InvalidPayload(_)));

    // No task ran, so nothing was reported.
    assert!(payloads.try_recv().is_err());
}

#[tokio::test]
async fn test_panicking_task_still_reports_failure() {
    let store = Arc::new(PanickingStore::default());
    let fx = Fixture::with_store(store.clone());
    let placement = fx.placement("p1", 1, 10).await;
    let desc = fx.description(ComputeDescription::new("web")).await;
    let (service, mut payloads, _shutdown, _handle) = spawn_service(&fx);

    store.arm();
    let err = service.reserve(request(&desc, 1)).await.unwrap_err();

    match err {
        ReservationError::Failed(failure) => assert_eq!(failure.kind, FailureKind::Internal),
        other => panic!("expected an internal failure, got {other:?}"),
    }
    let notified = payloads.recv().await.unwrap();
    assert_eq!(notified.stage, TaskStage::Failed);
    assert!(payloads.try_recv().is_err());
    assert_eq!(fx.load_placement(&placement).await.allocated_instances_count, 0);
}

#[tokio::test]
async fn test_overflowing_reservation_fails_without_stopping_service() {
    let fx = Fixture::new();
    fx.placement("unlimited", 1, 0).await;
    let desc = fx.description(ComputeDescription::new("web")).await;
    let (service, mut payloads, _shutdown, _handle) = spawn_service(&fx);

    service.reserve(request(&desc, u64::MAX)).await.unwrap();
    let err = service.reserve(request(&desc, 1)).await.unwrap_err();

    assert!(matches!(
        err,
        ReservationError::Failed(ref f) if f.kind == FailureKind::NoCapacity
    ));
    assert!(payloads.recv().await.unwrap().is_success());
    assert!(!payloads.recv().await.unwrap().is_success());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reservations_respect_capacity() {
    let fx = Fixture::new();
    let capped = fx.placement("capped", 1, 10).await;
    let desc = fx.description(ComputeDescription::new("web")).await;
    let (service, mut payloads, _shutdown, _handle) = spawn_service(&fx);

    let mut handles = Vec::new();
    for _ in 0..15 {
        handles.push(service.submit(request(&desc, 1)).await.unwrap());
    }

    let mut granted = 0;
    for handle in handles {
        match handle.outcome().await {
            Ok(_) => granted += 1,
            Err(ReservationError::Failed(f)) => assert!(
                matches!(f.kind, FailureKind::NoCapacity | FailureKind::Transient),
                "{f:?}"
            ),
            Err(e) => panic!("unexpected error {e:?}"),
        }
    }

    let placement = fx.load_placement(&capped).await;
    assert!(granted <= 10);
    assert_eq!(placement.allocated_instances_count, granted);

    let mut notified = 0;
    while payloads.try_recv().is_ok() {
        notified += 1;
    }
    assert_eq!(notified, 15);
}

#[tokio::test]
async fn test_shutdown_finishes_queued_work() {
    let fx = Fixture::new();
    fx.placement("p1", 1, 0).await;
    let desc = fx.description(ComputeDescription::new("web")).await;
    let (service, _payloads, shutdown, dispatcher) = spawn_service(&fx);

    let handles: Vec<_> = submit_many(&service, &desc, 4).await;
    shutdown.send(true).unwrap();

    for handle in handles {
        assert!(handle.outcome().await.is_ok());
    }
    tokio::time::timeout(Duration::from_secs(5), dispatcher)
        .await
        .expect("dispatcher did not stop")
        .unwrap();

    assert!(matches!(
        service.submit(request(&desc, 1)).await,
        Err(ReservationError::ServiceStopped)
    ));
}

async fn submit_many(
    service: &ReservationService,
    desc: &berth_id::DocumentLink,
    count: usize,
) -> Vec<berth_placement::reservation::ReservationHandle> {
    let mut handles = Vec::with_capacity(count);
    for _ in 0..count {
        handles.push(service.submit(request(desc, 1)).await.unwrap());
    }
    handles
}
