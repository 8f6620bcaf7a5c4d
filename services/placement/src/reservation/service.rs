//! Reservation dispatcher.
//!
//! Requests are validated synchronously, queued on a bounded channel and
//! picked up by a single dispatcher loop that spawns one tokio task per
//! reservation. Callers get a [`ReservationHandle`] resolving to the same
//! payload the [`TaskCallback`] receives.

use std::sync::Arc;

use berth_id::ReservationId;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, instrument};

use super::{
    validate_request, ReservationError, ReservationRequest, ReservationResult, ReservationTask,
    TaskCallback, TaskResultPayload,
};
use crate::placement::PlacementSelector;

struct Envelope {
    task: ReservationTask,
    reply: oneshot::Sender<TaskResultPayload>,
}

/// Pending result of a submitted reservation.
#[derive(Debug)]
pub struct ReservationHandle {
    id: ReservationId,
    rx: oneshot::Receiver<TaskResultPayload>,
}

impl ReservationHandle {
    pub fn id(&self) -> ReservationId {
        self.id
    }

    /// Wait for the terminal payload.
    pub async fn payload(self) -> Result<TaskResultPayload, ReservationError> {
        self.rx.await.map_err(|_| ReservationError::ServiceStopped)
    }

    /// Wait for the task and unwrap its outcome.
    pub async fn outcome(self) -> Result<ReservationResult, ReservationError> {
        self.payload().await?.into_result()
    }
}

/// Entry point for reservations.
#[derive(Clone)]
pub struct ReservationService {
    tx: mpsc::Sender<Envelope>,
}

impl ReservationService {
    /// Start the dispatcher. It stops once `shutdown` flips to `true` or
    /// every service clone is dropped, after finishing queued and in-flight
    /// tasks.
    pub fn spawn(
        selector: Arc<PlacementSelector>,
        callback: Arc<dyn TaskCallback>,
        queue_depth: usize,
        shutdown: watch::Receiver<bool>,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(queue_depth.max(1));
        let dispatcher = Dispatcher {
            rx,
            selector,
            callback,
            in_flight: JoinSet::new(),
        };
        let handle = tokio::spawn(dispatcher.run(shutdown));
        (Self { tx }, handle)
    }

    /// Validate and queue a reservation.
    pub async fn submit(
        &self,
        request: ReservationRequest,
    ) -> Result<ReservationHandle, ReservationError> {
        validate_request(&request)?;

        let task = ReservationTask::new(request);
        let id = task.id();
        let (reply, rx) = oneshot::channel();

        self.tx
            .send(Envelope { task, reply })
            .await
            .map_err(|_| ReservationError::ServiceStopped)?;

        debug!(reservation_id = %id, "Reservation queued");
        Ok(ReservationHandle { id, rx })
    }

    /// Submit and wait for the outcome.
    pub async fn reserve(
        &self,
        request: ReservationRequest,
    ) -> Result<ReservationResult, ReservationError> {
        self.submit(request).await?.outcome().await
    }
}

struct Dispatcher {
    rx: mpsc::Receiver<Envelope>,
    selector: Arc<PlacementSelector>,
    callback: Arc<dyn TaskCallback>,
    in_flight: JoinSet<()>,
}

impl Dispatcher {
    #[instrument(skip_all)]
    async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("Starting reservation dispatcher");

        loop {
            tokio::select! {
                envelope = self.rx.recv() => match envelope {
                    Some(envelope) => self.dispatch(envelope),
                    None => break,
                },
                Some(joined) = self.in_flight.join_next(), if !self.in_flight.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "Reservation task panicked");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Reservation dispatcher shutting down");
                        break;
                    }
                }
            }
        }

        // Queued tasks still get run: none may end without a callback.
        self.rx.close();
        while let Some(envelope) = self.rx.recv().await {
            self.dispatch(envelope);
        }
        while let Some(joined) = self.in_flight.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Reservation task panicked");
            }
        }

        info!("Reservation dispatcher stopped");
    }

    fn dispatch(&mut self, envelope: Envelope) {
        let selector = Arc::clone(&self.selector);
        let callback = Arc::clone(&self.callback);

        self.in_flight.spawn(async move {
            let Envelope { mut task, reply } = envelope;
            let id = task.id();

            // A panic inside selection still ends in a failed payload.
            let run = tokio::spawn(async move { task.run(&selector).await });
            let payload = match run.await {
                Ok(Ok(payload)) => payload,
                Ok(Err(e)) => {
                    error!(reservation_id = %id, error = %e, "Reservation state machine error");
                    TaskResultPayload::internal_failure(id, e.to_string())
                }
                Err(e) => {
                    error!(reservation_id = %id, error = %e, "Reservation task aborted");
                    TaskResultPayload::internal_failure(id, format!("reservation task aborted: {e}"))
                }
            };

            callback.on_complete(payload.clone()).await;
            // The caller may have dropped its handle; the callback still ran.
            let _ = reply.send(payload);
        });
    }
}
