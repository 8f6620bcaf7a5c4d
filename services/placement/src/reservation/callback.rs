//! Task completion callbacks.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::{TaskOutcome, TaskResultPayload};

/// Receives the terminal payload of every reservation task, exactly once.
#[async_trait]
pub trait TaskCallback: Send + Sync {
    async fn on_complete(&self, payload: TaskResultPayload);
}

/// Logs every completion.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogCallback;

#[async_trait]
impl TaskCallback for LogCallback {
    async fn on_complete(&self, payload: TaskResultPayload) {
        match &payload.outcome {
            TaskOutcome::Success { result } => info!(
                reservation_id = %payload.reservation_id,
                placement = %result.placement_link,
                count = result.resource_count,
                "Reservation task completed"
            ),
            TaskOutcome::Failure { error } => warn!(
                reservation_id = %payload.reservation_id,
                kind = ?error.kind,
                message = %error.message,
                "Reservation task failed"
            ),
        }
    }
}

/// Forwards payloads into a channel.
#[derive(Debug, Clone)]
pub struct ChannelCallback {
    tx: mpsc::UnboundedSender<TaskResultPayload>,
}

impl ChannelCallback {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TaskResultPayload>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl TaskCallback for ChannelCallback {
    async fn on_complete(&self, payload: TaskResultPayload) {
        if self.tx.send(payload).is_err() {
            warn!("Task callback receiver dropped");
        }
    }
}
