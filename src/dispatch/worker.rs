//! The delivery worker loop.

use std::sync::Arc;
use std::time::Duration;

use crate::dispatch::queue::BoundedQueue;
use crate::dispatch::send::{SendOperation, SendOutcome};
use crate::dispatch::task::MailTask;

/// What one worker did before it exited.
#[derive(Debug, Default)]
pub(crate) struct WorkerStats {
    pub delivered: u64,
    pub failed_attempts: u64,
    /// Tasks whose last attempt failed after the queue closed.
    pub undelivered: Vec<MailTask>,
}

/// Dequeue, send, settle; until the queue is closed and exhausted.
///
/// Failed tasks go back to the tail of the queue. Once the queue is closed a
/// failed task can no longer be requeued and is returned in the stats instead.
pub(crate) async fn run(
    id: usize,
    queue: Arc<BoundedQueue<MailTask>>,
    operation: SendOperation,
    retry_delay: Duration,
) -> WorkerStats {
    tracing::debug!(worker = id, "Worker started");
    let mut stats = WorkerStats::default();

    while let Some(lease) = queue.dequeue().await {
        match operation.send(lease.item()).await {
            SendOutcome::Delivered(_) => {
                stats.delivered += 1;
                lease.ack();
            }
            SendOutcome::Failed(failure) => {
                stats.failed_attempts += 1;
                tracing::warn!(
                    worker = id,
                    recipient = %lease.item().recipient().email,
                    kind = failure.kind(),
                    error = %failure,
                    "Delivery failed, requeueing"
                );

                if !retry_delay.is_zero() {
                    tokio::time::sleep(retry_delay).await;
                }

                if let Err(rejected) = lease.requeue() {
                    let task = rejected.into_inner();
                    tracing::warn!(
                        worker = id,
                        recipient = %task.recipient().email,
                        "Queue closed, task will not be retried"
                    );
                    stats.undelivered.push(task);
                }
            }
        }
    }

    tracing::debug!(
        worker = id,
        delivered = stats.delivered,
        failed_attempts = stats.failed_attempts,
        "Queue exhausted, worker exiting"
    );
    stats
}
