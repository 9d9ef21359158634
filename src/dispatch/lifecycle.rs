//! Dispatcher lifecycle: start workers, accept tasks, shut down exactly once.

use std::fmt;
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::config::{DispatchConfig, DrainPolicy};
use crate::dispatch::queue::BoundedQueue;
use crate::dispatch::send::SendOperation;
use crate::dispatch::task::MailTask;
use crate::dispatch::worker::{self, WorkerStats};
use crate::error::{MailError, Rejected};
use crate::mailer::Mailer;

/// Where a [`Dispatcher`] is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Queue exists and accepts tasks; no worker is running yet.
    Unstarted,
    /// Workers are delivering.
    Running,
    /// The queue is closed; in-flight attempts are finishing.
    Draining,
    /// Every worker has exited.
    Stopped,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unstarted => "unstarted",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Summary returned by [`Dispatcher::shutdown`].
#[derive(Debug, Default)]
pub struct ShutdownReport {
    /// Messages delivered over the dispatcher's lifetime.
    pub delivered: u64,
    /// Attempts that failed (each one was retried or reported below).
    pub failed_attempts: u64,
    /// Tasks accepted by the queue that were never delivered, oldest first.
    pub undelivered: Vec<MailTask>,
}

impl ShutdownReport {
    fn absorb(&mut self, stats: WorkerStats) {
        self.delivered += stats.delivered;
        self.failed_attempts += stats.failed_attempts;
        self.undelivered.extend(stats.undelivered);
    }
}

/// Producer handle for queueing notifications.
///
/// Cheap to clone; hand one to every request handler that sends mail.
#[derive(Clone)]
pub struct MailSender {
    queue: Arc<BoundedQueue<MailTask>>,
}

impl MailSender {
    /// Queue `task`, waiting for space while the queue is full.
    ///
    /// Fails only once shutdown has begun. The task is handed back so the
    /// caller can log it; the business action that triggered it should not
    /// fail because of it.
    pub async fn enqueue(&self, task: MailTask) -> Result<(), Rejected<MailTask>> {
        let result = self.queue.enqueue(task).await;
        self.record(&result);
        result
    }

    /// Queue `task` without waiting; fails with [`QueueError::Full`](crate::QueueError::Full)
    /// at capacity.
    pub fn try_enqueue(&self, task: MailTask) -> Result<(), Rejected<MailTask>> {
        let result = self.queue.try_enqueue(task);
        self.record(&result);
        result
    }

    /// Tasks waiting for a worker.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// `true` once shutdown has closed the queue.
    pub fn is_closed(&self) -> bool {
        self.queue.is_closed()
    }

    fn record(&self, result: &Result<(), Rejected<MailTask>>) {
        match result {
            Ok(()) => {
                #[cfg(feature = "metrics")]
                {
                    metrics::counter!("courier_enqueued_total").increment(1);
                    metrics::gauge!("courier_queue_depth").set(self.queue.len() as f64);
                }
            }
            Err(rejected) => tracing::debug!(
                recipient = %rejected.item.recipient().email,
                reason = %rejected.reason,
                "Task rejected by mail queue"
            ),
        }
    }
}

impl fmt::Debug for MailSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailSender")
            .field("pending", &self.queue.len())
            .field("closed", &self.queue.is_closed())
            .finish()
    }
}

/// Owns the mail queue and the delivery workers.
///
/// Build one at startup, hand [`sender`](Self::sender)s to producers, call
/// [`start`](Self::start) once, and [`shutdown`](Self::shutdown) at teardown.
/// `shutdown` consumes the dispatcher, so the queue is closed exactly once and
/// a stopped dispatcher cannot be restarted.
///
/// ```rust,ignore
/// let mut dispatcher = Dispatcher::new(mailer_from_env()?, DispatchConfig::from_env()?)?;
/// dispatcher.start_configured()?;
///
/// let sender = dispatcher.sender();
/// sender.enqueue(MailTask::new(&member, template)?).await?;
///
/// let report = dispatcher.shutdown().await;
/// ```
pub struct Dispatcher {
    queue: Arc<BoundedQueue<MailTask>>,
    operation: SendOperation,
    config: DispatchConfig,
    state: LifecycleState,
    workers: Vec<JoinHandle<WorkerStats>>,
}

impl Dispatcher {
    /// Validate `config` and `mailer`, and create the queue. No worker runs yet.
    pub fn new<M: Mailer + 'static>(mailer: M, config: DispatchConfig) -> Result<Self, MailError> {
        config.validate()?;
        mailer.validate_config()?;

        let mailer: Arc<dyn Mailer> = Arc::new(mailer);
        let operation = SendOperation::new(mailer, config.send_timeout)
            .default_from(config.default_from.clone());

        Ok(Self {
            queue: Arc::new(BoundedQueue::new(config.capacity)),
            operation,
            config,
            state: LifecycleState::Unstarted,
            workers: Vec::new(),
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Settings this dispatcher was built with.
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// A producer handle onto this dispatcher's queue.
    pub fn sender(&self) -> MailSender {
        MailSender {
            queue: Arc::clone(&self.queue),
        }
    }

    /// Spawn `workers` delivery workers on the current tokio runtime.
    ///
    /// Calling it again while running does nothing.
    pub fn start(&mut self, workers: usize) -> Result<(), MailError> {
        if self.state == LifecycleState::Running {
            tracing::debug!(workers = self.workers.len(), "Dispatcher already running");
            return Ok(());
        }
        if workers == 0 {
            return Err(MailError::Configuration(
                "worker count must be at least 1".into(),
            ));
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            MailError::Configuration("dispatcher must be started inside a tokio runtime".into())
        })?;

        self.workers = (0..workers)
            .map(|id| {
                runtime.spawn(worker::run(
                    id,
                    Arc::clone(&self.queue),
                    self.operation.clone(),
                    self.config.retry_delay,
                ))
            })
            .collect();
        self.state = LifecycleState::Running;

        tracing::info!(
            workers,
            capacity = self.queue.capacity(),
            timeout = ?self.config.send_timeout,
            "Mail dispatcher started"
        );
        Ok(())
    }

    /// [`start`](Self::start) with the configured worker count.
    pub fn start_configured(&mut self) -> Result<(), MailError> {
        self.start(self.config.workers)
    }

    /// Close the queue, let workers finish, and report what was left undone.
    ///
    /// Returns only after every worker has exited. Producers racing with
    /// shutdown either get their task queued (and then delivered or reported)
    /// or get it back with [`QueueError::Closed`](crate::QueueError::Closed).
    pub async fn shutdown(mut self) -> ShutdownReport {
        let mut report = ShutdownReport::default();

        if self.state == LifecycleState::Unstarted {
            report.undelivered = self.queue.close_and_drain();
            self.transition(LifecycleState::Stopped);
            self.log_undelivered(&report);
            return report;
        }

        self.transition(LifecycleState::Draining);
        let backlog = match self.config.drain {
            DrainPolicy::Discard => self.queue.close_and_drain(),
            DrainPolicy::Flush => {
                self.queue.close();
                Vec::new()
            }
        };

        for handle in std::mem::take(&mut self.workers) {
            match handle.await {
                Ok(stats) => report.absorb(stats),
                Err(err) => tracing::error!(error = %err, "Mail worker terminated abnormally"),
            }
        }
        report.undelivered.extend(backlog);

        self.transition(LifecycleState::Stopped);
        self.log_undelivered(&report);
        tracing::info!(
            delivered = report.delivered,
            failed_attempts = report.failed_attempts,
            undelivered = report.undelivered.len(),
            "Mail dispatcher stopped"
        );
        report
    }

    fn transition(&mut self, next: LifecycleState) {
        tracing::info!(from = %self.state, to = %next, "Mail dispatcher state change");
        self.state = next;
    }

    fn log_undelivered(&self, report: &ShutdownReport) {
        if !report.undelivered.is_empty() {
            tracing::warn!(
                count = report.undelivered.len(),
                "Mail dispatcher stopped with undelivered tasks"
            );
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        match self.state {
            LifecycleState::Stopped => {}
            LifecycleState::Unstarted => {
                let discarded = self.queue.close_and_drain();
                tracing::warn!(
                    discarded = discarded.len(),
                    "Mail dispatcher dropped before start; queued tasks discarded"
                );
            }
            LifecycleState::Running | LifecycleState::Draining => {
                tracing::warn!("Mail dispatcher dropped without shutdown; closing queue");
                self.queue.close();
            }
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("state", &self.state)
            .field("workers", &self.workers.len())
            .field("pending", &self.queue.len())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::Email;
    use crate::error::QueueError;
    use crate::providers::LocalMailer;

    fn task(n: usize) -> MailTask {
        MailTask::new(format!("m{n}@example.com"), Email::new().subject("Registered")).unwrap()
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let err = Dispatcher::new(LocalMailer::new(), DispatchConfig::default().capacity(0))
            .unwrap_err();
        assert!(matches!(err, MailError::Configuration(_)));
    }

    #[test]
    fn test_start_outside_runtime_fails() {
        let mut dispatcher = Dispatcher::new(LocalMailer::new(), DispatchConfig::default()).unwrap();
        assert!(dispatcher.start(1).is_err());
        assert_eq!(dispatcher.state(), LifecycleState::Unstarted);
    }

    #[tokio::test]
    async fn test_start_zero_workers_fails() {
        let mut dispatcher = Dispatcher::new(LocalMailer::new(), DispatchConfig::default()).unwrap();
        assert!(dispatcher.start(0).is_err());
        assert_eq!(dispatcher.state(), LifecycleState::Unstarted);
    }

    #[tokio::test]
    async fn test_start_twice_is_noop() {
        let mut dispatcher = Dispatcher::new(LocalMailer::new(), DispatchConfig::default()).unwrap();
        dispatcher.start(2).unwrap();
        dispatcher.start(5).unwrap();
        assert_eq!(dispatcher.workers.len(), 2);
        assert_eq!(dispatcher.state(), LifecycleState::Running);
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_unstarted_shutdown_reports_queued_tasks() {
        let dispatcher = Dispatcher::new(LocalMailer::new(), DispatchConfig::default()).unwrap();
        let sender = dispatcher.sender();
        sender.enqueue(task(0)).await.unwrap();
        sender.enqueue(task(1)).await.unwrap();

        let report = dispatcher.shutdown().await;
        assert_eq!(report.delivered, 0);
        assert_eq!(report.undelivered, vec![task(0), task(1)]);

        let rejected = sender.enqueue(task(2)).await.unwrap_err();
        assert_eq!(rejected.reason, QueueError::Closed);
        assert!(sender.is_closed());
    }

    #[tokio::test]
    async fn test_drop_unstarted_releases_blocked_producer() {
        let config = DispatchConfig::default().capacity(1);
        let dispatcher = Dispatcher::new(LocalMailer::new(), config).unwrap();
        let sender = dispatcher.sender();
        sender.enqueue(task(0)).await.unwrap();

        let producer = {
            let sender = sender.clone();
            tokio::spawn(async move { sender.enqueue(task(1)).await })
        };
        tokio::task::yield_now().await;
        assert!(!producer.is_finished());

        drop(dispatcher);

        let result = tokio::time::timeout(std::time::Duration::from_secs(2), producer)
            .await
            .expect("producer still blocked after dispatcher dropped")
            .unwrap();
        assert_eq!(result.unwrap_err().reason, QueueError::Closed);
        assert!(sender.is_closed());
        assert_eq!(sender.pending(), 0);
    }

    #[tokio::test]
    async fn test_flush_delivers_backlog() {
        let local = LocalMailer::new();
        let config = DispatchConfig::default().drain(DrainPolicy::Flush);
        let mut dispatcher = Dispatcher::new(local.clone(), config).unwrap();
        let sender = dispatcher.sender();
        for n in 0..5 {
            sender.enqueue(task(n)).await.unwrap();
        }
        dispatcher.start(1).unwrap();

        let report = dispatcher.shutdown().await;
        assert_eq!(report.delivered, 5);
        assert!(report.undelivered.is_empty());
        assert_eq!(local.email_count(), 5);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(LifecycleState::Draining.to_string(), "draining");
    }
}
