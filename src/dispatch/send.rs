//! A single timed delivery attempt.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use tracing::Instrument;

use crate::address::Address;
use crate::dispatch::task::MailTask;
use crate::error::{MailError, SendFailure};
use crate::mailer::{DeliveryResult, Mailer};

#[cfg(feature = "metrics")]
use std::time::Instant;

/// Result of one send attempt. There is no partial success.
#[derive(Debug)]
pub enum SendOutcome {
    /// The transport accepted the message; the task is done.
    Delivered(DeliveryResult),
    /// The attempt failed; the task may be retried.
    Failed(SendFailure),
}

impl SendOutcome {
    /// `true` if the transport accepted the message.
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered(_))
    }
}

/// Races one transport call against a timer.
///
/// Cheap to clone; every worker holds its own copy.
#[derive(Clone)]
pub struct SendOperation {
    mailer: Arc<dyn Mailer>,
    default_from: Option<Address>,
    timeout: Duration,
}

impl SendOperation {
    /// Send through `mailer`, giving each attempt at most `timeout`.
    pub fn new(mailer: Arc<dyn Mailer>, timeout: Duration) -> Self {
        Self {
            mailer,
            default_from: None,
            timeout,
        }
    }

    /// Sender used for composed messages whose template has no `from`.
    pub fn default_from(mut self, from: Option<Address>) -> Self {
        self.default_from = from;
        self
    }

    /// Limit on a single attempt.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Make exactly one delivery attempt for `task`.
    ///
    /// The transport runs in its own task. If it has not finished within the
    /// timeout it is aborted and its eventual result discarded. A panic in the
    /// transport is reported as [`SendFailure::Panicked`].
    pub async fn send(&self, task: &MailTask) -> SendOutcome {
        let provider = self.mailer.provider_name();
        let span = tracing::info_span!(
            "courier.send",
            provider = provider,
            recipient = %task.recipient().email,
        );

        self.attempt(task).instrument(span).await
    }

    async fn attempt(&self, task: &MailTask) -> SendOutcome {
        let mut email = task.email();
        if email.from.is_none() {
            email.from = self.default_from.clone();
        }

        #[cfg(feature = "metrics")]
        let start = Instant::now();

        let mailer = Arc::clone(&self.mailer);
        let handle = tokio::spawn(async move { mailer.deliver(&email).await });
        let abort = handle.abort_handle();

        let outcome = match tokio::time::timeout(self.timeout, handle).await {
            Ok(Ok(Ok(result))) => SendOutcome::Delivered(result),
            Ok(Ok(Err(err))) => SendOutcome::Failed(SendFailure::Transport(err)),
            Ok(Err(join_err)) if join_err.is_panic() => {
                SendOutcome::Failed(SendFailure::Panicked(panic_message(join_err.into_panic())))
            }
            Ok(Err(_)) => SendOutcome::Failed(SendFailure::Transport(MailError::SendError(
                "send attempt was cancelled".into(),
            ))),
            Err(_) => {
                abort.abort();
                SendOutcome::Failed(SendFailure::Timeout(self.timeout))
            }
        };

        #[cfg(feature = "metrics")]
        {
            let provider = self.mailer.provider_name();
            let status = match &outcome {
                SendOutcome::Delivered(_) => "success",
                SendOutcome::Failed(failure) => failure.kind(),
            };
            metrics::counter!("courier_deliveries_total", "provider" => provider, "status" => status)
                .increment(1);
            metrics::histogram!("courier_delivery_duration_seconds", "provider" => provider)
                .record(start.elapsed().as_secs_f64());
        }

        match &outcome {
            SendOutcome::Delivered(result) => {
                tracing::debug!(message_id = %result.message_id, "Email delivered")
            }
            SendOutcome::Failed(failure) => {
                tracing::debug!(kind = failure.kind(), error = %failure, "Delivery attempt failed")
            }
        }

        outcome
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
