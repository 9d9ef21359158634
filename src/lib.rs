//! # Courier
//!
//! Background email notifications for request handlers that must not wait on
//! a mail server.
//!
//! Producers put [`MailTask`]s on a bounded queue and return immediately. A
//! fixed pool of workers delivers them through a [`Mailer`], bounding every
//! attempt with a timeout and putting failed tasks back at the tail of the
//! queue so one bad recipient cannot hold up the rest.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use courier::{mailer_from_env, DispatchConfig, Dispatcher, Email, MailTask};
//!
//! let mut dispatcher = Dispatcher::new(mailer_from_env()?, DispatchConfig::from_env()?)?;
//! dispatcher.start_configured()?;
//! let sender = dispatcher.sender();
//!
//! // In a request handler:
//! let task = MailTask::new(
//!     ("Ferris", "ferris@example.com"),
//!     Email::new()
//!         .subject("Registration received")
//!         .text_body("Thanks for registering!"),
//! )?;
//! if let Err(rejected) = sender.enqueue(task).await {
//!     tracing::warn!(reason = %rejected.reason, "Notification not queued");
//! }
//!
//! // At teardown:
//! let report = dispatcher.shutdown().await;
//! ```
//!
//! ## Environment Variables
//!
//! See [`DispatchConfig::from_env`] and [`mailer_from_env`].
//!
//! | Variable | Description |
//! |----------|-------------|
//! | `COURIER_QUEUE_CAPACITY` | Queue capacity (default: 1024) |
//! | `COURIER_WORKERS` | Worker count (default: 4) |
//! | `COURIER_SEND_TIMEOUT_SECS` | Per-attempt timeout (default: 30) |
//! | `COURIER_RETRY_DELAY_MS` | Pause before a failed task is requeued (default: 0) |
//! | `COURIER_DRAIN` | `discard` or `flush` on shutdown (default: discard) |
//! | `EMAIL_PROVIDER` | `smtp`, `local`, `logger`, `logger_full` |
//! | `EMAIL_FROM` | Default sender email |
//! | `EMAIL_FROM_NAME` | Default sender name |
//! | `SMTP_HOST` | SMTP server host |
//! | `SMTP_PORT` | SMTP server port (default: 587) |
//! | `SMTP_USERNAME` | SMTP username |
//! | `SMTP_PASSWORD` | SMTP password |
//!
//! ## Feature Flags
//!
//! - `smtp` - SMTP provider via lettre
//! - `metrics` - Prometheus-style metrics (counters/gauges/histograms)
//!
//! ## Metrics
//!
//! Enable `features = ["metrics"]` to emit:
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `courier_enqueued_total` | Counter | | Tasks accepted by the queue |
//! | `courier_queue_depth` | Gauge | | Pending tasks after an enqueue |
//! | `courier_deliveries_total` | Counter | provider, status | Delivery attempts |
//! | `courier_delivery_duration_seconds` | Histogram | provider | Attempt duration |
//!
//! Install a recorder (e.g., `metrics-exporter-prometheus`) in your app to collect them.

/// The version of the courier crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

mod address;
mod config;
mod dispatch;
mod email;
mod error;
mod interceptor;
mod mailer;
mod storage;

pub mod providers;
pub mod testing;

// Re-exports
pub use address::{Address, ToAddress};
pub use config::{default_from, mailer_from_env, DispatchConfig, DrainPolicy};
pub use dispatch::{
    BoundedQueue, Dispatcher, Lease, LifecycleState, MailSender, MailTask, SendOperation,
    SendOutcome, ShutdownReport,
};
pub use email::Email;
pub use error::{MailError, QueueError, Rejected, SendFailure};
pub use interceptor::{Interceptor, InterceptorExt, WithInterceptor};
pub use mailer::{DeliveryResult, Mailer};
pub use storage::{MemoryStorage, Storage, StoredEmail};

/// Common imports for application code.
pub mod prelude {
    pub use crate::{
        Address, DispatchConfig, Dispatcher, Email, MailError, MailSender, MailTask, Mailer,
        ToAddress,
    };
}
