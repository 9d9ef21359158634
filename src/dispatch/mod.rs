//! Background delivery: a bounded queue of [`MailTask`]s drained by a pool of
//! workers, each attempt raced against a timeout.

mod lifecycle;
mod queue;
mod send;
mod task;
mod worker;

pub use lifecycle::{Dispatcher, LifecycleState, MailSender, ShutdownReport};
pub use queue::{BoundedQueue, Lease};
pub use send::{SendOperation, SendOutcome};
pub use task::MailTask;
