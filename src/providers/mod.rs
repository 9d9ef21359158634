//! Email provider implementations.
//!
//! Each provider implements the [`Mailer`](crate::Mailer) trait and can back a
//! [`Dispatcher`](crate::Dispatcher).
//!
//! | Provider | Feature Flag | Description |
//! |----------|-------------|-------------|
//! | [`SmtpMailer`] | `smtp` | SMTP via lettre |
//! | [`LocalMailer`] | (none) | In-memory storage for dev/testing |
//! | [`LoggerMailer`] | (none) | Logs emails without sending |

#[cfg(feature = "smtp")]
mod smtp;
#[cfg(feature = "smtp")]
pub use smtp::{SmtpBuilder, SmtpMailer, TlsMode};

mod local;
pub use local::LocalMailer;

mod logger;
pub use logger::LoggerMailer;
