//! Error types for courier.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Errors raised while composing or delivering a message.
#[derive(Debug, Clone, Error)]
pub enum MailError {
    /// Email provider is not configured.
    #[error("Email provider not configured")]
    NotConfigured,

    /// Configuration error (missing env var, invalid value, etc.)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Missing required field (e.g., from address).
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// Invalid email address format.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Error building the email message.
    #[error("Build error: {0}")]
    BuildError(String),

    /// Error sending the email.
    #[error("Send error: {0}")]
    SendError(String),

    /// Provider-specific error with details.
    #[error("Provider error ({provider}): {message}")]
    ProviderError {
        provider: &'static str,
        message: String,
    },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(String),
}

impl MailError {
    /// Create a provider-specific error.
    pub fn provider(provider: &'static str, message: impl Into<String>) -> Self {
        Self::ProviderError {
            provider,
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for MailError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonError(err.to_string())
    }
}

#[cfg(feature = "smtp")]
impl From<lettre::error::Error> for MailError {
    fn from(err: lettre::error::Error) -> Self {
        Self::BuildError(err.to_string())
    }
}

#[cfg(feature = "smtp")]
impl From<lettre::transport::smtp::Error> for MailError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        Self::SendError(err.to_string())
    }
}

#[cfg(feature = "smtp")]
impl From<lettre::address::AddressError> for MailError {
    fn from(err: lettre::address::AddressError) -> Self {
        Self::InvalidAddress(err.to_string())
    }
}

/// Producer-visible queue errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    /// The queue is at capacity (non-blocking enqueue only).
    #[error("mail queue is full")]
    Full,

    /// The queue has been closed; shutdown is in progress or complete.
    #[error("mail queue is closed")]
    Closed,
}

/// An item the queue refused, handed back to the caller together with the reason.
///
/// Nothing is dropped on rejection: callers decide whether to retry, log or
/// discard the item.
#[derive(Error)]
#[error("{reason}")]
pub struct Rejected<T> {
    /// The item that was not enqueued.
    pub item: T,
    /// Why the item was refused.
    pub reason: QueueError,
}

impl<T> Rejected<T> {
    pub(crate) fn new(item: T, reason: QueueError) -> Self {
        Self { item, reason }
    }

    /// Take back the refused item.
    pub fn into_inner(self) -> T {
        self.item
    }
}

impl<T> fmt::Debug for Rejected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rejected")
            .field("reason", &self.reason)
            .finish_non_exhaustive()
    }
}

/// Why a single send attempt failed. Every variant is retryable.
#[derive(Debug, Clone, Error)]
pub enum SendFailure {
    /// The transport did not finish within the configured timeout.
    #[error("delivery timed out after {0:?}")]
    Timeout(Duration),

    /// The transport reported an error.
    #[error(transparent)]
    Transport(#[from] MailError),

    /// The transport panicked; the panic was contained to the attempt.
    #[error("transport panicked: {0}")]
    Panicked(String),
}

impl SendFailure {
    /// Short label used for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "timeout",
            Self::Transport(_) => "transport",
            Self::Panicked(_) => "panic",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_keeps_item() {
        let rejected = Rejected::new("task", QueueError::Closed);
        assert_eq!(rejected.to_string(), "mail queue is closed");
        assert_eq!(rejected.into_inner(), "task");
    }

    #[test]
    fn test_send_failure_kind() {
        assert_eq!(SendFailure::Timeout(Duration::from_secs(1)).kind(), "timeout");
        assert_eq!(
            SendFailure::from(MailError::SendError("refused".into())).kind(),
            "transport"
        );
        assert_eq!(SendFailure::Panicked("boom".into()).kind(), "panic");
    }

    #[test]
    fn test_transport_failure_is_transparent() {
        let failure = SendFailure::from(MailError::SendError("refused".into()));
        assert_eq!(failure.to_string(), "Send error: refused");
    }
}
