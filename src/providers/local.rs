//! Local mailer for development and testing.
//!
//! Stores delivered emails in memory so tests can assert on what the
//! dispatcher actually sent.
//!
//! ```rust,ignore
//! use courier::providers::LocalMailer;
//! use courier::testing::*;
//!
//! let mailer = LocalMailer::new();
//! let mut dispatcher = Dispatcher::new(mailer.clone(), DispatchConfig::default())?;
//! dispatcher.start(2)?;
//! // ... enqueue, shut down ...
//! assert_email_to(&mailer, "member@example.com");
//! ```

use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;

use crate::email::Email;
use crate::error::MailError;
use crate::mailer::{DeliveryResult, Mailer};
use crate::storage::{MemoryStorage, Storage, StoredEmail};

/// Local mailer that stores emails in memory.
///
/// Clones share both storage and failure state.
#[derive(Debug, Clone)]
pub struct LocalMailer {
    storage: Arc<MemoryStorage>,
    fail_with: Arc<RwLock<Option<String>>>,
}

impl LocalMailer {
    /// Create a new local mailer with fresh storage.
    pub fn new() -> Self {
        Self::with_storage(MemoryStorage::shared())
    }

    /// Create a local mailer with existing storage.
    pub fn with_storage(storage: Arc<MemoryStorage>) -> Self {
        Self {
            storage,
            fail_with: Arc::new(RwLock::new(None)),
        }
    }

    /// Get a reference to the underlying storage.
    pub fn storage(&self) -> Arc<MemoryStorage> {
        Arc::clone(&self.storage)
    }

    /// Make every delivery fail with `message` until [`clear_failure`](Self::clear_failure).
    pub fn set_failure(&self, message: impl Into<String>) {
        *self.fail_with.write() = Some(message.into());
    }

    /// Clear the failure state.
    pub fn clear_failure(&self) {
        *self.fail_with.write() = None;
    }

    /// Get all captured emails (newest first).
    pub fn emails(&self) -> Vec<StoredEmail> {
        self.storage.all()
    }

    /// Recipients of captured emails in delivery order (oldest first).
    pub fn recipients(&self) -> Vec<String> {
        let mut recipients: Vec<String> = self
            .storage
            .all()
            .into_iter()
            .flat_map(|stored| stored.email.to.into_iter().map(|a| a.email))
            .collect();
        recipients.reverse();
        recipients
    }

    /// Get the count of sent emails.
    pub fn email_count(&self) -> usize {
        self.storage.count()
    }

    /// Check if any email was sent.
    pub fn has_emails(&self) -> bool {
        self.storage.count() > 0
    }

    /// Remove and return all captured emails.
    pub fn flush(&self) -> Vec<StoredEmail> {
        self.storage.flush()
    }

    /// Check if an email was sent to a specific address.
    pub fn sent_to(&self, email: &str) -> bool {
        self.storage.all().iter().any(|stored| {
            stored
                .email
                .to
                .iter()
                .any(|addr| addr.email.eq_ignore_ascii_case(email))
        })
    }
}

impl Default for LocalMailer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Mailer for LocalMailer {
    async fn deliver(&self, email: &Email) -> Result<DeliveryResult, MailError> {
        if let Some(message) = self.fail_with.read().clone() {
            return Err(MailError::SendError(message));
        }

        let message_id = self.storage.push(email.clone());
        Ok(DeliveryResult::new(message_id))
    }

    fn provider_name(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_mailer_stores() {
        let mailer = LocalMailer::new();
        let email = Email::new()
            .from("sender@example.com")
            .to("recipient@example.com")
            .subject("Test Email");

        let result = mailer.deliver(&email).await.unwrap();

        let stored = mailer.storage().get(&result.message_id).unwrap();
        assert_eq!(stored.email.subject, "Test Email");
        assert!(mailer.sent_to("RECIPIENT@example.com"));
    }

    #[tokio::test]
    async fn test_can_fail() {
        let mailer = LocalMailer::new();
        mailer.set_failure("Simulated failure");

        let email = Email::new().to("a@example.com");
        let err = mailer.deliver(&email).await.unwrap_err();
        assert!(err.to_string().contains("Simulated failure"));
        assert!(!mailer.has_emails());

        mailer.clear_failure();
        assert!(mailer.deliver(&email).await.is_ok());
    }

    #[tokio::test]
    async fn test_clone_shares_state() {
        let mailer = LocalMailer::new();
        let cloned = mailer.clone();

        cloned.set_failure("down");
        assert!(mailer.deliver(&Email::new()).await.is_err());

        cloned.clear_failure();
        mailer.deliver(&Email::new().to("a@example.com")).await.unwrap();
        cloned.deliver(&Email::new().to("b@example.com")).await.unwrap();

        assert_eq!(mailer.recipients(), vec!["a@example.com", "b@example.com"]);
        assert_eq!(mailer.flush().len(), 2);
        assert_eq!(cloned.email_count(), 0);
    }
}
