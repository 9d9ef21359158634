//! In-memory message storage backing [`LocalMailer`](crate::providers::LocalMailer).

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;

use crate::email::Email;

/// A stored email with metadata.
#[derive(Debug, Clone)]
pub struct StoredEmail {
    /// Unique identifier for this email.
    pub id: String,
    /// The email content.
    pub email: Email,
    /// When the email was "sent" (stored).
    pub sent_at: DateTime<Utc>,
}

/// Trait for email storage backends.
pub trait Storage: Send + Sync {
    /// Store an email and return its ID.
    fn push(&self, email: Email) -> String;

    /// Get an email by ID.
    fn get(&self, id: &str) -> Option<StoredEmail>;

    /// Get all stored emails, newest first.
    fn all(&self) -> Vec<StoredEmail>;

    /// Clear all stored emails.
    fn clear(&self);

    /// Get the count of stored emails.
    fn count(&self) -> usize;

    /// Remove and return all stored emails, newest first.
    fn flush(&self) -> Vec<StoredEmail>;
}

/// Thread-safe in-memory storage for emails, kept in insertion order.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    emails: RwLock<Vec<StoredEmail>>,
}

impl MemoryStorage {
    /// Create a new empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create storage wrapped in an Arc for sharing.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl Storage for MemoryStorage {
    fn push(&self, email: Email) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        self.emails.write().push(StoredEmail {
            id: id.clone(),
            email,
            sent_at: Utc::now(),
        });
        id
    }

    fn get(&self, id: &str) -> Option<StoredEmail> {
        self.emails.read().iter().find(|s| s.id == id).cloned()
    }

    fn all(&self) -> Vec<StoredEmail> {
        self.emails.read().iter().rev().cloned().collect()
    }

    fn clear(&self) {
        self.emails.write().clear();
    }

    fn count(&self) -> usize {
        self.emails.read().len()
    }

    fn flush(&self) -> Vec<StoredEmail> {
        let mut emails = std::mem::take(&mut *self.emails.write());
        emails.reverse();
        emails
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage() {
        let storage = MemoryStorage::new();

        let id = storage.push(Email::new().subject("First"));
        let id2 = storage.push(Email::new().subject("Second"));
        assert_eq!(storage.count(), 2);
        assert_eq!(storage.get(&id).unwrap().email.subject, "First");

        let all = storage.all();
        assert_eq!(all[0].id, id2);

        storage.clear();
        assert_eq!(storage.count(), 0);
        assert!(storage.get(&id).is_none());
    }

    #[test]
    fn test_flush() {
        let storage = MemoryStorage::new();
        storage.push(Email::new().subject("First"));
        storage.push(Email::new().subject("Second"));

        let flushed = storage.flush();
        assert_eq!(flushed.len(), 2);
        assert_eq!(flushed[0].email.subject, "Second");
        assert_eq!(storage.count(), 0);
        assert!(storage.flush().is_empty());
    }
}
