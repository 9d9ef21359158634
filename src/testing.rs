//! Testing utilities: assertion helpers and misbehaving transports.
//!
//! # Example
//!
//! ```rust,ignore
//! use courier::providers::LocalMailer;
//! use courier::testing::*;
//!
//! #[tokio::test]
//! async fn test_registration_notifies_member() {
//!     let mailer = LocalMailer::new();
//!     let mut dispatcher = Dispatcher::new(mailer.clone(), DispatchConfig::default())?;
//!     dispatcher.start(1)?;
//!
//!     // ... trigger registration ...
//!
//!     dispatcher.shutdown().await;
//!     assert_email_to(&mailer, "member@example.com");
//!     assert_no_emails_to(&mailer, "admin@example.com");
//! }
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::email::Email;
use crate::error::MailError;
use crate::mailer::{DeliveryResult, Mailer};
use crate::providers::LocalMailer;
use crate::storage::StoredEmail;

// ============================================================================
// Helper Functions
// ============================================================================

fn format_email_summary(emails: &[StoredEmail]) -> String {
    if emails.is_empty() {
        return "  (no emails sent)".to_string();
    }

    emails
        .iter()
        .enumerate()
        .map(|(i, stored)| {
            let e = &stored.email;
            let to = e
                .to
                .iter()
                .map(|a| a.email.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            format!("  {}. To: [{}], Subject: \"{}\"", i + 1, to, e.subject)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_addressed_to(stored: &StoredEmail, email: &str) -> bool {
    stored
        .email
        .to
        .iter()
        .any(|a| a.email.eq_ignore_ascii_case(email))
}

// ============================================================================
// Assertions
// ============================================================================

/// Assert that at least one email was sent.
///
/// # Panics
///
/// Panics if no emails were sent.
pub fn assert_email_sent(mailer: &LocalMailer) {
    assert!(
        mailer.has_emails(),
        "Expected at least one email to be sent, but none were sent"
    );
}

/// Assert that no emails were sent.
pub fn assert_no_emails_sent(mailer: &LocalMailer) {
    let emails = mailer.emails();
    assert!(
        emails.is_empty(),
        "Expected no emails to be sent, but {} were sent.\n\nEmails sent:\n{}",
        emails.len(),
        format_email_summary(&emails)
    );
}

/// Assert that exactly `expected` emails were sent.
pub fn assert_email_count(mailer: &LocalMailer, expected: usize) {
    let actual = mailer.email_count();
    assert!(
        actual == expected,
        "Expected {} email(s) to be sent, but {} were sent.\n\nEmails sent:\n{}",
        expected,
        actual,
        format_email_summary(&mailer.emails())
    );
}

/// Assert that an email was sent to `email` (case-insensitive).
pub fn assert_email_to(mailer: &LocalMailer, email: &str) {
    let emails = mailer.emails();
    assert!(
        emails.iter().any(|stored| is_addressed_to(stored, email)),
        "Expected an email to be sent to '{}'.\n\nEmails sent:\n{}",
        email,
        format_email_summary(&emails)
    );
}

/// Assert that no email was sent to `email`.
pub fn assert_no_emails_to(mailer: &LocalMailer, email: &str) {
    let emails = mailer.emails();
    if let Some(found) = emails.iter().find(|stored| is_addressed_to(stored, email)) {
        panic!(
            "Expected no email to be sent to '{}', but found one.\n\nMatching email:\n  Subject: \"{}\"\n\nAll emails:\n{}",
            email,
            found.email.subject,
            format_email_summary(&emails)
        );
    }
}

/// Assert that some email's subject contains `text`.
pub fn assert_email_subject_contains(mailer: &LocalMailer, text: &str) {
    let emails = mailer.emails();
    assert!(
        emails.iter().any(|stored| stored.email.subject.contains(text)),
        "Expected an email with subject containing '{}'.\n\nEmails sent:\n{}",
        text,
        format_email_summary(&emails)
    );
}

/// Assert the exact order in which recipients were delivered to.
pub fn assert_delivery_order(mailer: &LocalMailer, expected: &[&str]) {
    let actual = mailer.recipients();
    assert!(
        actual == expected,
        "Expected deliveries in order {:?}, got {:?}",
        expected,
        actual
    );
}

/// Wait until `mailer` holds at least `count` emails, or `within` elapses.
///
/// Returns whether the count was reached. Works with paused test time.
pub async fn wait_for_emails(mailer: &LocalMailer, count: usize, within: Duration) -> bool {
    let poll = async {
        while mailer.email_count() < count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    tokio::time::timeout(within, poll).await.is_ok()
}

// ============================================================================
// Misbehaving Transports
// ============================================================================

/// Transport that sleeps before delegating to a [`LocalMailer`].
///
/// Pair with a short send timeout to exercise the timeout path.
#[derive(Debug, Clone)]
pub struct SlowMailer {
    inner: LocalMailer,
    delay: Duration,
}

impl SlowMailer {
    pub fn new(inner: LocalMailer, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl Mailer for SlowMailer {
    async fn deliver(&self, email: &Email) -> Result<DeliveryResult, MailError> {
        tokio::time::sleep(self.delay).await;
        self.inner.deliver(email).await
    }

    fn provider_name(&self) -> &'static str {
        "slow"
    }
}

/// Transport that panics on every delivery.
#[derive(Debug, Clone, Default)]
pub struct PanickingMailer;

#[async_trait]
impl Mailer for PanickingMailer {
    async fn deliver(&self, _email: &Email) -> Result<DeliveryResult, MailError> {
        panic!("transport exploded")
    }

    fn provider_name(&self) -> &'static str {
        "panicking"
    }
}

/// Transport that rejects listed recipients and delivers the rest to a
/// [`LocalMailer`], counting attempts per recipient.
#[derive(Debug, Clone)]
pub struct RejectingMailer {
    inner: LocalMailer,
    rejected: Arc<HashSet<String>>,
    attempts: Arc<Mutex<HashMap<String, usize>>>,
}

impl RejectingMailer {
    pub fn new<I, S>(inner: LocalMailer, rejected: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inner,
            rejected: Arc::new(rejected.into_iter().map(|s| s.into().to_lowercase()).collect()),
            attempts: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Attempts made for `email` so far, successful or not.
    pub fn attempts(&self, email: &str) -> usize {
        self.attempts
            .lock()
            .get(&email.to_lowercase())
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl Mailer for RejectingMailer {
    async fn deliver(&self, email: &Email) -> Result<DeliveryResult, MailError> {
        let recipient = email
            .to
            .first()
            .map(|a| a.email.to_lowercase())
            .unwrap_or_default();
        *self.attempts.lock().entry(recipient.clone()).or_insert(0) += 1;

        if self.rejected.contains(&recipient) {
            return Err(MailError::provider(
                "rejecting",
                format!("mailbox unavailable: {}", recipient),
            ));
        }
        self.inner.deliver(email).await
    }

    fn provider_name(&self) -> &'static str {
        "rejecting"
    }
}
