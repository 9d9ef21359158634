//! The unit of queued mail work.

use serde::{Deserialize, Serialize};

use crate::address::{Address, ToAddress};
use crate::email::Email;
use crate::error::MailError;

/// One pending notification: who to send to, and the message to send them.
///
/// Immutable once built and compared by value. The `params` email acts as a
/// template; its `to` list is replaced by the recipient when the message is
/// composed.
///
/// ```
/// use courier::{Email, MailTask};
///
/// let task = MailTask::new(
///     "member@example.com",
///     Email::new().subject("Registration received").assign("team", "Rustaceans"),
/// )
/// .unwrap();
///
/// assert_eq!(task.recipient().email, "member@example.com");
/// assert_eq!(task.email().to.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMailTask")]
pub struct MailTask {
    recipient: Address,
    params: Email,
}

/// Wire shape of a [`MailTask`]; validated on the way in.
#[derive(Deserialize)]
struct RawMailTask {
    recipient: Address,
    params: Email,
}

impl TryFrom<RawMailTask> for MailTask {
    type Error = MailError;

    fn try_from(raw: RawMailTask) -> Result<Self, Self::Error> {
        Self::new(raw.recipient, raw.params)
    }
}

impl MailTask {
    /// Build a task, rejecting empty or malformed recipients.
    pub fn new(recipient: impl ToAddress, params: Email) -> Result<Self, MailError> {
        let recipient = recipient.to_address();
        Address::validate(&recipient.email)?;
        Ok(Self { recipient, params })
    }

    pub fn recipient(&self) -> &Address {
        &self.recipient
    }

    pub fn params(&self) -> &Email {
        &self.params
    }

    /// The deliverable message: the template addressed to the recipient.
    pub fn email(&self) -> Email {
        self.params.clone().put_to(vec![self.recipient.clone()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_empty_recipient() {
        let err = MailTask::new("", Email::new()).unwrap_err();
        assert!(matches!(err, MailError::MissingField("recipient")));
    }

    #[test]
    fn test_rejects_malformed_recipient() {
        let err = MailTask::new("nobody", Email::new()).unwrap_err();
        assert!(matches!(err, MailError::InvalidAddress(_)));
    }

    #[test]
    fn test_email_replaces_template_recipients() {
        let template = Email::new().to("leftover@example.com").subject("Welcome");
        let task = MailTask::new(("Member", "member@example.com"), template).unwrap();

        let email = task.email();
        assert_eq!(email.to, vec![Address::with_name("Member", "member@example.com")]);
        assert_eq!(email.subject, "Welcome");
    }

    #[test]
    fn test_value_equality() {
        let a = MailTask::new("m@example.com", Email::new().subject("Hi")).unwrap();
        let b = MailTask::new("m@example.com", Email::new().subject("Hi")).unwrap();
        let c = MailTask::new("m@example.com", Email::new().subject("Bye")).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_serde_roundtrip_preserves_value() {
        let task = MailTask::new("m@example.com", Email::new().assign("track", "systems")).unwrap();
        let json = serde_json::to_string(&task).unwrap();
        let back: MailTask = serde_json::from_str(&json).unwrap();
        assert_eq!(task, back);
    }

    #[test]
    fn test_deserialize_validates_recipient() {
        let task = MailTask::new("m@example.com", Email::new().subject("Hi")).unwrap();
        let json = serde_json::to_string(&task).unwrap();

        for bad in ["", "nobody"] {
            let tampered = json.replace("m@example.com", bad);
            let err = serde_json::from_str::<MailTask>(&tampered).unwrap_err();
            assert!(err.is_data(), "recipient {bad:?} accepted: {err}");
        }
    }
}
