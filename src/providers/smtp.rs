//! SMTP provider using lettre.
//!
//! ```rust,ignore
//! use courier::providers::SmtpMailer;
//!
//! let mailer = SmtpMailer::new("smtp.example.com", 587)
//!     .credentials("username", "password")
//!     .build();
//!
//! // Local relay, no TLS, no auth
//! let mailer = SmtpMailer::localhost();
//! ```

use async_trait::async_trait;
use lettre::{
    message::{
        header::{ContentType, HeaderName, HeaderValue},
        Mailbox, MultiPart,
    },
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::address::Address;
use crate::email::Email;
use crate::error::MailError;
use crate::mailer::{DeliveryResult, Mailer};

/// SMTP email provider.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    /// Create a new SMTP mailer builder with TLS (STARTTLS on port 587).
    pub fn new(host: &str, port: u16) -> SmtpBuilder {
        SmtpBuilder {
            host: host.to_string(),
            port,
            credentials: None,
            tls: TlsMode::StartTls,
        }
    }

    /// Create a new SMTP mailer for localhost (no TLS, no auth).
    pub fn localhost() -> Self {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous("localhost")
            .port(25)
            .build();

        Self { transport }
    }

    fn build_message(&self, email: &Email) -> Result<Message, MailError> {
        let from = email
            .from
            .as_ref()
            .ok_or(MailError::MissingField("from"))?;

        if email.to.is_empty() {
            return Err(MailError::MissingField("to"));
        }

        let mut builder = Message::builder()
            .from(address_to_mailbox(from)?)
            .subject(&email.subject);

        for to in &email.to {
            builder = builder.to(address_to_mailbox(to)?);
        }
        if let Some(reply_to) = email.reply_to.first() {
            builder = builder.reply_to(address_to_mailbox(reply_to)?);
        }
        for (name, value) in &email.headers {
            let name = HeaderName::new_from_ascii(name.clone())
                .map_err(|e| MailError::BuildError(format!("invalid header name {}: {}", name, e)))?;
            builder = builder.raw_header(HeaderValue::new(name, value.clone()));
        }

        let message = match (&email.html_body, &email.text_body) {
            (Some(html), Some(text)) => {
                builder.multipart(MultiPart::alternative_plain_html(text.clone(), html.clone()))?
            }
            (Some(html), None) => builder.header(ContentType::TEXT_HTML).body(html.clone())?,
            (None, Some(text)) => builder.header(ContentType::TEXT_PLAIN).body(text.clone())?,
            (None, None) => builder
                .header(ContentType::TEXT_PLAIN)
                .body(String::new())?,
        };

        Ok(message)
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn deliver(&self, email: &Email) -> Result<DeliveryResult, MailError> {
        let message = self.build_message(email)?;

        let response = self.transport.send(message).await?;

        // First line of the server's reply usually carries the queue id
        let message_id = response
            .message()
            .next()
            .and_then(|m| m.lines().next())
            .map(|s| s.to_string())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        Ok(DeliveryResult::new(message_id))
    }

    fn provider_name(&self) -> &'static str {
        "smtp"
    }
}

/// TLS mode for SMTP connection.
#[derive(Debug, Clone, Copy)]
pub enum TlsMode {
    /// No TLS (dangerous, only for localhost)
    None,
    /// STARTTLS - upgrade to TLS after connecting (port 587)
    StartTls,
    /// Implicit TLS - connect with TLS from start (port 465)
    Tls,
}

/// Builder for SmtpMailer.
pub struct SmtpBuilder {
    host: String,
    port: u16,
    credentials: Option<Credentials>,
    tls: TlsMode,
}

impl SmtpBuilder {
    /// Set SMTP credentials.
    pub fn credentials(mut self, username: &str, password: &str) -> Self {
        self.credentials = Some(Credentials::new(username.to_string(), password.to_string()));
        self
    }

    /// Set TLS mode.
    pub fn tls(mut self, mode: TlsMode) -> Self {
        self.tls = mode;
        self
    }

    /// Disable TLS (dangerous, only for localhost/testing).
    pub fn no_tls(self) -> Self {
        self.tls(TlsMode::None)
    }

    /// Build the SmtpMailer.
    pub fn build(self) -> SmtpMailer {
        let dangerous = || AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.host);
        let builder = match self.tls {
            TlsMode::None => dangerous(),
            TlsMode::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.host)
                .unwrap_or_else(|_| dangerous()),
            TlsMode::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&self.host)
                .unwrap_or_else(|_| dangerous()),
        };

        let mut builder = builder.port(self.port);
        if let Some(creds) = self.credentials {
            builder = builder.credentials(creds);
        }

        SmtpMailer {
            transport: builder.build(),
        }
    }
}

fn address_to_mailbox(addr: &Address) -> Result<Mailbox, MailError> {
    let email = addr.email.parse()?;
    Ok(Mailbox::new(addr.name.clone(), email))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_message_requires_from() {
        let mailer = SmtpMailer::localhost();
        let email = Email::new().to("member@example.com").subject("Hi");
        assert!(matches!(
            mailer.build_message(&email),
            Err(MailError::MissingField("from"))
        ));
    }

    #[tokio::test]
    async fn test_build_message_multipart() {
        let mailer = SmtpMailer::localhost();
        let email = Email::new()
            .from("registrations@example.com")
            .to(("Member", "member@example.com"))
            .subject("Registered")
            .text_body("text")
            .html_body("<p>html</p>");
        assert!(mailer.build_message(&email).is_ok());
    }

    #[tokio::test]
    async fn test_build_message_keeps_custom_headers() {
        let mailer = SmtpMailer::localhost();
        let email = Email::new()
            .from("registrations@example.com")
            .to("member@example.com")
            .subject("Registered")
            .text_body("text")
            .header("X-Environment", "staging");

        let raw = mailer.build_message(&email).unwrap().formatted();
        let raw = String::from_utf8_lossy(&raw);
        assert!(raw.contains("X-Environment: staging"), "headers missing:\n{raw}");
    }

    #[tokio::test]
    async fn test_build_message_rejects_bad_header_name() {
        let mailer = SmtpMailer::localhost();
        let email = Email::new()
            .from("registrations@example.com")
            .to("member@example.com")
            .header("Bad Header", "x");

        assert!(matches!(
            mailer.build_message(&email),
            Err(MailError::BuildError(_))
        ));
    }
}
