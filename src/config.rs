//! Dispatcher and transport configuration, read once at startup.
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `COURIER_QUEUE_CAPACITY` | Maximum queued plus in-flight tasks | `1024` |
//! | `COURIER_WORKERS` | Number of delivery workers | `4` |
//! | `COURIER_SEND_TIMEOUT_SECS` | Per-attempt timeout | `30` |
//! | `COURIER_RETRY_DELAY_MS` | Pause before requeueing a failed task | `0` |
//! | `COURIER_DRAIN` | `discard` or `flush` the backlog on shutdown | `discard` |
//! | `EMAIL_PROVIDER` | `smtp`, `local`, `logger`, `logger_full` | required |
//! | `EMAIL_FROM` | Default sender email | |
//! | `EMAIL_FROM_NAME` | Default sender name | |
//! | `SMTP_HOST` | SMTP server host | |
//! | `SMTP_PORT` | SMTP server port | `587` |
//! | `SMTP_USERNAME` | SMTP username | |
//! | `SMTP_PASSWORD` | SMTP password | |

use std::env;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::error::MailError;
use crate::mailer::Mailer;
use crate::providers;

/// What shutdown does with tasks still waiting in the queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrainPolicy {
    /// Drop the backlog at close and report it; only in-flight attempts finish.
    #[default]
    Discard,
    /// Keep delivering the backlog until the queue is empty.
    Flush,
}

impl FromStr for DrainPolicy {
    type Err = MailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "discard" => Ok(Self::Discard),
            "flush" => Ok(Self::Flush),
            other => Err(MailError::Configuration(format!(
                "Unknown drain policy: {}. Valid policies are: discard, flush",
                other
            ))),
        }
    }
}

/// Settings for a [`Dispatcher`](crate::Dispatcher).
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchConfig {
    /// Queue capacity, counting pending and in-flight tasks.
    pub capacity: usize,
    /// Workers spawned by [`Dispatcher::start_configured`](crate::Dispatcher::start_configured).
    pub workers: usize,
    /// Hard limit on a single delivery attempt.
    pub send_timeout: Duration,
    /// Pause before a failed task is put back in the queue.
    pub retry_delay: Duration,
    /// What shutdown does with the backlog.
    pub drain: DrainPolicy,
    /// Sender for messages whose template has none.
    pub default_from: Option<Address>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            workers: 4,
            send_timeout: Duration::from_secs(30),
            retry_delay: Duration::ZERO,
            drain: DrainPolicy::Discard,
            default_from: None,
        }
    }
}

impl DispatchConfig {
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn drain(mut self, policy: DrainPolicy) -> Self {
        self.drain = policy;
        self
    }

    pub fn default_from(mut self, from: impl Into<Address>) -> Self {
        self.default_from = Some(from.into());
        self
    }

    /// Reject settings the dispatcher cannot run with.
    pub fn validate(&self) -> Result<(), MailError> {
        if self.capacity == 0 {
            return Err(MailError::Configuration(
                "queue capacity must be at least 1".into(),
            ));
        }
        if self.workers == 0 {
            return Err(MailError::Configuration(
                "worker count must be at least 1".into(),
            ));
        }
        if self.send_timeout.is_zero() {
            return Err(MailError::Configuration(
                "send timeout must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Load settings from `COURIER_*` and `EMAIL_FROM*` environment variables.
    pub fn from_env() -> Result<Self, MailError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load settings through `lookup`, falling back to defaults for missing keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, MailError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            capacity: parse_or(&lookup, "COURIER_QUEUE_CAPACITY", defaults.capacity)?,
            workers: parse_or(&lookup, "COURIER_WORKERS", defaults.workers)?,
            send_timeout: Duration::from_secs(parse_or(
                &lookup,
                "COURIER_SEND_TIMEOUT_SECS",
                defaults.send_timeout.as_secs(),
            )?),
            retry_delay: Duration::from_millis(parse_or(&lookup, "COURIER_RETRY_DELAY_MS", 0)?),
            drain: parse_or(&lookup, "COURIER_DRAIN", defaults.drain)?,
            default_from: sender_from(&lookup),
        };

        config.validate()?;
        Ok(config)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, MailError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| MailError::Configuration(format!("{} has an invalid value: {}", key, raw))),
        None => Ok(default),
    }
}

fn sender_from<F>(lookup: &F) -> Option<Address>
where
    F: Fn(&str) -> Option<String>,
{
    let email = lookup("EMAIL_FROM")?;
    match lookup("EMAIL_FROM_NAME") {
        Some(name) => Some(Address::with_name(name, email)),
        None => Some(Address::new(email)),
    }
}

/// Get the default from address from environment.
pub fn default_from() -> Option<Address> {
    sender_from(&|key: &str| env::var(key).ok())
}

/// Create the transport named by `EMAIL_PROVIDER`.
pub fn mailer_from_env() -> Result<Arc<dyn Mailer>, MailError> {
    let provider = env::var("EMAIL_PROVIDER")
        .map_err(|_| MailError::NotConfigured)?
        .to_lowercase();

    let mailer: Arc<dyn Mailer> = match provider.as_str() {
        #[cfg(feature = "smtp")]
        "smtp" => {
            let host = env::var("SMTP_HOST")
                .map_err(|_| MailError::Configuration("SMTP_HOST not set".into()))?;
            let port: u16 = parse_or(&|key: &str| env::var(key).ok(), "SMTP_PORT", 587)?;
            let username = env::var("SMTP_USERNAME").unwrap_or_default();
            let password = env::var("SMTP_PASSWORD").unwrap_or_default();

            let builder = providers::SmtpMailer::new(&host, port);
            let mailer = if username.is_empty() {
                builder.build()
            } else {
                builder.credentials(&username, &password).build()
            };
            Arc::new(mailer)
        }
        #[cfg(not(feature = "smtp"))]
        "smtp" => {
            return Err(MailError::Configuration(
                "EMAIL_PROVIDER=smtp but 'smtp' feature is not enabled. \
                Add `features = [\"smtp\"]` to Cargo.toml"
                    .into(),
            ))
        }
        "local" => Arc::new(providers::LocalMailer::new()),
        "logger" => Arc::new(providers::LoggerMailer::new()),
        "logger_full" => Arc::new(providers::LoggerMailer::full()),
        _ => {
            return Err(MailError::Configuration(format!(
                "Unknown EMAIL_PROVIDER: {}. Valid providers are: smtp, local, logger, logger_full",
                provider
            )))
        }
    };

    tracing::debug!(provider = mailer.provider_name(), "Configured mail transport");
    mailer.validate_config()?;
    Ok(mailer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = DispatchConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, DispatchConfig::default());
    }

    #[test]
    fn test_reads_all_keys() {
        let config = DispatchConfig::from_lookup(lookup(&[
            ("COURIER_QUEUE_CAPACITY", "16"),
            ("COURIER_WORKERS", "2"),
            ("COURIER_SEND_TIMEOUT_SECS", "5"),
            ("COURIER_RETRY_DELAY_MS", "250"),
            ("COURIER_DRAIN", "Flush"),
            ("EMAIL_FROM", "registrations@example.com"),
            ("EMAIL_FROM_NAME", "Registrations"),
        ]))
        .unwrap();

        assert_eq!(config.capacity, 16);
        assert_eq!(config.workers, 2);
        assert_eq!(config.send_timeout, Duration::from_secs(5));
        assert_eq!(config.retry_delay, Duration::from_millis(250));
        assert_eq!(config.drain, DrainPolicy::Flush);
        assert_eq!(
            config.default_from,
            Some(Address::with_name("Registrations", "registrations@example.com"))
        );
    }

    #[test]
    fn test_invalid_number_is_configuration_error() {
        let err = DispatchConfig::from_lookup(lookup(&[("COURIER_WORKERS", "many")])).unwrap_err();
        assert!(err.to_string().contains("COURIER_WORKERS"));
    }

    #[test]
    fn test_zero_values_rejected() {
        assert!(DispatchConfig::default().capacity(0).validate().is_err());
        assert!(DispatchConfig::default().workers(0).validate().is_err());
        assert!(DispatchConfig::default()
            .send_timeout(Duration::ZERO)
            .validate()
            .is_err());
        assert!(DispatchConfig::from_lookup(lookup(&[("COURIER_SEND_TIMEOUT_SECS", "0")])).is_err());
    }

    #[test]
    fn test_unknown_drain_policy() {
        assert!("later".parse::<DrainPolicy>().is_err());
        assert_eq!("discard".parse::<DrainPolicy>().unwrap(), DrainPolicy::Discard);
    }
}
