//! Interceptors rewrite or block a composed message right before delivery.
//!
//! They wrap any [`Mailer`], so a dispatcher can redirect every queued
//! notification to a staging inbox or refuse recipients on a blocklist without
//! touching the producers:
//!
//! ```rust,ignore
//! use courier::providers::LocalMailer;
//! use courier::InterceptorExt;
//!
//! let mailer = LocalMailer::new()
//!     .with_interceptor(|email| Ok(email.header("X-Environment", "staging")));
//! ```
//!
//! A blocked message surfaces as a transport error, so the worker treats it
//! like any other failed attempt.

use async_trait::async_trait;

use crate::email::Email;
use crate::error::MailError;
use crate::mailer::{DeliveryResult, Mailer};

/// Transform an email before delivery, or block it by returning an error.
pub trait Interceptor: Send + Sync {
    fn intercept(&self, email: Email) -> Result<Email, MailError>;
}

impl<F> Interceptor for F
where
    F: Fn(Email) -> Result<Email, MailError> + Send + Sync,
{
    fn intercept(&self, email: Email) -> Result<Email, MailError> {
        (self)(email)
    }
}

/// A mailer wrapper that applies an interceptor before delivery.
///
/// Created by [`InterceptorExt::with_interceptor`].
#[derive(Debug, Clone)]
pub struct WithInterceptor<M, I> {
    inner: M,
    interceptor: I,
}

#[async_trait]
impl<M, I> Mailer for WithInterceptor<M, I>
where
    M: Mailer,
    I: Interceptor,
{
    async fn deliver(&self, email: &Email) -> Result<DeliveryResult, MailError> {
        let email = self.interceptor.intercept(email.clone())?;
        self.inner.deliver(&email).await
    }

    fn provider_name(&self) -> &'static str {
        self.inner.provider_name()
    }

    fn validate_config(&self) -> Result<(), MailError> {
        self.inner.validate_config()
    }
}

/// Extension trait for adding interceptors to any mailer.
pub trait InterceptorExt: Mailer + Sized {
    /// Wrap this mailer with an interceptor. Calls chain outermost-last:
    ///
    /// ```rust,ignore
    /// let mailer = LocalMailer::new()
    ///     .with_interceptor(redirect_to_staging)
    ///     .with_interceptor(block_test_domains);
    /// ```
    fn with_interceptor<I>(self, interceptor: I) -> WithInterceptor<Self, I>
    where
        I: Interceptor,
    {
        WithInterceptor {
            inner: self,
            interceptor,
        }
    }
}

impl<M: Mailer + Sized> InterceptorExt for M {}
