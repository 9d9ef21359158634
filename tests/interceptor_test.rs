//! Interceptors wrapped around the transport a dispatcher delivers through.

use std::time::Duration;

use courier::providers::LocalMailer;
use courier::testing::*;
use courier::{
    Address, DispatchConfig, Dispatcher, DrainPolicy, Email, Interceptor, InterceptorExt,
    MailError, MailTask, Mailer,
};

fn redirect_to_staging(email: Email) -> Result<Email, MailError> {
    Ok(email.put_to(vec![Address::new("inbox@staging.example.com")]))
}

/// Test that a basic interceptor can modify an email.
#[tokio::test]
async fn test_interceptor_modifies_email() {
    let local = LocalMailer::new();
    let mailer = local
        .clone()
        .with_interceptor(|email: Email| -> Result<Email, MailError> {
            Ok(email.header("X-Environment", "staging"))
        });

    mailer
        .deliver(&Email::new().to("member@example.com").subject("Welcome"))
        .await
        .unwrap();

    let emails = local.emails();
    assert_eq!(
        emails[0].email.headers.get("X-Environment"),
        Some(&"staging".to_string())
    );
}

/// Test that multiple interceptors apply in order, and a block stops delivery.
#[tokio::test]
async fn test_chain_stops_at_block() {
    let local = LocalMailer::new();
    let mailer = local
        .clone()
        .with_interceptor(|email: Email| -> Result<Email, MailError> {
            Ok(email.header("X-First", "1"))
        })
        .with_interceptor(|_email: Email| -> Result<Email, MailError> {
            Err(MailError::SendError("Blocked".into()))
        });

    let result = mailer.deliver(&Email::new().to("member@example.com")).await;
    assert!(result.is_err());
    assert_no_emails_sent(&local);
}

/// Test that a struct implementing Interceptor works.
#[tokio::test]
async fn test_struct_interceptor() {
    struct Blocklist(Vec<&'static str>);

    impl Interceptor for Blocklist {
        fn intercept(&self, email: Email) -> Result<Email, MailError> {
            if email.to.iter().any(|a| self.0.contains(&a.email.as_str())) {
                return Err(MailError::SendError("recipient is blocklisted".into()));
            }
            Ok(email)
        }
    }

    let local = LocalMailer::new();
    let mailer = local.clone().with_interceptor(Blocklist(vec!["spam@example.com"]));

    assert!(mailer.deliver(&Email::new().to("spam@example.com")).await.is_err());
    assert!(mailer.deliver(&Email::new().to("ham@example.com")).await.is_ok());
    assert_email_count(&local, 1);
}

/// Test that provider_name is preserved through the interceptor wrapper.
#[test]
fn test_interceptor_preserves_provider_name() {
    let mailer = LocalMailer::new().with_interceptor(redirect_to_staging);
    assert_eq!(mailer.provider_name(), "local");
}

/// Every queued notification is redirected, whoever the task names.
#[tokio::test]
async fn test_dispatcher_through_redirect() {
    let local = LocalMailer::new();
    let mailer = local.clone().with_interceptor(redirect_to_staging);
    let config = DispatchConfig::default().drain(DrainPolicy::Flush);
    let mut dispatcher = Dispatcher::new(mailer, config).unwrap();
    let sender = dispatcher.sender();

    for member in ["a@example.com", "b@example.com"] {
        let task = MailTask::new(member, Email::new().subject("Registered")).unwrap();
        sender.enqueue(task).await.unwrap();
    }
    dispatcher.start(1).unwrap();
    let report = dispatcher.shutdown().await;

    assert_eq!(report.delivered, 2);
    assert_delivery_order(
        &local,
        &["inbox@staging.example.com", "inbox@staging.example.com"],
    );
    assert_no_emails_to(&local, "a@example.com");
}

/// A blocked task keeps being retried until shutdown reports it.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dispatcher_retries_blocked_task() {
    let local = LocalMailer::new();
    let mailer = local
        .clone()
        .with_interceptor(|email: Email| -> Result<Email, MailError> {
            if email.to.iter().any(|a| a.email.ends_with("@blocked.example.com")) {
                return Err(MailError::SendError("Blocked domain".into()));
            }
            Ok(email)
        });
    let config = DispatchConfig::default().retry_delay(Duration::from_millis(5));
    let mut dispatcher = Dispatcher::new(mailer, config).unwrap();
    let sender = dispatcher.sender();

    let blocked = MailTask::new("x@blocked.example.com", Email::new()).unwrap();
    sender.enqueue(blocked.clone()).await.unwrap();
    sender
        .enqueue(MailTask::new("y@example.com", Email::new()).unwrap())
        .await
        .unwrap();
    dispatcher.start(2).unwrap();

    assert!(wait_for_emails(&local, 1, Duration::from_secs(5)).await);
    tokio::time::sleep(Duration::from_millis(30)).await;
    let report = dispatcher.shutdown().await;

    assert!(report.failed_attempts >= 2);
    assert_eq!(report.undelivered, vec![blocked]);
    assert_email_to(&local, "y@example.com");
}
