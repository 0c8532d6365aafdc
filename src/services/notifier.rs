use crate::error::Result;
use crate::models::SmtpConfig;
use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::Arc;
use tracing::info;

/// Sink for alert and digest emails
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, recipients: &[String], subject: &str, body: &str) -> Result<()>;
}

pub type SharedNotifier = Arc<dyn Notifier>;

/// Sends plain-text email through an authenticated SMTP relay
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let credentials = Credentials::new(config.username.clone(), config.password.clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?
            .credentials(credentials)
            .build();
        let from: Mailbox = config.from.parse()?;

        info!(host = %config.host, from = %config.from, "Created SMTP notifier");
        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, recipients: &[String], subject: &str, body: &str) -> Result<()> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(subject)
            .header(ContentType::TEXT_PLAIN);

        for recipient in recipients {
            builder = builder.to(recipient.parse()?);
        }

        let message = builder.body(body.to_string())?;
        self.transport.send(message).await?;

        info!(recipients = recipients.len(), subject, "Email sent");
        Ok(())
    }
}

/// Writes messages to the log instead of sending them
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, recipients: &[String], subject: &str, body: &str) -> Result<()> {
        info!(recipients = ?recipients, subject, "Dry run, email not sent:\n{}", body);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_notifier_always_succeeds() {
        let notifier = LogNotifier;
        let recipients = vec!["a@example.com".to_string()];
        assert!(notifier.send(&recipients, "subject", "body").await.is_ok());
    }

    #[test]
    fn test_smtp_notifier_rejects_bad_sender() {
        let config = SmtpConfig {
            host: "smtp.example.com".to_string(),
            username: "user".to_string(),
            password: "secret".to_string(),
            from: "not an address".to_string(),
            recipients: vec!["a@example.com".to_string()],
        };
        assert!(SmtpNotifier::new(&config).is_err());
    }
}
