use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::MultiPart;
use lettre::transport::smtp::authentication::Credentials;
use lettre::AsyncSmtpTransport;
use lettre::AsyncTransport;
use lettre::Message;
use lettre::Tokio1Executor;

use crate::config::EmailConfig;
use crate::notification::errors::NotificationError;
use crate::notification::models::OutgoingEmail;
use crate::notification::ports::EmailTransport;

/// SMTP delivery, or a logging no-op when no host is configured.
pub struct SmtpEmailTransport {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
}

impl SmtpEmailTransport {
    /// Build the transport from configuration.
    ///
    /// # Arguments
    /// * `config` - Email settings; an empty `smtp_host` selects no-op mode
    ///
    /// # Errors
    /// * `TransportFailed` - SMTP relay could not be configured
    pub fn new(config: &EmailConfig) -> Result<Self, NotificationError> {
        if config.smtp_host.trim().is_empty() {
            tracing::warn!("SMTP host not configured, emails will only be logged");
            return Ok(Self { transport: None });
        }

        let builder = if config.use_starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
        }
        .map_err(|e| NotificationError::TransportFailed(e.to_string()))?
        .port(config.smtp_port);

        let builder = match (&config.smtp_username, &config.smtp_password) {
            (Some(username), Some(password)) => {
                builder.credentials(Credentials::new(username.to_string(), password.to_string()))
            }
            _ => builder,
        };

        tracing::info!(
            host = %config.smtp_host,
            port = config.smtp_port,
            "SMTP transport configured"
        );

        Ok(Self {
            transport: Some(builder.build()),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.transport.is_some()
    }
}

fn build_message(email: OutgoingEmail) -> Result<Message, NotificationError> {
    let from = email
        .from
        .parse::<Mailbox>()
        .map_err(|e| NotificationError::InvalidMessage(format!("sender: {}", e)))?;
    let to = email
        .to
        .as_str()
        .parse::<Mailbox>()
        .map_err(|e| NotificationError::InvalidMessage(format!("recipient: {}", e)))?;

    Message::builder()
        .from(from)
        .to(to)
        .subject(email.subject)
        .multipart(MultiPart::alternative_plain_html(email.text, email.html))
        .map_err(|e| NotificationError::InvalidMessage(e.to_string()))
}

#[async_trait]
impl EmailTransport for SmtpEmailTransport {
    async fn send_mail(&self, email: OutgoingEmail) -> Result<(), NotificationError> {
        let subject = email.subject.clone();
        let message = build_message(email)?;

        let Some(transport) = &self.transport else {
            tracing::info!(subject = %subject, "No-op email transport, email not sent");
            return Ok(());
        };

        transport
            .send(message)
            .await
            .map_err(|e| NotificationError::TransportFailed(e.to_string()))?;

        tracing::info!(subject = %subject, "Email sent");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authentication::models::EmailAddress;

    fn email(from: &str) -> OutgoingEmail {
        OutgoingEmail {
            from: from.to_string(),
            to: EmailAddress::new("a@x.com".to_string()).unwrap(),
            subject: "Confirm your email address".to_string(),
            html: "<p>hi</p>".to_string(),
            text: "hi".to_string(),
        }
    }

    fn no_op_config() -> EmailConfig {
        EmailConfig {
            smtp_host: String::new(),
            smtp_port: 587,
            smtp_username: None,
            smtp_password: None,
            use_starttls: true,
            from: "Auth <no-reply@example.com>".to_string(),
            templates_dir: "templates".to_string(),
        }
    }

    #[test]
    fn test_build_message_accepts_display_name_sender() {
        assert!(build_message(email("Auth <no-reply@example.com>")).is_ok());
    }

    #[test]
    fn test_build_message_rejects_invalid_sender() {
        assert!(matches!(
            build_message(email("not an address")),
            Err(NotificationError::InvalidMessage(_))
        ));
    }

    #[tokio::test]
    async fn test_no_op_transport_succeeds_without_server() {
        let transport = SmtpEmailTransport::new(&no_op_config()).unwrap();

        assert!(!transport.is_enabled());
        assert!(transport.send_mail(email("no-reply@example.com")).await.is_ok());
    }
}
