use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::config::EmailConfig;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    #[error("failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    #[error("invalid email address: {0}")]
    InvalidAddress(String),
}

/// Reusable SMTP transport, built once at startup and cloned into detached
/// notification tasks. Stateless per call; the connection pool lives inside
/// the lettre transport.
#[derive(Clone)]
pub struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl Mailer {
    pub fn new(config: &EmailConfig) -> Result<Self, MailError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        let from = config
            .from_address
            .parse::<Mailbox>()
            .map_err(|_| MailError::InvalidAddress(config.from_address.clone()))?;

        Ok(Self { transport, from })
    }

    /// Send one HTML message addressed to every recipient in `to`.
    pub async fn send_html(
        &self,
        to: &[String],
        subject: &str,
        html: String,
    ) -> Result<(), MailError> {
        let mut builder = Message::builder().from(self.from.clone()).subject(subject);
        for addr in to {
            let mailbox = addr
                .parse::<Mailbox>()
                .map_err(|_| MailError::InvalidAddress(addr.clone()))?;
            builder = builder.to(mailbox);
        }

        let message = builder.header(ContentType::TEXT_HTML).body(html)?;
        self.transport.send(message).await?;

        tracing::info!(recipients = to.len(), subject = %subject, "email sent");
        Ok(())
    }
}
