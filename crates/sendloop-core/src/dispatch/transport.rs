//! SMTP Transport - Outbound delivery through lettre

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use sendloop_common::config::{SenderConfig, SmtpConfig};

/// Delivery errors, split by blast radius
#[derive(Error, Debug)]
pub enum MailerError {
    /// This message was rejected; the rest of the batch can continue
    #[error("message rejected: {0}")]
    Message(String),

    /// The transport itself is unusable; the whole batch fails
    #[error("transport failure: {0}")]
    Transport(String),
}

/// One rendered outbound email
#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub to_email: String,
    pub to_name: String,
    pub subject: String,
    pub html_body: String,
}

/// Outbound mail delivery
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send one email, returning the generated Message-ID
    async fn send(&self, email: &OutgoingEmail) -> Result<String, MailerError>;
}

/// Lettre-backed SMTP mailer
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Create a mailer from SMTP and sender configuration
    pub fn new(smtp: &SmtpConfig, sender: &SenderConfig) -> Result<Self, MailerError> {
        let transport = build_transport(smtp)?;

        let address: Address = sender
            .from_email
            .parse()
            .map_err(|e| MailerError::Transport(format!("invalid from address: {}", e)))?;
        let from = Mailbox::new(Some(sender.from_name.clone()), address);

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<String, MailerError> {
        let address: Address = email
            .to_email
            .parse()
            .map_err(|e| MailerError::Message(format!("invalid recipient address: {}", e)))?;
        let to = Mailbox::new(Some(email.to_name.clone()), address);

        let message_id = format!("<{}.{}@sendloop>", Uuid::new_v4(), Utc::now().timestamp());

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(&email.subject)
            .message_id(Some(message_id.clone()))
            .header(ContentType::TEXT_HTML)
            .body(email.html_body.clone())
            .map_err(|e| MailerError::Message(format!("failed to build email: {}", e)))?;

        match self.transport.send(message).await {
            Ok(response) => {
                debug!("Email sent: {:?}", response);
                Ok(message_id)
            }
            Err(e) => {
                // A server reply means the channel works and only this
                // message is affected; anything else takes down the batch.
                if e.is_permanent() || e.is_transient() {
                    Err(MailerError::Message(e.to_string()))
                } else {
                    Err(MailerError::Transport(e.to_string()))
                }
            }
        }
    }
}

/// Build the SMTP transport per the configured encryption mode
fn build_transport(
    config: &SmtpConfig,
) -> Result<AsyncSmtpTransport<Tokio1Executor>, MailerError> {
    let builder = if config.use_tls {
        AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
    } else if config.use_starttls {
        AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
    } else {
        Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(
            &config.host,
        ))
    };

    let mut builder = builder
        .map_err(|e| MailerError::Transport(format!("failed to create SMTP transport: {}", e)))?
        .port(config.port);

    if let (Some(username), Some(password)) = (&config.username, &config.password) {
        builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
    }

    Ok(builder.timeout(Some(Duration::from_secs(30))).build())
}
