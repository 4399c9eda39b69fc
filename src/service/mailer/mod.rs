//! Alert notifications by e-mail.

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use tracing::{info, instrument};

use crate::base::{
    config::Config,
    prompts,
    types::{Res, Void},
};

// Traits.

/// Generic mailer trait that notification transports must implement.
#[async_trait]
pub trait GenericMailer: Send + Sync + 'static {
    /// Send a weather alert carrying the given rationale.
    async fn send_alert(&self, rationale: &str) -> Void;
}

// Structs.

/// Mailer for the application.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct Mailer {
    inner: Arc<dyn GenericMailer>,
}

impl Deref for Mailer {
    type Target = dyn GenericMailer;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl Mailer {
    pub fn new(inner: Arc<dyn GenericMailer>) -> Self {
        Self { inner }
    }

    pub fn smtp(config: &Config) -> Res<Self> {
        Ok(Self::new(Arc::new(SmtpMailer::new(config)?)))
    }
}

// Specific implementations.

/// STARTTLS SMTP mailer that logs in as the sender.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
    receiver: Mailbox,
    subject: String,
}

impl SmtpMailer {
    #[instrument(name = "SmtpMailer::new", skip_all)]
    pub fn new(config: &Config) -> Res<Self> {
        if config.email_smtp_server.is_empty() {
            return Err(anyhow::anyhow!("An SMTP server (`email_smtp_server`) is required to send alerts."));
        }

        let sender: Mailbox = config.email_sender.parse().map_err(|e| anyhow::anyhow!("Invalid alert sender `{}`: {e}", config.email_sender))?;
        let receiver: Mailbox = config.email_receiver.parse().map_err(|e| anyhow::anyhow!("Invalid alert receiver `{}`: {e}", config.email_receiver))?;

        let credentials = Credentials::new(config.email_sender.clone(), config.email_password.clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.email_smtp_server)?
            .port(config.email_smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            transport,
            sender,
            receiver,
            subject: config.email_subject.clone(),
        })
    }

    /// Build the plaintext alert message.
    pub fn build_message(&self, rationale: &str) -> Res<Message> {
        let message = Message::builder()
            .from(self.sender.clone())
            .to(self.receiver.clone())
            .subject(self.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(prompts::alert_email_body(rationale))?;

        Ok(message)
    }
}

#[async_trait]
impl GenericMailer for SmtpMailer {
    #[instrument(skip_all)]
    async fn send_alert(&self, rationale: &str) -> Void {
        let message = self.build_message(rationale)?;

        self.transport.send(message).await?;

        info!("Alert e-mail sent to {}.", self.receiver);

        Ok(())
    }
}

// Tests.
