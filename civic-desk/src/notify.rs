//! Staff notifications.
//!
//! Email goes out over SMTP with the blocking `lettre` transport, run on the
//! blocking pool. When SMTP is disabled the [`LogNotifier`] records the
//! notification in the log instead.

use std::sync::Arc;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::info;

use civic_common::SmtpConfig;

use crate::error::{DeskError, DeskResult};

/// One email to a staff member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn notify(&self, notification: &Notification) -> DeskResult<()>;
}

/// Pick the notifier the config asks for.
pub fn from_config(config: &SmtpConfig) -> Arc<dyn Notifier> {
    if config.enabled {
        Arc::new(SmtpNotifier::new(config.clone()))
    } else {
        info!("SMTP disabled, staff notifications will only be logged");
        Arc::new(LogNotifier)
    }
}

pub struct SmtpNotifier {
    config: SmtpConfig,
}

impl SmtpNotifier {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    fn sender(&self) -> DeskResult<Mailbox> {
        let address = self
            .config
            .from_address
            .parse()
            .map_err(|e| DeskError::Validation(format!("Invalid from address: {e}")))?;
        let name = Some(self.config.from_name.clone()).filter(|n| !n.is_empty());
        Ok(Mailbox::new(name, address))
    }

    /// Build the HTML email.
    pub fn build_message(&self, notification: &Notification) -> DeskResult<Message> {
        let to: Mailbox = notification
            .to
            .parse()
            .map_err(|e| DeskError::Validation(format!("Invalid recipient: {e}")))?;

        Message::builder()
            .from(self.sender()?)
            .to(to)
            .subject(notification.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(notification.html.clone())
            .map_err(|e| DeskError::Validation(format!("Failed to build email: {e}")))
    }

    fn create_smtp_transport(config: &SmtpConfig) -> DeskResult<SmtpTransport> {
        let creds = Credentials::new(config.username.clone(), config.password.clone());
        let transport = if config.tls {
            SmtpTransport::relay(&config.host)
                .map_err(|e| DeskError::Transport(format!("SMTP setup failed: {e}")))?
                .port(config.port)
                .credentials(creds)
                .build()
        } else {
            SmtpTransport::builder_dangerous(&config.host)
                .port(config.port)
                .credentials(creds)
                .build()
        };
        Ok(transport)
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    fn name(&self) -> &'static str {
        "smtp"
    }

    async fn notify(&self, notification: &Notification) -> DeskResult<()> {
        let email = self.build_message(notification)?;
        let config = self.config.clone();

        tokio::task::spawn_blocking(move || -> DeskResult<()> {
            let transport = SmtpNotifier::create_smtp_transport(&config)?;
            transport
                .send(&email)
                .map_err(|e| DeskError::Transport(format!("SMTP send failed: {e}")))?;
            Ok(())
        })
        .await??;

        info!(subject = %notification.subject, "Staff email sent");
        Ok(())
    }
}

/// Writes notifications to the log only.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn notify(&self, notification: &Notification) -> DeskResult<()> {
        info!(
            subject = %notification.subject,
            bytes = notification.html.len(),
            "Staff notification (SMTP disabled)"
        );
        Ok(())
    }
}
