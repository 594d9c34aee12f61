//! Outbound mail
//!
//! Handlers never wait on SMTP: a `Mailer` only accepts the message and
//! delivery happens elsewhere (see `SmtpMailer`).

mod smtp;

pub use smtp::SmtpMailer;

use thiserror::Error;

use crate::config::MailConfig;
use crate::templates::MailTemplate;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid address '{0}'")]
    Address(String),

    #[error("failed to build message: {0}")]
    Build(String),

    #[error("failed to render template: {0}")]
    Render(String),

    #[error("smtp transport error: {0}")]
    Transport(String),

    #[error("mail queue is closed")]
    QueueClosed,
}

/// A rendered message ready to hand to a mailer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub to: Vec<String>,
    pub subject: String,
    pub text: String,
    pub html: String,
}

pub trait Mailer: Send + Sync {
    /// Accept a message for delivery. Must not block on the network.
    fn send(&self, message: OutboundMessage) -> Result<(), MailError>;
}

/// Render `template` as text and HTML and queue it for `to`.
/// The subject is prefixed with `mail.subject_prefix`.
pub fn send_mail(
    mailer: &dyn Mailer,
    config: &MailConfig,
    to: &[&str],
    subject: &str,
    template: &dyn MailTemplate,
) -> Result<(), MailError> {
    let text = template
        .render_text()
        .map_err(|e| MailError::Render(e.to_string()))?;
    let html = template
        .render_html()
        .map_err(|e| MailError::Render(e.to_string()))?;

    mailer.send(OutboundMessage {
        to: to.iter().map(ToString::to_string).collect(),
        subject: format!("{}{subject}", config.subject_prefix),
        text,
        html,
    })
}

/// Keeps every message in memory
#[cfg(test)]
#[derive(Default)]
pub struct RecordingMailer {
    sent: std::sync::Mutex<Vec<OutboundMessage>>,
}

#[cfg(test)]
impl RecordingMailer {
    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl Mailer for RecordingMailer {
    fn send(&self, message: OutboundMessage) -> Result<(), MailError> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}
