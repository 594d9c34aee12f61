// SMTP delivery
// Messages are validated on the caller's thread, then delivered by one
// background task so a slow relay never stalls request handling.

use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tokio::sync::mpsc;

use super::{MailError, Mailer, OutboundMessage};
use crate::config::MailConfig;
use crate::logger;

pub struct SmtpMailer {
    from: Mailbox,
    queue: mpsc::UnboundedSender<Message>,
}

impl SmtpMailer {
    /// Build the transport and spawn the delivery task.
    /// Must be called from within a Tokio runtime.
    pub fn start(config: &MailConfig) -> Result<Self, MailError> {
        let from: Mailbox = config
            .sender
            .parse()
            .map_err(|_| MailError::Address(config.sender.clone()))?;
        let transport = build_transport(config)?;
        let (queue, mut rx) = mpsc::unbounded_channel::<Message>();

        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                match transport.send(message).await {
                    Ok(_) => logger::log_debug("[Mail] Message delivered"),
                    Err(e) => logger::log_error(&format!("[Mail] Delivery failed: {e}")),
                }
            }
            logger::log_debug("[Mail] Delivery task stopped");
        });

        logger::log_info(&format!(
            "[Mail] Relay {}:{} (tls: {})",
            config.server, config.port, config.use_tls
        ));
        Ok(Self { from, queue })
    }
}

fn build_transport(config: &MailConfig) -> Result<AsyncSmtpTransport<Tokio1Executor>, MailError> {
    let mut builder = if config.use_tls {
        AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.server)
            .map_err(|e| MailError::Transport(e.to_string()))?
    } else {
        AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.server)
    };
    builder = builder.port(config.port);

    if let (Some(username), Some(password)) = (&config.username, &config.password) {
        builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
    } else {
        logger::log_warning("[Mail] MAIL_USERNAME/MAIL_PASSWORD not set; sending unauthenticated");
    }
    Ok(builder.build())
}

impl Mailer for SmtpMailer {
    fn send(&self, message: OutboundMessage) -> Result<(), MailError> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(message.subject);
        for to in &message.to {
            let mailbox: Mailbox = to.parse().map_err(|_| MailError::Address(to.clone()))?;
            builder = builder.to(mailbox);
        }
        let email = builder
            .multipart(MultiPart::alternative_plain_html(message.text, message.html))
            .map_err(|e| MailError::Build(e.to_string()))?;

        self.queue.send(email).map_err(|_| MailError::QueueClosed)
    }
}
