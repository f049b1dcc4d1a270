//! Logger transport that only logs emails.
//!
//! Useful for staging environments or when you want to see what would be sent
//! without opening a connection.

use async_trait::async_trait;

use crate::config::SmtpConfig;
use crate::error::MailError;
use crate::message::Envelope;
use crate::transport::{SmtpSession, Transport};

/// Logger transport that emits tracing events instead of talking SMTP.
#[derive(Debug, Clone, Default)]
pub struct LoggerTransport {
    /// If true, log the full message at debug level.
    log_full: bool,
}

impl LoggerTransport {
    /// Create a logger transport with brief output (envelope only).
    pub fn new() -> Self {
        Self { log_full: false }
    }

    /// Create a logger transport that also logs message contents.
    pub fn full() -> Self {
        Self { log_full: true }
    }

    /// Set whether to log message contents.
    pub fn log_full(mut self, full: bool) -> Self {
        self.log_full = full;
        self
    }

    fn log_message(&self, from: &str, recipients: &[String], message: &[u8], tls: bool) {
        tracing::info!(
            from = %from,
            recipients = ?recipients,
            bytes = message.len(),
            tls,
            "Email logged"
        );
        if self.log_full {
            tracing::debug!(message = %String::from_utf8_lossy(message), "Message contents");
        }
    }
}

#[async_trait]
impl Transport for LoggerTransport {
    type Session = LoggerSession;

    async fn connect_tls(&self, config: &SmtpConfig) -> Result<LoggerSession, MailError> {
        tracing::debug!(address = %config.address(), "Logger session opened");
        Ok(LoggerSession {
            transport: self.clone(),
            from: String::new(),
            recipients: Vec::new(),
        })
    }

    async fn send_plain(
        &self,
        _config: &SmtpConfig,
        envelope: &Envelope,
        message: &[u8],
    ) -> Result<(), MailError> {
        self.log_message(&envelope.from, &envelope.recipients, message, false);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "logger"
    }
}

/// Session that collects the envelope and logs on `DATA`.
#[derive(Debug)]
pub struct LoggerSession {
    transport: LoggerTransport,
    from: String,
    recipients: Vec<String>,
}

#[async_trait]
impl SmtpSession for LoggerSession {
    async fn authenticate(&mut self, username: &str, _password: &str) -> Result<(), MailError> {
        tracing::debug!(username = %username, "Logger session authenticated");
        Ok(())
    }

    async fn mail_from(&mut self, from: &str) -> Result<(), MailError> {
        self.from = from.to_string();
        Ok(())
    }

    async fn rcpt_to(&mut self, recipient: &str) -> Result<(), MailError> {
        self.recipients.push(recipient.to_string());
        Ok(())
    }

    async fn data(&mut self, message: &[u8]) -> Result<(), MailError> {
        self.transport
            .log_message(&self.from, &self.recipients, message, true);
        Ok(())
    }

    async fn quit(&mut self) -> Result<(), MailError> {
        Ok(())
    }
}
