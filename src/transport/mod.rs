//! Delivery backends.
//!
//! A [`Transport`] offers the two delivery paths a [`Mailer`](crate::Mailer)
//! chooses between:
//!
//! - **Implicit TLS**: [`Transport::connect_tls`] opens a TLS-wrapped SMTP
//!   session and hands back an [`SmtpSession`]. The mailer drives it command by
//!   command (AUTH, MAIL FROM, RCPT TO, DATA, QUIT) with a deadline per phase.
//! - **Plain SMTP**: [`Transport::send_plain`] performs the whole exchange in
//!   one composite call.
//!
//! ## Available Transports
//!
//! | Transport | Description |
//! |-----------|-------------|
//! | [`SmtpTransport`] | Real SMTP via lettre |
//! | [`LoggerTransport`] | Logs what would be sent, never connects |
//! | [`RecordingTransport`](crate::testing::RecordingTransport) | Scriptable in-memory transport for tests |
//!
//! Both traits use `#[async_trait]` so sessions can be held across awaits in
//! generic code without naming their future types.

use async_trait::async_trait;

use crate::config::SmtpConfig;
use crate::error::MailError;
use crate::message::Envelope;

mod logger;
mod smtp;

pub use logger::{LoggerSession, LoggerTransport};
pub use smtp::{LettreSession, SmtpTransport};

/// An open SMTP session, already past the greeting and EHLO.
///
/// Every method maps to one protocol step. Implementations return the
/// server's rejection as an error; they never retry.
#[async_trait]
pub trait SmtpSession: Send {
    /// Authenticate with PLAIN credentials.
    async fn authenticate(&mut self, username: &str, password: &str) -> Result<(), MailError>;

    /// Issue `MAIL FROM`.
    async fn mail_from(&mut self, from: &str) -> Result<(), MailError>;

    /// Issue `RCPT TO` for one recipient.
    async fn rcpt_to(&mut self, recipient: &str) -> Result<(), MailError>;

    /// Issue `DATA`, transmit `message`, and finish the data stream.
    async fn data(&mut self, message: &[u8]) -> Result<(), MailError>;

    /// Issue `QUIT` and close the connection.
    async fn quit(&mut self) -> Result<(), MailError>;
}

/// A way of reaching an SMTP server.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Session type returned by [`connect_tls`](Self::connect_tls).
    type Session: SmtpSession;

    /// Open an implicit-TLS session to `config.host:config.port`.
    ///
    /// The TLS handshake completes before any SMTP traffic. Certificate
    /// verification follows `config.insecure_skip_verify`.
    async fn connect_tls(&self, config: &SmtpConfig) -> Result<Self::Session, MailError>;

    /// Deliver `message` over plain SMTP in one exchange.
    async fn send_plain(
        &self,
        config: &SmtpConfig,
        envelope: &Envelope,
        message: &[u8],
    ) -> Result<(), MailError>;

    /// Transport name (for logging/debugging).
    fn name(&self) -> &'static str {
        "unknown"
    }
}
