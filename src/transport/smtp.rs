//! SMTP transport using lettre.
//!
//! # Example
//!
//! ```rust,ignore
//! use mailpost::{Mailer, SmtpConfig};
//! use mailpost::transport::SmtpTransport;
//!
//! let config = SmtpConfig::new("smtp.example.com", 465)
//!     .credentials("alerts@example.com", "app-password")
//!     .from("alerts@example.com")
//!     .use_tls(true);
//!
//! let mailer = Mailer::with_transport(config, SmtpTransport::new().hello_name("alerts.example.com"));
//! ```

use async_trait::async_trait;
use lettre::{
    address::{Address, Envelope as LettreEnvelope},
    transport::smtp::{
        authentication::{Credentials, Mechanism},
        client::{AsyncSmtpConnection, TlsParameters},
        commands::{Data, Mail, Rcpt},
        extension::ClientId,
        response::Code,
        Error as SmtpError,
    },
    AsyncSmtpTransport, AsyncTransport, Tokio1Executor,
};

use crate::config::SmtpConfig;
use crate::error::{MailError, Phase};
use crate::message::Envelope;
use crate::transport::{SmtpSession, Transport};

/// Name announced in `EHLO` unless overridden.
const DEFAULT_HELLO_NAME: &str = "localhost";

/// SMTP transport.
#[derive(Debug, Clone)]
pub struct SmtpTransport {
    hello_name: String,
}

impl Default for SmtpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl SmtpTransport {
    /// Create a transport announcing `localhost` in `EHLO`.
    pub fn new() -> Self {
        Self {
            hello_name: DEFAULT_HELLO_NAME.to_string(),
        }
    }

    /// Set the name announced in `EHLO`.
    pub fn hello_name(mut self, name: impl Into<String>) -> Self {
        self.hello_name = name.into();
        self
    }

    fn client_id(&self) -> ClientId {
        ClientId::Domain(self.hello_name.clone())
    }
}

#[async_trait]
impl Transport for SmtpTransport {
    type Session = LettreSession;

    async fn connect_tls(&self, config: &SmtpConfig) -> Result<LettreSession, MailError> {
        if config.insecure_skip_verify {
            tracing::warn!(
                host = %config.host,
                "TLS certificate verification disabled for SMTP connection"
            );
        }

        let tls = TlsParameters::builder(config.host.clone())
            .dangerous_accept_invalid_certs(config.insecure_skip_verify)
            .build()
            .map_err(|e| MailError::ConnectionError(format!("TLS setup failed: {}", e)))?;

        let connection = AsyncSmtpConnection::connect_tokio1(
            (config.host.as_str(), config.port),
            Some(config.timeouts.connect),
            &self.client_id(),
            Some(tls),
            None,
        )
        .await
        .map_err(|e| classify(e, Phase::Connect))?;

        tracing::debug!(address = %config.address(), "SMTP session opened over TLS");
        Ok(LettreSession { connection })
    }

    async fn send_plain(
        &self,
        config: &SmtpConfig,
        envelope: &Envelope,
        message: &[u8],
    ) -> Result<(), MailError> {
        let from: Address = envelope.from.parse()?;
        let to = envelope
            .recipients
            .iter()
            .map(|r| r.parse::<Address>())
            .collect::<Result<Vec<_>, _>>()?;
        let envelope = LettreEnvelope::new(Some(from), to)
            .map_err(|e| MailError::InvalidAddress(e.to_string()))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
            .port(config.port)
            .hello_name(self.client_id())
            .timeout(Some(config.timeouts.command));
        if !config.username.is_empty() {
            builder = builder
                .credentials(Credentials::new(
                    config.username.clone(),
                    config.password.clone(),
                ))
                .authentication(vec![Mechanism::Plain]);
        }

        builder
            .build()
            .send_raw(&envelope, message)
            .await
            .map_err(|e| classify(e, Phase::Send))?;

        Ok(())
    }

    fn name(&self) -> &'static str {
        "smtp"
    }
}

/// A lettre SMTP connection driven one command at a time.
pub struct LettreSession {
    connection: AsyncSmtpConnection,
}

#[async_trait]
impl SmtpSession for LettreSession {
    async fn authenticate(&mut self, username: &str, password: &str) -> Result<(), MailError> {
        let credentials = Credentials::new(username.to_string(), password.to_string());
        self.connection
            .auth(&[Mechanism::Plain], &credentials)
            .await
            .map_err(|e| classify(e, Phase::Auth))?;
        Ok(())
    }

    async fn mail_from(&mut self, from: &str) -> Result<(), MailError> {
        let from: Address = from.parse()?;
        self.connection
            .command(Mail::new(Some(from), vec![]))
            .await
            .map_err(|e| classify(e, Phase::MailFrom))?;
        Ok(())
    }

    async fn rcpt_to(&mut self, recipient: &str) -> Result<(), MailError> {
        let recipient: Address = recipient.parse()?;
        self.connection
            .command(Rcpt::new(recipient, vec![]))
            .await
            .map_err(|e| classify(e, Phase::RcptTo))?;
        Ok(())
    }

    async fn data(&mut self, message: &[u8]) -> Result<(), MailError> {
        self.connection
            .command(Data)
            .await
            .map_err(|e| classify(e, Phase::Data))?;
        self.connection
            .message(message)
            .await
            .map_err(|e| classify(e, Phase::Data))?;
        Ok(())
    }

    async fn quit(&mut self) -> Result<(), MailError> {
        self.connection
            .quit()
            .await
            .map_err(|e| classify(e, Phase::Quit))?;
        Ok(())
    }
}

/// Reply codes that mean the credentials were refused or required.
fn is_auth_code(code: u16) -> bool {
    matches!(code, 530 | 534 | 535 | 538)
}

fn reply_code(code: Code) -> Option<u16> {
    code.to_string().parse().ok()
}

/// Map a lettre error into the taxonomy for the phase it happened in.
fn classify(err: SmtpError, phase: Phase) -> MailError {
    if err.is_timeout() {
        return MailError::Timeout(phase);
    }

    let code = err.status().and_then(reply_code);
    let message = err.to_string();

    match phase {
        Phase::Connect => MailError::ConnectionError(message),
        Phase::Auth if code.is_some() || err.is_client() => MailError::AuthError(message),
        _ => match code {
            Some(code) if is_auth_code(code) => MailError::AuthError(message),
            Some(code) => MailError::ProtocolError {
                code: Some(code),
                message,
            },
            None => MailError::ConnectionError(message),
        },
    }
}
