//! Error types for mailpost.

use std::fmt;

use thiserror::Error;

/// A step of the delivery pipeline, used to label timeouts and failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// TCP/TLS establishment and the server greeting.
    Connect,
    /// Credential authentication.
    Auth,
    /// `MAIL FROM` envelope command.
    MailFrom,
    /// `RCPT TO` envelope command.
    RcptTo,
    /// `DATA` command and message transfer.
    Data,
    /// Session termination.
    Quit,
    /// Composite send on the plain path (connect through quit).
    Send,
}

impl Phase {
    /// Lowercase label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Connect => "connect",
            Phase::Auth => "auth",
            Phase::MailFrom => "mail_from",
            Phase::RcptTo => "rcpt_to",
            Phase::Data => "data",
            Phase::Quit => "quit",
            Phase::Send => "send",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur when resolving configuration or sending emails.
#[derive(Debug, Clone, Error)]
pub enum MailError {
    /// Missing or malformed configuration (e.g. an unparseable port).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Template missing, unparseable, or failed to render.
    #[error("Template error: {0}")]
    TemplateError(String),

    /// TCP or TLS establishment failed, or the connection dropped.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The server rejected the credentials.
    #[error("Authentication error: {0}")]
    AuthError(String),

    /// The server rejected an envelope or data command.
    #[error(
        "Protocol error{}: {}",
        .code.map(|c| format!(" ({c})")).unwrap_or_default(),
        .message
    )]
    ProtocolError {
        /// SMTP reply code, when the server sent one.
        code: Option<u16>,
        /// Server reply text or client-side description.
        message: String,
    },

    /// An address could not be used as an SMTP envelope address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// A delivery phase exceeded its deadline.
    #[error("Timed out during {0}")]
    Timeout(Phase),

    /// The caller cancelled the send before it completed.
    #[error("Send cancelled")]
    Cancelled,
}

impl MailError {
    /// Create a protocol error carrying the server's reply code.
    pub fn protocol(code: u16, message: impl Into<String>) -> Self {
        Self::ProtocolError {
            code: Some(code),
            message: message.into(),
        }
    }

    /// The SMTP reply code attached to this error, if any.
    pub fn code(&self) -> Option<u16> {
        match self {
            Self::ProtocolError { code, .. } => *code,
            _ => None,
        }
    }
}

impl From<minijinja::Error> for MailError {
    fn from(err: minijinja::Error) -> Self {
        Self::TemplateError(err.to_string())
    }
}

impl From<serde_yaml::Error> for MailError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Configuration(err.to_string())
    }
}

impl From<lettre::address::AddressError> for MailError {
    fn from(err: lettre::address::AddressError) -> Self {
        Self::InvalidAddress(err.to_string())
    }
}
