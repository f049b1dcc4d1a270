//! In-memory transport for testing delivery logic without a server.
//!
//! [`RecordingTransport`] records every protocol step a [`Mailer`](crate::Mailer)
//! performs and can be scripted to fail or stall at any of them.
//!
//! # Example
//!
//! ```rust,ignore
//! use mailpost::testing::{Call, RecordingTransport};
//! use mailpost::{Email, MailError, Mailer, SmtpConfig};
//!
//! #[tokio::test]
//! async fn test_rejected_recipient() {
//!     let transport = RecordingTransport::new();
//!     transport.reject_recipient("b@example.com", MailError::protocol(550, "no such user"));
//!
//!     let config = SmtpConfig::new("smtp.example.com", 465).use_tls(true);
//!     let mailer = Mailer::with_transport(config, transport.clone());
//!
//!     let email = Email::new().to("a@example.com").to("b@example.com").to("c@example.com");
//!     assert!(mailer.send(&email).await.is_err());
//!     assert_eq!(transport.recipients(), vec!["a@example.com", "b@example.com"]);
//! }
//! ```

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::SmtpConfig;
use crate::error::{MailError, Phase};
use crate::message::Envelope;
use crate::transport::{SmtpSession, Transport};

/// One recorded transport interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    /// Implicit-TLS session opened.
    ConnectTls {
        address: String,
        insecure_skip_verify: bool,
    },
    /// PLAIN authentication attempted.
    Auth { username: String },
    /// `MAIL FROM` issued.
    MailFrom(String),
    /// `RCPT TO` issued.
    RcptTo(String),
    /// `DATA` issued with this message.
    Data(String),
    /// `QUIT` issued.
    Quit,
    /// Composite plain-SMTP send.
    SendPlain {
        address: String,
        username: String,
        envelope: Envelope,
        message: String,
    },
}

#[derive(Debug, Default)]
struct Script {
    connect: Option<MailError>,
    auth: Option<MailError>,
    mail_from: Option<MailError>,
    rejected: HashMap<String, MailError>,
    data: Option<MailError>,
    quit: Option<MailError>,
    plain: Option<MailError>,
    stall: Option<Phase>,
}

#[derive(Debug, Default)]
struct State {
    calls: Mutex<Vec<Call>>,
    script: Mutex<Script>,
}

impl State {
    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }

    fn stalls_at(&self, phase: Phase) -> bool {
        self.script.lock().stall == Some(phase)
    }

    async fn step(&self, phase: Phase, call: Call, failure: Option<MailError>) -> Result<(), MailError> {
        self.record(call);
        if self.stalls_at(phase) {
            std::future::pending::<()>().await;
        }
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Transport that records calls instead of connecting.
///
/// Clones share state, so keep a clone for assertions after handing one to
/// a mailer.
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    state: Arc<State>,
}

impl RecordingTransport {
    /// Create a transport where every step succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Failure Simulation
    // =========================================================================

    /// Fail the TLS connect with `err`.
    pub fn fail_connect(&self, err: MailError) {
        self.state.script.lock().connect = Some(err);
    }

    /// Fail authentication with `err`.
    pub fn fail_auth(&self, err: MailError) {
        self.state.script.lock().auth = Some(err);
    }

    /// Fail `MAIL FROM` with `err`.
    pub fn fail_mail_from(&self, err: MailError) {
        self.state.script.lock().mail_from = Some(err);
    }

    /// Reject `RCPT TO` for `recipient` with `err`.
    pub fn reject_recipient(&self, recipient: impl Into<String>, err: MailError) {
        self.state
            .script
            .lock()
            .rejected
            .insert(recipient.into(), err);
    }

    /// Fail `DATA` with `err`.
    pub fn fail_data(&self, err: MailError) {
        self.state.script.lock().data = Some(err);
    }

    /// Fail `QUIT` with `err`.
    pub fn fail_quit(&self, err: MailError) {
        self.state.script.lock().quit = Some(err);
    }

    /// Fail the composite plain send with `err`.
    pub fn fail_plain(&self, err: MailError) {
        self.state.script.lock().plain = Some(err);
    }

    /// Never complete the given phase (after recording it).
    pub fn stall(&self, phase: Phase) {
        self.state.script.lock().stall = Some(phase);
    }

    // =========================================================================
    // Call Access (for testing assertions)
    // =========================================================================

    /// All recorded calls, oldest first.
    pub fn calls(&self) -> Vec<Call> {
        self.state.calls.lock().clone()
    }

    /// Clear recorded calls. The failure script is kept.
    pub fn clear(&self) {
        self.state.calls.lock().clear();
    }

    /// Whether the implicit-TLS path was taken.
    pub fn used_tls(&self) -> bool {
        self.calls()
            .iter()
            .any(|c| matches!(c, Call::ConnectTls { .. }))
    }

    /// Whether the plain path was taken.
    pub fn used_plain(&self) -> bool {
        self.calls()
            .iter()
            .any(|c| matches!(c, Call::SendPlain { .. }))
    }

    /// Recipients in the order `RCPT TO` was issued (TLS path).
    pub fn recipients(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::RcptTo(addr) => Some(addr),
                _ => None,
            })
            .collect()
    }

    /// The last message transmitted on either path.
    pub fn last_message(&self) -> Option<String> {
        self.calls().into_iter().rev().find_map(|c| match c {
            Call::Data(message) => Some(message),
            Call::SendPlain { message, .. } => Some(message),
            _ => None,
        })
    }

    /// Whether `QUIT` was issued.
    pub fn quit_sent(&self) -> bool {
        self.calls().contains(&Call::Quit)
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    type Session = RecordingSession;

    async fn connect_tls(&self, config: &SmtpConfig) -> Result<RecordingSession, MailError> {
        let failure = self.state.script.lock().connect.clone();
        self.state
            .step(
                Phase::Connect,
                Call::ConnectTls {
                    address: config.address(),
                    insecure_skip_verify: config.insecure_skip_verify,
                },
                failure,
            )
            .await?;
        Ok(RecordingSession {
            state: Arc::clone(&self.state),
        })
    }

    async fn send_plain(
        &self,
        config: &SmtpConfig,
        envelope: &Envelope,
        message: &[u8],
    ) -> Result<(), MailError> {
        let failure = self.state.script.lock().plain.clone();
        self.state
            .step(
                Phase::Send,
                Call::SendPlain {
                    address: config.address(),
                    username: config.username.clone(),
                    envelope: envelope.clone(),
                    message: String::from_utf8_lossy(message).into_owned(),
                },
                failure,
            )
            .await
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Session handed out by [`RecordingTransport`].
#[derive(Debug)]
pub struct RecordingSession {
    state: Arc<State>,
}

#[async_trait]
impl SmtpSession for RecordingSession {
    async fn authenticate(&mut self, username: &str, _password: &str) -> Result<(), MailError> {
        let failure = self.state.script.lock().auth.clone();
        let call = Call::Auth {
            username: username.to_string(),
        };
        self.state.step(Phase::Auth, call, failure).await
    }

    async fn mail_from(&mut self, from: &str) -> Result<(), MailError> {
        let failure = self.state.script.lock().mail_from.clone();
        self.state
            .step(Phase::MailFrom, Call::MailFrom(from.to_string()), failure)
            .await
    }

    async fn rcpt_to(&mut self, recipient: &str) -> Result<(), MailError> {
        let failure = self.state.script.lock().rejected.get(recipient).cloned();
        self.state
            .step(Phase::RcptTo, Call::RcptTo(recipient.to_string()), failure)
            .await
    }

    async fn data(&mut self, message: &[u8]) -> Result<(), MailError> {
        let failure = self.state.script.lock().data.clone();
        let call = Call::Data(String::from_utf8_lossy(message).into_owned());
        self.state.step(Phase::Data, call, failure).await
    }

    async fn quit(&mut self) -> Result<(), MailError> {
        let failure = self.state.script.lock().quit.clone();
        self.state.step(Phase::Quit, Call::Quit, failure).await
    }
}
