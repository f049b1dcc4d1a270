//! The send pipeline.
//!
//! A [`Mailer`] owns one [`SmtpConfig`] and a [`Transport`]. Each call to
//! [`Mailer::send`] renders the email, builds the envelope, and delivers it in
//! a single attempt:
//!
//! 1. Render headers and body ([`RenderedMessage`]). Template failures abort
//!    here, before any network I/O.
//! 2. Compute the recipient set: to, then cc, then bcc, duplicates kept.
//! 3. Dispatch on [`SmtpConfig::use_tls`]:
//!    - implicit TLS: connect, authenticate, `MAIL FROM`, `RCPT TO` per
//!      recipient (stopping at the first rejection), `DATA`, `QUIT`;
//!    - plain: one composite [`Transport::send_plain`] call.
//!
//! Every phase runs under its own deadline from [`SmtpConfig::timeouts`].
//! Once a TLS session is open, `QUIT` is attempted on every exit path.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "metrics")]
use std::time::Instant;

use tracing::Instrument;

use crate::config::SmtpConfig;
use crate::email::Email;
use crate::error::{MailError, Phase};
use crate::message::{Envelope, RenderedMessage};
use crate::template::Templates;
use crate::transport::{SmtpSession, SmtpTransport, Transport};

/// Renders and delivers emails for one SMTP account.
///
/// Holds no per-send state, so one mailer can serve concurrent sends, and
/// several mailers can share one `Arc<SmtpConfig>`.
///
/// # Example
///
/// ```rust,ignore
/// use mailpost::{ConfigResolver, Email, Mailer};
///
/// let config = ConfigResolver::new().resolve()?;
/// let mailer = Mailer::new(config).template_dir("email/templates");
///
/// let email = Email::new()
///     .to("ops@example.com")
///     .subject("Database alert")
///     .template("db_analysis.html")
///     .assign("Title", "Slow queries detected");
///
/// mailer.send(&email).await?;
/// ```
#[derive(Debug, Clone)]
pub struct Mailer<T = SmtpTransport> {
    config: Arc<SmtpConfig>,
    templates: Templates,
    transport: T,
}

impl Mailer<SmtpTransport> {
    /// Create a mailer delivering over real SMTP.
    pub fn new(config: impl Into<Arc<SmtpConfig>>) -> Self {
        Self::with_transport(config, SmtpTransport::new())
    }
}

impl<T: Transport> Mailer<T> {
    /// Create a mailer with a specific transport.
    pub fn with_transport(config: impl Into<Arc<SmtpConfig>>, transport: T) -> Self {
        Self {
            config: config.into(),
            templates: Templates::default(),
            transport,
        }
    }

    /// Load templates from `dir` instead of the default directory.
    pub fn template_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.templates = Templates::new(dir);
        self
    }

    /// The account configuration.
    pub fn config(&self) -> &SmtpConfig {
        &self.config
    }

    /// The transport used for delivery.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Render headers and body for `email` without sending.
    pub fn render(&self, email: &Email) -> Result<RenderedMessage, MailError> {
        RenderedMessage::build(email, &self.config.from, &self.templates)
    }

    /// The envelope `email` would be sent with.
    pub fn envelope(&self, email: &Email) -> Envelope {
        Envelope::new(self.config.from.as_str(), email)
    }

    /// Render and deliver `email`. Single attempt, no retry.
    pub async fn send(&self, email: &Email) -> Result<(), MailError> {
        let transport_name = self.transport.name();
        let span = tracing::info_span!(
            "mailpost.send",
            transport = transport_name,
            tls = self.config.use_tls,
            to = ?email.to,
            subject = %email.subject,
        );

        async move {
            tracing::debug!("Sending email");

            #[cfg(feature = "metrics")]
            let start = Instant::now();

            let result = self.dispatch(email).await;

            #[cfg(feature = "metrics")]
            {
                let duration = start.elapsed().as_secs_f64();
                let status = if result.is_ok() { "success" } else { "error" };
                metrics::counter!("mailpost_emails_total", "transport" => transport_name, "status" => status)
                    .increment(1);
                metrics::histogram!("mailpost_delivery_duration_seconds", "transport" => transport_name)
                    .record(duration);
            }

            match &result {
                Ok(()) => tracing::info!("Email sent"),
                Err(e) => tracing::error!(error = %e, "Email delivery failed"),
            }

            result
        }
        .instrument(span)
        .await
    }

    /// Like [`send`](Self::send), but gives up when `cancel` completes first.
    ///
    /// A cancelled send drops its connection without `QUIT` and returns
    /// [`MailError::Cancelled`].
    ///
    /// ```rust,ignore
    /// let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    /// mailer.send_until(&email, async { stop_rx.await.ok(); }).await?;
    /// ```
    pub async fn send_until<F>(&self, email: &Email, cancel: F) -> Result<(), MailError>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            result = self.send(email) => result,
            () = cancel => {
                tracing::warn!(to = ?email.to, "Email send cancelled");
                Err(MailError::Cancelled)
            }
        }
    }

    async fn dispatch(&self, email: &Email) -> Result<(), MailError> {
        let message = self.render(email)?.to_bytes();
        let envelope = self.envelope(email);
        let config = self.config.as_ref();

        if config.use_tls {
            self.send_tls(&envelope, &message).await
        } else {
            let budget = config.timeouts.session_budget(envelope.recipients.len());
            within(
                Phase::Send,
                budget,
                self.transport.send_plain(config, &envelope, &message),
            )
            .await
        }
    }

    async fn send_tls(&self, envelope: &Envelope, message: &[u8]) -> Result<(), MailError> {
        let config = self.config.as_ref();
        let mut session = within(
            Phase::Connect,
            config.timeouts.connect,
            self.transport.connect_tls(config),
        )
        .await?;

        let result = run_session(&mut session, config, envelope, message).await;

        // The message is already accepted or the send already failed; a QUIT
        // error changes neither.
        if let Err(e) = within(Phase::Quit, config.timeouts.command, session.quit()).await {
            tracing::debug!(error = %e, "QUIT failed");
        }

        result
    }
}

async fn run_session<S: SmtpSession>(
    session: &mut S,
    config: &SmtpConfig,
    envelope: &Envelope,
    message: &[u8],
) -> Result<(), MailError> {
    let timeouts = config.timeouts;

    if !config.username.is_empty() {
        within(
            Phase::Auth,
            timeouts.auth,
            session.authenticate(&config.username, &config.password),
        )
        .await?;
    }

    within(Phase::MailFrom, timeouts.command, session.mail_from(&envelope.from)).await?;

    for recipient in &envelope.recipients {
        within(Phase::RcptTo, timeouts.command, session.rcpt_to(recipient)).await?;
    }

    within(Phase::Data, timeouts.data, session.data(message)).await
}

/// Run `fut` with a deadline, reporting expiry as a timeout in `phase`.
async fn within<F, O>(phase: Phase, limit: Duration, fut: F) -> Result<O, MailError>
where
    F: Future<Output = Result<O, MailError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(MailError::Timeout(phase)),
    }
}
