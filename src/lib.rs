//! # Mailpost
//!
//! Render an email (plain text, pre-rendered HTML, or an HTML template) and
//! deliver it over SMTP, either with implicit TLS or plain SMTP.
//!
//! ## Quick Start
//!
//! Provide a `config.yaml`:
//! ```yaml
//! email:
//!   host: smtp.example.com
//!   port: 465
//!   username: alerts@example.com
//!   password: app-password
//!   from: alerts@example.com
//!   usetls: true
//! ```
//!
//! or the equivalent environment variables:
//! ```bash
//! EMAIL_SMTP_HOST=smtp.example.com
//! EMAIL_SMTP_PORT=465
//! EMAIL_SMTP_USERNAME=alerts@example.com
//! EMAIL_SMTP_PASSWORD=app-password
//! EMAIL_SMTP_FROM=alerts@example.com
//! EMAIL_SMTP_USETLS=true
//! ```
//!
//! Then send:
//! ```rust,ignore
//! use mailpost::{ConfigResolver, Email, Mailer};
//!
//! let config = ConfigResolver::new().resolve()?;
//! let mailer = Mailer::new(config);
//!
//! let email = Email::new()
//!     .to("ops@example.com")
//!     .subject("Nightly job finished")
//!     .text_body("All green.");
//!
//! mailer.send(&email).await?;
//! ```
//!
//! ## Delivery
//!
//! Each send is one attempt. There is no queue, retry, or delivery tracking.
//! The first failing step aborts the send and its error is returned:
//!
//! | Error | Meaning |
//! |-------|---------|
//! | [`MailError::Configuration`] | Missing or malformed configuration |
//! | [`MailError::TemplateError`] | Template missing, invalid, or failed to render |
//! | [`MailError::ConnectionError`] | TCP/TLS establishment failed or connection lost |
//! | [`MailError::AuthError`] | Credentials rejected |
//! | [`MailError::ProtocolError`] | Server rejected `MAIL FROM`, `RCPT TO`, or `DATA` |
//! | [`MailError::Timeout`] | A phase exceeded its deadline |
//!
//! ## Feature Flags
//!
//! - `metrics` - Prometheus-style metrics (counters/histograms)
//!
//! ## Metrics
//!
//! Enable `features = ["metrics"]` to emit Prometheus-style metrics:
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `mailpost_emails_total` | Counter | transport, status | Total emails sent |
//! | `mailpost_delivery_duration_seconds` | Histogram | transport | Delivery duration |
//!
//! Install a recorder (e.g., `metrics-exporter-prometheus`) in your app to collect them.

/// The version of the mailpost crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

mod config;
mod email;
mod error;
mod mailer;
mod message;
mod template;

pub mod testing;
pub mod transport;

// Re-exports
pub use config::{
    config_from_env, ConfigResolver, SmtpConfig, Timeouts, DEFAULT_CONFIG_PATH, ENV_FROM,
    ENV_HOST, ENV_INSECURE_SKIP_VERIFY, ENV_PASSWORD, ENV_PORT, ENV_TIMEOUT_SECS, ENV_USERNAME,
    ENV_USE_TLS, MAX_TIMEOUT_SECS,
};
pub use email::Email;
pub use error::{MailError, Phase};
pub use mailer::Mailer;
pub use message::{Envelope, RenderedMessage, CONTENT_TYPE_HTML, CONTENT_TYPE_PLAIN};
pub use template::{Templates, DEFAULT_TEMPLATE_DIR, SUBJECT_KEY};
pub use transport::{SmtpSession, Transport};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::ConfigResolver;
    pub use crate::Email;
    pub use crate::MailError;
    pub use crate::Mailer;
    pub use crate::SmtpConfig;
    pub use crate::Transport;
}
