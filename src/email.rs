//! Email request with builder pattern.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One outbound message request.
///
/// Build a fresh `Email` per send:
///
/// ```
/// use mailpost::Email;
///
/// // Plain text
/// let email = Email::new()
///     .to("ops@example.com")
///     .cc("lead@example.com")
///     .subject("Nightly job finished")
///     .text_body("All green.");
///
/// // HTML template
/// let email = Email::new()
///     .to("ops@example.com")
///     .subject("Database alert")
///     .template("db_analysis.html")
///     .assign("Title", "Slow queries detected")
///     .assign("RiskLevel", "high");
/// ```
///
/// ## Body selection
///
/// - `is_html == false`: `body` is sent as plain text; template fields are ignored.
/// - `is_html == true` with a template: the template is rendered and `body` is ignored.
/// - `is_html == true` without a template: `body` is sent as pre-rendered HTML.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Email {
    /// Primary recipients
    pub to: Vec<String>,
    /// Carbon copy recipients
    pub cc: Vec<String>,
    /// Blind carbon copy recipients (envelope only, never in headers)
    pub bcc: Vec<String>,
    /// Subject line, sent verbatim
    pub subject: String,
    /// Plain text or pre-rendered HTML body
    pub body: String,
    /// Send as `text/html`
    pub is_html: bool,
    /// Template file name inside the mailer's template directory
    pub template_name: Option<String>,
    /// Template variables. `Subject` is always overwritten with [`Email::subject`].
    pub template_data: HashMap<String, serde_json::Value>,
}

impl Email {
    /// Create a new empty email.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a recipient.
    ///
    /// Can be called multiple times to add multiple recipients.
    pub fn to(mut self, addr: impl Into<String>) -> Self {
        self.to.push(addr.into());
        self
    }

    /// Replace all recipients.
    pub fn put_to(mut self, addrs: Vec<String>) -> Self {
        self.to = addrs;
        self
    }

    /// Add a CC recipient.
    pub fn cc(mut self, addr: impl Into<String>) -> Self {
        self.cc.push(addr.into());
        self
    }

    /// Replace all CC recipients.
    pub fn put_cc(mut self, addrs: Vec<String>) -> Self {
        self.cc = addrs;
        self
    }

    /// Add a BCC recipient.
    pub fn bcc(mut self, addr: impl Into<String>) -> Self {
        self.bcc.push(addr.into());
        self
    }

    /// Replace all BCC recipients.
    pub fn put_bcc(mut self, addrs: Vec<String>) -> Self {
        self.bcc = addrs;
        self
    }

    /// Set the subject line.
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Set a plain text body and switch to plain mode.
    pub fn text_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self.is_html = false;
        self
    }

    /// Set a pre-rendered HTML body and switch to HTML mode.
    pub fn html_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self.is_html = true;
        self
    }

    /// Set the body without changing the mode.
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Set the HTML flag directly.
    pub fn html(mut self, is_html: bool) -> Self {
        self.is_html = is_html;
        self
    }

    /// Render the named template as the HTML body.
    pub fn template(mut self, name: impl Into<String>) -> Self {
        self.template_name = Some(name.into());
        self.is_html = true;
        self
    }

    /// Store a template variable.
    ///
    /// ```rust,ignore
    /// Email::new()
    ///     .template("welcome.html")
    ///     .assign("username", "alice")
    ///     .assign("retries", 3)
    /// ```
    pub fn assign(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.template_data.insert(key.into(), value.into());
        self
    }

    /// Get all envelope recipients (to + cc + bcc), in that order, duplicates kept.
    pub fn all_recipients(&self) -> Vec<&str> {
        self.to
            .iter()
            .chain(self.cc.iter())
            .chain(self.bcc.iter())
            .map(String::as_str)
            .collect()
    }

    /// Whether the body comes from a template.
    pub fn uses_template(&self) -> bool {
        self.is_html && self.template_name.as_deref().is_some_and(|name| !name.is_empty())
    }
}
