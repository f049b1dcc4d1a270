//! Message assembly: headers, body resolution, wire serialization, envelope.

use std::fmt;

use crate::email::Email;
use crate::error::MailError;
use crate::template::Templates;

/// Content type for plain text bodies.
pub const CONTENT_TYPE_PLAIN: &str = "text/plain; charset=UTF-8";
/// Content type for HTML bodies, rendered or pre-rendered.
pub const CONTENT_TYPE_HTML: &str = "text/html; charset=UTF-8";

/// Headers plus body for one send. Built fresh per send and never stored.
///
/// Header order in the serialized form is an implementation detail; each
/// header appears at most once. `Cc` is present only when there are CC
/// recipients. BCC recipients never appear in headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    headers: Vec<(&'static str, String)>,
    body: String,
}

impl RenderedMessage {
    /// Assemble headers and resolve the body for `email` sent as `from`.
    ///
    /// Template failures abort here, before any network I/O.
    pub fn build(email: &Email, from: &str, templates: &Templates) -> Result<Self, MailError> {
        let template = email.template_name.as_deref().filter(|name| !name.is_empty());
        let (content_type, body) = match (email.is_html, template) {
            (false, _) => (CONTENT_TYPE_PLAIN, email.body.clone()),
            (true, Some(name)) => (
                CONTENT_TYPE_HTML,
                templates.render(name, &email.subject, &email.template_data)?,
            ),
            (true, None) => (CONTENT_TYPE_HTML, email.body.clone()),
        };

        let mut headers = Vec::with_capacity(5);
        headers.push(("From", header_value(from)));
        headers.push(("To", header_value(&email.to.join(", "))));
        if !email.cc.is_empty() {
            headers.push(("Cc", header_value(&email.cc.join(", "))));
        }
        headers.push(("Subject", header_value(&email.subject)));
        headers.push(("Content-Type", content_type.to_string()));

        Ok(Self { headers, body })
    }

    /// Look up a header value by name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// All headers as `(name, value)` pairs.
    pub fn headers(&self) -> &[(&'static str, String)] {
        &self.headers
    }

    /// The resolved body.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// The `Content-Type` header value.
    pub fn content_type(&self) -> &str {
        self.header("Content-Type").unwrap_or(CONTENT_TYPE_PLAIN)
    }

    /// Serialize as `Key: Value\r\n` lines, a blank line, then the body.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl fmt::Display for RenderedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.headers {
            write!(f, "{}: {}\r\n", key, value)?;
        }
        f.write_str("\r\n")?;
        f.write_str(&self.body)
    }
}

/// Values are sent verbatim apart from line breaks, which would start a new header.
fn header_value(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}

/// Protocol-level sender and recipients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// `MAIL FROM` address.
    pub from: String,
    /// `RCPT TO` addresses: to, then cc, then bcc, duplicates kept.
    pub recipients: Vec<String>,
}

impl Envelope {
    /// Envelope for `email` sent as `from`.
    pub fn new(from: impl Into<String>, email: &Email) -> Self {
        Self {
            from: from.into(),
            recipients: email
                .all_recipients()
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}
