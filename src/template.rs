//! HTML template rendering backed by minijinja.
//!
//! Templates live in a directory and are looked up by file name on every
//! render, so edits on disk are picked up without restarting. All output is
//! HTML-escaped; use the `|safe` filter for trusted markup.
//!
//! ```html
//! <!-- email/templates/alert.html -->
//! <h1>{{ Title }}</h1>
//! <p>{{ Subject }}</p>
//! ```
//!
//! Dot-prefixed field references such as `{{ .Title }}` are accepted and read
//! as `{{ Title }}`.

use minijinja::{AutoEscape, Environment, ErrorKind, UndefinedBehavior};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::error::MailError;

/// Directory templates are loaded from unless overridden.
pub const DEFAULT_TEMPLATE_DIR: &str = "email/templates";

/// Key the email subject is injected under.
pub const SUBJECT_KEY: &str = "Subject";

/// A directory of email templates.
#[derive(Debug, Clone)]
pub struct Templates {
    dir: PathBuf,
}

impl Default for Templates {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPLATE_DIR)
    }
}

impl Templates {
    /// Load templates from `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The template directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Render template `name` with `data`, plus `Subject` set to `subject`.
    ///
    /// A caller-supplied `Subject` key is overwritten.
    pub fn render(
        &self,
        name: &str,
        subject: &str,
        data: &HashMap<String, serde_json::Value>,
    ) -> Result<String, MailError> {
        let mut context = data.clone();
        context.insert(SUBJECT_KEY.to_string(), serde_json::Value::from(subject));

        let env = self.environment();
        let template = env.get_template(name)?;
        let rendered = template.render(&context)?;

        tracing::debug!(template = name, bytes = rendered.len(), "Rendered template");
        Ok(rendered)
    }

    fn environment(&self) -> Environment<'static> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_auto_escape_callback(|_| AutoEscape::Html);

        let dir = self.dir.clone();
        env.set_loader(move |name| load_template(&dir, name));
        env
    }
}

fn load_template(dir: &Path, name: &str) -> Result<Option<String>, minijinja::Error> {
    let path = join_inside(dir, name).ok_or_else(|| {
        minijinja::Error::new(
            ErrorKind::InvalidOperation,
            format!("template name '{}' leaves the template directory", name),
        )
    })?;

    match fs::read_to_string(&path) {
        Ok(source) => Ok(Some(strip_dot_fields(&source))),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(minijinja::Error::new(
            ErrorKind::InvalidOperation,
            format!("could not read template {}", path.display()),
        )
        .with_source(err)),
    }
}

/// Join `name` onto `dir`, refusing absolute paths and `..` segments.
fn join_inside(dir: &Path, name: &str) -> Option<PathBuf> {
    let relative = Path::new(name);
    let plain = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if name.is_empty() || !plain {
        return None;
    }
    Some(dir.join(relative))
}

/// Rewrite `{{ .Field }}` references to `{{ Field }}`.
fn strip_dot_fields(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;

    while let Some(start) = rest.find("{{") {
        let (before, after) = rest.split_at(start + 2);
        out.push_str(before);

        let lead = after.len()
            - after
                .trim_start_matches(|c: char| c == '-' || c.is_whitespace())
                .len();
        out.push_str(&after[..lead]);
        let tail = &after[lead..];

        rest = match tail.strip_prefix('.') {
            Some(field) if field.starts_with(|c: char| c.is_alphabetic() || c == '_') => field,
            _ => tail,
        };
    }

    out.push_str(rest);
    out
}
