//! SMTP account configuration and layered resolution.
//!
//! Configuration comes from an optional YAML file, falling back to environment
//! variables when the file is absent, unreadable, unparseable, or has an empty
//! host. There is no field-level merging: the file wins entirely or not at all.
//!
//! ```yaml
//! # config.yaml
//! email:
//!   host: smtp.example.com
//!   port: 465
//!   username: alerts@example.com
//!   password: app-password
//!   from: alerts@example.com
//!   usetls: true
//!   insecure_skip_verify: false
//!   timeouts:
//!     connect_secs: 10
//!     command_secs: 30
//! ```
//!
//! | Variable | Description |
//! |----------|-------------|
//! | `EMAIL_SMTP_HOST` | SMTP server host |
//! | `EMAIL_SMTP_PORT` | SMTP server port (required, no default) |
//! | `EMAIL_SMTP_USERNAME` | SMTP username |
//! | `EMAIL_SMTP_PASSWORD` | SMTP password |
//! | `EMAIL_SMTP_FROM` | Sender address |
//! | `EMAIL_SMTP_USETLS` | `true` for implicit TLS, anything else for plain |
//! | `EMAIL_SMTP_INSECURE_SKIP_VERIFY` | `true` to skip certificate verification |
//! | `EMAIL_SMTP_TIMEOUT_SECS` | Deadline applied to every delivery phase, 1 to 86400 |

use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::MailError;

/// Default location of the configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

pub const ENV_HOST: &str = "EMAIL_SMTP_HOST";
pub const ENV_PORT: &str = "EMAIL_SMTP_PORT";
pub const ENV_USERNAME: &str = "EMAIL_SMTP_USERNAME";
pub const ENV_PASSWORD: &str = "EMAIL_SMTP_PASSWORD";
pub const ENV_FROM: &str = "EMAIL_SMTP_FROM";
pub const ENV_USE_TLS: &str = "EMAIL_SMTP_USETLS";
pub const ENV_INSECURE_SKIP_VERIFY: &str = "EMAIL_SMTP_INSECURE_SKIP_VERIFY";
pub const ENV_TIMEOUT_SECS: &str = "EMAIL_SMTP_TIMEOUT_SECS";

/// Longest deadline accepted for a single phase, from the file or environment.
pub const MAX_TIMEOUT_SECS: u64 = 86_400;

/// Per-phase deadlines for a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// TCP/TLS establishment and server greeting.
    pub connect: Duration,
    /// Credential authentication.
    pub auth: Duration,
    /// Each envelope command (`MAIL FROM`, `RCPT TO`) and `QUIT`.
    pub command: Duration,
    /// `DATA` and the message transfer.
    pub data: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            auth: Duration::from_secs(10),
            command: Duration::from_secs(30),
            data: Duration::from_secs(60),
        }
    }
}

impl Timeouts {
    /// Use the same deadline for every phase.
    pub fn uniform(limit: Duration) -> Self {
        Self {
            connect: limit,
            auth: limit,
            command: limit,
            data: limit,
        }
    }

    /// Upper bound for a whole session delivering to `recipients` addresses.
    pub fn session_budget(&self, recipients: usize) -> Duration {
        // MAIL FROM + each RCPT TO + QUIT
        let commands = u32::try_from(recipients.saturating_add(2)).unwrap_or(u32::MAX);
        self.connect
            .saturating_add(self.auth)
            .saturating_add(self.command.saturating_mul(commands))
            .saturating_add(self.data)
    }
}

/// One SMTP account.
///
/// Built once at startup (usually by [`ConfigResolver`]) and shared read-only
/// between mailers.
///
/// # Certificate verification
///
/// `insecure_skip_verify` disables TLS certificate and hostname verification on
/// the implicit-TLS path. It exists for providers with self-issued or broken
/// chains and leaves the connection open to interception. It is off unless set
/// explicitly.
#[derive(Clone, PartialEq, Eq)]
pub struct SmtpConfig {
    /// SMTP server host name, also used for TLS server name verification.
    pub host: String,
    /// SMTP server port, never 0.
    pub port: u16,
    /// Login name. Authentication is skipped when empty.
    pub username: String,
    /// Login password. Redacted from `Debug` output.
    pub password: String,
    /// Sender address used for the `From` header and `MAIL FROM`.
    pub from: String,
    /// Connect with implicit TLS (wrapper mode) instead of plain SMTP.
    pub use_tls: bool,
    /// Accept any server certificate on the TLS path.
    pub insecure_skip_verify: bool,
    /// Per-phase deadlines.
    pub timeouts: Timeouts,
}

impl SmtpConfig {
    /// Create a configuration for `host:port` with no credentials, plain SMTP.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            username: String::new(),
            password: String::new(),
            from: String::new(),
            use_tls: false,
            insecure_skip_verify: false,
            timeouts: Timeouts::default(),
        }
    }

    /// Set the login credentials.
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Set the sender address.
    pub fn from(mut self, from: impl Into<String>) -> Self {
        self.from = from.into();
        self
    }

    /// Choose implicit TLS (`true`) or plain SMTP (`false`).
    pub fn use_tls(mut self, use_tls: bool) -> Self {
        self.use_tls = use_tls;
        self
    }

    /// Skip certificate verification on the TLS path. See the type docs.
    pub fn insecure_skip_verify(mut self, skip: bool) -> Self {
        self.insecure_skip_verify = skip;
        self
    }

    /// Override the per-phase deadlines.
    pub fn timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// `host:port` as dialed.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Parse the `email` section of a YAML document.
    pub fn from_yaml_str(raw: &str) -> Result<Self, MailError> {
        let file: ConfigFile = serde_yaml::from_str(raw)?;
        file.email.into_config()
    }
}

impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("from", &self.from)
            .field("use_tls", &self.use_tls)
            .field("insecure_skip_verify", &self.insecure_skip_verify)
            .field("timeouts", &self.timeouts)
            .finish()
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    email: EmailSection,
}

#[derive(Debug, Default, Deserialize)]
struct EmailSection {
    #[serde(default)]
    host: String,
    port: u16,
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    from: String,
    #[serde(default, rename = "usetls")]
    use_tls: bool,
    #[serde(default)]
    insecure_skip_verify: bool,
    #[serde(default)]
    timeouts: TimeoutsSection,
}

#[derive(Debug, Default, Deserialize)]
struct TimeoutsSection {
    connect_secs: Option<u64>,
    auth_secs: Option<u64>,
    command_secs: Option<u64>,
    data_secs: Option<u64>,
}

impl TimeoutsSection {
    fn into_timeouts(self) -> Result<Timeouts, MailError> {
        let defaults = Timeouts::default();
        let secs = |key: &str, value: Option<u64>, fallback: Duration| match value {
            None => Ok(fallback),
            Some(secs) => timeout_from_secs(&format!("email.timeouts.{}", key), secs),
        };
        Ok(Timeouts {
            connect: secs("connect_secs", self.connect_secs, defaults.connect)?,
            auth: secs("auth_secs", self.auth_secs, defaults.auth)?,
            command: secs("command_secs", self.command_secs, defaults.command)?,
            data: secs("data_secs", self.data_secs, defaults.data)?,
        })
    }
}

impl EmailSection {
    fn into_config(self) -> Result<SmtpConfig, MailError> {
        if self.port == 0 {
            return Err(MailError::Configuration(
                "email.port must be a port number between 1 and 65535, got 0".to_string(),
            ));
        }

        Ok(SmtpConfig {
            host: self.host,
            port: self.port,
            username: self.username,
            password: self.password,
            from: self.from,
            use_tls: self.use_tls,
            insecure_skip_verify: self.insecure_skip_verify,
            timeouts: self.timeouts.into_timeouts()?,
        })
    }
}

/// A phase deadline of `secs`, which must lie in `1..=MAX_TIMEOUT_SECS`.
fn timeout_from_secs(key: &str, secs: u64) -> Result<Duration, MailError> {
    if (1..=MAX_TIMEOUT_SECS).contains(&secs) {
        Ok(Duration::from_secs(secs))
    } else {
        Err(MailError::Configuration(format!(
            "{} must be between 1 and {} seconds, got {}",
            key, MAX_TIMEOUT_SECS, secs
        )))
    }
}

/// Resolves an [`SmtpConfig`] from a config file with environment fallback.
///
/// The resolver holds no global state: point it at a file and, optionally, an
/// explicit environment snapshot. Without a snapshot the process environment is
/// captured when [`resolve`](Self::resolve) runs.
///
/// ```rust,ignore
/// use mailpost::ConfigResolver;
///
/// let config = ConfigResolver::new().resolve()?;
///
/// // Deterministic resolution, e.g. in tests
/// let config = ConfigResolver::new()
///     .path("/etc/myapp/config.yaml")
///     .env([("EMAIL_SMTP_HOST", "smtp.example.com"), ("EMAIL_SMTP_PORT", "465")])
///     .resolve()?;
/// ```
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    path: PathBuf,
    env: Option<HashMap<String, String>>,
}

impl Default for ConfigResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigResolver {
    /// Resolver for [`DEFAULT_CONFIG_PATH`] and the process environment.
    pub fn new() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_CONFIG_PATH),
            env: None,
        }
    }

    /// Read the config file from `path` instead of the default location.
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    /// Use an explicit environment snapshot instead of the process environment.
    pub fn env<K, V>(mut self, vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.env = Some(
            vars.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// The config file location this resolver reads.
    pub fn config_path(&self) -> &Path {
        &self.path
    }

    /// Produce the configuration.
    ///
    /// File problems are never errors; they fall through to the environment.
    /// Only a malformed environment value (e.g. `EMAIL_SMTP_PORT=abc`) fails.
    pub fn resolve(&self) -> Result<SmtpConfig, MailError> {
        if let Some(config) = self.load_file() {
            tracing::debug!(path = %self.path.display(), "Loaded SMTP config from file");
            return Ok(config);
        }

        match &self.env {
            Some(vars) => config_from_env(vars),
            None => config_from_env(&std::env::vars().collect()),
        }
    }

    fn load_file(&self) -> Option<SmtpConfig> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::debug!(
                    path = %self.path.display(),
                    error = %err,
                    "Config file not readable, falling back to environment"
                );
                return None;
            }
        };

        let config = match SmtpConfig::from_yaml_str(&raw) {
            Ok(config) => config,
            Err(err) => {
                tracing::debug!(
                    path = %self.path.display(),
                    error = %err,
                    "Config file not parseable, falling back to environment"
                );
                return None;
            }
        };

        if config.host.is_empty() {
            tracing::debug!(
                path = %self.path.display(),
                "Config file has no email.host, falling back to environment"
            );
            return None;
        }

        Some(config)
    }
}

/// Build a configuration entirely from environment variables.
pub fn config_from_env(vars: &HashMap<String, String>) -> Result<SmtpConfig, MailError> {
    let get = |key: &str| vars.get(key).cloned().unwrap_or_default();

    let raw_port = get(ENV_PORT);
    let port = match raw_port.parse::<u16>() {
        Ok(0) | Err(_) => {
            return Err(MailError::Configuration(format!(
                "{} must be a port number between 1 and 65535, got '{}'",
                ENV_PORT, raw_port
            )))
        }
        Ok(port) => port,
    };

    let timeouts = match vars.get(ENV_TIMEOUT_SECS) {
        None => Timeouts::default(),
        Some(raw) => {
            let secs = raw.parse::<u64>().map_err(|_| {
                MailError::Configuration(format!(
                    "{} must be a positive number of seconds, got '{}'",
                    ENV_TIMEOUT_SECS, raw
                ))
            })?;
            Timeouts::uniform(timeout_from_secs(ENV_TIMEOUT_SECS, secs)?)
        }
    };

    Ok(SmtpConfig {
        host: get(ENV_HOST),
        port,
        username: get(ENV_USERNAME),
        password: get(ENV_PASSWORD),
        from: get(ENV_FROM),
        use_tls: get(ENV_USE_TLS) == "true",
        insecure_skip_verify: get(ENV_INSECURE_SKIP_VERIFY) == "true",
        timeouts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env_vars(port: &str) -> Vec<(&'static str, String)> {
        vec![
            (ENV_HOST, "env.example.com".to_string()),
            (ENV_PORT, port.to_string()),
            (ENV_USERNAME, "env-user".to_string()),
            (ENV_PASSWORD, "env-pass".to_string()),
            (ENV_FROM, "env@example.com".to_string()),
            (ENV_USE_TLS, "true".to_string()),
        ]
    }

    fn write_config(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("config.yaml");
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_file_overrides_env_entirely() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "email:\n  host: smtp.file.com\n  port: 587\n  username: file-user\n  password: file-pass\n  from: file@example.com\n  usetls: false\n",
        );

        let config = ConfigResolver::new()
            .path(&path)
            .env(env_vars("465"))
            .resolve()
            .unwrap();

        assert_eq!(config.host, "smtp.file.com");
        assert_eq!(config.port, 587);
        assert_eq!(config.username, "file-user");
        assert_eq!(config.password, "file-pass");
        assert_eq!(config.from, "file@example.com");
        assert!(!config.use_tls);
        assert!(!config.insecure_skip_verify);
    }

    #[test]
    fn test_absent_file_uses_env() {
        let dir = tempfile::tempdir().unwrap();

        let config = ConfigResolver::new()
            .path(dir.path().join("missing.yaml"))
            .env(env_vars("465"))
            .resolve()
            .unwrap();

        assert_eq!(config.host, "env.example.com");
        assert_eq!(config.port, 465);
        assert_eq!(config.username, "env-user");
        assert_eq!(config.password, "env-pass");
        assert_eq!(config.from, "env@example.com");
        assert!(config.use_tls);
    }

    #[test]
    fn test_empty_host_in_file_falls_through() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "email:\n  host: \"\"\n  port: 25\n");

        let config = ConfigResolver::new()
            .path(&path)
            .env(env_vars("2525"))
            .resolve()
            .unwrap();

        assert_eq!(config.host, "env.example.com");
        assert_eq!(config.port, 2525);
    }

    #[test]
    fn test_unparseable_file_falls_through() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "email:\n  host: smtp.file.com\n  port: not-a-number\n");

        let config = ConfigResolver::new()
            .path(&path)
            .env(env_vars("465"))
            .resolve()
            .unwrap();

        assert_eq!(config.host, "env.example.com");
    }

    #[test]
    fn test_bad_port_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();

        let result = ConfigResolver::new()
            .path(dir.path().join("missing.yaml"))
            .env(env_vars("abc"))
            .resolve();

        assert!(matches!(result, Err(MailError::Configuration(_))));
    }

    #[test]
    fn test_missing_port_is_configuration_error() {
        let result = config_from_env(&HashMap::new());
        assert!(matches!(result, Err(MailError::Configuration(_))));
    }

    #[test]
    fn test_port_zero_is_rejected() {
        let vars: HashMap<String, String> = env_vars("0")
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        assert!(matches!(
            config_from_env(&vars),
            Err(MailError::Configuration(_))
        ));
    }

    #[test]
    fn test_use_tls_requires_literal_true() {
        let mut vars: HashMap<String, String> = env_vars("465")
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();

        vars.insert(ENV_USE_TLS.to_string(), "TRUE".to_string());
        assert!(!config_from_env(&vars).unwrap().use_tls);

        vars.insert(ENV_USE_TLS.to_string(), "1".to_string());
        assert!(!config_from_env(&vars).unwrap().use_tls);

        vars.insert(ENV_USE_TLS.to_string(), "true".to_string());
        assert!(config_from_env(&vars).unwrap().use_tls);
    }

    #[test]
    fn test_env_timeout_applies_to_every_phase() {
        let mut vars: HashMap<String, String> = env_vars("465")
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        vars.insert(ENV_TIMEOUT_SECS.to_string(), "5".to_string());

        let config = config_from_env(&vars).unwrap();
        assert_eq!(config.timeouts, Timeouts::uniform(Duration::from_secs(5)));

        vars.insert(ENV_TIMEOUT_SECS.to_string(), "soon".to_string());
        assert!(matches!(
            config_from_env(&vars),
            Err(MailError::Configuration(_))
        ));
    }

    #[test]
    fn test_file_optional_fields() {
        let config = SmtpConfig::from_yaml_str(
            "email:\n  host: smtp.file.com\n  port: 465\n  usetls: true\n  insecure_skip_verify: true\n  timeouts:\n    connect_secs: 3\n",
        )
        .unwrap();

        assert!(config.use_tls);
        assert!(config.insecure_skip_verify);
        assert_eq!(config.timeouts.connect, Duration::from_secs(3));
        assert_eq!(config.timeouts.data, Timeouts::default().data);
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = SmtpConfig::new("smtp.example.com", 465).credentials("user", "hunter2");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_session_budget() {
        let timeouts = Timeouts::uniform(Duration::from_secs(1));
        // connect + auth + (mail + 3 rcpt + quit) + data
        assert_eq!(timeouts.session_budget(3), Duration::from_secs(8));
    }

    #[test]
    fn test_session_budget_saturates() {
        let timeouts = Timeouts::uniform(Duration::MAX);
        assert_eq!(timeouts.session_budget(usize::MAX), Duration::MAX);
    }

    #[test]
    fn test_env_timeout_upper_bound() {
        let mut vars: HashMap<String, String> = env_vars("25")
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();

        vars.insert(ENV_TIMEOUT_SECS.to_string(), MAX_TIMEOUT_SECS.to_string());
        assert_eq!(
            config_from_env(&vars).unwrap().timeouts,
            Timeouts::uniform(Duration::from_secs(MAX_TIMEOUT_SECS))
        );

        for raw in ["0", "86401", "9223372036854775808"] {
            vars.insert(ENV_TIMEOUT_SECS.to_string(), raw.to_string());
            assert!(
                matches!(config_from_env(&vars), Err(MailError::Configuration(_))),
                "{}={}",
                ENV_TIMEOUT_SECS,
                raw
            );
        }
    }

    #[test]
    fn test_file_rejects_zero_port_and_timeouts() {
        let zero_port = SmtpConfig::from_yaml_str("email:\n  host: smtp.file.com\n  port: 0\n");
        assert!(matches!(zero_port, Err(MailError::Configuration(_))));

        let zero_timeout = SmtpConfig::from_yaml_str(
            "email:\n  host: smtp.file.com\n  port: 465\n  timeouts:\n    connect_secs: 0\n",
        );
        assert!(matches!(zero_timeout, Err(MailError::Configuration(_))));

        let huge_timeout = SmtpConfig::from_yaml_str(
            "email:\n  host: smtp.file.com\n  port: 465\n  timeouts:\n    data_secs: 9223372036854775808\n",
        );
        assert!(huge_timeout.is_err());
    }

    #[test]
    fn test_invalid_file_values_fall_through_to_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "email:\n  host: smtp.file.com\n  port: 0\n  timeouts:\n    connect_secs: 0\n",
        );

        let config = ConfigResolver::new()
            .path(&path)
            .env(env_vars("465"))
            .resolve()
            .unwrap();

        assert_eq!(config.host, "env.example.com");
        assert_eq!(config.port, 465);
        assert_eq!(config.timeouts, Timeouts::default());
    }
}
