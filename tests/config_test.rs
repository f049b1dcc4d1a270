//! Configuration resolution tests.

use std::fs;
use std::time::Duration;

use mailpost::{ConfigResolver, MailError, SmtpConfig, Timeouts};

const FULL_YAML: &str = "\
email:
  host: smtp.example.com
  port: 465
  username: tony.stark@example.com
  password: jarvis
  from: tony.stark@example.com
  usetls: true
";

fn env(port: &str) -> Vec<(&'static str, String)> {
    vec![
        ("EMAIL_SMTP_HOST", "relay.example.com".to_string()),
        ("EMAIL_SMTP_PORT", port.to_string()),
        ("EMAIL_SMTP_USERNAME", "steve.rogers@example.com".to_string()),
        ("EMAIL_SMTP_PASSWORD", "shield".to_string()),
        ("EMAIL_SMTP_FROM", "steve.rogers@example.com".to_string()),
        ("EMAIL_SMTP_USETLS", "false".to_string()),
    ]
}

fn write_config(contents: &str) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("config.yaml"), contents).unwrap();
    dir
}

// ============================================================================
// File Tests
// ============================================================================

#[test]
fn file_with_host_wins_over_env() {
    let dir = write_config(FULL_YAML);

    let config = ConfigResolver::new()
        .path(dir.path().join("config.yaml"))
        .env(env("25"))
        .resolve()
        .unwrap();

    assert_eq!(
        config,
        SmtpConfig::new("smtp.example.com", 465)
            .credentials("tony.stark@example.com", "jarvis")
            .from("tony.stark@example.com")
            .use_tls(true)
    );
}

#[test]
fn file_timeouts_override_defaults_per_phase() {
    let dir = write_config(
        "\
email:
  host: smtp.example.com
  port: 587
  timeouts:
    connect_secs: 3
    data_secs: 120
",
    );

    let config = ConfigResolver::new()
        .path(dir.path().join("config.yaml"))
        .env(Vec::<(String, String)>::new())
        .resolve()
        .unwrap();

    let defaults = Timeouts::default();
    assert_eq!(config.timeouts.connect, Duration::from_secs(3));
    assert_eq!(config.timeouts.data, Duration::from_secs(120));
    assert_eq!(config.timeouts.auth, defaults.auth);
    assert_eq!(config.timeouts.command, defaults.command);
}

#[test]
fn file_insecure_skip_verify_is_opt_in() {
    let dir = write_config(FULL_YAML);
    let config = ConfigResolver::new()
        .path(dir.path().join("config.yaml"))
        .resolve()
        .unwrap();
    assert!(!config.insecure_skip_verify);

    let dir = write_config(&format!("{FULL_YAML}  insecure_skip_verify: true\n"));
    let config = ConfigResolver::new()
        .path(dir.path().join("config.yaml"))
        .resolve()
        .unwrap();
    assert!(config.insecure_skip_verify);
}

// ============================================================================
// Fallback Tests
// ============================================================================

#[test]
fn missing_file_falls_back_to_env() {
    let dir = tempfile::tempdir().unwrap();

    let config = ConfigResolver::new()
        .path(dir.path().join("absent.yaml"))
        .env(env("2525"))
        .resolve()
        .unwrap();

    assert_eq!(config.host, "relay.example.com");
    assert_eq!(config.port, 2525);
    assert_eq!(config.username, "steve.rogers@example.com");
    assert_eq!(config.password, "shield");
    assert_eq!(config.from, "steve.rogers@example.com");
    assert!(!config.use_tls);
}

#[test]
fn file_without_host_falls_back_to_env() {
    let dir = write_config("email:\n  host: \"\"\n  port: 465\n");

    let config = ConfigResolver::new()
        .path(dir.path().join("config.yaml"))
        .env(env("25"))
        .resolve()
        .unwrap();

    assert_eq!(config.host, "relay.example.com");
    assert_eq!(config.port, 25);
}

#[test]
fn unparseable_file_falls_back_to_env() {
    let dir = write_config("email: [not, a, mapping");

    let config = ConfigResolver::new()
        .path(dir.path().join("config.yaml"))
        .env(env("25"))
        .resolve()
        .unwrap();

    assert_eq!(config.host, "relay.example.com");
}

#[test]
fn file_with_bad_port_falls_back_to_env() {
    let dir = write_config("email:\n  host: smtp.example.com\n  port: abc\n");

    let config = ConfigResolver::new()
        .path(dir.path().join("config.yaml"))
        .env(env("25"))
        .resolve()
        .unwrap();

    assert_eq!(config.host, "relay.example.com");
}

// ============================================================================
// Environment Tests
// ============================================================================

#[test]
fn non_numeric_env_port_is_configuration_error() {
    let dir = tempfile::tempdir().unwrap();

    let result = ConfigResolver::new()
        .path(dir.path().join("absent.yaml"))
        .env(env("abc"))
        .resolve();

    assert!(matches!(result, Err(MailError::Configuration(_))));
}

#[test]
fn missing_env_port_is_configuration_error() {
    let dir = tempfile::tempdir().unwrap();

    let result = ConfigResolver::new()
        .path(dir.path().join("absent.yaml"))
        .env([("EMAIL_SMTP_HOST", "relay.example.com")])
        .resolve();

    assert!(matches!(result, Err(MailError::Configuration(_))));
}

#[test]
fn usetls_only_accepts_literal_true() {
    let dir = tempfile::tempdir().unwrap();

    for (raw, expected) in [("true", true), ("TRUE", false), ("1", false), ("", false)] {
        let mut vars = env("465");
        vars.retain(|(k, _)| *k != "EMAIL_SMTP_USETLS");
        vars.push(("EMAIL_SMTP_USETLS", raw.to_string()));

        let config = ConfigResolver::new()
            .path(dir.path().join("absent.yaml"))
            .env(vars)
            .resolve()
            .unwrap();
        assert_eq!(config.use_tls, expected, "EMAIL_SMTP_USETLS={raw:?}");
    }
}

#[test]
fn env_timeout_applies_to_every_phase() {
    let dir = tempfile::tempdir().unwrap();
    let mut vars = env("25");
    vars.push(("EMAIL_SMTP_TIMEOUT_SECS", "7".to_string()));

    let config = ConfigResolver::new()
        .path(dir.path().join("absent.yaml"))
        .env(vars)
        .resolve()
        .unwrap();

    assert_eq!(config.timeouts, Timeouts::uniform(Duration::from_secs(7)));
}

#[test]
fn oversized_env_timeout_is_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut vars = env("25");
    vars.push(("EMAIL_SMTP_TIMEOUT_SECS", "9223372036854775808".to_string()));

    let result = ConfigResolver::new()
        .path(dir.path().join("absent.yaml"))
        .env(vars)
        .resolve();

    assert!(matches!(result, Err(MailError::Configuration(_))));
}

#[test]
fn file_with_zero_port_falls_back_to_env() {
    let dir = write_config("email:\n  host: smtp.example.com\n  port: 0\n");

    let config = ConfigResolver::new()
        .path(dir.path().join("config.yaml"))
        .env(env("25"))
        .resolve()
        .unwrap();

    assert_eq!(config.host, "relay.example.com");
    assert_eq!(config.port, 25);
}

#[test]
fn file_with_zero_timeout_falls_back_to_env() {
    let dir = write_config(&format!("{FULL_YAML}  timeouts:\n    connect_secs: 0\n"));

    let config = ConfigResolver::new()
        .path(dir.path().join("config.yaml"))
        .env(env("25"))
        .resolve()
        .unwrap();

    assert_eq!(config.host, "relay.example.com");
    assert_eq!(config.timeouts, Timeouts::default());
}

#[test]
fn password_is_redacted_in_debug() {
    let config = SmtpConfig::new("smtp.example.com", 465).credentials("user", "jarvis");
    let debug = format!("{:?}", config);
    assert!(!debug.contains("jarvis"));
    assert!(debug.contains("<redacted>"));
}
