use sn_domain::config::{Config, ConfigSeverity};

#[test]
fn default_auth_timing() {
    let config = Config::default();
    assert_eq!(config.session.auth_timeout_ms, 10_000);
    assert_eq!(config.session.retry_interval_ms, 500);
    assert_eq!(config.session.refresh_lead_ms, 50);
    assert_eq!(config.session.poll_interval_ms, 10);
    assert!(config.session.trap_interrupt);
}

#[test]
fn empty_document_parses_to_defaults() {
    let config: Config = toml::from_str("").unwrap();
    assert_eq!(config.transport.auth_path, "/auth");
    assert!(config.directory.include_remote);
    assert_eq!(config.logging.filter, "info");
}

#[test]
fn session_section_parses() {
    let toml_str = r#"
[session]
auth_timeout_ms = 2000
retry_interval_ms = 250
trap_interrupt = false
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.session.auth_timeout_ms, 2000);
    assert_eq!(config.session.retry_interval_ms, 250);
    assert!(!config.session.trap_interrupt);
    // Unset fields keep their defaults.
    assert_eq!(config.session.refresh_lead_ms, 50);
}

#[test]
fn transport_and_directory_sections_parse() {
    let toml_str = r#"
[transport]
auth_path = "/v2/auth"
request_timeout_ms = 5000

[directory]
include_remote = false
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.transport.auth_path, "/v2/auth");
    assert_eq!(config.transport.request_timeout_ms, 5000);
    assert!(!config.directory.include_remote);

    let issues = config.validate();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].severity, ConfigSeverity::Warning);
    assert_eq!(issues[0].field, "directory.include_remote");
}

#[test]
fn short_session_ttl_warns() {
    let toml_str = r#"
[responder]
session_ttl_ms = 20
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert!(config
        .validate()
        .iter()
        .any(|i| i.field == "responder.session_ttl_ms" && i.severity == ConfigSeverity::Warning));
}
