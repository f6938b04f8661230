mod directory;
mod logging;
mod responder;
mod session;
mod transport;

pub use directory::*;
pub use logging::*;
pub use responder::*;
pub use session::*;
pub use transport::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Construction-time settings for sessions, transports and the directory.
///
/// Hosts load this from their own config file; every section has
/// defaults so an empty document is valid.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub directory: DirectoryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub responder: ResponderConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.session.auth_timeout_ms == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "session.auth_timeout_ms".into(),
                message: "auth timeout must be greater than 0".into(),
            });
        }

        if self.session.retry_interval_ms == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "session.retry_interval_ms".into(),
                message: "retry interval must be greater than 0".into(),
            });
        }

        if self.session.poll_interval_ms == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "session.poll_interval_ms".into(),
                message: "poll interval must be greater than 0".into(),
            });
        }

        // A poll interval longer than the whole wait budget means the
        // first check happens after the deadline.
        if self.session.poll_interval_ms > self.session.auth_timeout_ms {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "session.poll_interval_ms".into(),
                message: "poll interval exceeds auth timeout".into(),
            });
        }

        if !self.transport.auth_path.starts_with('/') {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "transport.auth_path".into(),
                message: "auth path must start with '/'".into(),
            });
        }

        if self.transport.request_timeout_ms == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "transport.request_timeout_ms".into(),
                message: "request timeout must be greater than 0".into(),
            });
        }

        if self.responder.session_ttl_ms <= self.session.refresh_lead_ms {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "responder.session_ttl_ms".into(),
                message: "session ttl is shorter than the client refresh lead; \
                          sessions will refresh continuously"
                    .into(),
            });
        }

        if !self.directory.include_remote {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "directory.include_remote".into(),
                message: "shared spaces are disabled; only owned targets are listed".into(),
            });
        }

        errors
    }
}
