use std::time::Duration;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Node session timing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Environment variable overriding [`SessionConfig::auth_timeout_ms`].
pub const ENV_AUTH_TIMEOUT_MS: &str = "SN_NODE_AUTH_TIMEOUT_MS";
/// Environment variable overriding [`SessionConfig::retry_interval_ms`].
pub const ENV_AUTH_RETRY_MS: &str = "SN_NODE_AUTH_RETRY_MS";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// How long `wait_for_auth` waits before giving up.
    #[serde(default = "d_10000")]
    pub auth_timeout_ms: u64,
    /// Delay before the refresh task retries a failed handshake.
    #[serde(default = "d_500")]
    pub retry_interval_ms: u64,
    /// How long before `expiresAt` the refresh task re-authenticates.
    #[serde(default = "d_50")]
    pub refresh_lead_ms: u64,
    /// Polling period of `wait_for_auth`.
    #[serde(default = "d_10")]
    pub poll_interval_ms: u64,
    /// Abort `wait_for_auth` on Ctrl-C (interactive hosts).
    #[serde(default = "d_true")]
    pub trap_interrupt: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auth_timeout_ms: 10_000,
            retry_interval_ms: 500,
            refresh_lead_ms: 50,
            poll_interval_ms: 10,
            trap_interrupt: true,
        }
    }
}

impl SessionConfig {
    /// Apply `SN_NODE_AUTH_TIMEOUT_MS` / `SN_NODE_AUTH_RETRY_MS` when set.
    ///
    /// Unparseable values are ignored with a warning.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env_millis(ENV_AUTH_TIMEOUT_MS) {
            self.auth_timeout_ms = v;
        }
        if let Some(v) = env_millis(ENV_AUTH_RETRY_MS) {
            self.retry_interval_ms = v;
        }
        self
    }

    pub fn auth_timeout(&self) -> Duration {
        Duration::from_millis(self.auth_timeout_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    pub fn refresh_lead(&self) -> Duration {
        Duration::from_millis(self.refresh_lead_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn env_millis(name: &str) -> Option<u64> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse::<u64>() {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!(var = name, value = %raw, error = %e, "ignoring invalid env override");
            None
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_10000() -> u64 {
    10_000
}
fn d_500() -> u64 {
    500
}
fn d_50() -> u64 {
    50
}
fn d_10() -> u64 {
    10
}
fn d_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_follow_millis() {
        let cfg = SessionConfig {
            auth_timeout_ms: 1500,
            ..Default::default()
        };
        assert_eq!(cfg.auth_timeout(), Duration::from_millis(1500));
        assert_eq!(cfg.retry_interval(), Duration::from_millis(500));
        assert_eq!(cfg.refresh_lead(), Duration::from_millis(50));
        assert_eq!(cfg.poll_interval(), Duration::from_millis(10));
    }

    #[test]
    fn env_overrides_apply() {
        std::env::set_var(ENV_AUTH_TIMEOUT_MS, "2500");
        std::env::set_var(ENV_AUTH_RETRY_MS, "not-a-number");
        let cfg = SessionConfig::default().with_env_overrides();
        std::env::remove_var(ENV_AUTH_TIMEOUT_MS);
        std::env::remove_var(ENV_AUTH_RETRY_MS);

        assert_eq!(cfg.auth_timeout_ms, 2500);
        assert_eq!(cfg.retry_interval_ms, 500);
    }
}
