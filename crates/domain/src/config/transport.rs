use std::time::Duration;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Node transport
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default = "d_30000")]
    pub request_timeout_ms: u64,
    /// Path of the node's handshake endpoint.
    #[serde(default = "d_auth_path")]
    pub auth_path: String,
    #[serde(default = "d_user_agent")]
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 30_000,
            auth_path: d_auth_path(),
            user_agent: d_user_agent(),
        }
    }
}

impl TransportConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_30000() -> u64 {
    30_000
}
fn d_auth_path() -> String {
    "/auth".into()
}
fn d_user_agent() -> String {
    concat!("spacenode-client/", env!("CARGO_PKG_VERSION")).into()
}
