use std::time::Duration;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Space-node directory
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Fetch shared spaces from the remote catalog during a build.
    /// When `false` only locally-owned targets are listed.
    #[serde(default = "d_true")]
    pub include_remote: bool,
    /// Upper bound on the remote catalog fetch.
    #[serde(default = "d_30000")]
    pub catalog_timeout_ms: u64,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            include_remote: true,
            catalog_timeout_ms: 30_000,
        }
    }
}

impl DirectoryConfig {
    pub fn catalog_timeout(&self) -> Duration {
        Duration::from_millis(self.catalog_timeout_ms)
    }
}

fn d_true() -> bool {
    true
}
fn d_30000() -> u64 {
    30_000
}
