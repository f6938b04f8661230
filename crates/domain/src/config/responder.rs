use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Node-side handshake responder
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Settings used by the node side of the handshake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponderConfig {
    /// Lifetime granted to a session, added to the request nonce.
    #[serde(default = "d_300000")]
    pub session_ttl_ms: u64,
    /// Maximum distance between a request token's `issuedAt` and the
    /// node's clock.
    #[serde(default = "d_30000")]
    pub max_token_skew_ms: u64,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            session_ttl_ms: 300_000,
            max_token_skew_ms: 30_000,
        }
    }
}

fn d_300000() -> u64 {
    300_000
}
fn d_30000() -> u64 {
    30_000
}
