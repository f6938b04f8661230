use serde::Serialize;

/// Structured trace events emitted across the space-node crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    HandshakeCompleted {
        node: String,
        nonce: i64,
        expires_at: i64,
        duration_ms: u64,
    },
    HandshakeFailed {
        node: String,
        nonce: i64,
        reason: String,
    },
    NodeCall {
        node: String,
        endpoint: String,
        status: u16,
        duration_ms: u64,
    },
    SessionPooled {
        node: String,
        refcount: usize,
        created: bool,
    },
    SessionEvicted {
        node: String,
    },
    DirectoryBuilt {
        local_nodes: usize,
        remote_nodes: usize,
        shared_spaces: usize,
        duration_ms: u64,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "sn_event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_event_tag() {
        let ev = TraceEvent::SessionEvicted {
            node: "space-a".into(),
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["event"], "SessionEvicted");
        assert_eq!(json["node"], "space-a");
    }
}
