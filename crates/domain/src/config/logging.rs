use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Logging
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Subscriber settings for [`crate::logging::init_tracing`].
///
/// `RUST_LOG` always wins over `filter` when it is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "d_filter")]
    pub filter: String,
    /// Emit one JSON object per line instead of compact text.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: d_filter(),
            json: false,
        }
    }
}

fn d_filter() -> String {
    "info".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_compact_info() {
        let cfg = LoggingConfig::default();
        assert_eq!(cfg.filter, "info");
        assert!(!cfg.json);
    }

    #[test]
    fn deserialize_partial() {
        let cfg: LoggingConfig = serde_json::from_str(r#"{"json": true}"#).unwrap();
        assert!(cfg.json);
        assert_eq!(cfg.filter, "info");
    }
}
