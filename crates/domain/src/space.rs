//! Space node references: one node's identity and connection metadata,
//! tagged with where it was learned from.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle status reported for a space node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Running,
    Pending,
    Stopped,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Fields shared by both provenance variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDescriptor {
    /// Logical key. Unique among local targets only.
    pub key: String,
    /// Cloud-assigned space id; absent for unregistered local targets.
    #[serde(default, rename = "spaceID")]
    pub space_id: Option<String>,
    /// Control endpoint URL, when it resolves.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Node's long-lived RSA public key (PEM).
    pub public_key: String,
    #[serde(default)]
    pub status: NodeStatus,
    #[serde(default)]
    pub can_use_as_egress: bool,
    #[serde(default)]
    pub is_owner: bool,
    /// Locally cached root CA (PEM) the node's TLS certificate chains to.
    #[serde(default)]
    pub ca_root: Option<String>,
}

/// Where a node reference was sourced from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Local,
    Remote,
}

/// A space node known to the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "provenance", content = "node", rename_all = "lowercase")]
pub enum SpaceNodeRef {
    /// One of the device's own managed targets.
    Local(NodeDescriptor),
    /// A space shared with the user through the cloud catalog.
    Remote(NodeDescriptor),
}

impl SpaceNodeRef {
    pub fn descriptor(&self) -> &NodeDescriptor {
        match self {
            SpaceNodeRef::Local(d) | SpaceNodeRef::Remote(d) => d,
        }
    }

    pub fn provenance(&self) -> Provenance {
        match self {
            SpaceNodeRef::Local(_) => Provenance::Local,
            SpaceNodeRef::Remote(_) => Provenance::Remote,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, SpaceNodeRef::Local(_))
    }

    pub fn key(&self) -> &str {
        &self.descriptor().key
    }

    pub fn space_id(&self) -> Option<&str> {
        self.descriptor().space_id.as_deref()
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.descriptor().endpoint.as_deref()
    }

    pub fn public_key(&self) -> &str {
        &self.descriptor().public_key
    }

    pub fn ca_root(&self) -> Option<&str> {
        self.descriptor().ca_root.as_deref()
    }

    pub fn status(&self) -> NodeStatus {
        self.descriptor().status
    }

    pub fn is_running(&self) -> bool {
        self.status() == NodeStatus::Running
    }

    pub fn can_use_as_egress(&self) -> bool {
        self.descriptor().can_use_as_egress
    }

    pub fn is_owner(&self) -> bool {
        self.descriptor().is_owner
    }

    /// Identity used to pool sessions: the space id when the cloud knows
    /// the node, otherwise the key qualified by provenance. Keys alone
    /// collide across sources, space ids do not.
    pub fn identity(&self) -> String {
        match (self.space_id(), self) {
            (Some(id), _) => id.to_string(),
            (None, Self::Local(d)) => format!("local:{}", d.key),
            (None, Self::Remote(d)) => format!("remote:{}", d.key),
        }
    }

    /// Lookup forms of the endpoint: the full URL and its bare
    /// `host[:port]`. Empty when the endpoint is absent or unparseable.
    pub fn endpoint_forms(&self) -> Vec<String> {
        let Some(endpoint) = self.endpoint() else {
            return Vec::new();
        };
        let mut forms = vec![endpoint.to_string()];
        if let Some(host) = endpoint_host(endpoint) {
            if host != endpoint {
                forms.push(host);
            }
        }
        forms
    }
}

impl fmt::Display for SpaceNodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.space_id() {
            Some(id) => write!(f, "{} ({id})", self.key()),
            None => write!(f, "{}", self.key()),
        }
    }
}

/// `host[:port]` of a URL, or `None` when it does not parse.
pub fn endpoint_host(endpoint: &str) -> Option<String> {
    let parsed = url::Url::parse(endpoint).ok()?;
    let host = parsed.host_str()?;
    Some(match parsed.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(key: &str, space_id: Option<&str>, endpoint: Option<&str>) -> NodeDescriptor {
        NodeDescriptor {
            key: key.into(),
            space_id: space_id.map(Into::into),
            endpoint: endpoint.map(Into::into),
            public_key: String::new(),
            status: NodeStatus::Running,
            can_use_as_egress: false,
            is_owner: true,
            ca_root: None,
        }
    }

    #[test]
    fn identity_prefers_space_id() {
        let with_id = SpaceNodeRef::Remote(desc("a", Some("S1"), None));
        let without = SpaceNodeRef::Local(desc("a", None, None));
        assert_eq!(with_id.identity(), "S1");
        assert_eq!(without.identity(), "local:a");
        let remote_without = SpaceNodeRef::Remote(desc("a", None, None));
        assert_eq!(remote_without.identity(), "remote:a");
    }

    #[test]
    fn endpoint_forms_include_host_and_port() {
        let node = SpaceNodeRef::Local(desc("a", None, Some("https://10.0.0.1:8443")));
        assert_eq!(
            node.endpoint_forms(),
            vec!["https://10.0.0.1:8443".to_string(), "10.0.0.1:8443".to_string()]
        );

        let node = SpaceNodeRef::Local(desc("a", None, Some("https://node.example.com")));
        assert_eq!(node.endpoint_forms()[1], "node.example.com");
    }

    #[test]
    fn unparseable_endpoint_keeps_only_raw_form() {
        let node = SpaceNodeRef::Local(desc("a", None, Some("not a url")));
        assert_eq!(node.endpoint_forms(), vec!["not a url".to_string()]);
        let node = SpaceNodeRef::Local(desc("a", None, None));
        assert!(node.endpoint_forms().is_empty());
    }

    #[test]
    fn unknown_status_deserializes() {
        let s: NodeStatus = serde_json::from_str(r#""hibernating""#).unwrap();
        assert_eq!(s, NodeStatus::Unknown);
        let s: NodeStatus = serde_json::from_str(r#""running""#).unwrap();
        assert_eq!(s, NodeStatus::Running);
    }
}
