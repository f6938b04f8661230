//! Sources the directory is built from: the host's own managed targets
//! and the cloud catalog of spaces shared with the user.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sn_domain::error::Result;
use sn_domain::{NodeDescriptor, NodeStatus, SpaceNodeRef};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Remote catalog
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The user's membership state in a shared space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccessStatus {
    #[default]
    Active,
    /// Invitation not yet accepted.
    Pending,
    /// Access revoked or suspended.
    #[serde(other)]
    Inactive,
}

/// One space from the remote catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSpace {
    #[serde(rename = "spaceID")]
    pub space_id: String,
    pub key: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    pub public_key: String,
    #[serde(default)]
    pub status: NodeStatus,
    #[serde(default)]
    pub access_status: AccessStatus,
    #[serde(default)]
    pub is_owner: bool,
    #[serde(default)]
    pub can_use_as_egress: bool,
    #[serde(default)]
    pub ca_root: Option<String>,
}

impl RemoteSpace {
    pub fn is_active(&self) -> bool {
        self.access_status == AccessStatus::Active
    }

    pub fn into_node_ref(self) -> SpaceNodeRef {
        SpaceNodeRef::Remote(NodeDescriptor {
            key: self.key,
            space_id: Some(self.space_id).filter(|s| !s.is_empty()),
            endpoint: self.endpoint.filter(|e| !e.is_empty()),
            public_key: self.public_key,
            status: self.status,
            can_use_as_egress: self.can_use_as_egress,
            is_owner: self.is_owner,
            ca_root: self.ca_root,
        })
    }
}

/// Async fetch of the spaces the current user can reach.
#[async_trait]
pub trait RemoteSpaceCatalog: Send + Sync {
    async fn accessible_spaces(&self) -> Result<Vec<RemoteSpace>>;
}

/// A fixed catalog, for hosts that cache the cloud response themselves.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog(pub Vec<RemoteSpace>);

#[async_trait]
impl RemoteSpaceCatalog for StaticCatalog {
    async fn accessible_spaces(&self) -> Result<Vec<RemoteSpace>> {
        Ok(self.0.clone())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Local targets
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A deployment target the host manages itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedTarget {
    /// Unique among the host's targets.
    pub key: String,
    /// Only targets with a bastion (control endpoint) count as spaces.
    pub has_bastion: bool,
    pub space_id: Option<String>,
    pub endpoint: Option<String>,
    pub public_key: String,
    pub status: NodeStatus,
    pub can_use_as_egress: bool,
    pub ca_root: Option<String>,
    /// Set when the target's deployed state could not be loaded.
    pub state_error: Option<String>,
}

impl ManagedTarget {
    pub fn into_node_ref(self) -> SpaceNodeRef {
        // An endpoint read from unloadable state is not trusted.
        let endpoint = if self.state_error.is_some() {
            None
        } else {
            self.endpoint.filter(|e| !e.is_empty())
        };
        SpaceNodeRef::Local(NodeDescriptor {
            key: self.key,
            space_id: self.space_id.filter(|s| !s.is_empty()),
            endpoint,
            public_key: self.public_key,
            status: self.status,
            can_use_as_egress: self.can_use_as_egress,
            is_owner: true,
            ca_root: self.ca_root,
        })
    }
}

/// The host's set of managed targets.
pub trait LocalTargets: Send + Sync {
    fn managed_targets(&self) -> Vec<ManagedTarget>;
}

impl LocalTargets for Vec<ManagedTarget> {
    fn managed_targets(&self) -> Vec<ManagedTarget> {
        self.clone()
    }
}
