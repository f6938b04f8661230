//! `NodeApiClient`: signed REST calls over a node session.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use sn_directory::SpaceNodeDirectory;
use sn_domain::error::{Error, Result};
use sn_domain::SpaceNodeRef;
use sn_protocol::{
    ConnectRequest, CreateMeshAuthKeyRequest, EnableDeviceRequest, MeshAuthKey, SpaceDevice,
    SpaceUser, UpdateSpaceUserRequest, VpnConfig,
};
use sn_session::{NodeRequest, NodeResponse, NodeSession};

use crate::provider::SpaceNodeApi;

/// API client bound to one authenticated node session.
///
/// The session is shared; several clients may wrap the same pooled
/// instance.
#[derive(Clone)]
pub struct NodeApiClient {
    session: Arc<NodeSession>,
}

impl NodeApiClient {
    pub fn new(session: Arc<NodeSession>) -> Self {
        Self { session }
    }

    /// Acquire a pooled session to `node` from `directory` and wrap it.
    /// Pair with [`release`](Self::release).
    pub async fn acquire(
        directory: &SpaceNodeDirectory,
        node: &Arc<SpaceNodeRef>,
        timeout: Duration,
    ) -> Result<Self> {
        let session = directory.acquire_session(node, timeout).await?;
        Ok(Self::new(session))
    }

    /// Hand the session back to the directory's pool.
    pub async fn release(self, directory: &SpaceNodeDirectory) {
        directory.release_session(&self.session).await;
    }

    pub fn session(&self) -> &Arc<NodeSession> {
        &self.session
    }

    pub fn node(&self) -> &Arc<SpaceNodeRef> {
        self.session.node()
    }

    /// Node URL for a sequence of path segments, each percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<String> {
        let base = self.session.url("/")?;
        let mut url = url::Url::parse(&base)
            .map_err(|e| Error::Config(format!("invalid node endpoint {base}: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("node endpoint {base} cannot carry a path")))?
            .pop_if_empty()
            .extend(segments);
        Ok(url.into())
    }

    async fn send(&self, op: &str, request: NodeRequest) -> Result<NodeResponse> {
        let path = request.path();
        self.session.send(request).await.map_err(|e| {
            tracing::error!(node = %self.node(), op, path = %path, error = %e, "node API call failed");
            e
        })
    }

    async fn call<T: DeserializeOwned>(&self, op: &str, request: NodeRequest) -> Result<T> {
        self.send(op, request).await?.json()
    }
}

#[async_trait]
impl SpaceNodeApi for NodeApiClient {
    async fn space_users(&self) -> Result<Vec<SpaceUser>> {
        let url = self.endpoint(&["users"])?;
        self.call("space_users", NodeRequest::get(url)).await
    }

    async fn space_user(&self, user_id: &str) -> Result<SpaceUser> {
        let url = self.endpoint(&["user", user_id])?;
        self.call("space_user", NodeRequest::get(url)).await
    }

    async fn update_space_user(
        &self,
        user_id: &str,
        is_space_admin: bool,
        enable_site_blocking: bool,
    ) -> Result<SpaceUser> {
        let url = self.endpoint(&["user", user_id])?;
        let body = UpdateSpaceUserRequest {
            is_space_admin,
            enable_site_blocking,
        };
        self.call("update_space_user", NodeRequest::put(url, &body)?).await
    }

    async fn user_device(&self, user_id: &str, device_id: &str) -> Result<SpaceDevice> {
        let url = self.endpoint(&["user", user_id, "device", device_id])?;
        self.call("user_device", NodeRequest::get(url)).await
    }

    async fn enable_user_device(&self, user_id: &str, device_id: &str, enabled: bool) -> Result<SpaceDevice> {
        let url = self.endpoint(&["user", user_id, "device", device_id])?;
        let body = EnableDeviceRequest { enabled };
        self.call("enable_user_device", NodeRequest::put(url, &body)?).await
    }

    async fn connect(&self, device_connect_key: &str) -> Result<VpnConfig> {
        let url = self.endpoint(&["connect"])?;
        let body = ConnectRequest {
            device_connect_key: device_connect_key.to_string(),
        };
        self.call("connect", NodeRequest::post(url, &body)?).await
    }

    async fn disconnect(&self) -> Result<()> {
        let url = self.endpoint(&["connect"])?;
        self.send("disconnect", NodeRequest::delete(url)).await?;
        Ok(())
    }

    async fn create_mesh_auth_key(&self, expires_in_ms: i64) -> Result<MeshAuthKey> {
        let url = self.endpoint(&["mycs", "device", "meshAuthKey"])?;
        let body = CreateMeshAuthKeyRequest {
            expires_in: expires_in_ms,
        };
        self.call("create_mesh_auth_key", NodeRequest::post(url, &body)?).await
    }

    fn is_running(&self) -> bool {
        self.node().is_running()
    }
}
