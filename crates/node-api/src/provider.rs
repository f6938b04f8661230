//! The `SpaceNodeApi` trait: the node's REST surface as seen by a device.

use async_trait::async_trait;
use sn_domain::error::Result;
use sn_protocol::{MeshAuthKey, SpaceDevice, SpaceUser, VpnConfig};

/// Calls a device makes against a space node.
///
/// Every call is signed with the node session; structured node errors
/// come back as `Error::Node { code, message }`.
#[async_trait]
pub trait SpaceNodeApi: Send + Sync {
    /// Users with access to the space (GET /users).
    async fn space_users(&self) -> Result<Vec<SpaceUser>>;

    /// One user (GET /user/{userID}).
    async fn space_user(&self, user_id: &str) -> Result<SpaceUser>;

    /// Change a user's admin and site-blocking flags (PUT /user/{userID}).
    async fn update_space_user(
        &self,
        user_id: &str,
        is_space_admin: bool,
        enable_site_blocking: bool,
    ) -> Result<SpaceUser>;

    /// One of a user's devices (GET /user/{userID}/device/{deviceID}).
    async fn user_device(&self, user_id: &str, device_id: &str) -> Result<SpaceDevice>;

    /// Enable or disable a user's device (PUT /user/{userID}/device/{deviceID}).
    async fn enable_user_device(&self, user_id: &str, device_id: &str, enabled: bool) -> Result<SpaceDevice>;

    /// Request tunnel configuration for this device (POST /connect).
    async fn connect(&self, device_connect_key: &str) -> Result<VpnConfig>;

    /// Tear down this device's tunnel (DELETE /connect).
    async fn disconnect(&self) -> Result<()>;

    /// Pre-authorized mesh key valid for `expires_in_ms`
    /// (POST /mycs/device/meshAuthKey).
    async fn create_mesh_auth_key(&self, expires_in_ms: i64) -> Result<MeshAuthKey>;

    /// Whether the node reports itself running.
    fn is_running(&self) -> bool;
}
