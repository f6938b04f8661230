//! Node protocol: wire types for the space-node handshake, request
//! authorization headers, and the node's REST API.
//!
//! Field names follow the node's JSON exactly (`deviceIDKey`, `authReqKey`,
//! ...); the Rust side stays snake_case.

use serde::{Deserialize, Serialize};

/// Header carrying the opaque session token issued by the node.
pub const HEADER_AUTH_KEY: &str = "X-Auth-Key";
/// Header carrying the sealed, time-bound request signature.
pub const HEADER_AUTH_TOKEN: &str = "X-Auth-Token";
/// Pseudo-field name for the request URL in [`RequestToken::fields`].
pub const FIELD_URL: &str = "url";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Handshake
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Device → Node: body of `POST /auth`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthRequest {
    #[serde(rename = "deviceIDKey")]
    pub device_id_key: String,
    /// Base64 RSA ciphertext of an [`AuthReqKey`], sealed to the node key.
    #[serde(rename = "authReqKey")]
    pub auth_req_key: String,
}

/// Plaintext sealed inside [`AuthRequest::auth_req_key`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthReqKey {
    #[serde(rename = "userID")]
    pub user_id: String,
    /// Base64 X25519 public key of the device's ephemeral keypair.
    #[serde(rename = "deviceECDHPublicKey")]
    pub device_ecdh_public_key: String,
    /// Millisecond timestamp, unique per attempt.
    pub nonce: i64,
}

/// Node → Device: success body of `POST /auth`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    /// Base64 RSA ciphertext of an [`AuthRespKey`], sealed to the device key.
    #[serde(rename = "authRespKey")]
    pub auth_resp_key: String,
    /// Opaque session token, presented as `X-Auth-Key` afterwards.
    #[serde(rename = "authIDKey")]
    pub auth_id_key: String,
}

/// Plaintext sealed inside [`AuthResponse::auth_resp_key`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthRespKey {
    #[serde(rename = "nodeECDHPublicKey")]
    pub node_ecdh_public_key: String,
    /// Must echo [`AuthReqKey::nonce`].
    pub nonce: i64,
    /// Session expiry, unix milliseconds.
    #[serde(rename = "timeoutAt")]
    pub timeout_at: i64,
    #[serde(rename = "deviceName")]
    pub device_name: String,
}

/// Structured error body returned by a node on any failed call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ErrorResponse {
    #[serde(rename = "errorCode", default)]
    pub error_code: i64,
    #[serde(rename = "errorMessage", default)]
    pub error_message: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request authorization
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Plaintext of the `X-Auth-Token` header before it is sealed with the
/// session cipher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestToken {
    /// Name the node uses to look the signer up (the device name).
    pub key_name: String,
    /// Unix milliseconds at signing time.
    pub issued_at: i64,
    /// Transport fields covered by `mac`, in order.
    pub fields: Vec<String>,
    /// Base64 HMAC-SHA256 over the field values and `issued_at`.
    pub mac: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Node REST API
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A user with access to a space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpaceUser {
    #[serde(rename = "userID")]
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub is_owner: bool,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub enable_site_blocking: bool,
    #[serde(default)]
    pub devices: Vec<SpaceDevice>,
}

/// One of a space user's devices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceDevice {
    #[serde(rename = "deviceID")]
    pub device_id: String,
    pub name: String,
    #[serde(default)]
    pub enabled: bool,
}

/// Body of `PUT /user/{userID}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSpaceUserRequest {
    pub is_space_admin: bool,
    pub enable_site_blocking: bool,
}

/// Body of `PUT /user/{userID}/device/{deviceID}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnableDeviceRequest {
    pub enabled: bool,
}

/// Body of `POST /connect`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectRequest {
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub device_connect_key: String,
}

/// Tunnel configuration returned by `POST /connect`. The config payload
/// is kept raw; parsing it is the tunnel layer's business.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VpnConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub vpn_type: String,
    #[serde(default)]
    pub config: serde_json::Value,
}

/// Body of `POST /mycs/device/meshAuthKey`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMeshAuthKeyRequest {
    /// Requested key lifetime in milliseconds.
    pub expires_in: i64,
}

/// Pre-authorized key the mesh daemon uses to join the space's overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshAuthKey {
    pub auth_key: String,
    #[serde(default)]
    pub expires_at: i64,
    /// Anything else the node returns (DNS settings, control URL, ...).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}
