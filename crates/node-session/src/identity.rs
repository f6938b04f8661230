//! The local device's identity as seen by a space node.

/// Long-lived device key material plus the display name the node
/// echoes back during the handshake.
#[derive(Clone)]
pub struct DeviceKeys {
    pub name: String,
    /// RSA private key PEM.
    pub rsa_private_key: String,
    /// RSA public key PEM, as registered with the space.
    pub rsa_public_key: String,
}

impl std::fmt::Debug for DeviceKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceKeys")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Source of the device identity used to authenticate with nodes.
///
/// Implementations are usually backed by the user's login state and may
/// change between handshakes (re-login), so sessions read them on every
/// attempt instead of caching.
pub trait DeviceIdentity: Send + Sync {
    /// Opaque key the node uses to find this device's registration.
    fn device_registration_key(&self) -> String;

    /// Currently logged-in user id.
    fn logged_in_user_id(&self) -> String;

    fn device(&self) -> DeviceKeys;
}

/// Fixed identity, for hosts that load credentials once at startup.
#[derive(Debug, Clone)]
pub struct StaticDeviceIdentity {
    pub registration_key: String,
    pub user_id: String,
    pub keys: DeviceKeys,
}

impl DeviceIdentity for StaticDeviceIdentity {
    fn device_registration_key(&self) -> String {
        self.registration_key.clone()
    }

    fn logged_in_user_id(&self) -> String {
        self.user_id.clone()
    }

    fn device(&self) -> DeviceKeys {
        self.keys.clone()
    }
}
