//! Node side of the handshake.
//!
//! [`NodeResponder`] answers `POST /auth` for registered devices and
//! checks the `X-Auth-Key` / `X-Auth-Token` pair on later requests.
//! Node implementations embed it; the test fakes are built on it too.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use sn_domain::config::ResponderConfig;
use sn_domain::error::{Error, Result};
use sn_protocol::{AuthReqKey, AuthRequest, AuthRespKey, AuthResponse, RequestToken};

use crate::crypto::{EphemeralKey, RsaPrivate, RsaPublic, SessionCipher};
use crate::signing::verify_request_token;

/// A device allowed to authenticate with this node.
#[derive(Debug, Clone)]
pub struct RegisteredDevice {
    pub name: String,
    pub public_key: RsaPublic,
}

/// Caller identity established by a verified request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedCaller {
    pub user_id: String,
    pub device_name: String,
}

#[derive(Debug, Clone)]
struct IssuedSession {
    cipher: Arc<SessionCipher>,
    user_id: String,
    device_name: String,
    expires_at: i64,
}

/// Node side of the handshake: answers auth requests and verifies
/// signed calls.
///
/// Lapsed sessions are dropped whenever a new one is issued;
/// [`purge_expired`](Self::purge_expired) reclaims them sooner.
pub struct NodeResponder {
    node_key: RsaPrivate,
    config: ResponderConfig,
    /// Keyed by device registration key.
    devices: RwLock<HashMap<String, RegisteredDevice>>,
    /// Keyed by issued session token.
    sessions: RwLock<HashMap<String, IssuedSession>>,
}

impl NodeResponder {
    pub fn new(node_key: RsaPrivate, config: ResponderConfig) -> Self {
        Self {
            node_key,
            config,
            devices: RwLock::new(HashMap::new()),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn public_key(&self) -> RsaPublic {
        self.node_key.public_key()
    }

    pub fn register_device(&self, registration_key: &str, name: &str, public_key_pem: &str) -> Result<()> {
        let public_key = RsaPublic::from_pem(public_key_pem)?;
        self.devices.write().insert(
            registration_key.to_string(),
            RegisteredDevice {
                name: name.to_string(),
                public_key,
            },
        );
        Ok(())
    }

    /// Answer a handshake. The issued session lives for
    /// `session_ttl_ms` from `now_ms`.
    pub fn respond(&self, request: &AuthRequest, now_ms: i64) -> Result<AuthResponse> {
        let token = uuid::Uuid::new_v4().to_string();
        self.respond_with(request, now_ms, &token, |_| {})
    }

    /// [`respond`](Self::respond) with a caller-chosen session token and
    /// a hook to alter the sealed reply before it is encrypted.
    pub(crate) fn respond_with(
        &self,
        request: &AuthRequest,
        now_ms: i64,
        session_token: &str,
        alter: impl FnOnce(&mut AuthRespKey),
    ) -> Result<AuthResponse> {
        let device = self
            .devices
            .read()
            .get(&request.device_id_key)
            .cloned()
            .ok_or_else(|| Error::NotAuthenticated("unknown device".into()))?;

        let plain = self.node_key.decrypt_base64(&request.auth_req_key)?;
        let req_key: AuthReqKey = serde_json::from_slice(&plain)
            .map_err(|e| Error::Decryption(format!("malformed auth request key: {e}")))?;

        let ephemeral = EphemeralKey::generate();
        let mut resp_key = AuthRespKey {
            node_ecdh_public_key: ephemeral.public_key_base64(),
            nonce: req_key.nonce,
            timeout_at: now_ms + self.config.session_ttl_ms as i64,
            device_name: device.name.clone(),
        };
        let shared = ephemeral.agree(&req_key.device_ecdh_public_key)?;
        let cipher = SessionCipher::derive(&shared, req_key.nonce)?;
        alter(&mut resp_key);

        let mut sessions = self.sessions.write();
        sessions.retain(|_, s| s.expires_at > now_ms);
        sessions.insert(
            session_token.to_string(),
            IssuedSession {
                cipher: Arc::new(cipher),
                user_id: req_key.user_id.clone(),
                device_name: device.name.clone(),
                expires_at: resp_key.timeout_at,
            },
        );
        drop(sessions);
        tracing::debug!(device = %device.name, user = %req_key.user_id, nonce = req_key.nonce, "issued node session");

        Ok(AuthResponse {
            auth_resp_key: device
                .public_key
                .encrypt_base64(&serde_json::to_vec(&resp_key)?)?,
            auth_id_key: session_token.to_string(),
        })
    }

    /// Check a signed request. `auth_key` and `auth_token` are the raw
    /// `X-Auth-Key` / `X-Auth-Token` header values.
    pub fn verify(&self, url: &str, auth_key: &str, auth_token: &str, now_ms: i64) -> Result<VerifiedCaller> {
        let session = self
            .sessions
            .read()
            .get(auth_key)
            .cloned()
            .ok_or_else(|| Error::NotAuthenticated("unknown session token".into()))?;
        if now_ms >= session.expires_at {
            return Err(Error::NotAuthenticated("session expired".into()));
        }

        let token: RequestToken = verify_request_token(
            &session.cipher,
            auth_token,
            url,
            auth_key,
            now_ms,
            self.config.max_token_skew_ms as i64,
        )?;
        if token.key_name != session.device_name {
            return Err(Error::NotAuthenticated(format!(
                "token signed as {:?} for a session issued to {:?}",
                token.key_name, session.device_name
            )));
        }
        Ok(VerifiedCaller {
            user_id: session.user_id,
            device_name: session.device_name,
        })
    }

    /// Cipher of an issued session, for sealing replies.
    pub fn session_cipher(&self, auth_key: &str) -> Option<Arc<SessionCipher>> {
        self.sessions.read().get(auth_key).map(|s| s.cipher.clone())
    }

    /// Drop sessions that expired before `now_ms`.
    pub fn purge_expired(&self, now_ms: i64) -> usize {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, s| s.expires_at > now_ms);
        before - sessions.len()
    }

    pub fn issued_sessions(&self) -> usize {
        self.sessions.read().len()
    }
}
