//! Authenticated session with one space node.
//!
//! A [`NodeSession`] runs the RSA + ECDH handshake, publishes the derived
//! cipher and session token, signs outbound requests with it, and (once
//! started) keeps it fresh in the background.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use sn_domain::config::{Config, SessionConfig};
use sn_domain::error::{Error, Result};
use sn_domain::trace::TraceEvent;
use sn_domain::SpaceNodeRef;
use sn_protocol::{AuthReqKey, AuthRequest, AuthRespKey, AuthResponse, HEADER_AUTH_KEY, HEADER_AUTH_TOKEN};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::crypto::{EphemeralKey, RsaPrivate, RsaPublic, SessionCipher};
use crate::identity::DeviceIdentity;
use crate::refresh::RefreshTask;
use crate::signing::seal_request_token;
use crate::transport::{NodeRequest, NodeResponse, NodeTransport};

/// Wall clock in unix milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Options
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Construction-time settings for a [`NodeSession`].
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub session: SessionConfig,
    /// Path of the handshake endpoint, joined onto the node endpoint.
    pub auth_path: String,
    /// Process-level cancellation; ends `wait_for_auth` early.
    pub shutdown: CancellationToken,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl SessionOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            session: config.session.clone(),
            auth_path: config.transport.auth_path.clone(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Published state
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Result of the last successful handshake.
#[derive(Debug, Clone, Default)]
pub struct AuthState {
    pub cipher: Option<Arc<SessionCipher>>,
    pub session_token: String,
    /// Unix milliseconds.
    pub expires_at: i64,
    pub nonce: i64,
    /// Device name the node confirmed; used as the request key name.
    pub device_name: String,
    pub authenticated: bool,
}

impl AuthState {
    pub fn is_valid_at(&self, now_ms: i64) -> bool {
        self.authenticated && now_ms < self.expires_at
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct NodeSession {
    node: Arc<SpaceNodeRef>,
    node_key: RsaPublic,
    identity: Arc<dyn DeviceIdentity>,
    transport: Arc<dyn NodeTransport>,
    config: SessionConfig,
    auth_path: String,
    shutdown: CancellationToken,
    /// Held for the whole handshake; serializes attempts for this node.
    handshake_lock: tokio::sync::Mutex<()>,
    state: RwLock<AuthState>,
    last_nonce: AtomicI64,
    refresh: Mutex<Option<RefreshTask>>,
}

impl std::fmt::Debug for NodeSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeSession")
            .field("node", &self.node.to_string())
            .field("authenticated", &self.is_authenticated())
            .finish_non_exhaustive()
    }
}

impl NodeSession {
    /// Fails with [`Error::Crypto`] when the node's public key does not parse.
    pub fn new(
        node: Arc<SpaceNodeRef>,
        identity: Arc<dyn DeviceIdentity>,
        transport: Arc<dyn NodeTransport>,
        options: SessionOptions,
    ) -> Result<Self> {
        let node_key = RsaPublic::from_pem(node.public_key())
            .map_err(|e| Error::Crypto(format!("node {node}: {e}")))?;
        Ok(Self {
            node,
            node_key,
            identity,
            transport,
            config: options.session,
            auth_path: options.auth_path,
            shutdown: options.shutdown,
            handshake_lock: tokio::sync::Mutex::new(()),
            state: RwLock::new(AuthState::default()),
            last_nonce: AtomicI64::new(0),
            refresh: Mutex::new(None),
        })
    }

    pub fn node(&self) -> &Arc<SpaceNodeRef> {
        &self.node
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Snapshot of the published state.
    pub fn state(&self) -> AuthState {
        self.state.read().clone()
    }

    pub fn expires_at(&self) -> i64 {
        self.state.read().expires_at
    }

    pub fn session_token(&self) -> Option<String> {
        let state = self.state.read();
        state.authenticated.then(|| state.session_token.clone())
    }

    pub fn shared_cipher(&self) -> Option<Arc<SessionCipher>> {
        self.state.read().cipher.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.read().is_valid_at(now_ms())
    }

    /// Absolute URL for a node API path.
    pub fn url(&self, path: &str) -> Result<String> {
        let endpoint = self
            .node
            .endpoint()
            .ok_or_else(|| Error::Transport(format!("node {} has no reachable endpoint", self.node)))?;
        Ok(format!("{}{}", endpoint.trim_end_matches('/'), path))
    }

    // ── handshake ────────────────────────────────────────────────────

    /// Ensure a valid session exists, running the handshake if needed.
    ///
    /// Returns `Ok(true)` without touching the network when the current
    /// session is still valid. A failed handshake leaves any previously
    /// published state as it was.
    pub async fn authenticate(&self) -> Result<bool> {
        self.ensure_valid_for(0).await
    }

    /// Like [`authenticate`](Self::authenticate), but treats a session
    /// expiring within `margin_ms` as already expired.
    async fn ensure_valid_for(&self, margin_ms: i64) -> Result<bool> {
        if self.state.read().is_valid_at(now_ms() + margin_ms) {
            return Ok(true);
        }

        let _guard = self.handshake_lock.lock().await;
        // Another caller may have finished a handshake while we waited.
        if self.state.read().is_valid_at(now_ms() + margin_ms) {
            return Ok(true);
        }

        let nonce = self.next_nonce();
        let started = Instant::now();
        match self.handshake(nonce).await {
            Ok(state) => {
                TraceEvent::HandshakeCompleted {
                    node: self.node.to_string(),
                    nonce,
                    expires_at: state.expires_at,
                    duration_ms: started.elapsed().as_millis() as u64,
                }
                .emit();
                *self.state.write() = state;
                Ok(true)
            }
            Err(e) => {
                TraceEvent::HandshakeFailed {
                    node: self.node.to_string(),
                    nonce,
                    reason: e.to_string(),
                }
                .emit();
                Err(e)
            }
        }
    }

    /// Millisecond nonce, strictly increasing per session.
    fn next_nonce(&self) -> i64 {
        let now = now_ms();
        let mut last = self.last_nonce.load(Ordering::Relaxed);
        loop {
            let next = now.max(last + 1);
            match self
                .last_nonce
                .compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return next,
                Err(actual) => last = actual,
            }
        }
    }

    async fn handshake(&self, nonce: i64) -> Result<AuthState> {
        let device = self.identity.device();
        let device_key = RsaPrivate::from_pem(&device.rsa_private_key)?;
        let url = self.url(&self.auth_path)?;

        let ephemeral = EphemeralKey::generate();
        let req_key = AuthReqKey {
            user_id: self.identity.logged_in_user_id(),
            device_ecdh_public_key: ephemeral.public_key_base64(),
            nonce,
        };
        let body = AuthRequest {
            device_id_key: self.identity.device_registration_key(),
            auth_req_key: self.node_key.encrypt_base64(&serde_json::to_vec(&req_key)?)?,
        };

        tracing::debug!(node = %self.node, nonce, "sending auth request");
        let response = self
            .transport
            .execute(NodeRequest::post(url, &body)?)
            .await?
            .error_for_status()?;
        let auth: AuthResponse = response.json()?;

        let plain = device_key.decrypt_base64(&auth.auth_resp_key)?;
        let resp_key: AuthRespKey = serde_json::from_slice(&plain)
            .map_err(|e| Error::Decryption(format!("malformed auth response key: {e}")))?;

        if resp_key.device_name != device.name {
            return Err(Error::InvalidResponse(format!(
                "auth response names device {:?}, expected {:?}",
                resp_key.device_name, device.name
            )));
        }
        if resp_key.nonce != nonce {
            return Err(Error::InvalidResponse(format!(
                "auth response echoed nonce {}, expected {nonce}",
                resp_key.nonce
            )));
        }

        let shared = ephemeral.agree(&resp_key.node_ecdh_public_key)?;
        let cipher = SessionCipher::derive(&shared, nonce)?;

        tracing::debug!(node = %self.node, nonce, expires_at = resp_key.timeout_at, "node session established");
        Ok(AuthState {
            cipher: Some(Arc::new(cipher)),
            session_token: auth.auth_id_key,
            expires_at: resp_key.timeout_at,
            nonce,
            device_name: resp_key.device_name,
            authenticated: true,
        })
    }

    // ── background refresh ───────────────────────────────────────────

    /// Start the refresh loop. Authenticates immediately, then again
    /// `refresh_lead` before each expiry; failures retry after
    /// `retry_interval`. No-op when already running.
    pub fn start(self: &Arc<Self>) {
        let mut slot = self.refresh.lock();
        if slot.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }
        let weak = Arc::downgrade(self);
        *slot = Some(RefreshTask::spawn(self.node.to_string(), move || {
            let weak = weak.clone();
            async move {
                let session = weak.upgrade()?;
                Some(session.refresh_once().await)
            }
        }));
    }

    /// Stop the refresh loop and wait for it to exit.
    pub async fn stop(&self) {
        let task = self.refresh.lock().take();
        if let Some(task) = task {
            task.stop().await;
            tracing::debug!(node = %self.node, "node session stopped");
        }
    }

    /// Signal the refresh loop to exit without waiting for it. For
    /// contexts that cannot await [`stop`](Self::stop).
    pub fn cancel(&self) {
        if let Some(task) = self.refresh.lock().take() {
            task.cancel();
        }
    }

    pub fn is_refreshing(&self) -> bool {
        self.refresh
            .lock()
            .as_ref()
            .is_some_and(|t| !t.is_finished())
    }

    async fn refresh_once(&self) -> Duration {
        let lead = self.config.refresh_lead_ms as i64;
        match self.ensure_valid_for(lead).await {
            Ok(_) => {
                let remaining = self.expires_at() - now_ms() - lead;
                Duration::from_millis(remaining.max(0) as u64).max(self.config.poll_interval())
            }
            Err(e) => {
                tracing::warn!(node = %self.node, error = %e, "node session refresh failed");
                self.config.retry_interval()
            }
        }
    }

    /// Wait until authenticated, `timeout` elapses, or the process is
    /// shutting down. Returns whether the session is authenticated.
    pub async fn wait_for_auth(&self, timeout: Duration) -> bool {
        if self.is_authenticated() {
            return true;
        }

        let deadline = tokio::time::Instant::now() + timeout;
        let mut ticker = tokio::time::interval(self.config.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let interrupt = interrupt_signal(self.config.trap_interrupt);
        tokio::pin!(interrupt);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.is_authenticated() {
                        return true;
                    }
                }
                _ = tokio::time::sleep_until(deadline) => {
                    let ok = self.is_authenticated();
                    if !ok {
                        tracing::debug!(node = %self.node, timeout_ms = timeout.as_millis() as u64, "timed out waiting for node authentication");
                    }
                    return ok;
                }
                _ = self.shutdown.cancelled() => {
                    tracing::debug!(node = %self.node, "wait for authentication cancelled");
                    return false;
                }
                _ = &mut interrupt => {
                    tracing::debug!(node = %self.node, "wait for authentication interrupted");
                    return false;
                }
            }
        }
    }

    // ── requests ─────────────────────────────────────────────────────

    /// Attach `X-Auth-Key` and a fresh `X-Auth-Token` to `request`.
    pub fn sign_request(&self, request: &mut NodeRequest) -> Result<()> {
        let state = self.state.read().clone();
        let now = now_ms();
        let cipher = match (&state.cipher, state.is_valid_at(now)) {
            (Some(cipher), true) => cipher.clone(),
            _ => {
                return Err(Error::NotAuthenticated(format!(
                    "no valid session with {}",
                    self.node
                )))
            }
        };

        let token = seal_request_token(
            &cipher,
            &state.device_name,
            &request.url,
            &state.session_token,
            now,
        )?;
        request.set_header(HEADER_AUTH_KEY, state.session_token);
        request.set_header(HEADER_AUTH_TOKEN, token);
        Ok(())
    }

    /// Sign and execute `request`, mapping error statuses to errors.
    pub async fn send(&self, mut request: NodeRequest) -> Result<NodeResponse> {
        self.sign_request(&mut request)?;
        self.transport.execute(request).await?.error_for_status()
    }
}

impl Drop for NodeSession {
    fn drop(&mut self) {
        if let Some(task) = self.refresh.get_mut().take() {
            task.cancel();
        }
    }
}

/// Resolves on Ctrl-C when `enabled`, otherwise never.
async fn interrupt_signal(enabled: bool) {
    if enabled && tokio::signal::ctrl_c().await.is_ok() {
        return;
    }
    std::future::pending::<()>().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, Behavior, FakeNode};

    fn session_for(fake: &Arc<FakeNode>) -> Arc<NodeSession> {
        Arc::new(
            NodeSession::new(
                Arc::new(fake.node_ref("home", Some("S1"))),
                testing::device_identity(),
                fake.clone(),
                testing::fast_options(),
            )
            .unwrap(),
        )
    }

    #[test]
    fn validity_is_strictly_before_expiry() {
        let state = AuthState {
            authenticated: true,
            expires_at: 1_000,
            ..Default::default()
        };
        assert!(state.is_valid_at(999));
        assert!(!state.is_valid_at(1_000));
        assert!(!state.is_valid_at(1_001));
        assert!(!AuthState::default().is_valid_at(0));
    }

    #[test]
    fn nonces_strictly_increase() {
        let fake = FakeNode::new();
        let session = session_for(&fake);
        let mut prev = 0;
        for _ in 0..100 {
            let n = session.next_nonce();
            assert!(n > prev);
            prev = n;
        }
    }

    #[test]
    fn bad_node_key_fails_construction() {
        let fake = FakeNode::new();
        let mut node = fake.node_ref("home", None);
        if let SpaceNodeRef::Local(d) = &mut node {
            d.public_key = "not a key".into();
        }
        let err = NodeSession::new(
            Arc::new(node),
            testing::device_identity(),
            fake.clone(),
            testing::fast_options(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Crypto(_)));
    }

    #[tokio::test]
    async fn second_authenticate_reuses_session() {
        let fake = FakeNode::new();
        let session = session_for(&fake);
        assert!(session.authenticate().await.unwrap());
        assert!(session.authenticate().await.unwrap());
        assert_eq!(fake.auth_calls(), 1);
        assert!(session.is_authenticated());
    }

    #[tokio::test]
    async fn wrong_nonce_keeps_previous_state() {
        let fake = FakeNode::new();
        let session = session_for(&fake);
        session.authenticate().await.unwrap();
        let before = session.state();

        // Force the next attempt to hit the network.
        session.state.write().expires_at = now_ms() + 60_000;
        fake.set_behavior(Behavior::WrongNonce);
        let err = session.ensure_valid_for(3_600_000).await.unwrap_err();
        assert!(matches!(err, Error::InvalidResponse(_)));

        let after = session.state();
        assert_eq!(after.session_token, before.session_token);
        assert_eq!(after.nonce, before.nonce);
        assert!(session.is_authenticated());
    }

    #[tokio::test]
    async fn wrong_device_name_is_rejected() {
        let fake = FakeNode::new();
        fake.set_behavior(Behavior::WrongDeviceName);
        let session = session_for(&fake);
        let err = session.authenticate().await.unwrap_err();
        assert!(matches!(err, Error::InvalidResponse(_)));
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn node_error_body_surfaces() {
        let fake = FakeNode::new();
        fake.set_behavior(Behavior::Reject {
            code: 1001,
            message: "Request Error".into(),
        });
        let session = session_for(&fake);
        match session.authenticate().await {
            Err(Error::Node { code, message }) => {
                assert_eq!(code, 1001);
                assert_eq!(message, "Request Error");
            }
            other => panic!("expected node error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn sign_request_requires_session() {
        let fake = FakeNode::new();
        let session = session_for(&fake);
        let mut req = NodeRequest::get("https://home.test/users");
        let err = session.sign_request(&mut req).unwrap_err();
        assert!(matches!(err, Error::NotAuthenticated(_)));
        assert!(req.header(HEADER_AUTH_KEY).is_none());
    }

    #[tokio::test]
    async fn expired_session_is_not_authenticated() {
        let fake = FakeNode::new();
        let session = session_for(&fake);
        session.authenticate().await.unwrap();
        session.state.write().expires_at = now_ms() - 1;
        assert!(!session.is_authenticated());
        let mut req = NodeRequest::get("https://home.test/users");
        assert!(session.sign_request(&mut req).is_err());
    }

    #[tokio::test]
    async fn concurrent_authenticate_runs_one_handshake() {
        let fake = FakeNode::new();
        fake.set_behavior(Behavior::Delay(Duration::from_millis(50)));
        let session = session_for(&fake);
        let mut joins = Vec::new();
        for _ in 0..8 {
            let s = session.clone();
            joins.push(tokio::spawn(async move { s.authenticate().await }));
        }
        for j in joins {
            assert!(j.await.unwrap().unwrap());
        }
        assert_eq!(fake.auth_calls(), 1);
    }

    #[tokio::test]
    async fn refresh_loop_renews_before_expiry() {
        let fake = FakeNode::with_ttl(300);
        let session = session_for(&fake);
        session.start();
        assert!(session.wait_for_auth(Duration::from_secs(2)).await);
        let first = session.expires_at();

        tokio::time::sleep(Duration::from_millis(700)).await;
        assert!(fake.auth_calls() >= 2);
        assert!(session.expires_at() > first);
        assert!(session.is_authenticated());

        session.stop().await;
        assert!(!session.is_refreshing());
    }

    #[tokio::test]
    async fn refresh_loop_retries_failures() {
        let fake = FakeNode::new();
        fake.set_behavior(Behavior::Unavailable);
        let session = session_for(&fake);
        session.start();
        assert!(!session.wait_for_auth(Duration::from_millis(100)).await);

        fake.set_behavior(Behavior::Normal);
        assert!(session.wait_for_auth(Duration::from_secs(2)).await);
        session.stop().await;
    }

    #[tokio::test]
    async fn wait_for_auth_honors_shutdown() {
        let fake = FakeNode::new();
        fake.set_behavior(Behavior::Unavailable);
        let shutdown = CancellationToken::new();
        let session = NodeSession::new(
            Arc::new(fake.node_ref("home", None)),
            testing::device_identity(),
            fake.clone(),
            testing::fast_options().with_shutdown(shutdown.clone()),
        )
        .unwrap();

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            shutdown.cancel();
        });
        let started = Instant::now();
        assert!(!session.wait_for_auth(Duration::from_secs(10)).await);
        assert!(started.elapsed() < Duration::from_secs(5));
        canceller.await.unwrap();
    }
}
