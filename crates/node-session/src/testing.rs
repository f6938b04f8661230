//! Fixtures for exercising sessions without a real node: cached RSA keys,
//! a static device identity, and an in-process node transport.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Method;
use sn_domain::config::{ResponderConfig, SessionConfig};
use sn_domain::error::{Error, Result};
use sn_domain::{NodeDescriptor, NodeStatus, SpaceNodeRef};
use sn_protocol::{AuthRequest, ErrorResponse, HEADER_AUTH_KEY, HEADER_AUTH_TOKEN};

use crate::identity::{DeviceIdentity, DeviceKeys, StaticDeviceIdentity};
use crate::responder::NodeResponder;
use crate::session::{now_ms, SessionOptions};
use crate::transport::{NodeConnector, NodeRequest, NodeResponse, NodeTransport};

pub const TEST_USER_ID: &str = "u1";
pub const TEST_DEVICE_NAME: &str = "dev1";
pub const TEST_REGISTRATION_KEY: &str = "reg-dev1";

/// Key generation is slow, so each key is made once per test binary.
pub mod keys {
    use std::sync::OnceLock;

    use crate::crypto::RsaPrivate;

    const TEST_KEY_BITS: usize = 1024;

    fn cached(slot: &'static OnceLock<RsaPrivate>) -> RsaPrivate {
        slot.get_or_init(|| {
            RsaPrivate::generate(TEST_KEY_BITS).unwrap_or_else(|e| panic!("test key generation: {e}"))
        })
        .clone()
    }

    pub fn node_key() -> RsaPrivate {
        static KEY: OnceLock<RsaPrivate> = OnceLock::new();
        cached(&KEY)
    }

    pub fn device_key() -> RsaPrivate {
        static KEY: OnceLock<RsaPrivate> = OnceLock::new();
        cached(&KEY)
    }
}

fn pem_or_panic(result: Result<String>) -> String {
    result.unwrap_or_else(|e| panic!("test key encoding: {e}"))
}

/// Identity of user `u1` on device `dev1`.
pub fn device_identity() -> Arc<dyn DeviceIdentity> {
    let key = keys::device_key();
    Arc::new(StaticDeviceIdentity {
        registration_key: TEST_REGISTRATION_KEY.into(),
        user_id: TEST_USER_ID.into(),
        keys: DeviceKeys {
            name: TEST_DEVICE_NAME.into(),
            rsa_private_key: pem_or_panic(key.to_pem()),
            rsa_public_key: pem_or_panic(key.public_key().to_pem()),
        },
    })
}

/// Short timings so refresh and retry paths run within a test.
pub fn fast_options() -> SessionOptions {
    let mut options = SessionOptions::default();
    options.session = SessionConfig {
        auth_timeout_ms: 2_000,
        retry_interval_ms: 20,
        refresh_lead_ms: 50,
        poll_interval_ms: 5,
        trap_interrupt: false,
    };
    options
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Fake node
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// How the fake node treats incoming requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Behavior {
    Normal,
    /// Echo `nonce + 1` in the handshake.
    WrongNonce,
    /// Name a different device in the handshake.
    WrongDeviceName,
    /// Issue sessions expiring at this unix millisecond.
    ExpiresAt(i64),
    /// Answer every request with a structured error body.
    Reject { code: i64, message: String },
    /// Fail at the connection level.
    Unavailable,
    /// Behave normally after sleeping.
    Delay(Duration),
}

/// In-process node: answers `/auth` through a real [`NodeResponder`],
/// verifies signed requests, and serves canned API routes.
pub struct FakeNode {
    responder: NodeResponder,
    auth_path: String,
    behavior: Mutex<Behavior>,
    session_token: Mutex<Option<String>>,
    routes: Mutex<HashMap<(Method, String), NodeResponse>>,
    requests: Mutex<Vec<NodeRequest>>,
    auth_calls: AtomicUsize,
    verified_calls: AtomicUsize,
}

impl FakeNode {
    pub fn new() -> Arc<Self> {
        Self::with_ttl(ResponderConfig::default().session_ttl_ms)
    }

    pub fn with_ttl(session_ttl_ms: u64) -> Arc<Self> {
        let responder = NodeResponder::new(
            keys::node_key(),
            ResponderConfig {
                session_ttl_ms,
                ..ResponderConfig::default()
            },
        );
        let device_pub = pem_or_panic(keys::device_key().public_key().to_pem());
        responder
            .register_device(TEST_REGISTRATION_KEY, TEST_DEVICE_NAME, &device_pub)
            .unwrap_or_else(|e| panic!("register test device: {e}"));

        Arc::new(Self {
            responder,
            auth_path: SessionOptions::default().auth_path,
            behavior: Mutex::new(Behavior::Normal),
            session_token: Mutex::new(None),
            routes: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
            auth_calls: AtomicUsize::new(0),
            verified_calls: AtomicUsize::new(0),
        })
    }

    /// A running, owned node reachable at `https://<key>.test`.
    pub fn node_ref(&self, key: &str, space_id: Option<&str>) -> SpaceNodeRef {
        SpaceNodeRef::Local(self.descriptor(key, space_id))
    }

    pub fn remote_ref(&self, key: &str, space_id: &str) -> SpaceNodeRef {
        let mut d = self.descriptor(key, Some(space_id));
        d.is_owner = false;
        SpaceNodeRef::Remote(d)
    }

    fn descriptor(&self, key: &str, space_id: Option<&str>) -> NodeDescriptor {
        NodeDescriptor {
            key: key.into(),
            space_id: space_id.map(Into::into),
            endpoint: Some(format!("https://{key}.test")),
            public_key: pem_or_panic(self.responder.public_key().to_pem()),
            status: NodeStatus::Running,
            can_use_as_egress: false,
            is_owner: true,
            ca_root: None,
        }
    }

    pub fn responder(&self) -> &NodeResponder {
        &self.responder
    }

    pub fn set_behavior(&self, behavior: Behavior) {
        *self.behavior.lock() = behavior;
    }

    /// Issue this token instead of a random one.
    pub fn set_session_token(&self, token: &str) {
        *self.session_token.lock() = Some(token.to_string());
    }

    /// Serve `body` with `status` for `method path` to verified callers.
    pub fn route<T: serde::Serialize>(&self, method: Method, path: &str, status: u16, body: &T) {
        let response = NodeResponse::json_body(status, body)
            .unwrap_or_else(|e| panic!("route body for {path}: {e}"));
        self.routes.lock().insert((method, path.to_string()), response);
    }

    pub fn auth_calls(&self) -> usize {
        self.auth_calls.load(Ordering::SeqCst)
    }

    pub fn verified_calls(&self) -> usize {
        self.verified_calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<NodeRequest> {
        self.requests.lock().clone()
    }

    pub fn last_request(&self) -> Option<NodeRequest> {
        self.requests.lock().last().cloned()
    }

    fn handle_auth(&self, request: &NodeRequest, behavior: &Behavior) -> Result<NodeResponse> {
        self.auth_calls.fetch_add(1, Ordering::SeqCst);
        let body: AuthRequest = serde_json::from_value(request.body.clone().unwrap_or_default())?;
        let token = self
            .session_token
            .lock()
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let reply = self.responder.respond_with(&body, now_ms(), &token, |key| match behavior {
            Behavior::WrongNonce => key.nonce += 1,
            Behavior::WrongDeviceName => key.device_name = "someone-else".into(),
            Behavior::ExpiresAt(at) => key.timeout_at = *at,
            _ => {}
        });
        match reply {
            Ok(resp) => NodeResponse::json_body(200, &resp),
            Err(e) => error_reply(401, 1002, &e.to_string()),
        }
    }

    fn handle_api(&self, request: &NodeRequest) -> Result<NodeResponse> {
        let auth_key = request.header(HEADER_AUTH_KEY).unwrap_or_default();
        let auth_token = request.header(HEADER_AUTH_TOKEN).unwrap_or_default();
        if let Err(e) = self.responder.verify(&request.url, auth_key, auth_token, now_ms()) {
            return error_reply(401, 1002, &e.to_string());
        }
        self.verified_calls.fetch_add(1, Ordering::SeqCst);

        let route = self
            .routes
            .lock()
            .get(&(request.method.clone(), request.path()))
            .cloned();
        match route {
            Some(resp) => Ok(resp),
            None => error_reply(404, 1004, "Not Found"),
        }
    }
}

fn error_reply(status: u16, code: i64, message: &str) -> Result<NodeResponse> {
    NodeResponse::json_body(
        status,
        &ErrorResponse {
            error_code: code,
            error_message: message.to_string(),
        },
    )
}

#[async_trait]
impl NodeTransport for FakeNode {
    async fn execute(&self, request: NodeRequest) -> Result<NodeResponse> {
        self.requests.lock().push(request.clone());
        let behavior = self.behavior.lock().clone();

        match &behavior {
            Behavior::Delay(d) => tokio::time::sleep(*d).await,
            Behavior::Unavailable => {
                return Err(Error::Transport(format!("connection to {} refused", request.url)))
            }
            Behavior::Reject { code, message } => return error_reply(400, *code, message),
            _ => {}
        }

        if request.method == Method::POST && request.path() == self.auth_path {
            self.handle_auth(&request, &behavior)
        } else {
            self.handle_api(&request)
        }
    }
}

/// Connector that routes every node to one shared [`FakeNode`].
pub struct FakeConnector {
    node: Arc<FakeNode>,
    connects: AtomicUsize,
}

impl FakeConnector {
    pub fn new(node: Arc<FakeNode>) -> Self {
        Self {
            node,
            connects: AtomicUsize::new(0),
        }
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl NodeConnector for FakeConnector {
    fn connect(&self, _node: &SpaceNodeRef) -> Result<Arc<dyn NodeTransport>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(self.node.clone())
    }
}
