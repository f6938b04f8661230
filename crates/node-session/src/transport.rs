//! HTTP transport to a single space node.
//!
//! Sessions never talk to `reqwest` directly: they hand a [`NodeRequest`]
//! to a [`NodeTransport`], which lets tests swap in an in-process node
//! and lets hosts route through their own tunnel stack.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Certificate, Client, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sn_domain::config::TransportConfig;
use sn_domain::error::{Error, Result};
use sn_domain::trace::TraceEvent;
use sn_domain::SpaceNodeRef;
use sn_protocol::ErrorResponse;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request / response
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// An outbound call to a node, before transport-specific encoding.
#[derive(Debug, Clone)]
pub struct NodeRequest {
    pub method: Method,
    /// Absolute URL, endpoint included.
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl NodeRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    pub fn post<T: Serialize>(url: impl Into<String>, body: &T) -> Result<Self> {
        Self::new(Method::POST, url).with_json(body)
    }

    pub fn put<T: Serialize>(url: impl Into<String>, body: &T) -> Result<Self> {
        Self::new(Method::PUT, url).with_json(body)
    }

    pub fn with_json<T: Serialize>(mut self, body: &T) -> Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Header lookup, case-insensitive like HTTP.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Set a header, replacing any existing value under the same name.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.into()));
    }

    /// Path component of the URL, for routing and logs.
    pub fn path(&self) -> String {
        url::Url::parse(&self.url)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| self.url.clone())
    }
}

/// Status and raw body of a node reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeResponse {
    pub status: u16,
    pub body: String,
}

impl NodeResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn json_body<T: Serialize>(status: u16, body: &T) -> Result<Self> {
        Ok(Self::new(status, serde_json::to_string(body)?))
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Map a non-2xx reply to an error.
    ///
    /// A body in the node's `{errorCode, errorMessage}` shape becomes
    /// [`Error::Node`]; anything else is a transport failure.
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        match serde_json::from_str::<ErrorResponse>(&self.body) {
            Ok(err) if err.error_code != 0 || !err.error_message.is_empty() => {
                Err(Error::node(err.error_code, err.error_message))
            }
            _ => Err(Error::Transport(format!(
                "node returned {}: {}",
                self.status,
                truncate(&self.body, 200)
            ))),
        }
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body)
            .map_err(|e| Error::InvalidResponse(format!("unexpected node reply: {e}")))
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Traits
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Executes requests against one node.
///
/// Only connection-level failures are errors here; HTTP error statuses
/// come back as a [`NodeResponse`] for the caller to interpret.
#[async_trait]
pub trait NodeTransport: Send + Sync {
    async fn execute(&self, request: NodeRequest) -> Result<NodeResponse>;
}

/// Builds a transport for a node. The directory uses this when it
/// creates pooled sessions.
pub trait NodeConnector: Send + Sync {
    fn connect(&self, node: &SpaceNodeRef) -> Result<Arc<dyn NodeTransport>>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// HTTP implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// `reqwest` transport. When the node carries a cached CA root, that
/// root is the only trust anchor for the connection.
#[derive(Debug, Clone)]
pub struct HttpNodeTransport {
    http: Client,
    label: String,
}

impl HttpNodeTransport {
    pub fn new(node: &SpaceNodeRef, cfg: &TransportConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(cfg.request_timeout())
            .user_agent(cfg.user_agent.clone());

        if let Some(pem) = node.ca_root() {
            let cert = Certificate::from_pem(pem.as_bytes())
                .map_err(|e| Error::Config(format!("invalid CA root for {node}: {e}")))?;
            builder = builder
                .add_root_certificate(cert)
                .tls_built_in_root_certs(false);
        }

        let http = builder
            .build()
            .map_err(|e| Error::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            label: node.to_string(),
        })
    }
}

#[async_trait]
impl NodeTransport for HttpNodeTransport {
    async fn execute(&self, request: NodeRequest) -> Result<NodeResponse> {
        let endpoint = request.path();
        let mut rb = self.http.request(request.method.clone(), &request.url);
        for (name, value) in &request.headers {
            rb = rb.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            rb = rb.json(body);
        }

        let start = Instant::now();
        let resp = rb.send().await.map_err(|e| from_reqwest(&self.label, e))?;
        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| from_reqwest(&self.label, e))?;

        TraceEvent::NodeCall {
            node: self.label.clone(),
            endpoint,
            status,
            duration_ms: start.elapsed().as_millis() as u64,
        }
        .emit();

        Ok(NodeResponse { status, body })
    }
}

fn from_reqwest(node: &str, e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(format!("request to {node} timed out"))
    } else {
        Error::Transport(format!("request to {node} failed: {e}"))
    }
}

/// Default connector: one [`HttpNodeTransport`] per node.
#[derive(Debug, Clone, Default)]
pub struct HttpConnector {
    cfg: TransportConfig,
}

impl HttpConnector {
    pub fn new(cfg: TransportConfig) -> Self {
        Self { cfg }
    }

    pub fn request_timeout(&self) -> Duration {
        self.cfg.request_timeout()
    }
}

impl NodeConnector for HttpConnector {
    fn connect(&self, node: &SpaceNodeRef) -> Result<Arc<dyn NodeTransport>> {
        Ok(Arc::new(HttpNodeTransport::new(node, &self.cfg)?))
    }
}
