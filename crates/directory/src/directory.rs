//! The consolidated space-node directory and its session pool.

use std::sync::Arc;
use std::time::{Duration, Instant};

use sn_domain::config::{Config, DirectoryConfig};
use sn_domain::error::{Error, Result};
use sn_domain::trace::TraceEvent;
use sn_domain::SpaceNodeRef;
use sn_session::{DeviceIdentity, HttpConnector, NodeConnector, NodeSession, SessionOptions};
use tokio_util::sync::CancellationToken;

use crate::catalog::{LocalTargets, RemoteSpace, RemoteSpaceCatalog};
use crate::index::NodeIndex;
use crate::pool::{Checkin, SessionPool};

/// Picks one node when several share a key.
pub type TieBreaker<'a> = &'a dyn Fn(&[Arc<SpaceNodeRef>]) -> Arc<SpaceNodeRef>;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Context
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// What the directory needs to open sessions.
#[derive(Clone)]
pub struct DirectoryContext {
    pub identity: Arc<dyn DeviceIdentity>,
    pub connector: Arc<dyn NodeConnector>,
    pub session: SessionOptions,
    pub directory: DirectoryConfig,
}

impl DirectoryContext {
    /// HTTP connector and settings taken from `config`.
    pub fn new(identity: Arc<dyn DeviceIdentity>, config: &Config) -> Self {
        Self {
            identity,
            connector: Arc::new(HttpConnector::new(config.transport.clone())),
            session: SessionOptions::from_config(config),
            directory: config.directory.clone(),
        }
    }

    pub fn with_connector(mut self, connector: Arc<dyn NodeConnector>) -> Self {
        self.connector = connector;
        self
    }

    pub fn with_session_options(mut self, session: SessionOptions) -> Self {
        self.session = session;
        self
    }

    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.session.shutdown = shutdown;
        self
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Directory
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Every space node the device can reach, local and shared, plus a
/// pool of authenticated sessions to them.
///
/// The node set is fixed at construction; build a new directory to
/// pick up changes.
pub struct SpaceNodeDirectory {
    index: NodeIndex,
    ctx: DirectoryContext,
    pool: SessionPool,
}

impl SpaceNodeDirectory {
    /// Scan local targets and fetch the remote catalog concurrently,
    /// then merge. Fails when the catalog fetch fails.
    pub async fn build(
        local: &dyn LocalTargets,
        catalog: &dyn RemoteSpaceCatalog,
        ctx: DirectoryContext,
    ) -> Result<Self> {
        if !ctx.directory.include_remote {
            return Ok(Self::local_only(local, ctx));
        }

        let started = Instant::now();
        let catalog_timeout = ctx.directory.catalog_timeout();
        let fetch = async {
            match tokio::time::timeout(catalog_timeout, catalog.accessible_spaces()).await {
                Ok(result) => result,
                Err(_) => Err(Error::Timeout(format!(
                    "remote space catalog did not answer within {}ms",
                    catalog_timeout.as_millis()
                ))),
            }
        };
        let scan = async { scan_local(local) };

        // The fetch is polled first so the request is in flight while
        // the local scan runs.
        let (remote, mut index) = tokio::join!(fetch, scan);
        let remote = remote.map_err(|e| {
            tracing::warn!(error = %e, "remote space catalog fetch failed");
            e
        })?;
        merge_remote(&mut index, remote);

        let directory = Self::from_index(index, ctx);
        directory.emit_built(started);
        Ok(directory)
    }

    /// Owned targets only; no catalog fetch and no shared spaces.
    pub fn local_only(local: &dyn LocalTargets, ctx: DirectoryContext) -> Self {
        let started = Instant::now();
        let directory = Self::from_index(scan_local(local), ctx);
        directory.emit_built(started);
        directory
    }

    fn from_index(index: NodeIndex, ctx: DirectoryContext) -> Self {
        Self {
            index,
            ctx,
            pool: SessionPool::new(),
        }
    }

    fn emit_built(&self, started: Instant) {
        TraceEvent::DirectoryBuilt {
            local_nodes: self.index.local_count(),
            remote_nodes: self.index.remote_count(),
            shared_spaces: self.index.shared().len(),
            duration_ms: started.elapsed().as_millis() as u64,
        }
        .emit();
    }

    // ── lookups ──────────────────────────────────────────────────────

    /// Node listed under `key`. With several candidates, `tie_breaker`
    /// picks one; without it the first (local, then catalog order) wins.
    pub fn lookup_by_key(&self, key: &str, tie_breaker: Option<TieBreaker<'_>>) -> Option<Arc<SpaceNodeRef>> {
        let candidates = self.index.by_key(key);
        match (candidates.len(), tie_breaker) {
            (0, _) => None,
            (n, Some(pick)) if n > 1 => Some(pick(candidates)),
            _ => candidates.first().cloned(),
        }
    }

    /// Accepts either the full endpoint URL or its bare `host[:port]`.
    pub fn lookup_by_endpoint(&self, endpoint: &str) -> Option<Arc<SpaceNodeRef>> {
        self.index.by_endpoint(endpoint)
    }

    pub fn all_spaces(&self) -> Vec<Arc<SpaceNodeRef>> {
        self.index.all()
    }

    /// Remote spaces that are not also local targets, in catalog order.
    pub fn shared_spaces(&self) -> Vec<Arc<SpaceNodeRef>> {
        self.index.shared().to_vec()
    }

    pub fn egress_nodes(&self) -> Vec<Arc<SpaceNodeRef>> {
        self.index
            .all()
            .into_iter()
            .filter(|n| n.can_use_as_egress())
            .collect()
    }

    // ── session pool ─────────────────────────────────────────────────

    /// Shared, authenticated session to `node`.
    ///
    /// The first caller creates and starts the session; later callers
    /// reuse it. Every caller then waits up to `timeout` for it to
    /// authenticate. On timeout, or when the future is dropped while
    /// waiting, this caller's reference is returned to the pool.
    pub async fn acquire_session(&self, node: &Arc<SpaceNodeRef>, timeout: Duration) -> Result<Arc<NodeSession>> {
        let identity = node.identity();
        let checkout = self.pool.checkout(&identity, || {
            let transport = self.ctx.connector.connect(node)?;
            let session = Arc::new(NodeSession::new(
                node.clone(),
                self.ctx.identity.clone(),
                transport,
                self.ctx.session.clone(),
            )?);
            session.start();
            Ok(session)
        })?;

        TraceEvent::SessionPooled {
            node: identity.clone(),
            refcount: checkout.refcount,
            created: checkout.created,
        }
        .emit();

        // Returns the reference if this future is dropped mid-wait.
        let pending = PendingCheckout {
            pool: &self.pool,
            identity,
            session: checkout.session,
            armed: true,
        };
        let authenticated = pending.session.wait_for_auth(timeout).await;
        let session = pending.complete();
        if authenticated {
            return Ok(session);
        }

        self.release_session(&session).await;
        Err(Error::Timeout(format!(
            "timed out waiting for space node {node} to authenticate"
        )))
    }

    /// [`acquire_session`](Self::acquire_session) with the configured
    /// auth timeout.
    pub async fn acquire_session_default(&self, node: &Arc<SpaceNodeRef>) -> Result<Arc<NodeSession>> {
        let timeout = self.ctx.session.session.auth_timeout();
        self.acquire_session(node, timeout).await
    }

    /// Return a reference. The last holder stops the session and waits
    /// for its refresh loop to exit.
    pub async fn release_session(&self, session: &Arc<NodeSession>) {
        let identity = session.node().identity();
        match self.pool.checkin(&identity, session) {
            Checkin::Retained { refcount } => {
                tracing::debug!(node = %identity, refcount, "node session released");
            }
            Checkin::Evicted(evicted) => {
                evicted.stop().await;
                TraceEvent::SessionEvicted { node: identity }.emit();
            }
            Checkin::Unknown => {
                tracing::error!(
                    node = %identity,
                    "released session is not managed by this directory"
                );
            }
        }
    }

    /// Identities of pooled sessions, sorted.
    pub fn pooled_sessions(&self) -> Vec<String> {
        self.pool.identities()
    }

    pub fn refcount(&self, node: &SpaceNodeRef) -> Option<usize> {
        self.pool.refcount(&node.identity())
    }

    /// Stop and drop every pooled session, regardless of holders.
    pub async fn shutdown(&self) {
        for session in self.pool.drain() {
            session.stop().await;
            TraceEvent::SessionEvicted {
                node: session.node().identity(),
            }
            .emit();
        }
    }
}

/// A checked-out reference not yet handed to the caller.
struct PendingCheckout<'a> {
    pool: &'a SessionPool,
    identity: String,
    session: Arc<NodeSession>,
    armed: bool,
}

impl PendingCheckout<'_> {
    fn complete(mut self) -> Arc<NodeSession> {
        self.armed = false;
        self.session.clone()
    }
}

impl Drop for PendingCheckout<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match self.pool.checkin(&self.identity, &self.session) {
            Checkin::Retained { refcount } => {
                tracing::debug!(node = %self.identity, refcount, "abandoned session acquire returned its reference");
            }
            Checkin::Evicted(evicted) => {
                evicted.cancel();
                TraceEvent::SessionEvicted {
                    node: self.identity.clone(),
                }
                .emit();
            }
            Checkin::Unknown => {}
        }
    }
}

fn scan_local(local: &dyn LocalTargets) -> NodeIndex {
    let mut index = NodeIndex::new();
    for target in local.managed_targets() {
        if !target.has_bastion {
            continue;
        }
        if let Some(err) = &target.state_error {
            tracing::debug!(key = %target.key, error = %err, "failed to load remote state for target");
        }
        index.insert_local(target.into_node_ref());
    }
    index
}

fn merge_remote(index: &mut NodeIndex, remote: Vec<RemoteSpace>) {
    for space in remote {
        if !space.is_active() {
            tracing::debug!(space_id = %space.space_id, "skipping inactive shared space");
            continue;
        }
        index.merge_remote(space.into_node_ref());
    }
}
