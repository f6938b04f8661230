//! Immutable lookup tables over the merged node set.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use sn_domain::SpaceNodeRef;

/// Nodes indexed by key and by endpoint, plus the shared-space list.
///
/// Built once per directory; entries are only ever added.
#[derive(Debug, Default)]
pub struct NodeIndex {
    by_key: HashMap<String, Vec<Arc<SpaceNodeRef>>>,
    by_endpoint: HashMap<String, Arc<SpaceNodeRef>>,
    shared: Vec<Arc<SpaceNodeRef>>,
    local_space_ids: HashSet<String>,
    local_count: usize,
    remote_count: usize,
}

impl NodeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an owned target. Local keys are unique; a repeated key
    /// replaces the earlier target.
    pub fn insert_local(&mut self, node: SpaceNodeRef) {
        let node = Arc::new(node);
        if let Some(id) = node.space_id() {
            self.local_space_ids.insert(id.to_string());
        }
        if node.endpoint().is_some() {
            self.index_endpoint(&node);
        } else {
            tracing::debug!(node = %node, "local target has no usable endpoint; indexed by key only");
        }
        if let Some(previous) = self.by_key.insert(node.key().to_string(), vec![node]) {
            tracing::warn!(key = %previous[0].key(), "duplicate local target key replaced");
        } else {
            self.local_count += 1;
        }
    }

    /// Merge a catalog entry. Returns `false` when an entry with the same
    /// space id is already listed under its key.
    pub fn merge_remote(&mut self, node: SpaceNodeRef) -> bool {
        let node = Arc::new(node);
        let listed = self.by_key.entry(node.key().to_string()).or_default();
        if listed
            .iter()
            .any(|n| n.space_id().is_some() && n.space_id() == node.space_id())
        {
            tracing::debug!(node = %node, "remote entry duplicates a listed node; dropped");
            return false;
        }
        listed.push(node.clone());
        self.remote_count += 1;
        self.index_endpoint(&node);

        let is_local_space = node
            .space_id()
            .is_some_and(|id| self.local_space_ids.contains(id));
        let already_shared = node
            .space_id()
            .is_some_and(|id| self.shared.iter().any(|s| s.space_id() == Some(id)));
        if !is_local_space && !already_shared {
            self.shared.push(node);
        }
        true
    }

    /// First writer wins for each endpoint form.
    fn index_endpoint(&mut self, node: &Arc<SpaceNodeRef>) {
        for form in node.endpoint_forms() {
            self.by_endpoint
                .entry(form)
                .or_insert_with(|| node.clone());
        }
    }

    /// All nodes listed under `key`, local first then catalog order.
    pub fn by_key(&self, key: &str) -> &[Arc<SpaceNodeRef>] {
        self.by_key.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    /// Lookup by full endpoint URL or bare `host[:port]`.
    pub fn by_endpoint(&self, endpoint: &str) -> Option<Arc<SpaceNodeRef>> {
        self.by_endpoint.get(endpoint).cloned()
    }

    /// Every node, sorted by key, then space id (absent first), then
    /// local before remote.
    pub fn all(&self) -> Vec<Arc<SpaceNodeRef>> {
        let mut nodes: Vec<_> = self.by_key.values().flatten().cloned().collect();
        nodes.sort_by(|a, b| {
            (a.key(), a.space_id(), a.provenance()).cmp(&(b.key(), b.space_id(), b.provenance()))
        });
        nodes
    }

    pub fn shared(&self) -> &[Arc<SpaceNodeRef>] {
        &self.shared
    }

    pub fn local_count(&self) -> usize {
        self.local_count
    }

    pub fn remote_count(&self) -> usize {
        self.remote_count
    }
}
