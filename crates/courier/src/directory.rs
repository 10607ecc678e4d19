//! Who hosts which endpoint.
//!
//! The messenger asks a [`Directory`] where to send a call when no local
//! implementor is bound. It also feeds the directory what it learns from
//! the network: implementor announcements and departures.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use courier_transport::NodeId;

/// Lookup of the node hosting an endpoint.
///
/// Implementations must not block; `host_of` is called on every remote
/// invocation. The hooks default to no-ops for directories maintained
/// out of band.
pub trait Directory: Send + Sync + 'static {
    /// A node hosting a request/response implementor for `endpoint`.
    ///
    /// When several nodes host it, which one is returned is up to the
    /// implementation.
    fn host_of(&self, endpoint: &str) -> Option<NodeId>;

    /// A node other than `local` hosting `endpoint`.
    ///
    /// The messenger routes remote calls through this. The default filters
    /// [`host_of`](Self::host_of); directories that know several hosts
    /// should override it so a local entry does not hide a remote one.
    fn remote_host_of(&self, endpoint: &str, local: NodeId) -> Option<NodeId> {
        self.host_of(endpoint).filter(|node| *node != local)
    }

    /// `node` announced an implementor for `endpoint`.
    fn node_hosts(&self, _node: NodeId, _endpoint: &str) {}

    /// `node` announced it no longer hosts `endpoint`.
    fn node_released(&self, _node: NodeId, _endpoint: &str) {}

    /// `node` left the network.
    fn node_departed(&self, _node: NodeId) {}
}

/// A [`Directory`] built from the announcements peers send each other.
///
/// With several hosts for one endpoint, `host_of` returns the one with
/// the lowest node id.
#[derive(Debug, Default)]
pub struct PeerDirectory {
    hosts: Mutex<HashMap<String, BTreeSet<NodeId>>>,
}

impl PeerDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a host by hand, for endpoints known out of band.
    pub fn insert(&self, endpoint: impl Into<String>, node: NodeId) {
        self.lock().entry(endpoint.into()).or_default().insert(node);
    }

    /// All nodes known to host `endpoint`, in id order.
    pub fn hosts_of(&self, endpoint: &str) -> Vec<NodeId> {
        self.lock()
            .get(endpoint)
            .map(|nodes| nodes.iter().copied().collect())
            .unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, BTreeSet<NodeId>>> {
        self.hosts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Directory for PeerDirectory {
    fn host_of(&self, endpoint: &str) -> Option<NodeId> {
        self.lock()
            .get(endpoint)
            .and_then(|nodes| nodes.first().copied())
    }

    fn remote_host_of(&self, endpoint: &str, local: NodeId) -> Option<NodeId> {
        self.lock()
            .get(endpoint)
            .and_then(|nodes| nodes.iter().copied().find(|node| *node != local))
    }

    fn node_hosts(&self, node: NodeId, endpoint: &str) {
        let added = self
            .lock()
            .entry(endpoint.to_owned())
            .or_default()
            .insert(node);
        if added {
            tracing::debug!(%node, endpoint, "peer hosts endpoint");
        }
    }

    fn node_released(&self, node: NodeId, endpoint: &str) {
        let mut hosts = self.lock();
        if let Some(nodes) = hosts.get_mut(endpoint) {
            nodes.remove(&node);
            if nodes.is_empty() {
                hosts.remove(endpoint);
            }
            tracing::debug!(%node, endpoint, "peer released endpoint");
        }
    }

    fn node_departed(&self, node: NodeId) {
        let mut hosts = self.lock();
        hosts.retain(|_, nodes| {
            nodes.remove(&node);
            !nodes.is_empty()
        });
    }
}
