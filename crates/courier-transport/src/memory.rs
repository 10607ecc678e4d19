//! In-process transport: every node is a channel in a shared map.
//!
//! Frames between two nodes are delivered in send order because each node
//! has a single unbounded inbox. There is no cross-sender ordering.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use crate::{NodeId, Transport, TransportError, TransportEvent};

type Inbox = mpsc::UnboundedSender<TransportEvent>;

/// A shared, in-memory network of nodes.
///
/// Cheap to clone; all clones see the same set of nodes.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    inboxes: Arc<Mutex<BTreeMap<NodeId, Inbox>>>,
}

impl MemoryNetwork {
    /// Creates an empty network.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `node` to the network.
    ///
    /// Returns the node's transport and the receiving end of its inbox.
    /// Every node already present gets a `NodeConnected` for the newcomer,
    /// and the newcomer gets one for each node already present. Joining
    /// with an id that is already taken replaces the old inbox.
    pub fn join(
        &self,
        node: NodeId,
    ) -> (MemoryTransport, mpsc::UnboundedReceiver<TransportEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inboxes = self.lock();

        if inboxes.remove(&node).is_some() {
            tracing::warn!(%node, "node rejoined, replacing previous inbox");
        }
        for (peer, inbox) in inboxes.iter() {
            let _ = inbox.send(TransportEvent::NodeConnected(node));
            let _ = tx.send(TransportEvent::NodeConnected(*peer));
        }
        inboxes.insert(node, tx);
        drop(inboxes);

        tracing::debug!(%node, "node joined memory network");
        let transport = MemoryTransport {
            node,
            network: self.clone(),
        };
        (transport, rx)
    }

    /// Removes `node` and tells every remaining node it disconnected.
    ///
    /// Returns `false` if the node was not part of the network.
    pub fn disconnect(&self, node: NodeId) -> bool {
        let mut inboxes = self.lock();
        if inboxes.remove(&node).is_none() {
            return false;
        }
        for inbox in inboxes.values() {
            let _ = inbox.send(TransportEvent::NodeDisconnected(node));
        }
        tracing::debug!(%node, "node left memory network");
        true
    }

    /// Lists the nodes currently on the network, in id order.
    pub fn nodes(&self) -> Vec<NodeId> {
        self.lock().keys().copied().collect()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<NodeId, Inbox>> {
        self.inboxes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One node's view of a [`MemoryNetwork`].
#[derive(Clone)]
pub struct MemoryTransport {
    node: NodeId,
    network: MemoryNetwork,
}

impl Transport for MemoryTransport {
    fn local_node(&self) -> NodeId {
        self.node
    }

    fn send_to(&self, node: NodeId, data: Vec<u8>) -> Result<(), TransportError> {
        let inboxes = self.network.lock();
        if !inboxes.contains_key(&self.node) {
            return Err(TransportError::Shutdown);
        }
        let inbox = inboxes.get(&node).ok_or(TransportError::UnknownNode(node))?;
        inbox
            .send(TransportEvent::Received {
                from: self.node,
                data,
            })
            .map_err(|_| TransportError::ConnectionClosed(node))
    }

    fn broadcast(&self, data: Vec<u8>) -> Result<(), TransportError> {
        let inboxes = self.network.lock();
        if !inboxes.contains_key(&self.node) {
            return Err(TransportError::Shutdown);
        }
        for (peer, inbox) in inboxes.iter().filter(|(peer, _)| **peer != self.node) {
            if inbox
                .send(TransportEvent::Received {
                    from: self.node,
                    data: data.clone(),
                })
                .is_err()
            {
                tracing::debug!(%peer, "dropping broadcast frame for closed inbox");
            }
        }
        Ok(())
    }
}
