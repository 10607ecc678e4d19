//! Transport contract for Courier.
//!
//! Courier does not own sockets. It only needs to push bytes at a node,
//! push bytes at every node, and be told what arrived and who left. This
//! crate defines that contract:
//!
//! - [`NodeId`]: opaque identity of a participant in the network
//! - [`Transport`]: the outbound half (`send_to`, `broadcast`)
//! - [`TransportEvent`]: the inbound half (received bytes, joins, leaves)
//!
//! # Feature Flags
//!
//! - `memory` (default): an in-process [`MemoryNetwork`] used by tests
//!   and demos

mod error;
#[cfg(feature = "memory")]
mod memory;

pub use error::TransportError;
#[cfg(feature = "memory")]
pub use memory::{MemoryNetwork, MemoryTransport};

use std::fmt;

/// Opaque identifier for a node in the network.
///
/// Node ids are handed to Courier by whatever owns the connections; the
/// dispatch core only compares and forwards them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u64);

impl NodeId {
    /// Creates a new `NodeId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node-{}", self.0)
    }
}

/// Something that happened on the network, as seen by the local node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A frame arrived from `from`. The sender is the transport-level
    /// peer, never a value read out of the frame itself.
    Received { from: NodeId, data: Vec<u8> },

    /// A node joined the network.
    NodeConnected(NodeId),

    /// A node left the network (clean close or connection loss).
    NodeDisconnected(NodeId),
}

/// The outbound half of a network connection.
///
/// Both send methods must not block: implementations queue the frame and
/// return. Delivery between any two nodes is expected to be in order.
pub trait Transport: Send + Sync + 'static {
    /// The identity of the node this transport belongs to.
    fn local_node(&self) -> NodeId;

    /// Queues `data` for delivery to `node`.
    fn send_to(&self, node: NodeId, data: Vec<u8>) -> Result<(), TransportError>;

    /// Queues `data` for delivery to every other node.
    fn broadcast(&self, data: Vec<u8>) -> Result<(), TransportError>;
}
