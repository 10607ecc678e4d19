use crate::NodeId;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection to the node was closed.
    #[error("connection to {0} closed")]
    ConnectionClosed(NodeId),

    /// The node is not (or no longer) part of the network.
    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    /// The transport was shut down.
    #[error("transport shut down")]
    Shutdown,
}
