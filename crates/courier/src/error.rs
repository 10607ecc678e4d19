//! Unified error type for Courier.

use std::time::Duration;

use courier_protocol::{CallId, ProtocolError, RemoteFault};
use courier_registry::RegistryError;
use courier_transport::{NodeId, TransportError};

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `courier` facade you deal with this single error type
/// instead of importing errors from each sub-crate. The `#[from]`
/// attribute on the wrapping variants generates `From` impls, so the `?`
/// operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum CourierError {
    /// A transport-level error (unknown node, closed connection).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, unknown method).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A registration was rejected.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// No node (local or remote) hosts the endpoint.
    #[error("no implementor bound for endpoint {endpoint:?}")]
    RemoteNotFound { endpoint: String },

    /// An argument could not be encoded. Nothing was sent.
    #[error("argument for {endpoint:?} is not transportable: {reason}")]
    NonTransportableArgument { endpoint: String, reason: String },

    /// The method ran on `node` and failed.
    ///
    /// `trace` is the remote trace followed by a local frame naming the
    /// calling node, endpoint and method.
    #[error("remote method failed on {node}: {fault}")]
    RemoteExecution {
        node: NodeId,
        fault: RemoteFault,
        trace: String,
    },

    /// The node we were waiting on left before answering.
    #[error("{node} disconnected while call {call_id} was pending")]
    NodeDisconnectedWhileWaiting { node: NodeId, call_id: CallId },

    /// The method index does not fit the endpoint's interface.
    #[error("method index mismatch on {endpoint:?}: {detail}")]
    MethodIndexMismatch { endpoint: String, detail: String },

    /// No result arrived within the configured call timeout.
    #[error("call {call_id} to {endpoint:?} timed out after {timeout:?}")]
    CallTimedOut {
        endpoint: String,
        call_id: CallId,
        timeout: Duration,
    },

    /// Too many calls are already waiting for results.
    #[error("too many pending calls (limit {limit})")]
    TooManyPendingCalls { limit: usize },

    /// The messenger was shut down.
    #[error("messenger shut down")]
    Shutdown,
}

impl CourierError {
    /// Returns the remote fault carried by a `RemoteExecution` error.
    pub fn remote_fault(&self) -> Option<&RemoteFault> {
        match self {
            Self::RemoteExecution { fault, .. } => Some(fault),
            _ => None,
        }
    }
}
