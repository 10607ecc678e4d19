//! Error types for the registry layer.

use crate::Mode;

/// Errors that can occur while binding implementors to endpoints.
///
/// All of these are local and recoverable: the caller can pick another
/// endpoint name or unregister the existing implementor first.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// A request/response endpoint already has a local implementor.
    /// Only one per process is allowed.
    #[error("endpoint {0:?} already has a local implementor")]
    DuplicateBinding(String),

    /// The endpoint exists with the other mode. An endpoint is either a
    /// request/response object or a broadcast channel, never both.
    #[error("endpoint {endpoint:?} is bound as {existing:?}")]
    ModeConflict { endpoint: String, existing: Mode },

    /// The endpoint was first bound with a different interface. An
    /// endpoint name denotes one interface for its whole lifetime.
    #[error("endpoint {endpoint:?} is bound to interface {existing}, not {requested}")]
    InterfaceConflict {
        endpoint: String,
        existing: String,
        requested: String,
    },
}
