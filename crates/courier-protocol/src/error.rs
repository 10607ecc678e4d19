//! Error types for the protocol layer.
//!
//! Each crate in Courier defines its own error enum. A `ProtocolError`
//! means the problem is in turning values into bytes (or back), or in
//! mapping a method to its wire index: never in networking or dispatch.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust value into bytes).
    ///
    /// For call arguments this is the "not transportable" case: the value
    /// has a shape the codec cannot represent, such as a map with
    /// non-string keys under JSON.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust value).
    ///
    /// Common causes: malformed input, missing fields, or peers that were
    /// built against different versions of an interface.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// No method with this name and parameter list exists on the interface.
    #[error("interface {interface} has no method {method}")]
    UnknownMethod { interface: String, method: String },

    /// A method index is out of range for the locally known interface.
    ///
    /// This is what version skew between peers looks like on the wire:
    /// the sender and receiver disagree on the method table.
    #[error(
        "method index {index} out of range for interface {interface} \
         ({method_count} methods)"
    )]
    MethodIndexMismatch {
        interface: String,
        index: u32,
        method_count: usize,
    },
}
