//! Codec trait and implementations for serializing/deserializing values.
//!
//! A codec converts between Rust values and raw bytes. Courier uses one
//! codec for two jobs: encoding whole [`Envelope`](crate::Envelope)s for
//! the transport, and encoding the opaque `args` / return value blobs
//! carried inside them. The dispatch core never looks inside a blob; it
//! only needs both ends of a call to agree on the codec.
//!
//! Currently we provide [`JsonCodec`]. A binary codec can be added without
//! touching the dispatch engine.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// A codec that can encode Rust values to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because the messenger that owns the codec is
/// shared across tasks and lives as long as the process' network session.
///
/// The methods are generic, so `Codec` is used as a type parameter rather
/// than a trait object. Implementor code receives the concrete codec
/// through `courier_registry::Invocation` and decodes its arguments
/// with it.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if the value cannot be represented
    /// in this format.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// Human-readable, which makes envelopes easy to inspect in logs while
/// debugging a session. Behind the `json` feature (enabled by default).
///
/// ## Example
///
/// ```rust
/// use courier_protocol::{CallId, Codec, Envelope, JsonCodec, MethodResult, Outcome};
///
/// let codec = JsonCodec;
///
/// let envelope = Envelope::MethodResult(MethodResult {
///     call_id: CallId::from_u128(7),
///     outcome: Outcome::Ok(vec![53]),
/// });
///
/// let bytes = codec.encode(&envelope).unwrap();
/// let decoded: Envelope = codec.decode(&bytes).unwrap();
/// assert_eq!(envelope, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
