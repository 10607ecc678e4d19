//! Wire types for Courier's invocation protocol.
//!
//! Every type in this module travels between nodes. The transport hands
//! the dispatch engine raw bytes; the codec turns those bytes into an
//! [`Envelope`], and the envelope says what to do: run a method, deliver
//! a method's result, fan an event out to subscribers, or update who
//! hosts which endpoint.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Correlation token matching a request to its eventual result.
///
/// 128 random bits, created by the caller for one outstanding call. On the
/// wire it is a 32-character lowercase hex string, so it survives codecs
/// (and clients) without 128-bit integer support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct CallId(u128);

impl CallId {
    /// Generates a fresh random call id.
    pub fn random() -> Self {
        let mut rng = rand::rng();
        Self(rng.random())
    }

    /// Builds a call id from a known value. Mostly useful in tests.
    pub fn from_u128(value: u128) -> Self {
        Self(value)
    }

    /// Returns the raw 128-bit value.
    pub fn as_u128(self) -> u128 {
        self.0
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl From<CallId> for String {
    fn from(id: CallId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for CallId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.len() != 32 {
            return Err(format!("call id must be 32 hex characters, got {}", value.len()));
        }
        u128::from_str_radix(&value, 16)
            .map(CallId)
            .map_err(|e| format!("invalid call id {value:?}: {e}"))
    }
}

/// Position of a method in its interface's canonical method table.
///
/// Replaces the method's name and parameter types on the wire. See
/// [`InterfaceDescriptor`](crate::InterfaceDescriptor) for how the table
/// is ordered.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct MethodIndex(pub u32);

impl fmt::Display for MethodIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// RemoteFault: an error that crossed the network
// ---------------------------------------------------------------------------

/// An error raised by a method on some node, in transportable form.
///
/// Error *types* don't survive the trip between processes, so a fault is
/// just a kind tag, a message, and whatever trace the raising side could
/// describe. The caller rebuilds a local error value from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct RemoteFault {
    /// Short machine-readable category, e.g. `"IllegalArgument"`.
    pub kind: String,
    /// Human-readable description.
    pub message: String,
    /// Where the fault was raised, as described by the raising node.
    #[serde(default)]
    pub remote_trace: String,
}

impl RemoteFault {
    /// No implementor was bound under the requested endpoint.
    pub const REMOTE_NOT_FOUND: &'static str = "RemoteNotFound";
    /// The method index was out of range for the receiver's interface.
    pub const METHOD_INDEX_MISMATCH: &'static str = "MethodIndexMismatch";
    /// The implementor panicked.
    pub const PANIC: &'static str = "Panic";
    /// The argument blob could not be decoded into the method's parameters.
    pub const BAD_ARGUMENTS: &'static str = "BadArguments";
    /// The return value could not be encoded.
    pub const BAD_RETURN_VALUE: &'static str = "BadReturnValue";

    /// Creates a fault with an empty trace.
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            remote_trace: String::new(),
        }
    }

    /// Replaces the trace.
    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        self.remote_trace = trace.into();
        self
    }

    /// Returns `true` if this fault has the given kind.
    pub fn is(&self, kind: &str) -> bool {
        self.kind == kind
    }
}

/// What a method call produced: an encoded return value or a fault.
///
/// `#[serde(tag = "status", content = "data")]` gives
/// `{"status": "Ok", "data": [..]}` or `{"status": "Err", "data": {..}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "data")]
pub enum Outcome {
    /// The method returned; the bytes are its codec-encoded value.
    Ok(Vec<u8>),
    /// The method failed.
    Err(RemoteFault),
}

impl Outcome {
    /// Converts into a plain `Result`.
    pub fn into_result(self) -> Result<Vec<u8>, RemoteFault> {
        match self {
            Self::Ok(value) => Ok(value),
            Self::Err(fault) => Err(fault),
        }
    }
}

impl From<Result<Vec<u8>, RemoteFault>> for Outcome {
    fn from(result: Result<Vec<u8>, RemoteFault>) -> Self {
        match result {
            Ok(value) => Self::Ok(value),
            Err(fault) => Self::Err(fault),
        }
    }
}

// ---------------------------------------------------------------------------
// Envelope bodies
// ---------------------------------------------------------------------------

/// Request to run a method on the endpoint's request/response implementor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodCall {
    /// The endpoint name the implementor is bound under.
    pub endpoint: String,
    /// Index of the method in the endpoint's interface.
    pub method: MethodIndex,
    /// Codec-encoded argument tuple.
    pub args: Vec<u8>,
    /// Correlates the eventual [`MethodResult`].
    pub call_id: CallId,
    /// `false` for fire-and-forget calls; the receiver sends no result.
    pub wants_result: bool,
}

/// The result of a [`MethodCall`], sent back to the calling node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodResult {
    /// The id of the call this answers.
    pub call_id: CallId,
    /// Return value or fault.
    pub outcome: Outcome,
}

/// One broadcast event for every subscriber of an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberEvent {
    /// The channel endpoint the subscribers are bound under.
    pub endpoint: String,
    /// Index of the method in the endpoint's interface.
    pub method: MethodIndex,
    /// Codec-encoded argument tuple.
    pub args: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Envelope: the top-level wire format
// ---------------------------------------------------------------------------

/// The top-level message. Every frame between two messengers is one
/// `Envelope`.
///
/// `#[serde(tag = "type")]` makes the variant name a field of the body:
///
/// ```text
/// { "type": "MethodCall", "endpoint": "calc", "method": 0,
///   "args": [91, 50, 44, 51, 93], "call_id": "00…07", "wants_result": true }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Envelope {
    /// Run a method on a request/response endpoint.
    MethodCall(MethodCall),

    /// Result of an earlier `MethodCall`.
    MethodResult(MethodResult),

    /// Deliver an event to every subscriber of a channel endpoint.
    SubscriberEvent(SubscriberEvent),

    /// The sending node now hosts an implementor for `endpoint`.
    ImplementorAdded { endpoint: String },

    /// The sending node no longer hosts an implementor for `endpoint`.
    ImplementorRemoved { endpoint: String },
}

impl Envelope {
    /// Variant name, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MethodCall(_) => "MethodCall",
            Self::MethodResult(_) => "MethodResult",
            Self::SubscriberEvent(_) => "SubscriberEvent",
            Self::ImplementorAdded { .. } => "ImplementorAdded",
            Self::ImplementorRemoved { .. } => "ImplementorRemoved",
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
