//! The contract between the dispatch engine and application objects.
//!
//! An [`Implementor`] is the local object behind an endpoint. The engine
//! never knows its concrete type: it hands the implementor an
//! [`Invocation`] (which method, which arguments, who asked) and gets back
//! either an encoded return value or a [`RemoteFault`].

use std::fmt;

use courier_protocol::{Codec, InterfaceDescriptor, MethodIndex, MethodSignature, RemoteFault};
use courier_transport::NodeId;
use serde::{de::DeserializeOwned, Serialize};

/// Who called, and what they called, for one inbound invocation.
///
/// Built by the dispatch engine from the transport-level sender of the
/// frame, never from anything inside the frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
    sender: NodeId,
    endpoint: String,
    method: MethodIndex,
}

impl CallContext {
    /// Creates a context. Only the dispatch engine should need this.
    pub fn new(sender: NodeId, endpoint: impl Into<String>, method: MethodIndex) -> Self {
        Self {
            sender,
            endpoint: endpoint.into(),
            method,
        }
    }

    /// The node that originated the call.
    pub fn sender(&self) -> NodeId {
        self.sender
    }

    /// The endpoint the call was addressed to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The method's wire index.
    pub fn method(&self) -> MethodIndex {
        self.method
    }
}

/// A local object bound under an endpoint name.
///
/// Request/response implementors return the encoded value of the method;
/// broadcast subscribers usually return `call.reply(&())`.
///
/// `invoke` is synchronous. Calls arriving from other nodes run on
/// tokio's blocking pool, one at a time per endpoint, so an implementor
/// may block, including on a nested call through
/// `tokio::runtime::Handle::current().block_on(..)`. Calls made on the
/// local node run on the caller's task and must not block.
///
/// # Example
///
/// ```rust
/// use std::sync::LazyLock;
///
/// use courier_protocol::{Codec, InterfaceDescriptor, RemoteFault};
/// use courier_registry::{Implementor, Invocation};
///
/// static CALCULATOR: LazyLock<InterfaceDescriptor> = LazyLock::new(|| {
///     InterfaceDescriptor::builder("Calculator")
///         .method("add", ["i32", "i32"])
///         .build()
/// });
///
/// struct Calculator;
///
/// impl<C: Codec> Implementor<C> for Calculator {
///     fn interface(&self) -> &InterfaceDescriptor {
///         &CALCULATOR
///     }
///
///     fn invoke(&self, call: Invocation<'_, C>) -> Result<Vec<u8>, RemoteFault> {
///         match call.method().name() {
///             "add" => {
///                 let (a, b): (i32, i32) = call.args()?;
///                 call.reply(&(a + b))
///             }
///             _ => Err(call.unsupported()),
///         }
///     }
/// }
/// ```
pub trait Implementor<C: Codec>: Send + Sync + 'static {
    /// The interface this object implements.
    fn interface(&self) -> &InterfaceDescriptor;

    /// Runs one method.
    fn invoke(&self, call: Invocation<'_, C>) -> Result<Vec<u8>, RemoteFault>;
}

/// One method invocation, as seen by an [`Implementor`].
pub struct Invocation<'a, C> {
    context: &'a CallContext,
    method: &'a MethodSignature,
    args: &'a [u8],
    codec: &'a C,
}

impl<'a, C: Codec> Invocation<'a, C> {
    /// Bundles the pieces of an invocation.
    pub fn new(
        context: &'a CallContext,
        method: &'a MethodSignature,
        args: &'a [u8],
        codec: &'a C,
    ) -> Self {
        Self {
            context,
            method,
            args,
            codec,
        }
    }

    /// The node that originated the call.
    pub fn sender(&self) -> NodeId {
        self.context.sender()
    }

    /// Full call context.
    pub fn context(&self) -> &CallContext {
        self.context
    }

    /// The method being invoked.
    pub fn method(&self) -> &MethodSignature {
        self.method
    }

    /// The still-encoded argument blob.
    pub fn raw_args(&self) -> &[u8] {
        self.args
    }

    /// Decodes the argument tuple.
    ///
    /// # Errors
    /// A [`RemoteFault::BAD_ARGUMENTS`] fault if the blob does not decode
    /// as `T`. The engine sends it back to the caller like any other fault.
    pub fn args<T: DeserializeOwned>(&self) -> Result<T, RemoteFault> {
        self.codec.decode(self.args).map_err(|e| {
            RemoteFault::new(
                RemoteFault::BAD_ARGUMENTS,
                format!("{}: {e}", self.method),
            )
        })
    }

    /// Encodes a return value.
    pub fn reply<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, RemoteFault> {
        self.codec.encode(value).map_err(|e| {
            RemoteFault::new(
                RemoteFault::BAD_RETURN_VALUE,
                format!("{}: {e}", self.method),
            )
        })
    }

    /// A fault for a method the implementor does not handle.
    pub fn unsupported(&self) -> RemoteFault {
        RemoteFault::new(
            "Unsupported",
            format!("{} is not implemented on {}", self.method, self.context.endpoint()),
        )
    }
}

impl<C> fmt::Debug for Invocation<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("context", self.context)
            .field("method", self.method)
            .field("args_len", &self.args.len())
            .finish()
    }
}

/// An [`Implementor`] built from a closure.
///
/// Handy for subscribers and tests where a whole type would be noise.
pub struct FnImplementor<F> {
    interface: InterfaceDescriptor,
    handler: F,
}

impl<F> FnImplementor<F> {
    /// Wraps `handler` as an implementor of `interface`.
    ///
    /// The bound pins the closure's signature, so the argument does not
    /// need a type annotation once the codec is known.
    pub fn new<C>(interface: InterfaceDescriptor, handler: F) -> Self
    where
        C: Codec,
        F: Fn(Invocation<'_, C>) -> Result<Vec<u8>, RemoteFault> + Send + Sync + 'static,
    {
        Self { interface, handler }
    }
}

impl<C, F> Implementor<C> for FnImplementor<F>
where
    C: Codec,
    F: Fn(Invocation<'_, C>) -> Result<Vec<u8>, RemoteFault> + Send + Sync + 'static,
{
    fn interface(&self) -> &InterfaceDescriptor {
        &self.interface
    }

    fn invoke(&self, call: Invocation<'_, C>) -> Result<Vec<u8>, RemoteFault> {
        (self.handler)(call)
    }
}
