//! Stand-ins for remote objects and broadcast channels.
//!
//! A stub pairs an endpoint name with its interface and forwards calls
//! into the messenger. Typed clients wrap a stub and resolve their method
//! indices once, in their constructor:
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use courier::prelude::*;
//!
//! struct CalculatorClient {
//!     stub: RemoteStub,
//!     add: MethodIndex,
//! }
//!
//! impl CalculatorClient {
//!     fn new(messenger: &Arc<Messenger>) -> Result<Self, CourierError> {
//!         let interface = InterfaceDescriptor::builder("Calculator")
//!             .method("add", ["i32", "i32"])
//!             .build();
//!         let stub = messenger.remote_stub("calc", interface);
//!         let add = stub.method("add", &["i32", "i32"])?;
//!         Ok(Self { stub, add })
//!     }
//!
//!     async fn add(&self, a: i32, b: i32) -> Result<i32, CourierError> {
//!         self.stub.call(self.add, &(a, b)).await
//!     }
//! }
//! ```

use std::sync::Arc;

use courier_protocol::{Codec, InterfaceDescriptor, JsonCodec, MethodIndex};
use serde::{de::DeserializeOwned, Serialize};

use crate::{CourierError, Messenger};

impl<C: Codec> Messenger<C> {
    /// A stand-in for the request/response object bound under `endpoint`.
    pub fn remote_stub(
        self: &Arc<Self>,
        endpoint: impl Into<String>,
        interface: InterfaceDescriptor,
    ) -> RemoteStub<C> {
        RemoteStub {
            messenger: Arc::clone(self),
            endpoint: endpoint.into(),
            interface: Arc::new(interface),
        }
    }

    /// A stand-in for the broadcast channel bound under `endpoint`.
    pub fn channel_stub(
        self: &Arc<Self>,
        endpoint: impl Into<String>,
        interface: InterfaceDescriptor,
    ) -> ChannelStub<C> {
        ChannelStub {
            messenger: Arc::clone(self),
            endpoint: endpoint.into(),
            interface: Arc::new(interface),
        }
    }
}

/// Forwards method calls on one request/response endpoint.
pub struct RemoteStub<C: Codec = JsonCodec> {
    messenger: Arc<Messenger<C>>,
    endpoint: String,
    interface: Arc<InterfaceDescriptor>,
}

impl<C: Codec> RemoteStub<C> {
    /// The endpoint name.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The interface the stub speaks.
    pub fn interface(&self) -> &InterfaceDescriptor {
        &self.interface
    }

    /// Resolves a method to its wire index.
    ///
    /// # Errors
    /// [`CourierError::Protocol`] if the interface has no such method.
    pub fn method(&self, name: &str, params: &[&str]) -> Result<MethodIndex, CourierError> {
        Ok(self.interface.index_of(name, params)?)
    }

    /// Calls `method` and waits for its result.
    pub async fn call<A, R>(&self, method: MethodIndex, args: &A) -> Result<R, CourierError>
    where
        A: Serialize,
        R: DeserializeOwned,
    {
        self.messenger
            .call(&self.endpoint, &self.interface, method, args)
            .await
    }

    /// Calls `method` without waiting for a result.
    pub fn call_and_forget<A: Serialize>(
        &self,
        method: MethodIndex,
        args: &A,
    ) -> Result<(), CourierError> {
        self.messenger
            .call_and_forget(&self.endpoint, &self.interface, method, args)
    }
}

impl<C: Codec> Clone for RemoteStub<C> {
    fn clone(&self) -> Self {
        Self {
            messenger: Arc::clone(&self.messenger),
            endpoint: self.endpoint.clone(),
            interface: Arc::clone(&self.interface),
        }
    }
}

/// Publishes events on one broadcast endpoint.
pub struct ChannelStub<C: Codec = JsonCodec> {
    messenger: Arc<Messenger<C>>,
    endpoint: String,
    interface: Arc<InterfaceDescriptor>,
}

impl<C: Codec> ChannelStub<C> {
    /// The endpoint name.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The interface the channel's subscribers implement.
    pub fn interface(&self) -> &InterfaceDescriptor {
        &self.interface
    }

    /// Resolves a method to its wire index.
    ///
    /// # Errors
    /// [`CourierError::Protocol`] if the interface has no such method.
    pub fn method(&self, name: &str, params: &[&str]) -> Result<MethodIndex, CourierError> {
        Ok(self.interface.index_of(name, params)?)
    }

    /// Delivers an event to every subscriber on every node.
    pub fn publish<A: Serialize>(&self, method: MethodIndex, args: &A) -> Result<(), CourierError> {
        self.messenger
            .publish(&self.endpoint, &self.interface, method, args)
    }
}

impl<C: Codec> Clone for ChannelStub<C> {
    fn clone(&self) -> Self {
        Self {
            messenger: Arc::clone(&self.messenger),
            endpoint: self.endpoint.clone(),
            interface: Arc::clone(&self.interface),
        }
    }
}
