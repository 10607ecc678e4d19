//! # Courier
//!
//! Remote invocation and broadcast between the peers of a game session.
//!
//! Courier lets one process call a method on an object that lives on
//! another node (request/response or fire-and-forget) and lets one
//! process notify every subscriber of a channel (broadcast). It does not
//! own sockets: bring a [`Transport`], feed its events into
//! [`Messenger::run`], and bind implementors by name.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use courier::prelude::*;
//!
//! # async fn demo() -> Result<(), CourierError> {
//! let network = MemoryNetwork::new();
//! let (transport, events) = network.join(NodeId::new(1));
//!
//! let messenger = Messenger::builder(Arc::new(transport)).build();
//! tokio::spawn(Arc::clone(&messenger).run(events));
//!
//! // messenger.register("calc", Arc::new(Calculator), Mode::RequestResponse)?;
//! // let sum: i32 = messenger.remote_stub("calc", iface).call(add, &(2, 3)).await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod directory;
mod dispatch;
mod error;
mod messenger;
mod pending;
mod sender;
mod stub;

pub use config::MessengerConfig;
pub use directory::{Directory, PeerDirectory};
pub use error::CourierError;
pub use messenger::{Messenger, MessengerBuilder};
pub use sender::current_sender;
pub use stub::{ChannelStub, RemoteStub};

pub use courier_protocol::{
    CallId, Codec, InterfaceDescriptor, JsonCodec, MethodIndex, MethodSignature, RemoteFault,
};
pub use courier_registry::{
    CallContext, FnImplementor, Implementor, Invocation, Mode, RegistryError, SharedImplementor,
};
pub use courier_transport::{MemoryNetwork, MemoryTransport, NodeId, Transport, TransportEvent};

/// The layers underneath, for code that works with envelopes or bindings
/// directly.
pub use courier_protocol as protocol;
pub use courier_registry as registry;
pub use courier_transport as transport;

/// Everything needed to bind implementors and call them.
pub mod prelude {
    pub use crate::{
        current_sender, ChannelStub, Codec, CourierError, Directory, FnImplementor, Implementor,
        InterfaceDescriptor, Invocation, JsonCodec, MemoryNetwork, Messenger, MessengerConfig,
        MethodIndex, Mode, NodeId, PeerDirectory, RemoteFault, RemoteStub, SharedImplementor,
        Transport, TransportEvent,
    };
}
