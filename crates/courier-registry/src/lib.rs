//! Endpoint bindings for Courier.
//!
//! This crate holds the local half of remote invocation:
//!
//! 1. **The implementor contract**: what an application object must
//!    provide to be invoked by name ([`Implementor`], [`Invocation`])
//! 2. **Bindings**: which local objects sit behind which endpoint names,
//!    and whether the endpoint is request/response or broadcast
//!    ([`BindingRegistry`], [`Mode`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Messenger (above)  ← looks up local implementors and invokes them
//!     ↕
//! Registry (this crate)  ← endpoint name → interface, mode, implementors
//!     ↕
//! Protocol (below)  ← provides InterfaceDescriptor, RemoteFault, Codec
//! ```

mod binding;
mod error;
mod implementor;
mod registry;

pub use binding::{Binding, LocalLookup, Mode, Registered, SharedImplementor, Unregistered};
pub use error::RegistryError;
pub use implementor::{CallContext, FnImplementor, Implementor, Invocation};
pub use registry::BindingRegistry;
