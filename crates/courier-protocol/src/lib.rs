//! Wire protocol for Courier.
//!
//! This crate defines what two messengers say to each other:
//!
//! - **Envelopes** ([`Envelope`], [`MethodCall`], [`MethodResult`],
//!   [`SubscriberEvent`]): the frames that travel between nodes.
//! - **Signatures** ([`InterfaceDescriptor`], [`MethodSignature`]): the
//!   canonical method tables that turn a method into a [`MethodIndex`].
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how envelopes and call
//!   arguments become bytes.
//! - **Errors** ([`ProtocolError`], and [`RemoteFault`] for errors that
//!   cross the network).
//!
//! # Architecture
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → Dispatch (implementors)
//! ```
//!
//! The protocol layer knows nothing about who hosts what or who is
//! waiting for which result; it only knows how to describe those things.

mod codec;
mod error;
mod signature;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use signature::{InterfaceBuilder, InterfaceDescriptor, MethodSignature};
pub use types::{
    CallId, Envelope, MethodCall, MethodIndex, MethodResult, Outcome, RemoteFault,
    SubscriberEvent,
};
