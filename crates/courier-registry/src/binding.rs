//! Binding types: what an endpoint name is bound to on this node.

use std::fmt;
use std::sync::Arc;

use courier_protocol::{Codec, InterfaceDescriptor};
use serde::{Deserialize, Serialize};

use crate::Implementor;

/// How an endpoint dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    /// One implementor answers each call with a value or a fault. At most
    /// one local implementor per process.
    RequestResponse,

    /// Every subscriber on every node receives each event. No results.
    Broadcast,
}

/// Shared handle to an implementor.
pub type SharedImplementor<C> = Arc<dyn Implementor<C>>;

/// An endpoint as known to the local registry.
///
/// The binding outlives its implementors: once an endpoint name has been
/// bound to an interface and mode, it keeps them even after the last
/// implementor is unregistered.
pub struct Binding<C: Codec> {
    pub(crate) interface: Arc<InterfaceDescriptor>,
    pub(crate) mode: Mode,
    pub(crate) implementors: Vec<SharedImplementor<C>>,
}

impl<C: Codec> Binding<C> {
    /// The endpoint's interface.
    pub fn interface(&self) -> &Arc<InterfaceDescriptor> {
        &self.interface
    }

    /// The endpoint's dispatch mode.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Number of local implementors.
    pub fn implementor_count(&self) -> usize {
        self.implementors.len()
    }
}

impl<C: Codec> fmt::Debug for Binding<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("interface", &self.interface.name())
            .field("mode", &self.mode)
            .field("implementors", &self.implementors.len())
            .finish()
    }
}

/// Result of a local lookup.
///
/// The implementors are cloned out of the registry so they can be invoked
/// without holding the registry lock.
pub enum LocalLookup<C: Codec> {
    /// Nothing is bound locally (or the endpoint is unknown).
    None,

    /// Exactly one local implementor.
    Single {
        implementor: SharedImplementor<C>,
        interface: Arc<InterfaceDescriptor>,
        mode: Mode,
    },

    /// Several local subscribers, in registration order.
    Many {
        implementors: Vec<SharedImplementor<C>>,
        interface: Arc<InterfaceDescriptor>,
    },
}

impl<C: Codec> LocalLookup<C> {
    /// Returns `true` if nothing is bound locally.
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Number of local implementors found.
    pub fn len(&self) -> usize {
        match self {
            Self::None => 0,
            Self::Single { .. } => 1,
            Self::Many { implementors, .. } => implementors.len(),
        }
    }

    /// Returns `true` if nothing is bound locally.
    pub fn is_empty(&self) -> bool {
        self.is_none()
    }

    /// Flattens into the interface and the implementors in registration
    /// order. `None` yields no interface and no implementors.
    pub fn into_parts(self) -> (Option<Arc<InterfaceDescriptor>>, Vec<SharedImplementor<C>>) {
        match self {
            Self::None => (None, Vec::new()),
            Self::Single {
                implementor,
                interface,
                ..
            } => (Some(interface), vec![implementor]),
            Self::Many {
                implementors,
                interface,
            } => (Some(interface), implementors),
        }
    }
}

/// Outcome of a successful registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registered {
    /// `true` if the endpoint had no local implementor before this one.
    pub first_local: bool,
}

/// Outcome of an unregistration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unregistered {
    /// `true` if the implementor was found and removed.
    pub removed: bool,
    /// `true` if the endpoint has no local implementors left.
    pub now_empty: bool,
}
