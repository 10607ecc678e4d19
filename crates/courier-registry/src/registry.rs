//! The binding registry: which local implementors sit behind which
//! endpoint names.
//!
//! # Concurrency note
//!
//! `BindingRegistry` is a plain `HashMap` with no locking of its own. The
//! messenger that owns it wraps it in a mutex and never holds that lock
//! while an implementor runs: [`lookup_local`](BindingRegistry::lookup_local)
//! clones the implementor handles out.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use courier_protocol::{Codec, InterfaceDescriptor};

use crate::{Binding, LocalLookup, Mode, Registered, RegistryError, SharedImplementor, Unregistered};

/// Every endpoint this node has ever bound, keyed by name.
///
/// ## Lifecycle
///
/// ```text
/// register() ──→ [bound, n ≥ 1] ──→ unregister() ──→ [bound, n = 0]
///                     ▲                                    │
///                     └──────────── register() ────────────┘
/// ```
///
/// An endpoint's interface and mode are fixed by its first registration
/// and survive the last unregistration.
pub struct BindingRegistry<C: Codec> {
    bindings: HashMap<String, Binding<C>>,
}

impl<C: Codec> BindingRegistry<C> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            bindings: HashMap::new(),
        }
    }

    /// Binds `implementor` under `endpoint`.
    ///
    /// # Errors
    /// - [`RegistryError::ModeConflict`] if the endpoint was bound with the
    ///   other mode
    /// - [`RegistryError::InterfaceConflict`] if the endpoint was bound
    ///   with a different interface
    /// - [`RegistryError::DuplicateBinding`] if a request/response endpoint
    ///   already has a local implementor
    pub fn register(
        &mut self,
        endpoint: &str,
        implementor: SharedImplementor<C>,
        mode: Mode,
    ) -> Result<Registered, RegistryError> {
        match self.bindings.entry(endpoint.to_owned()) {
            Entry::Vacant(slot) => {
                let interface = Arc::new(implementor.interface().clone());
                tracing::info!(
                    endpoint,
                    interface = interface.name(),
                    ?mode,
                    "endpoint bound"
                );
                slot.insert(Binding {
                    interface,
                    mode,
                    implementors: vec![implementor],
                });
                Ok(Registered { first_local: true })
            }
            Entry::Occupied(mut slot) => {
                let binding = slot.get_mut();
                if binding.mode != mode {
                    return Err(RegistryError::ModeConflict {
                        endpoint: endpoint.to_owned(),
                        existing: binding.mode,
                    });
                }
                if *binding.interface != *implementor.interface() {
                    return Err(RegistryError::InterfaceConflict {
                        endpoint: endpoint.to_owned(),
                        existing: binding.interface.name().to_owned(),
                        requested: implementor.interface().name().to_owned(),
                    });
                }
                if mode == Mode::RequestResponse && !binding.implementors.is_empty() {
                    return Err(RegistryError::DuplicateBinding(endpoint.to_owned()));
                }

                let first_local = binding.implementors.is_empty();
                binding.implementors.push(implementor);
                tracing::debug!(
                    endpoint,
                    implementors = binding.implementors.len(),
                    "implementor added"
                );
                Ok(Registered { first_local })
            }
        }
    }

    /// Removes `implementor` from `endpoint`.
    ///
    /// Identity is by allocation, so the caller must pass the same `Arc`
    /// (or a clone of it) that was registered. Unknown endpoints and
    /// implementors are not errors.
    pub fn unregister(&mut self, endpoint: &str, implementor: &SharedImplementor<C>) -> Unregistered {
        let Some(binding) = self.bindings.get_mut(endpoint) else {
            return Unregistered {
                removed: false,
                now_empty: true,
            };
        };

        let before = binding.implementors.len();
        binding
            .implementors
            .retain(|existing| !same_implementor(existing, implementor));
        let removed = binding.implementors.len() < before;
        let now_empty = binding.implementors.is_empty();

        if removed {
            tracing::debug!(endpoint, remaining = binding.implementors.len(), "implementor removed");
        }
        Unregistered { removed, now_empty }
    }

    /// Finds the local implementors for `endpoint`.
    ///
    /// The returned handles are clones; the registry can be modified while
    /// the caller invokes them.
    pub fn lookup_local(&self, endpoint: &str) -> LocalLookup<C> {
        let Some(binding) = self.bindings.get(endpoint) else {
            return LocalLookup::None;
        };
        match binding.implementors.as_slice() {
            [] => LocalLookup::None,
            [single] => LocalLookup::Single {
                implementor: Arc::clone(single),
                interface: Arc::clone(&binding.interface),
                mode: binding.mode,
            },
            many => LocalLookup::Many {
                implementors: many.to_vec(),
                interface: Arc::clone(&binding.interface),
            },
        }
    }

    /// Number of local implementors bound under `endpoint`.
    pub fn implementor_count(&self, endpoint: &str) -> usize {
        self.bindings
            .get(endpoint)
            .map_or(0, Binding::implementor_count)
    }

    /// The mode `endpoint` was bound with, if it was ever bound.
    pub fn mode_of(&self, endpoint: &str) -> Option<Mode> {
        self.bindings.get(endpoint).map(Binding::mode)
    }

    /// The interface `endpoint` was bound with, if it was ever bound.
    pub fn interface_of(&self, endpoint: &str) -> Option<Arc<InterfaceDescriptor>> {
        self.bindings
            .get(endpoint)
            .map(|binding| Arc::clone(&binding.interface))
    }

    /// Request/response endpoints with a local implementor, sorted by name.
    ///
    /// These are the endpoints this node answers calls for. Broadcast
    /// channels are not hosted anywhere in particular.
    pub fn hosted_endpoints(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .bindings
            .iter()
            .filter(|(_, binding)| {
                binding.mode == Mode::RequestResponse && !binding.implementors.is_empty()
            })
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Drops every binding, returning the endpoints that were hosted.
    ///
    /// Used on shutdown; the registry forgets interfaces as well.
    pub fn clear(&mut self) -> Vec<String> {
        let hosted = self.hosted_endpoints();
        self.bindings.clear();
        hosted
    }

    /// Number of endpoints ever bound (with or without implementors).
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns `true` if nothing was ever bound.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl<C: Codec> Default for BindingRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

fn same_implementor<C: Codec>(a: &SharedImplementor<C>, b: &SharedImplementor<C>) -> bool {
    // Compare data pointers only; vtable pointers may differ per codegen unit.
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

// =========================================================================
// Tests
// =========================================================================
