//! The dispatch engine.
//!
//! A [`Messenger`] ties the layers together: it owns the binding registry
//! and the pending-call tracker, turns outbound invocations into
//! envelopes on the transport, and turns inbound envelopes into
//! implementor invocations and resolved calls.
//!
//! Inbound invocations never run on the event pump itself. They are queued
//! per endpoint and run on the blocking pool, so results and disconnects
//! keep flowing while an implementor works.
//!
//! ```text
//! call()/publish()           on_envelope_received()
//!      │                              │
//!      ▼                              ▼
//! local implementor? ──yes──→ invoke in-process
//!      │ no                           │
//!      ▼                              ▼
//! Directory::host_of ──→ Transport ──→ MethodResult ──→ PendingCalls
//! ```

use std::any::Any;
use std::fmt::Write as _;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use courier_protocol::{
    CallId, Codec, Envelope, InterfaceDescriptor, JsonCodec, MethodCall, MethodIndex,
    MethodResult, MethodSignature, Outcome, RemoteFault, SubscriberEvent,
};
use courier_registry::{
    BindingRegistry, CallContext, Implementor, Invocation, LocalLookup, Mode, SharedImplementor,
};
use courier_transport::{NodeId, Transport, TransportEvent};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::mpsc;

use crate::dispatch::InvocationQueues;
use crate::pending::{PendingCalls, Resolution, ResolveOutcome};
use crate::sender::with_sender;
use crate::{CourierError, Directory, MessengerConfig, PeerDirectory};

/// How often [`Messenger::wait_for_implementors`] re-checks.
const IMPLEMENTOR_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Builder for a [`Messenger`].
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// use courier::prelude::*;
///
/// let network = MemoryNetwork::new();
/// let (transport, _events) = network.join(NodeId::new(1));
///
/// let messenger = Messenger::builder(Arc::new(transport))
///     .call_timeout(Duration::from_secs(5))
///     .build();
/// assert_eq!(messenger.local_node(), NodeId::new(1));
/// ```
pub struct MessengerBuilder<C: Codec = JsonCodec> {
    transport: Arc<dyn Transport>,
    directory: Option<Arc<dyn Directory>>,
    codec: C,
    config: MessengerConfig,
}

impl<C: Codec> MessengerBuilder<C> {
    /// Sets the directory used to find remote hosts. Defaults to a fresh
    /// [`PeerDirectory`].
    pub fn directory(mut self, directory: Arc<dyn Directory>) -> Self {
        self.directory = Some(directory);
        self
    }

    /// Replaces the codec. Every node in a session must use the same one.
    pub fn codec<C2: Codec>(self, codec: C2) -> MessengerBuilder<C2> {
        MessengerBuilder {
            transport: self.transport,
            directory: self.directory,
            codec,
            config: self.config,
        }
    }

    /// Sets the whole configuration.
    pub fn config(mut self, config: MessengerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets how long request/response calls wait for a result.
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.config.call_timeout = timeout;
        self
    }

    /// Builds the messenger.
    pub fn build(self) -> Arc<Messenger<C>> {
        let config = self.config.validated();
        let node = self.transport.local_node();
        let directory = self
            .directory
            .unwrap_or_else(|| Arc::new(PeerDirectory::new()));

        tracing::info!(%node, timeout = ?config.call_timeout, "messenger created");

        Arc::new_cyclic(|this| Messenger {
            this: this.clone(),
            node,
            transport: self.transport,
            directory,
            codec: self.codec,
            pending: Mutex::new(PendingCalls::new(config.max_pending_calls)),
            registry: Mutex::new(BindingRegistry::new()),
            invocations: InvocationQueues::new(),
            shut_down: AtomicBool::new(false),
            config,
        })
    }
}

/// The per-process dispatch engine.
///
/// Share it as `Arc<Messenger>`; every method takes `&self` and is safe
/// to call from many tasks at once. No internal lock is held while an
/// implementor runs or while a caller waits for a result.
pub struct Messenger<C: Codec = JsonCodec> {
    this: Weak<Self>,
    node: NodeId,
    transport: Arc<dyn Transport>,
    directory: Arc<dyn Directory>,
    codec: C,
    config: MessengerConfig,
    registry: Mutex<BindingRegistry<C>>,
    pending: Mutex<PendingCalls>,
    invocations: InvocationQueues,
    shut_down: AtomicBool,
}

impl Messenger<JsonCodec> {
    /// Starts building a messenger on top of `transport`, with the JSON
    /// codec and default configuration.
    pub fn builder(transport: Arc<dyn Transport>) -> MessengerBuilder<JsonCodec> {
        MessengerBuilder {
            transport,
            directory: None,
            codec: JsonCodec,
            config: MessengerConfig::default(),
        }
    }
}

impl<C: Codec> Messenger<C> {
    // -----------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------

    /// The node this messenger runs on.
    pub fn local_node(&self) -> NodeId {
        self.node
    }

    /// The codec used for envelopes and argument blobs.
    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// The active configuration.
    pub fn config(&self) -> &MessengerConfig {
        &self.config
    }

    /// The directory used to find remote hosts.
    pub fn directory(&self) -> &Arc<dyn Directory> {
        &self.directory
    }

    // -----------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------

    /// Binds `implementor` under `endpoint`.
    ///
    /// The first local request/response implementor of an endpoint is
    /// announced to every peer.
    ///
    /// # Errors
    /// [`CourierError::Registry`] if the binding is rejected, or
    /// [`CourierError::Shutdown`].
    pub fn register(
        &self,
        endpoint: &str,
        implementor: SharedImplementor<C>,
        mode: Mode,
    ) -> Result<(), CourierError> {
        self.ensure_running()?;
        let registered = self.lock_registry().register(endpoint, implementor, mode)?;

        if registered.first_local && mode == Mode::RequestResponse {
            self.announce(Envelope::ImplementorAdded {
                endpoint: endpoint.to_owned(),
            });
        }
        Ok(())
    }

    /// Removes `implementor` from `endpoint`. Calls already running on it
    /// are not cancelled.
    ///
    /// Returns `false` if it was not bound there.
    pub fn unregister(&self, endpoint: &str, implementor: &SharedImplementor<C>) -> bool {
        let (unregistered, mode) = {
            let mut registry = self.lock_registry();
            let result = registry.unregister(endpoint, implementor);
            (result, registry.mode_of(endpoint))
        };

        if unregistered.removed && unregistered.now_empty && mode == Some(Mode::RequestResponse) {
            self.announce(Envelope::ImplementorRemoved {
                endpoint: endpoint.to_owned(),
            });
        }
        unregistered.removed
    }

    // -----------------------------------------------------------------
    // Request/response
    // -----------------------------------------------------------------

    /// Invokes `method` of `endpoint` with an already encoded argument
    /// blob.
    ///
    /// A local request/response implementor is always preferred; then the
    /// host reported by the directory. With `ignore_results` the call is
    /// fire-and-forget and returns `Ok(None)` once sent.
    ///
    /// # Errors
    /// - [`CourierError::MethodIndexMismatch`] if `method` is not in
    ///   `interface` (nothing is sent)
    /// - [`CourierError::RemoteNotFound`] if no node hosts the endpoint
    /// - [`CourierError::RemoteExecution`] if the method failed
    /// - [`CourierError::NodeDisconnectedWhileWaiting`],
    ///   [`CourierError::CallTimedOut`] or [`CourierError::Shutdown`] if
    ///   the wait ended without a result
    pub async fn invoke(
        &self,
        endpoint: &str,
        interface: &InterfaceDescriptor,
        method: MethodIndex,
        args: Vec<u8>,
        ignore_results: bool,
    ) -> Result<Option<Vec<u8>>, CourierError> {
        self.ensure_running()?;
        let signature = check_method(endpoint, interface, method)?;

        if let Some(result) = self.invoke_local(endpoint, method, &args) {
            return match result {
                Ok(value) => Ok((!ignore_results).then_some(value)),
                Err(fault) if ignore_results => {
                    tracing::warn!(endpoint, %fault, "fire-and-forget call failed locally");
                    Ok(None)
                }
                Err(fault) => Err(self.fault_to_error(self.node, endpoint, signature, fault)),
            };
        }

        let host = self.host_for(endpoint)?;
        if ignore_results {
            self.send_call(host, endpoint, method, args, CallId::random(), false)?;
            return Ok(None);
        }

        // The entry must exist before the request leaves, or a fast reply
        // would find nothing to resolve.
        let (call_id, reply) = self.lock_pending().open(host, endpoint)?;
        let _guard = PendingGuard {
            pending: &self.pending,
            call_id,
        };
        self.send_call(host, endpoint, method, args, call_id, true)?;
        tracing::debug!(%call_id, endpoint, %host, "awaiting result");

        let resolution = match tokio::time::timeout(self.config.call_timeout, reply).await {
            Ok(Ok(resolution)) => resolution,
            Ok(Err(_)) => return Err(CourierError::Shutdown),
            Err(_) => {
                tracing::warn!(%call_id, endpoint, %host, "call timed out");
                return Err(CourierError::CallTimedOut {
                    endpoint: endpoint.to_owned(),
                    call_id,
                    timeout: self.config.call_timeout,
                });
            }
        };

        match resolution {
            Resolution::Completed(Outcome::Ok(value)) => Ok(Some(value)),
            Resolution::Completed(Outcome::Err(fault)) => {
                Err(self.fault_to_error(host, endpoint, signature, fault))
            }
            Resolution::NodeDisconnected(node) => {
                Err(CourierError::NodeDisconnectedWhileWaiting { node, call_id })
            }
            Resolution::Shutdown => Err(CourierError::Shutdown),
        }
    }

    /// Calls `method` with typed arguments and waits for the typed result.
    ///
    /// `args` is the method's argument tuple, e.g. `&(2, 3)`.
    ///
    /// # Errors
    /// [`CourierError::NonTransportableArgument`] if `args` cannot be
    /// encoded, [`CourierError::Protocol`] if the result does not decode as
    /// `R`, and everything [`invoke`](Self::invoke) returns.
    pub async fn call<A, R>(
        &self,
        endpoint: &str,
        interface: &InterfaceDescriptor,
        method: MethodIndex,
        args: &A,
    ) -> Result<R, CourierError>
    where
        A: Serialize,
        R: DeserializeOwned,
    {
        let args = self.encode_args(endpoint, args)?;
        let value = self
            .invoke(endpoint, interface, method, args, false)
            .await?
            .unwrap_or_default();
        Ok(self.codec.decode(&value)?)
    }

    /// Calls `method` without waiting for, or receiving, a result.
    ///
    /// A local implementor still runs before this returns.
    ///
    /// # Errors
    /// [`CourierError::NonTransportableArgument`],
    /// [`CourierError::MethodIndexMismatch`],
    /// [`CourierError::RemoteNotFound`], or a transport failure.
    pub fn call_and_forget<A: Serialize>(
        &self,
        endpoint: &str,
        interface: &InterfaceDescriptor,
        method: MethodIndex,
        args: &A,
    ) -> Result<(), CourierError> {
        self.ensure_running()?;
        let args = self.encode_args(endpoint, args)?;
        check_method(endpoint, interface, method)?;

        if let Some(result) = self.invoke_local(endpoint, method, &args) {
            if let Err(fault) = result {
                tracing::warn!(endpoint, %fault, "fire-and-forget call failed locally");
            }
            return Ok(());
        }

        let host = self.host_for(endpoint)?;
        self.send_call(host, endpoint, method, args, CallId::random(), false)
    }

    // -----------------------------------------------------------------
    // Broadcast
    // -----------------------------------------------------------------

    /// Delivers an event to every subscriber of `endpoint`: first the
    /// local ones, in registration order, then every other node.
    ///
    /// A failing subscriber is logged and skipped. Events from one
    /// publisher arrive everywhere in publish order; events from
    /// different publishers have no common order.
    ///
    /// # Errors
    /// [`CourierError::NonTransportableArgument`],
    /// [`CourierError::MethodIndexMismatch`], or a transport failure.
    pub fn publish<A: Serialize>(
        &self,
        endpoint: &str,
        interface: &InterfaceDescriptor,
        method: MethodIndex,
        args: &A,
    ) -> Result<(), CourierError> {
        self.ensure_running()?;
        let args = self.encode_args(endpoint, args)?;
        check_method(endpoint, interface, method)?;

        self.deliver_to_subscribers(self.node, endpoint, method, &args);

        let event = Envelope::SubscriberEvent(SubscriberEvent {
            endpoint: endpoint.to_owned(),
            method,
            args,
        });
        let bytes = self.codec.encode(&event)?;
        self.transport.broadcast(bytes)?;
        Ok(())
    }

    // -----------------------------------------------------------------
    // Inbound
    // -----------------------------------------------------------------

    /// Handles one frame received from `from`.
    ///
    /// Results and announcements are applied before this returns. Calls
    /// and events are queued behind earlier ones for the same endpoint and
    /// run on the blocking pool.
    ///
    /// Never fails: undecodable frames and protocol violations are logged
    /// and dropped.
    pub fn on_envelope_received(&self, from: NodeId, data: &[u8]) {
        if self.is_shut_down() {
            tracing::debug!(%from, "messenger shut down, dropping frame");
            return;
        }
        let envelope: Envelope = match self.codec.decode(data) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::debug!(%from, error = %e, "failed to decode envelope");
                return;
            }
        };
        tracing::debug!(%from, kind = envelope.kind(), "envelope received");

        match envelope {
            Envelope::MethodCall(call) => {
                let endpoint = call.endpoint.clone();
                self.dispatch(&endpoint, move |messenger| {
                    messenger.handle_method_call(from, call);
                });
            }
            Envelope::MethodResult(result) => self.handle_method_result(from, result),
            Envelope::SubscriberEvent(event) => {
                let endpoint = event.endpoint.clone();
                self.dispatch(&endpoint, move |messenger| {
                    messenger.deliver_to_subscribers(from, &event.endpoint, event.method, &event.args);
                });
            }
            Envelope::ImplementorAdded { endpoint } => self.directory.node_hosts(from, &endpoint),
            Envelope::ImplementorRemoved { endpoint } => {
                self.directory.node_released(from, &endpoint);
            }
        }
    }

    /// Tells a newly connected node which endpoints this node hosts.
    pub fn on_node_connected(&self, node: NodeId) {
        if !self.config.announce_implementors || self.is_shut_down() {
            return;
        }
        let hosted = self.lock_registry().hosted_endpoints();
        tracing::debug!(%node, endpoints = hosted.len(), "announcing hosted endpoints");

        for endpoint in hosted {
            let envelope = Envelope::ImplementorAdded { endpoint };
            if let Err(e) = self.send_envelope(node, &envelope) {
                tracing::warn!(%node, error = %e, "failed to announce endpoint");
            }
        }
    }

    /// Releases every call waiting on `node` and drops it from the
    /// directory.
    pub fn on_node_disconnected(&self, node: NodeId) {
        let released = self.lock_pending().release_node(node);
        self.directory.node_departed(node);
        tracing::info!(%node, released, "node disconnected");
    }

    /// Dispatches one transport event to the matching callback.
    pub fn handle_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::Received { from, data } => self.on_envelope_received(from, &data),
            TransportEvent::NodeConnected(node) => self.on_node_connected(node),
            TransportEvent::NodeDisconnected(node) => self.on_node_disconnected(node),
        }
    }

    /// Feeds transport events into the messenger, in arrival order, until
    /// the channel closes or the messenger shuts down.
    ///
    /// Usually spawned: `tokio::spawn(Arc::clone(&messenger).run(events))`.
    pub async fn run(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<TransportEvent>) {
        tracing::info!(node = %self.node, "messenger running");

        while let Some(event) = events.recv().await {
            if self.is_shut_down() {
                break;
            }
            self.handle_event(event);
        }

        tracing::info!(node = %self.node, "messenger event loop stopped");
    }

    // -----------------------------------------------------------------
    // Introspection and lifecycle
    // -----------------------------------------------------------------

    /// Number of local implementors bound under `endpoint`.
    pub fn local_implementor_count(&self, endpoint: &str) -> usize {
        self.lock_registry().implementor_count(endpoint)
    }

    /// Returns `true` if a call to `endpoint` has somewhere to go: a local
    /// implementor, or a remote host known to the directory.
    pub fn is_aware_of_implementors(&self, endpoint: &str) -> bool {
        self.local_implementor_count(endpoint) > 0
            || self.directory.remote_host_of(endpoint, self.node).is_some()
    }

    /// Waits until [`is_aware_of_implementors`](Self::is_aware_of_implementors)
    /// holds or `timeout` elapses. Returns whether it holds.
    pub async fn wait_for_implementors(&self, endpoint: &str, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.is_aware_of_implementors(endpoint) {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(IMPLEMENTOR_POLL_INTERVAL).await;
        }
    }

    /// Request/response endpoints hosted on this node.
    pub fn hosted_endpoints(&self) -> Vec<String> {
        self.lock_registry().hosted_endpoints()
    }

    /// Number of calls currently waiting for results.
    pub fn pending_calls(&self) -> usize {
        self.lock_pending().len()
    }

    /// Returns `true` once [`shutdown`](Self::shutdown) has been called.
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Stops the messenger.
    ///
    /// Every waiting caller is released with [`CourierError::Shutdown`],
    /// peers are told this node no longer hosts its endpoints, and all
    /// bindings are dropped. Later calls fail with `Shutdown`. Idempotent.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        let released = self.lock_pending().release_all();
        let hosted = self.lock_registry().clear();
        self.invocations.close();

        for endpoint in hosted {
            self.announce(Envelope::ImplementorRemoved { endpoint });
        }
        tracing::info!(node = %self.node, released, "messenger shut down");
    }

    // -----------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------

    fn ensure_running(&self) -> Result<(), CourierError> {
        if self.is_shut_down() {
            return Err(CourierError::Shutdown);
        }
        Ok(())
    }

    fn lock_registry(&self) -> MutexGuard<'_, BindingRegistry<C>> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_pending(&self) -> MutexGuard<'_, PendingCalls> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Clones the local implementors out so the registry lock is released
    /// before any of them runs.
    fn lookup_local(&self, endpoint: &str) -> LocalLookup<C> {
        self.lock_registry().lookup_local(endpoint)
    }

    /// Runs `job` on the invocation queue of `endpoint`.
    fn dispatch(&self, endpoint: &str, job: impl FnOnce(&Self) + Send + 'static) {
        let Some(this) = self.this.upgrade() else {
            return;
        };
        self.invocations.submit(endpoint, Box::new(move || job(&this)));
    }

    fn encode_args<A: Serialize>(&self, endpoint: &str, args: &A) -> Result<Vec<u8>, CourierError> {
        self.codec
            .encode(args)
            .map_err(|e| CourierError::NonTransportableArgument {
                endpoint: endpoint.to_owned(),
                reason: e.to_string(),
            })
    }

    fn host_for(&self, endpoint: &str) -> Result<NodeId, CourierError> {
        self.directory
            .remote_host_of(endpoint, self.node)
            .ok_or_else(|| CourierError::RemoteNotFound {
                endpoint: endpoint.to_owned(),
            })
    }

    /// Runs the local request/response implementor of `endpoint`, if any,
    /// with this node as the sender.
    fn invoke_local(
        &self,
        endpoint: &str,
        method: MethodIndex,
        args: &[u8],
    ) -> Option<Result<Vec<u8>, RemoteFault>> {
        match self.lookup_local(endpoint) {
            LocalLookup::Single {
                implementor,
                interface,
                mode: Mode::RequestResponse,
            } => {
                tracing::debug!(endpoint, %method, "invoking local implementor");
                Some(self.run_implementor(&*implementor, &interface, self.node, endpoint, method, args))
            }
            _ => None,
        }
    }

    fn handle_method_call(&self, from: NodeId, call: MethodCall) {
        let result = match self.lookup_local(&call.endpoint) {
            LocalLookup::Single {
                implementor,
                interface,
                mode: Mode::RequestResponse,
            } => self.run_implementor(
                &*implementor,
                &interface,
                from,
                &call.endpoint,
                call.method,
                &call.args,
            ),
            _ => {
                tracing::debug!(%from, endpoint = %call.endpoint, "call for endpoint not hosted here");
                Err(RemoteFault::new(
                    RemoteFault::REMOTE_NOT_FOUND,
                    format!("{} has no implementor for {:?}", self.node, call.endpoint),
                ))
            }
        };

        if !call.wants_result {
            if let Err(fault) = result {
                tracing::warn!(%from, endpoint = %call.endpoint, %fault, "fire-and-forget call failed");
            }
            return;
        }

        let reply = Envelope::MethodResult(MethodResult {
            call_id: call.call_id,
            outcome: result.into(),
        });
        if let Err(e) = self.send_envelope(from, &reply) {
            tracing::warn!(%from, call_id = %call.call_id, error = %e, "failed to send result");
        }
    }

    fn handle_method_result(&self, from: NodeId, result: MethodResult) {
        let call_id = result.call_id;
        let resolved = self.lock_pending().resolve(call_id, from, result.outcome);
        match resolved {
            ResolveOutcome::Delivered => tracing::debug!(%call_id, %from, "call resolved"),
            ResolveOutcome::Unknown => {
                tracing::debug!(%call_id, %from, "discarding result for unknown call");
            }
            ResolveOutcome::WrongNode { expected } => {
                tracing::warn!(%call_id, %from, %expected, "rejecting result from wrong node");
            }
        }
    }

    /// Invokes every local subscriber of `endpoint` in registration order.
    /// Failures are logged per subscriber and do not stop delivery.
    fn deliver_to_subscribers(&self, sender: NodeId, endpoint: &str, method: MethodIndex, args: &[u8]) {
        let lookup = self.lookup_local(endpoint);
        if let LocalLookup::Single { mode: Mode::RequestResponse, .. } = lookup {
            tracing::warn!(%sender, endpoint, "event for a request/response endpoint, ignoring");
            return;
        }
        let (Some(interface), subscribers) = lookup.into_parts() else {
            tracing::debug!(%sender, endpoint, "no local subscribers");
            return;
        };
        let Ok(signature) = resolve_method(endpoint, &interface, method) else {
            return;
        };

        for (index, subscriber) in subscribers.iter().enumerate() {
            if let Err(fault) = self.run_resolved(&**subscriber, signature, sender, endpoint, method, args) {
                tracing::warn!(endpoint, subscriber = index, %fault, "subscriber failed");
            }
        }
    }

    fn run_implementor(
        &self,
        implementor: &dyn Implementor<C>,
        interface: &InterfaceDescriptor,
        sender: NodeId,
        endpoint: &str,
        method: MethodIndex,
        args: &[u8],
    ) -> Result<Vec<u8>, RemoteFault> {
        let signature = resolve_method(endpoint, interface, method)?;
        self.run_resolved(implementor, signature, sender, endpoint, method, args)
    }

    /// Invokes one implementor with `sender` as the current sender.
    /// Panics become [`RemoteFault::PANIC`] faults. Faults without a trace
    /// get one naming this node and the method.
    fn run_resolved(
        &self,
        implementor: &dyn Implementor<C>,
        signature: &MethodSignature,
        sender: NodeId,
        endpoint: &str,
        method: MethodIndex,
        args: &[u8],
    ) -> Result<Vec<u8>, RemoteFault> {
        let context = CallContext::new(sender, endpoint, method);
        let invocation = Invocation::new(&context, signature, args, &self.codec);

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            with_sender(sender, || implementor.invoke(invocation))
        }));

        let fault = match result {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(fault)) => fault,
            Err(payload) => {
                tracing::warn!(endpoint, %signature, "implementor panicked");
                RemoteFault::new(RemoteFault::PANIC, panic_message(&*payload))
            }
        };
        if fault.remote_trace.is_empty() {
            let frame = format!("at {endpoint}.{signature} on {}", self.node);
            return Err(fault.with_trace(frame));
        }
        Err(fault)
    }

    fn fault_to_error(
        &self,
        node: NodeId,
        endpoint: &str,
        signature: &MethodSignature,
        fault: RemoteFault,
    ) -> CourierError {
        if fault.is(RemoteFault::REMOTE_NOT_FOUND) {
            return CourierError::RemoteNotFound {
                endpoint: endpoint.to_owned(),
            };
        }
        if fault.is(RemoteFault::METHOD_INDEX_MISMATCH) {
            return CourierError::MethodIndexMismatch {
                endpoint: endpoint.to_owned(),
                detail: fault.message,
            };
        }

        let mut trace = fault.remote_trace.clone();
        if !trace.is_empty() {
            trace.push('\n');
        }
        let _ = write!(trace, "called from {} as {endpoint}.{signature}", self.node);
        CourierError::RemoteExecution { node, fault, trace }
    }

    fn send_call(
        &self,
        host: NodeId,
        endpoint: &str,
        method: MethodIndex,
        args: Vec<u8>,
        call_id: CallId,
        wants_result: bool,
    ) -> Result<(), CourierError> {
        let envelope = Envelope::MethodCall(MethodCall {
            endpoint: endpoint.to_owned(),
            method,
            args,
            call_id,
            wants_result,
        });
        self.send_envelope(host, &envelope)
    }

    fn send_envelope(&self, node: NodeId, envelope: &Envelope) -> Result<(), CourierError> {
        let bytes = self.codec.encode(envelope)?;
        self.transport.send_to(node, bytes)?;
        Ok(())
    }

    /// Broadcasts an implementor announcement. Failures are logged only.
    fn announce(&self, envelope: Envelope) {
        if !self.config.announce_implementors {
            return;
        }
        let kind = envelope.kind();
        let sent = self
            .codec
            .encode(&envelope)
            .map_err(CourierError::from)
            .and_then(|bytes| self.transport.broadcast(bytes).map_err(CourierError::from));
        if let Err(e) = sent {
            tracing::warn!(kind, error = %e, "failed to announce");
        }
    }
}

/// Removes a pending entry when the waiting future ends for any reason,
/// including being dropped mid-await.
struct PendingGuard<'a> {
    pending: &'a Mutex<PendingCalls>,
    call_id: CallId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .forget(self.call_id);
    }
}

/// Checks a caller-supplied index against the caller's interface.
fn check_method<'a>(
    endpoint: &str,
    interface: &'a InterfaceDescriptor,
    method: MethodIndex,
) -> Result<&'a MethodSignature, CourierError> {
    interface
        .method_at(method)
        .map_err(|e| CourierError::MethodIndexMismatch {
            endpoint: endpoint.to_owned(),
            detail: e.to_string(),
        })
}

/// Checks an index against the locally bound interface. A mismatch here
/// means the peers were built against different interfaces.
fn resolve_method<'a>(
    endpoint: &str,
    interface: &'a InterfaceDescriptor,
    method: MethodIndex,
) -> Result<&'a MethodSignature, RemoteFault> {
    interface.method_at(method).map_err(|e| {
        tracing::error!(endpoint, %method, error = %e, "method index mismatch");
        RemoteFault::new(RemoteFault::METHOD_INDEX_MISMATCH, e.to_string())
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "implementor panicked".to_owned()
    }
}
