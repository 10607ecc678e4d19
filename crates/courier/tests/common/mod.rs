//! Shared fixtures for the messenger integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use courier::prelude::*;
use courier::protocol::Envelope;
use courier::transport::TransportError;

// =========================================================================
// Logging
// =========================================================================

static TRACING: Once = Once::new();

/// Routes `tracing` output through the test harness. `RUST_LOG` applies.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "warn".into()),
            )
            .with_test_writer()
            .try_init();
    });
}

// =========================================================================
// Nodes
// =========================================================================

pub fn node(id: u64) -> NodeId {
    NodeId::new(id)
}

/// Joins `id` to the network and pumps its events on a spawned task.
pub fn spawn_node(network: &MemoryNetwork, id: u64) -> Arc<Messenger> {
    spawn_node_with(network, id, test_config())
}

pub fn spawn_node_with(network: &MemoryNetwork, id: u64, config: MessengerConfig) -> Arc<Messenger> {
    init_tracing();
    let (transport, events) = network.join(node(id));
    let messenger = Messenger::builder(Arc::new(transport)).config(config).build();
    tokio::spawn(Arc::clone(&messenger).run(events));
    messenger
}

/// Joins `id` to the network without a messenger. Frames sent to it are
/// queued and never answered until the receiver is dropped.
pub fn idle_node(
    network: &MemoryNetwork,
    id: u64,
) -> tokio::sync::mpsc::UnboundedReceiver<TransportEvent> {
    let (_transport, events) = network.join(node(id));
    events
}

pub fn test_config() -> MessengerConfig {
    MessengerConfig {
        call_timeout: Duration::from_secs(2),
        ..MessengerConfig::default()
    }
}

/// Lets spawned event loops drain their inboxes.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(30)).await;
}

/// Polls `done` until it holds, for at most two seconds.
pub async fn eventually(done: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !done() {
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    true
}

// =========================================================================
// Calculator: the request/response fixture
// =========================================================================

pub fn calculator_interface() -> InterfaceDescriptor {
    InterfaceDescriptor::builder("Calculator")
        .method("add", ["i32", "i32"])
        .method("explode", [] as [&str; 0])
        .method("whoami", [] as [&str; 0])
        .build()
}

pub fn add_index() -> MethodIndex {
    calculator_interface().index_of("add", &["i32", "i32"]).unwrap()
}

pub fn explode_index() -> MethodIndex {
    calculator_interface().index_of("explode", &[]).unwrap()
}

pub fn whoami_index() -> MethodIndex {
    calculator_interface().index_of("whoami", &[]).unwrap()
}

/// Counts its invocations and remembers who made them.
///
/// `add(-1, -1)` fails with an `IllegalArgument` fault carrying "bad".
pub struct Calculator {
    interface: InterfaceDescriptor,
    calls: AtomicUsize,
    senders: Mutex<Vec<Option<NodeId>>>,
}

impl Calculator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            interface: calculator_interface(),
            calls: AtomicUsize::new(0),
            senders: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn senders(&self) -> Vec<Option<NodeId>> {
        self.senders.lock().unwrap().clone()
    }
}

impl Implementor<JsonCodec> for Calculator {
    fn interface(&self) -> &InterfaceDescriptor {
        &self.interface
    }

    fn invoke(&self, call: Invocation<'_, JsonCodec>) -> Result<Vec<u8>, RemoteFault> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.senders.lock().unwrap().push(current_sender());

        match call.method().name() {
            "add" => {
                let (a, b): (i32, i32) = call.args()?;
                if (a, b) == (-1, -1) {
                    return Err(RemoteFault::new("IllegalArgument", "bad"));
                }
                call.reply(&(a + b))
            }
            "explode" => panic!("calculator exploded"),
            "whoami" => call.reply(&call.sender().into_inner()),
            _ => Err(call.unsupported()),
        }
    }
}

// =========================================================================
// Chat: the broadcast fixture
// =========================================================================

pub fn chat_interface() -> InterfaceDescriptor {
    InterfaceDescriptor::builder("Chat")
        .method("said", ["String"])
        .build()
}

pub fn said_index() -> MethodIndex {
    chat_interface().index_of("said", &["String"]).unwrap()
}

/// Records every message with the sender it was delivered on behalf of.
pub struct ChatRecorder {
    interface: InterfaceDescriptor,
    seen: Mutex<Vec<(Option<NodeId>, String)>>,
}

impl ChatRecorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            interface: chat_interface(),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn seen(&self) -> Vec<(Option<NodeId>, String)> {
        self.seen.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.seen().into_iter().map(|(_, text)| text).collect()
    }
}

impl Implementor<JsonCodec> for ChatRecorder {
    fn interface(&self) -> &InterfaceDescriptor {
        &self.interface
    }

    fn invoke(&self, call: Invocation<'_, JsonCodec>) -> Result<Vec<u8>, RemoteFault> {
        let (text,): (String,) = call.args()?;
        self.seen.lock().unwrap().push((current_sender(), text));
        call.reply(&())
    }
}

// =========================================================================
// RecordingTransport
// =========================================================================

/// A transport that keeps every outbound frame instead of delivering it.
#[derive(Clone)]
pub struct RecordingTransport {
    node: NodeId,
    frames: Arc<Mutex<Vec<(Option<NodeId>, Vec<u8>)>>>,
}

impl RecordingTransport {
    pub fn new(id: u64) -> Self {
        Self {
            node: node(id),
            frames: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every frame so far: `Some(target)` for `send_to`, `None` for
    /// `broadcast`.
    pub fn frames(&self) -> Vec<(Option<NodeId>, Envelope)> {
        self.frames
            .lock()
            .unwrap()
            .iter()
            .map(|(to, data)| (*to, JsonCodec.decode(data).unwrap()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.frames.lock().unwrap().len()
    }
}

impl Transport for RecordingTransport {
    fn local_node(&self) -> NodeId {
        self.node
    }

    fn send_to(&self, node: NodeId, data: Vec<u8>) -> Result<(), TransportError> {
        self.frames.lock().unwrap().push((Some(node), data));
        Ok(())
    }

    fn broadcast(&self, data: Vec<u8>) -> Result<(), TransportError> {
        self.frames.lock().unwrap().push((None, data));
        Ok(())
    }
}

/// A messenger on a [`RecordingTransport`] whose directory says `host`
/// hosts `endpoint`. Nothing pumps its events.
pub fn recording_messenger(
    id: u64,
    endpoint: &str,
    host: u64,
    config: MessengerConfig,
) -> (Arc<Messenger>, RecordingTransport) {
    init_tracing();
    let transport = RecordingTransport::new(id);
    let directory = Arc::new(PeerDirectory::new());
    directory.insert(endpoint, node(host));
    let messenger = Messenger::builder(Arc::new(transport.clone()))
        .directory(directory)
        .config(config)
        .build();
    (messenger, transport)
}

pub fn encode(envelope: &Envelope) -> Vec<u8> {
    JsonCodec.encode(envelope).unwrap()
}
