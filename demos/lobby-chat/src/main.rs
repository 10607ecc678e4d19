use std::sync::{Arc, LazyLock, Mutex};
use std::time::Duration;

use courier::prelude::*;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Interfaces
// ---------------------------------------------------------------------------

static CALCULATOR: LazyLock<InterfaceDescriptor> = LazyLock::new(|| {
    InterfaceDescriptor::builder("Calculator")
        .method("add", ["i32", "i32"])
        .method("mul", ["i32", "i32"])
        .build()
});

static LOBBY: LazyLock<InterfaceDescriptor> = LazyLock::new(|| {
    InterfaceDescriptor::builder("Lobby")
        .method("said", ["ChatLine"])
        .method("joined", ["String"])
        .build()
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatLine {
    from: String,
    text: String,
}

// ---------------------------------------------------------------------------
// Implementors
// ---------------------------------------------------------------------------

/// Adds and multiplies. Refuses `add(-1, -1)`.
struct Calculator;

impl Implementor<JsonCodec> for Calculator {
    fn interface(&self) -> &InterfaceDescriptor {
        &CALCULATOR
    }

    fn invoke(&self, call: Invocation<'_, JsonCodec>) -> Result<Vec<u8>, RemoteFault> {
        let (a, b): (i32, i32) = call.args()?;
        match call.method().name() {
            "add" if (a, b) == (-1, -1) => Err(RemoteFault::new("IllegalArgument", "bad")),
            "add" => call.reply(&a.wrapping_add(b)),
            "mul" => call.reply(&a.wrapping_mul(b)),
            _ => Err(call.unsupported()),
        }
    }
}

/// Keeps every lobby event this node has seen.
#[derive(Default)]
struct LobbyLog {
    lines: Mutex<Vec<String>>,
}

impl LobbyLog {
    fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

impl Implementor<JsonCodec> for LobbyLog {
    fn interface(&self) -> &InterfaceDescriptor {
        &LOBBY
    }

    fn invoke(&self, call: Invocation<'_, JsonCodec>) -> Result<Vec<u8>, RemoteFault> {
        let line = match call.method().name() {
            "said" => {
                let (line,): (ChatLine,) = call.args()?;
                format!("<{}> {}", line.from, line.text)
            }
            "joined" => {
                let (name,): (String,) = call.args()?;
                format!("* {name} joined")
            }
            _ => return Err(call.unsupported()),
        };
        tracing::info!(sender = ?current_sender(), "{line}");
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line);
        }
        call.reply(&())
    }
}

// ---------------------------------------------------------------------------
// Typed clients
// ---------------------------------------------------------------------------

struct CalculatorClient {
    stub: RemoteStub,
    add: MethodIndex,
    mul: MethodIndex,
}

impl CalculatorClient {
    fn new(messenger: &Arc<Messenger>) -> Result<Self, CourierError> {
        let stub = messenger.remote_stub("calc", CALCULATOR.clone());
        Ok(Self {
            add: stub.method("add", &["i32", "i32"])?,
            mul: stub.method("mul", &["i32", "i32"])?,
            stub,
        })
    }

    async fn add(&self, a: i32, b: i32) -> Result<i32, CourierError> {
        self.stub.call(self.add, &(a, b)).await
    }

    async fn mul(&self, a: i32, b: i32) -> Result<i32, CourierError> {
        self.stub.call(self.mul, &(a, b)).await
    }
}

struct LobbyClient {
    stub: ChannelStub,
    said: MethodIndex,
    joined: MethodIndex,
}

impl LobbyClient {
    fn new(messenger: &Arc<Messenger>) -> Result<Self, CourierError> {
        let stub = messenger.channel_stub("lobby", LOBBY.clone());
        Ok(Self {
            said: stub.method("said", &["ChatLine"])?,
            joined: stub.method("joined", &["String"])?,
            stub,
        })
    }

    fn say(&self, from: &str, text: &str) -> Result<(), CourierError> {
        let line = ChatLine {
            from: from.to_owned(),
            text: text.to_owned(),
        };
        self.stub.publish(self.said, &(line,))
    }

    fn join(&self, name: &str) -> Result<(), CourierError> {
        self.stub.publish(self.joined, &(name,))
    }
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

struct Peer {
    messenger: Arc<Messenger>,
    log: Arc<LobbyLog>,
}

fn start_peer(network: &MemoryNetwork, id: u64) -> Result<Peer, CourierError> {
    let (transport, events) = network.join(NodeId::new(id));
    let messenger = Messenger::builder(Arc::new(transport))
        .call_timeout(Duration::from_secs(2))
        .build();
    tokio::spawn(Arc::clone(&messenger).run(events));

    let log = Arc::new(LobbyLog::default());
    messenger.register("lobby", log.clone(), Mode::Broadcast)?;
    Ok(Peer { messenger, log })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,courier=debug".into()),
        )
        .init();

    let network = MemoryNetwork::new();
    let host = start_peer(&network, 1)?;
    let alice = start_peer(&network, 2)?;
    let bob = start_peer(&network, 3)?;

    host.messenger
        .register("calc", Arc::new(Calculator), Mode::RequestResponse)?;

    if !alice
        .messenger
        .wait_for_implementors("calc", Duration::from_secs(1))
        .await
    {
        return Err("calc never showed up".into());
    }

    let calc = CalculatorClient::new(&alice.messenger)?;
    let sum = calc.add(2, 3).await?;
    tracing::info!(result = sum, "alice: add(2, 3)");
    let product = calc.mul(6, 7).await?;
    tracing::info!(result = product, "alice: mul(6, 7)");
    match calc.add(-1, -1).await {
        Ok(value) => tracing::warn!(value, "alice: add(-1, -1) unexpectedly succeeded"),
        Err(e) => tracing::info!(error = %e, "alice: add(-1, -1) failed as expected"),
    }

    let lobby = LobbyClient::new(&bob.messenger)?;
    lobby.join("bob")?;
    lobby.say("bob", "hi")?;
    lobby.say("bob", "anyone up for a game?")?;

    tokio::time::sleep(Duration::from_millis(100)).await;
    for (name, peer) in [("host", &host), ("alice", &alice), ("bob", &bob)] {
        tracing::info!(peer = name, lines = ?peer.log.lines(), "lobby log");
    }

    for peer in [&host, &alice, &bob] {
        peer.messenger.shutdown();
    }
    Ok(())
}
