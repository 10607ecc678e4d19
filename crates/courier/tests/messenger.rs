//! Integration tests for request/response dispatch, over the in-memory
//! transport.

mod common;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use common::*;
use courier::prelude::*;
use courier::RegistryError;
use courier::protocol::{CallId, Envelope, MethodResult, Outcome};
use serde::{Deserialize, Serialize};

async fn add(messenger: &Messenger, a: i32, b: i32) -> Result<i32, CourierError> {
    messenger
        .call("calc", &calculator_interface(), add_index(), &(a, b))
        .await
}

/// Host on node 1 with a calculator, caller on node 2 that knows about it.
async fn host_and_caller(network: &MemoryNetwork) -> (Arc<Messenger>, Arc<Messenger>, Arc<Calculator>) {
    let host = spawn_node(network, 1);
    let caller = spawn_node(network, 2);
    let calc = Calculator::new();
    host.register("calc", calc.clone(), Mode::RequestResponse).unwrap();
    assert!(
        caller
            .wait_for_implementors("calc", Duration::from_secs(1))
            .await,
        "caller never learned about calc"
    );
    (host, caller, calc)
}

// =========================================================================
// Round trip
// =========================================================================

#[tokio::test]
async fn test_call_remote_implementor_returns_value() {
    let network = MemoryNetwork::new();
    let (_host, caller, calc) = host_and_caller(&network).await;

    let sum = add(&caller, 2, 3).await.unwrap();

    assert_eq!(sum, 5);
    assert_eq!(calc.calls(), 1, "exactly one invocation per call");
    assert_eq!(caller.pending_calls(), 0);
}

#[tokio::test]
async fn test_call_remote_fault_surfaces_message_and_trace() {
    let network = MemoryNetwork::new();
    let (_host, caller, _calc) = host_and_caller(&network).await;

    let err = add(&caller, -1, -1).await.unwrap_err();

    match &err {
        CourierError::RemoteExecution { node: at, fault, trace } => {
            assert_eq!(*at, node(1));
            assert_eq!(fault.kind, "IllegalArgument");
            assert_eq!(fault.message, "bad");
            assert!(trace.contains("on node-1"), "remote frame missing: {trace}");
            assert!(trace.contains("called from node-2"), "local frame missing: {trace}");
        }
        other => panic!("expected RemoteExecution, got {other:?}"),
    }
    assert!(err.to_string().contains("bad"));
}

#[tokio::test]
async fn test_call_local_implementor_sends_nothing() {
    let config = MessengerConfig {
        announce_implementors: false,
        ..test_config()
    };
    let (messenger, transport) = recording_messenger(1, "calc", 2, config);
    let calc = Calculator::new();
    messenger
        .register("calc", calc.clone(), Mode::RequestResponse)
        .unwrap();

    let sum = add(&messenger, 2, 3).await.unwrap();

    assert_eq!(sum, 5);
    assert_eq!(calc.calls(), 1);
    assert_eq!(calc.senders(), vec![Some(node(1))]);
    assert_eq!(transport.len(), 0, "local-first calls must not touch the network");
}

#[tokio::test]
async fn test_call_local_fault_returns_remote_execution() {
    let network = MemoryNetwork::new();
    let messenger = spawn_node(&network, 1);
    messenger
        .register("calc", Calculator::new(), Mode::RequestResponse)
        .unwrap();

    let err = add(&messenger, -1, -1).await.unwrap_err();

    assert!(matches!(
        err,
        CourierError::RemoteExecution { node: at, ref fault, .. }
            if at == node(1) && fault.message == "bad"
    ));
}

#[tokio::test]
async fn test_call_through_stub_matches_direct_call() {
    let network = MemoryNetwork::new();
    let (_host, caller, _calc) = host_and_caller(&network).await;
    let stub = caller.remote_stub("calc", calculator_interface());
    let add = stub.method("add", &["i32", "i32"]).unwrap();

    let sum: i32 = stub.call(add, &(20, 22)).await.unwrap();

    assert_eq!(sum, 42);
    assert_eq!(add, add_index());
}

// =========================================================================
// Failure modes
// =========================================================================

#[tokio::test]
async fn test_call_unknown_endpoint_returns_remote_not_found() {
    let network = MemoryNetwork::new();
    let caller = spawn_node(&network, 1);

    let err = add(&caller, 1, 2).await.unwrap_err();

    assert!(matches!(err, CourierError::RemoteNotFound { ref endpoint } if endpoint == "calc"));
}

#[tokio::test]
async fn test_call_endpoint_missing_on_host_returns_remote_not_found() {
    // The directory is stale: node 2 is listed but hosts nothing.
    let network = MemoryNetwork::new();
    let directory = Arc::new(PeerDirectory::new());
    directory.insert("calc", node(2));
    let (transport, events) = network.join(node(1));
    let caller = Messenger::builder(Arc::new(transport))
        .directory(directory)
        .build();
    tokio::spawn(Arc::clone(&caller).run(events));
    let _host = spawn_node(&network, 2);

    let err = add(&caller, 1, 2).await.unwrap_err();

    assert!(matches!(err, CourierError::RemoteNotFound { .. }));
}

#[tokio::test]
async fn test_call_out_of_range_index_returns_mismatch_and_sends_nothing() {
    let (messenger, transport) = recording_messenger(1, "calc", 2, test_config());

    let err = messenger
        .call::<_, i32>("calc", &calculator_interface(), MethodIndex(7), &(1, 2))
        .await
        .unwrap_err();

    assert!(matches!(err, CourierError::MethodIndexMismatch { .. }));
    assert_eq!(transport.len(), 0);
}

#[tokio::test]
async fn test_call_remote_with_shorter_interface_returns_mismatch() {
    // The host was built against a one-method interface; index 2 is past
    // its end.
    let network = MemoryNetwork::new();
    let host = spawn_node(&network, 1);
    let caller = spawn_node(&network, 2);
    let short = InterfaceDescriptor::builder("Calculator")
        .method("add", ["i32", "i32"])
        .build();
    host.register(
        "calc",
        Arc::new(FnImplementor::new(short, |call: Invocation<'_, JsonCodec>| {
            call.reply(&0)
        })),
        Mode::RequestResponse,
    )
    .unwrap();
    assert!(caller.wait_for_implementors("calc", Duration::from_secs(1)).await);

    let err = caller
        .call::<_, u64>("calc", &calculator_interface(), whoami_index(), &())
        .await
        .unwrap_err();

    assert!(matches!(err, CourierError::MethodIndexMismatch { ref endpoint, .. } if endpoint == "calc"));
}

#[tokio::test]
async fn test_call_non_transportable_argument_sends_nothing() {
    let (messenger, transport) = recording_messenger(1, "calc", 2, test_config());
    let mut unencodable = HashMap::new();
    unencodable.insert((1, 2), "tuple keys have no JSON form");

    let err = messenger
        .call::<_, i32>("calc", &calculator_interface(), add_index(), &unencodable)
        .await
        .unwrap_err();

    assert!(matches!(err, CourierError::NonTransportableArgument { .. }));
    assert_eq!(transport.len(), 0);
    assert_eq!(messenger.pending_calls(), 0);
}

#[tokio::test]
async fn test_call_implementor_panic_returns_fault_and_host_survives() {
    let network = MemoryNetwork::new();
    let (_host, caller, calc) = host_and_caller(&network).await;

    let err = caller
        .call::<_, ()>("calc", &calculator_interface(), explode_index(), &())
        .await
        .unwrap_err();

    let fault = err.remote_fault().expect("panic travels as a fault");
    assert!(fault.is(RemoteFault::PANIC));
    assert!(fault.message.contains("calculator exploded"));

    assert_eq!(add(&caller, 1, 1).await.unwrap(), 2, "host keeps serving");
    assert_eq!(calc.calls(), 2);
}

#[tokio::test]
async fn test_call_idle_host_times_out_and_clears_pending() {
    let network = MemoryNetwork::new();
    let _idle = idle_node(&network, 2);
    let config = MessengerConfig {
        call_timeout: Duration::from_millis(100),
        ..test_config()
    };
    let (transport, events) = network.join(node(1));
    let directory = Arc::new(PeerDirectory::new());
    directory.insert("calc", node(2));
    let caller = Messenger::builder(Arc::new(transport))
        .directory(directory)
        .config(config)
        .build();
    tokio::spawn(Arc::clone(&caller).run(events));

    let err = add(&caller, 1, 2).await.unwrap_err();

    assert!(matches!(
        err,
        CourierError::CallTimedOut { timeout, .. } if timeout == Duration::from_millis(100)
    ));
    assert_eq!(caller.pending_calls(), 0);
}

#[tokio::test]
async fn test_call_awaited_node_disconnects_releases_caller() {
    let network = MemoryNetwork::new();
    let _idle = idle_node(&network, 2);
    let (transport, events) = network.join(node(1));
    let directory = Arc::new(PeerDirectory::new());
    directory.insert("calc", node(2));
    let caller = Messenger::builder(Arc::new(transport))
        .directory(directory)
        .config(test_config())
        .build();
    tokio::spawn(Arc::clone(&caller).run(events));

    let pending = {
        let caller = Arc::clone(&caller);
        tokio::spawn(async move { add(&caller, 1, 2).await })
    };
    settle().await;
    assert_eq!(caller.pending_calls(), 1);

    network.disconnect(node(2));
    let err = tokio::time::timeout(Duration::from_secs(1), pending)
        .await
        .expect("caller must be released before the call timeout")
        .unwrap()
        .unwrap_err();

    assert!(matches!(
        err,
        CourierError::NodeDisconnectedWhileWaiting { node: gone, .. } if gone == node(2)
    ));
    assert_eq!(caller.pending_calls(), 0);
    assert!(!caller.is_aware_of_implementors("calc"), "directory forgets departed hosts");
}

#[tokio::test]
async fn test_call_beyond_pending_limit_returns_too_many() {
    let config = MessengerConfig {
        max_pending_calls: 1,
        ..test_config()
    };
    let (caller, _transport) = recording_messenger(1, "calc", 2, config);

    let first = {
        let caller = Arc::clone(&caller);
        tokio::spawn(async move { add(&caller, 1, 2).await })
    };
    settle().await;

    let err = add(&caller, 3, 4).await.unwrap_err();

    assert!(matches!(err, CourierError::TooManyPendingCalls { limit: 1 }));
    first.abort();
}

// =========================================================================
// Correlation
// =========================================================================

/// Starts a call to node 2 on a recording messenger and returns the call
/// id it was sent with.
async fn start_recorded_call(
    caller: &Arc<Messenger>,
    transport: &RecordingTransport,
) -> (tokio::task::JoinHandle<Result<i32, CourierError>>, CallId) {
    let handle = {
        let caller = Arc::clone(caller);
        tokio::spawn(async move { add(&caller, 2, 3).await })
    };
    settle().await;

    let call_id = transport
        .frames()
        .into_iter()
        .find_map(|(to, envelope)| match envelope {
            Envelope::MethodCall(call) if to == Some(node(2)) => Some(call.call_id),
            _ => None,
        })
        .expect("a MethodCall to node 2");
    (handle, call_id)
}

fn result_frame(call_id: CallId, value: i32) -> Vec<u8> {
    encode(&Envelope::MethodResult(MethodResult {
        call_id,
        outcome: Outcome::Ok(JsonCodec.encode(&value).unwrap()),
    }))
}

#[tokio::test]
async fn test_result_from_wrong_node_is_rejected() {
    let (caller, transport) = recording_messenger(1, "calc", 2, test_config());
    let (handle, call_id) = start_recorded_call(&caller, &transport).await;

    caller.on_envelope_received(node(3), &result_frame(call_id, 999));
    settle().await;

    assert_eq!(caller.pending_calls(), 1, "forged result must not resolve the call");
    assert!(!handle.is_finished());

    caller.on_envelope_received(node(2), &result_frame(call_id, 5));

    assert_eq!(handle.await.unwrap().unwrap(), 5);
}

#[tokio::test]
async fn test_duplicate_result_is_discarded() {
    let (caller, transport) = recording_messenger(1, "calc", 2, test_config());
    let (handle, call_id) = start_recorded_call(&caller, &transport).await;

    caller.on_envelope_received(node(2), &result_frame(call_id, 5));
    caller.on_envelope_received(node(2), &result_frame(call_id, 6));

    assert_eq!(handle.await.unwrap().unwrap(), 5);
    assert_eq!(caller.pending_calls(), 0);
}

#[tokio::test]
async fn test_result_for_unknown_call_is_ignored() {
    let (caller, _transport) = recording_messenger(1, "calc", 2, test_config());

    caller.on_envelope_received(node(2), &result_frame(CallId::from_u128(1), 5));

    assert_eq!(caller.pending_calls(), 0);
}

#[tokio::test]
async fn test_concurrent_calls_each_get_their_own_result() {
    let network = MemoryNetwork::new();
    let (_host, caller, calc) = host_and_caller(&network).await;

    let handles: Vec<_> = (0..20)
        .map(|i| {
            let caller = Arc::clone(&caller);
            tokio::spawn(async move { (i, add(&caller, i, i).await) })
        })
        .collect();

    for handle in handles {
        let (i, result) = handle.await.unwrap();
        assert_eq!(result.unwrap(), i * 2);
    }
    assert_eq!(calc.calls(), 20);
    assert_eq!(caller.pending_calls(), 0);
}

#[tokio::test]
async fn test_garbage_frame_is_ignored() {
    let network = MemoryNetwork::new();
    let (host, caller, _calc) = host_and_caller(&network).await;

    host.on_envelope_received(node(2), b"definitely not an envelope");

    assert_eq!(add(&caller, 1, 1).await.unwrap(), 2);
}

// =========================================================================
// Sender context
// =========================================================================

#[tokio::test]
async fn test_current_sender_is_transport_level_caller() {
    let network = MemoryNetwork::new();
    let (_host, caller, calc) = host_and_caller(&network).await;

    let who: u64 = caller
        .call("calc", &calculator_interface(), whoami_index(), &())
        .await
        .unwrap();

    assert_eq!(who, 2);
    assert_eq!(calc.senders(), vec![Some(node(2))]);
    assert_eq!(current_sender(), None, "unset outside implementors");
}

// =========================================================================
// Fire-and-forget
// =========================================================================

#[tokio::test]
async fn test_call_and_forget_runs_remotely_without_reply() {
    let network = MemoryNetwork::new();
    let (_host, caller, calc) = host_and_caller(&network).await;

    caller
        .call_and_forget("calc", &calculator_interface(), add_index(), &(1, 1))
        .unwrap();
    assert_eq!(caller.pending_calls(), 0, "nothing to wait for");
    settle().await;

    assert_eq!(calc.calls(), 1);
}

#[tokio::test]
async fn test_invoke_ignore_results_returns_none() {
    let (caller, transport) = recording_messenger(1, "calc", 2, test_config());

    let result = caller
        .invoke("calc", &calculator_interface(), add_index(), b"[1,1]".to_vec(), true)
        .await
        .unwrap();

    assert_eq!(result, None);
    match transport.frames().as_slice() {
        [(Some(to), Envelope::MethodCall(call))] => {
            assert_eq!(*to, node(2));
            assert!(!call.wants_result);
        }
        other => panic!("expected one MethodCall, got {other:?}"),
    }
}

// =========================================================================
// Registration and announcements
// =========================================================================

#[tokio::test]
async fn test_register_second_request_response_returns_error() {
    let network = MemoryNetwork::new();
    let host = spawn_node(&network, 1);
    host.register("calc", Calculator::new(), Mode::RequestResponse)
        .unwrap();

    let err = host
        .register("calc", Calculator::new(), Mode::RequestResponse)
        .unwrap_err();

    assert!(matches!(err, CourierError::Registry(RegistryError::DuplicateBinding(_))));
    assert_eq!(host.local_implementor_count("calc"), 1);
}

#[tokio::test]
async fn test_unregister_withdraws_announcement() {
    let network = MemoryNetwork::new();
    let (host, caller, calc) = host_and_caller(&network).await;
    let handle: SharedImplementor<JsonCodec> = calc;

    assert!(host.unregister("calc", &handle));
    settle().await;

    assert!(!caller.is_aware_of_implementors("calc"));
    assert!(matches!(
        add(&caller, 1, 1).await,
        Err(CourierError::RemoteNotFound { .. })
    ));
}

#[tokio::test]
async fn test_late_joiner_learns_existing_hosts() {
    let network = MemoryNetwork::new();
    let host = spawn_node(&network, 1);
    host.register("calc", Calculator::new(), Mode::RequestResponse)
        .unwrap();
    settle().await;

    let late = spawn_node(&network, 5);

    assert!(late.wait_for_implementors("calc", Duration::from_secs(1)).await);
    assert_eq!(add(&late, 4, 4).await.unwrap(), 8);
}

#[tokio::test]
async fn test_wait_for_implementors_gives_up_after_timeout() {
    let network = MemoryNetwork::new();
    let caller = spawn_node(&network, 1);

    let found = caller
        .wait_for_implementors("calc", Duration::from_millis(120))
        .await;

    assert!(!found);
}

// =========================================================================
// Shutdown
// =========================================================================

#[tokio::test]
async fn test_shutdown_releases_waiters_and_rejects_new_calls() {
    let (caller, transport) = recording_messenger(1, "calc", 2, test_config());
    let (handle, _call_id) = start_recorded_call(&caller, &transport).await;

    caller.shutdown();

    assert!(matches!(handle.await.unwrap(), Err(CourierError::Shutdown)));
    assert!(matches!(add(&caller, 1, 1).await, Err(CourierError::Shutdown)));
    assert!(caller.is_shut_down());
}

#[tokio::test]
async fn test_shutdown_withdraws_hosted_endpoints() {
    let network = MemoryNetwork::new();
    let (host, caller, _calc) = host_and_caller(&network).await;

    host.shutdown();
    settle().await;

    assert!(!caller.is_aware_of_implementors("calc"));
    assert_eq!(host.local_implementor_count("calc"), 0);
}

// =========================================================================
// Responsiveness while implementors work
// =========================================================================

fn sleeper_interface() -> InterfaceDescriptor {
    InterfaceDescriptor::builder("Sleeper")
        .method("nap", [] as [&str; 0])
        .build()
}

/// Registers a `nap` endpoint on `host` that blocks for `duration`.
fn register_sleeper(host: &Messenger, duration: Duration) {
    host.register(
        "sleeper",
        Arc::new(FnImplementor::new(
            sleeper_interface(),
            move |call: Invocation<'_, JsonCodec>| {
                std::thread::sleep(duration);
                call.reply(&())
            },
        )),
        Mode::RequestResponse,
    )
    .unwrap();
}

/// Starts a `nap` call from `caller` and waits until it is in flight.
async fn start_nap(caller: &Arc<Messenger>) -> tokio::task::JoinHandle<Result<(), CourierError>> {
    assert!(caller.wait_for_implementors("sleeper", Duration::from_secs(1)).await);
    let handle = {
        let caller = Arc::clone(caller);
        tokio::spawn(async move {
            caller
                .call("sleeper", &sleeper_interface(), MethodIndex(0), &())
                .await
        })
    };
    settle().await;
    handle
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_call_from_node_with_busy_implementor_completes_promptly() {
    let network = MemoryNetwork::new();
    let client = spawn_node(&network, 1);
    let busy = spawn_node(&network, 2);
    let calc_host = spawn_node(&network, 3);
    register_sleeper(&busy, Duration::from_millis(800));
    calc_host
        .register("calc", Calculator::new(), Mode::RequestResponse)
        .unwrap();
    assert!(busy.wait_for_implementors("calc", Duration::from_secs(1)).await);
    let nap = start_nap(&client).await;

    let started = tokio::time::Instant::now();
    let sum = add(&busy, 2, 3).await.unwrap();

    assert_eq!(sum, 5);
    assert!(
        started.elapsed() < Duration::from_millis(400),
        "result waited for the busy implementor: {:?}",
        started.elapsed()
    );
    nap.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_disconnect_while_implementor_busy_releases_caller() {
    let network = MemoryNetwork::new();
    let client = spawn_node(&network, 1);
    let busy = spawn_node(&network, 2);
    let _idle = idle_node(&network, 4);
    register_sleeper(&busy, Duration::from_millis(800));
    busy.directory().node_hosts(node(4), "calc");
    let nap = start_nap(&client).await;

    let waiting = {
        let busy = Arc::clone(&busy);
        tokio::spawn(async move { add(&busy, 1, 1).await })
    };
    settle().await;
    network.disconnect(node(4));

    let err = tokio::time::timeout(Duration::from_millis(400), waiting)
        .await
        .expect("disconnect must be noticed while the implementor runs")
        .unwrap()
        .unwrap_err();

    assert!(matches!(
        err,
        CourierError::NodeDisconnectedWhileWaiting { node: gone, .. } if gone == node(4)
    ));
    nap.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_call_implementor_making_nested_call_returns_value() {
    let network = MemoryNetwork::new();
    let client = spawn_node(&network, 1);
    let relay_host = spawn_node(&network, 2);
    let calc_host = spawn_node(&network, 3);
    calc_host
        .register("calc", Calculator::new(), Mode::RequestResponse)
        .unwrap();

    let relay_interface = InterfaceDescriptor::builder("Relay")
        .method("add", ["i32", "i32"])
        .build();
    let host = Arc::downgrade(&relay_host);
    relay_host
        .register(
            "relay",
            Arc::new(FnImplementor::new(
                relay_interface.clone(),
                move |call: Invocation<'_, JsonCodec>| {
                    let (a, b): (i32, i32) = call.args()?;
                    let messenger = host
                        .upgrade()
                        .ok_or_else(|| RemoteFault::new("IllegalState", "relay host gone"))?;
                    let sum = tokio::runtime::Handle::current()
                        .block_on(add(&messenger, a, b))
                        .map_err(|e| RemoteFault::new("Nested", e.to_string()))?;
                    call.reply(&sum)
                },
            )),
            Mode::RequestResponse,
        )
        .unwrap();
    assert!(relay_host.wait_for_implementors("calc", Duration::from_secs(1)).await);
    assert!(client.wait_for_implementors("relay", Duration::from_secs(1)).await);

    let sum: i32 = client
        .call("relay", &relay_interface, MethodIndex(0), &(2, 3))
        .await
        .unwrap();

    assert_eq!(sum, 5);
}

#[tokio::test]
async fn test_calls_to_one_endpoint_run_in_arrival_order() {
    let network = MemoryNetwork::new();
    let host = spawn_node(&network, 1);
    let caller = spawn_node(&network, 2);
    let log = ChatRecorder::new();
    host.register("log", log.clone(), Mode::RequestResponse).unwrap();
    assert!(caller.wait_for_implementors("log", Duration::from_secs(1)).await);

    let sent: Vec<String> = (0..30).map(|i| format!("line {i}")).collect();
    for text in &sent {
        caller
            .call_and_forget("log", &chat_interface(), said_index(), &(text,))
            .unwrap();
    }
    assert!(eventually(|| log.messages().len() == sent.len()).await);

    assert_eq!(log.messages(), sent);
}

// =========================================================================
// Argument shapes
// =========================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Item {
    name: String,
    weight: u32,
    tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Shape {
    Point,
    Circle { radius: u32 },
    Rect(u32, u32),
}

fn inventory_interface() -> InterfaceDescriptor {
    InterfaceDescriptor::builder("Inventory")
        .method("echo_item", ["Item"])
        .method("echo_shape", ["Shape"])
        .method("total", ["Option<Vec<u32>>"])
        .method("reset", [] as [&str; 0])
        .build()
}

fn inventory_index(name: &str, params: &[&str]) -> MethodIndex {
    inventory_interface().index_of(name, params).unwrap()
}

fn inventory() -> SharedImplementor<JsonCodec> {
    Arc::new(FnImplementor::new(
        inventory_interface(),
        |call: Invocation<'_, JsonCodec>| match call.method().name() {
            "echo_item" => {
                let (item,): (Item,) = call.args()?;
                call.reply(&item)
            }
            "echo_shape" => {
                let (shape,): (Shape,) = call.args()?;
                call.reply(&shape)
            }
            "total" => {
                let (values,): (Option<Vec<u32>>,) = call.args()?;
                let total: u64 = values.unwrap_or_default().into_iter().map(u64::from).sum();
                call.reply(&total)
            }
            "reset" => call.reply(&()),
            _ => Err(call.unsupported()),
        },
    ))
}

async fn assert_shapes_round_trip(caller: &Messenger) {
    let iface = inventory_interface();

    let item = Item {
        name: "sword".to_owned(),
        weight: 3,
        tags: vec!["sharp".to_owned(), "heavy".to_owned()],
    };
    let back: Item = caller
        .call("inventory", &iface, inventory_index("echo_item", &["Item"]), &(item.clone(),))
        .await
        .unwrap();
    assert_eq!(back, item);

    for shape in [Shape::Point, Shape::Circle { radius: 4 }, Shape::Rect(2, 3)] {
        let back: Shape = caller
            .call("inventory", &iface, inventory_index("echo_shape", &["Shape"]), &(shape.clone(),))
            .await
            .unwrap();
        assert_eq!(back, shape);
    }

    let total_index = inventory_index("total", &["Option<Vec<u32>>"]);
    let total: u64 = caller
        .call("inventory", &iface, total_index, &(Some(vec![1_u32, 2, 3]),))
        .await
        .unwrap();
    assert_eq!(total, 6);
    let total: u64 = caller
        .call("inventory", &iface, total_index, &(None::<Vec<u32>>,))
        .await
        .unwrap();
    assert_eq!(total, 0);

    let (): () = caller
        .call("inventory", &iface, inventory_index("reset", &[]), &())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_call_argument_shapes_round_trip_locally() {
    let network = MemoryNetwork::new();
    let messenger = spawn_node(&network, 1);
    messenger
        .register("inventory", inventory(), Mode::RequestResponse)
        .unwrap();

    assert_shapes_round_trip(&messenger).await;
}

#[tokio::test]
async fn test_call_argument_shapes_round_trip_remotely() {
    let network = MemoryNetwork::new();
    let host = spawn_node(&network, 1);
    let caller = spawn_node(&network, 2);
    host.register("inventory", inventory(), Mode::RequestResponse)
        .unwrap();
    assert!(caller.wait_for_implementors("inventory", Duration::from_secs(1)).await);

    assert_shapes_round_trip(&caller).await;
}

// =========================================================================
// Directory routing
// =========================================================================

#[tokio::test]
async fn test_call_directory_listing_self_first_routes_to_remote_host() {
    let transport = RecordingTransport::new(1);
    let directory = Arc::new(PeerDirectory::new());
    directory.insert("calc", node(1));
    directory.insert("calc", node(3));
    let caller = Messenger::builder(Arc::new(transport.clone()))
        .directory(directory)
        .config(test_config())
        .build();

    caller
        .call_and_forget("calc", &calculator_interface(), add_index(), &(1, 2))
        .unwrap();

    assert!(caller.is_aware_of_implementors("calc"));
    match transport.frames().as_slice() {
        [(Some(to), Envelope::MethodCall(call))] => {
            assert_eq!(*to, node(3));
            assert_eq!(call.endpoint, "calc");
        }
        other => panic!("expected one MethodCall to node-3, got {other:?}"),
    }
}
