//! Pending-call tracker: request/response correlation.
//!
//! A caller opens an entry before its `MethodCall` leaves the node and
//! then waits on the returned receiver. Exactly one thing completes the
//! entry:
//!
//! ```text
//! open() ──→ [pending] ──→ resolve()        (MethodResult from the awaited node)
//!                 │──────→ release_node()   (awaited node disconnected)
//!                 │──────→ release_all()    (messenger shut down)
//!                 └──────→ forget()         (caller gave up: timeout or drop)
//! ```
//!
//! Completion removes the entry, so a duplicate result finds nothing and
//! is discarded.

use std::collections::HashMap;

use courier_protocol::{CallId, Outcome};
use courier_transport::NodeId;
use tokio::sync::oneshot;

use crate::CourierError;

/// How a pending call ended.
#[derive(Debug)]
pub(crate) enum Resolution {
    /// The awaited node answered.
    Completed(Outcome),
    /// The awaited node left the network first.
    NodeDisconnected(NodeId),
    /// The messenger shut down.
    Shutdown,
}

/// What [`PendingCalls::resolve`] did with a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ResolveOutcome {
    /// The waiter was woken.
    Delivered,
    /// No call with this id is pending (late, duplicate or forged).
    Unknown,
    /// The call is pending on a different node. The entry is kept.
    WrongNode { expected: NodeId },
}

struct PendingCall {
    waiting_on: NodeId,
    endpoint: String,
    reply: oneshot::Sender<Resolution>,
}

/// Calls waiting for results, keyed by call id.
///
/// Not thread-safe by itself; the messenger keeps it behind a mutex that
/// is never held across an `.await`.
pub(crate) struct PendingCalls {
    calls: HashMap<CallId, PendingCall>,
    limit: usize,
    closed: bool,
}

impl PendingCalls {
    pub(crate) fn new(limit: usize) -> Self {
        Self {
            calls: HashMap::new(),
            limit,
            closed: false,
        }
    }

    /// Opens a pending entry for a call to `endpoint` on `node`.
    ///
    /// Returns the fresh call id and the receiver the caller waits on.
    ///
    /// # Errors
    /// - [`CourierError::Shutdown`] after [`release_all`](Self::release_all)
    /// - [`CourierError::TooManyPendingCalls`] at the configured limit
    pub(crate) fn open(
        &mut self,
        node: NodeId,
        endpoint: &str,
    ) -> Result<(CallId, oneshot::Receiver<Resolution>), CourierError> {
        if self.closed {
            return Err(CourierError::Shutdown);
        }
        if self.calls.len() >= self.limit {
            return Err(CourierError::TooManyPendingCalls { limit: self.limit });
        }

        let mut call_id = CallId::random();
        while self.calls.contains_key(&call_id) {
            call_id = CallId::random();
        }

        let (reply, rx) = oneshot::channel();
        self.calls.insert(
            call_id,
            PendingCall {
                waiting_on: node,
                endpoint: endpoint.to_owned(),
                reply,
            },
        );
        Ok((call_id, rx))
    }

    /// Completes the call `call_id` with a result that arrived from `from`.
    ///
    /// Only the node the call was sent to may complete it.
    pub(crate) fn resolve(&mut self, call_id: CallId, from: NodeId, outcome: Outcome) -> ResolveOutcome {
        let Some(pending) = self.calls.get(&call_id) else {
            return ResolveOutcome::Unknown;
        };
        if pending.waiting_on != from {
            return ResolveOutcome::WrongNode {
                expected: pending.waiting_on,
            };
        }

        let Some(pending) = self.calls.remove(&call_id) else {
            return ResolveOutcome::Unknown;
        };
        if pending.reply.send(Resolution::Completed(outcome)).is_err() {
            // Waiter already gone; its guard will find nothing to forget.
            tracing::debug!(%call_id, endpoint = %pending.endpoint, "result arrived after caller left");
        }
        ResolveOutcome::Delivered
    }

    /// Releases every call waiting on `node`. Returns how many.
    pub(crate) fn release_node(&mut self, node: NodeId) -> usize {
        let ids: Vec<CallId> = self
            .calls
            .iter()
            .filter(|(_, pending)| pending.waiting_on == node)
            .map(|(id, _)| *id)
            .collect();

        for id in &ids {
            if let Some(pending) = self.calls.remove(id) {
                tracing::debug!(call_id = %id, endpoint = %pending.endpoint, %node, "releasing call");
                let _ = pending.reply.send(Resolution::NodeDisconnected(node));
            }
        }
        ids.len()
    }

    /// Drops the entry for `call_id` without waking anyone.
    pub(crate) fn forget(&mut self, call_id: CallId) -> bool {
        self.calls.remove(&call_id).is_some()
    }

    /// Releases every call with [`Resolution::Shutdown`] and refuses new
    /// ones. Returns how many were released.
    pub(crate) fn release_all(&mut self) -> usize {
        self.closed = true;
        let released = self.calls.len();
        for (_, pending) in self.calls.drain() {
            let _ = pending.reply.send(Resolution::Shutdown);
        }
        released
    }

    pub(crate) fn len(&self) -> usize {
        self.calls.len()
    }
}

// =========================================================================
// Tests
// =========================================================================
