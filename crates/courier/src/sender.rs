//! The node on whose behalf the current implementor runs.
//!
//! The messenger sets this around every implementor and subscriber
//! invocation from the transport-level sender of the frame. Outside that
//! extent it is unset. The same value is passed to implementors as
//! [`Invocation::sender`](courier_registry::Invocation::sender); the
//! task-local form is for code further down the call stack that has no
//! access to the invocation.

use courier_transport::NodeId;

tokio::task_local! {
    static CURRENT_SENDER: NodeId;
}

/// The node that originated the invocation currently running on this
/// task, or `None` outside an implementor.
pub fn current_sender() -> Option<NodeId> {
    CURRENT_SENDER.try_with(|node| *node).ok()
}

/// Runs `f` with `sender` as the current sender. The value is cleared
/// when `f` returns or unwinds.
pub(crate) fn with_sender<R>(sender: NodeId, f: impl FnOnce() -> R) -> R {
    CURRENT_SENDER.sync_scope(sender, f)
}
