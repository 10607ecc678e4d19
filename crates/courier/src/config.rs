//! Messenger configuration.

use std::time::Duration;

/// Tuning knobs for a [`Messenger`](crate::Messenger).
///
/// The defaults suit a game session on a LAN or a decent internet link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessengerConfig {
    /// How long a request/response call waits for its result before
    /// failing with `CallTimedOut`.
    pub call_timeout: Duration,

    /// Upper bound on calls waiting for results at the same time. Further
    /// calls fail with `TooManyPendingCalls`.
    pub max_pending_calls: usize,

    /// Whether to tell peers when this node starts or stops hosting a
    /// request/response endpoint.
    pub announce_implementors: bool,
}

impl MessengerConfig {
    /// Shortest accepted call timeout.
    pub const MIN_CALL_TIMEOUT: Duration = Duration::from_millis(1);

    /// Clamps out-of-range values into something usable.
    ///
    /// A zero timeout would fail every call before the request left the
    /// node, and a zero pending limit would reject every call.
    pub fn validated(mut self) -> Self {
        if self.call_timeout < Self::MIN_CALL_TIMEOUT {
            tracing::warn!(
                requested = ?self.call_timeout,
                "call_timeout too small, clamping"
            );
            self.call_timeout = Self::MIN_CALL_TIMEOUT;
        }
        if self.max_pending_calls == 0 {
            tracing::warn!("max_pending_calls is 0, clamping to 1");
            self.max_pending_calls = 1;
        }
        self
    }
}

impl Default for MessengerConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(30),
            max_pending_calls: 4096,
            announce_implementors: true,
        }
    }
}
