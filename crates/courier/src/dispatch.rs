//! Inbound invocations, off the event pump.
//!
//! The pump must keep reading results and disconnects while implementors
//! run, so every inbound `MethodCall` and `SubscriberEvent` is handed to a
//! queue here instead of running inline. Each endpoint has one queue,
//! drained by its own task: invocations of one endpoint run one at a time
//! in arrival order, and different endpoints run side by side.
//!
//! Implementors are plain synchronous code and may block, so each job runs
//! on tokio's blocking pool. A job can therefore wait on a nested call
//! with `Handle::current().block_on(..)`.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::runtime::Handle;
use tokio::sync::mpsc;

/// One queued invocation, result reply included.
pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

pub(crate) struct InvocationQueues {
    queues: Mutex<HashMap<String, mpsc::UnboundedSender<Job>>>,
}

impl InvocationQueues {
    pub(crate) fn new() -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
        }
    }

    /// Queues `job` behind every earlier job for `endpoint`.
    ///
    /// Outside a tokio runtime there is nowhere to queue to, and the job
    /// runs on the calling thread.
    pub(crate) fn submit(&self, endpoint: &str, job: Job) {
        let Ok(runtime) = Handle::try_current() else {
            tracing::debug!(endpoint, "no runtime, running invocation inline");
            job();
            return;
        };

        let mut queues = self.lock();
        let job = match queues.get(endpoint) {
            Some(queue) => match queue.send(job) {
                Ok(()) => return,
                // The drain task is gone; start a new one.
                Err(mpsc::error::SendError(job)) => job,
            },
            None => job,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        if tx.send(job).is_err() {
            return;
        }
        queues.insert(endpoint.to_owned(), tx);
        runtime.spawn(drain(endpoint.to_owned(), rx));
        tracing::debug!(endpoint, "invocation queue opened");
    }

    /// Drops every queue. Jobs already queued still run; drain tasks stop
    /// once their queue is empty.
    pub(crate) fn close(&self) -> usize {
        let mut queues = self.lock();
        let closed = queues.len();
        queues.clear();
        closed
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, mpsc::UnboundedSender<Job>>> {
        self.queues.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn drain(endpoint: String, mut jobs: mpsc::UnboundedReceiver<Job>) {
    while let Some(job) = jobs.recv().await {
        if let Err(e) = tokio::task::spawn_blocking(job).await {
            tracing::warn!(endpoint, error = %e, "invocation task failed");
        }
    }
    tracing::debug!(endpoint, "invocation queue closed");
}
