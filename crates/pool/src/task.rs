//! Task identity, lifecycle state, and the caller-side result handle.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::error::PoolError;

/// Identifier assigned to every submission, monotonically increasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Lifecycle of a submitted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
    /// Submitted, admission not yet decided.
    Pending,
    /// Waiting in the task queue for a free worker slot.
    Queued,
    /// Handed to a worker.
    Running,
    /// Settled with the backend's outcome (success or payload failure).
    /// Observed through the task's handle; the pool forgets settled tasks.
    Completed,
    /// Settled by pool shutdown. Observed as [`PoolError::Aborted`] on the
    /// task's handle.
    Aborted,
}

pub(crate) type ResultSender<R> = oneshot::Sender<Result<R, PoolError>>;

/// A task the pool has admitted but not yet handed to a worker.
///
/// The payload leaves with the assignment; the result sender stays with the
/// pool so that only the pool ever settles the caller's handle.
pub(crate) struct PendingTask<P, R> {
    pub id: TaskId,
    pub payload: P,
    pub result_tx: ResultSender<R>,
    pub state: TaskState,
    pub submitted: Instant,
}

impl<P, R> PendingTask<P, R> {
    pub fn new(id: TaskId, payload: P) -> (Self, TaskHandle<R>) {
        let (result_tx, result_rx) = oneshot::channel();
        let task = Self {
            id,
            payload,
            result_tx,
            state: TaskState::Pending,
            submitted: Instant::now(),
        };
        (task, TaskHandle { id, result_rx })
    }
}

/// Bookkeeping for a task that a worker is executing.
pub(crate) struct RunningTask<R> {
    pub worker: crate::worker::WorkerId,
    pub result_tx: ResultSender<R>,
    pub submitted: Instant,
    pub started: Instant,
}

/// Caller-side handle to a submitted task. Resolves exactly once.
#[derive(Debug)]
pub struct TaskHandle<R> {
    id: TaskId,
    result_rx: oneshot::Receiver<Result<R, PoolError>>,
}

impl<R> TaskHandle<R> {
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// A handle that is already settled with `err`. Used for synchronous
    /// rejections from [`crate::Pool::submit`].
    pub(crate) fn rejected(id: TaskId, err: PoolError) -> Self {
        let (tx, result_rx) = oneshot::channel();
        let _ = tx.send(Err(err));
        Self { id, result_rx }
    }
}

impl<R> Future for TaskHandle<R> {
    type Output = Result<R, PoolError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.result_rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            // Sender dropped without settling: the pool itself went away.
            Poll::Ready(Err(_)) => Poll::Ready(Err(PoolError::Destroyed)),
            Poll::Pending => Poll::Pending,
        }
    }
}
