//! Execution backend seam.
//!
//! The pool decides *where* a task runs; a backend decides *how*. A backend
//! starts one execution context per [`WorkerId`] and hands back a
//! [`WorkerHandle`] that accepts payloads and can be told to stop.

pub mod thread;

use futures::future::BoxFuture;

use crate::error::{PoolError, TaskError};
use crate::task::TaskId;
use crate::worker::WorkerId;

pub use thread::ThreadBackend;

/// Future returned by [`WorkerHandle::execute`], resolving with the payload's
/// outcome.
pub type TaskFuture<R> = BoxFuture<'static, Result<R, TaskError>>;

/// Control handle for one running execution context.
///
/// Both methods are called while the pool holds its state lock, so they must
/// not block: `execute` hands the payload over and returns immediately, and
/// `terminate` only signals. [`ExecutionBackend::spawn`] is the one call
/// allowed to wait, and only for the new context to finish starting.
pub trait WorkerHandle<P, R>: Send + 'static {
    /// Start running `payload`. The returned future resolves when the worker
    /// reports completion.
    fn execute(&self, task: TaskId, payload: P) -> TaskFuture<R>;

    /// Ask the context to stop, abandoning in-flight work where possible.
    fn terminate(&self);
}

/// Factory for execution contexts.
pub trait ExecutionBackend: Send + Sync + 'static {
    type Payload: Send + 'static;
    type Output: Send + 'static;
    type Worker: WorkerHandle<Self::Payload, Self::Output>;

    /// Start a new execution context. `name` is a human-readable label
    /// (thread name, log field).
    ///
    /// Runs under the pool's state lock. It may block briefly until the
    /// context reports that it started, so that a startup failure surfaces
    /// here as [`PoolError::Spawn`] rather than on the first task.
    fn spawn(&self, id: WorkerId, name: &str) -> Result<Self::Worker, PoolError>;
}
