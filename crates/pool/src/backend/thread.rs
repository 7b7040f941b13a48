//! OS-thread backend: one dedicated thread per worker.
//!
//! Each thread drives a current-thread tokio runtime with a [`LocalSet`].
//! Jobs arrive over an unbounded channel and run as local tasks, so a worker
//! configured for several concurrent tasks interleaves them at await points.
//! A payload that blocks the thread without yielding holds the whole worker.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::{self, LocalBoxFuture};
use futures::FutureExt;
use tokio::sync::{mpsc, oneshot, Notify};
use tokio::task::LocalSet;
use tracing::{debug, info};

use super::{ExecutionBackend, TaskFuture, WorkerHandle};
use crate::error::{PoolError, TaskError};
use crate::task::TaskId;
use crate::worker::WorkerId;

type Handler<P, R> =
    Arc<dyn Fn(P) -> LocalBoxFuture<'static, Result<R, TaskError>> + Send + Sync>;

struct Job<P, R> {
    task: TaskId,
    payload: P,
    reply: oneshot::Sender<Result<R, TaskError>>,
}

// ── ThreadBackend ───────────────────────────────────────────────────

/// Backend that runs every worker on its own OS thread.
pub struct ThreadBackend<P, R> {
    handler: Handler<P, R>,
    stack_size: Option<usize>,
}

impl<P, R> ThreadBackend<P, R>
where
    P: Send + 'static,
    R: Send + 'static,
{
    /// Build a backend from an async handler. The future runs on the worker
    /// thread and need not be `Send`.
    pub fn new<F, Fut>(handler: F) -> Self
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, TaskError>> + 'static,
    {
        Self {
            handler: Arc::new(move |payload| handler(payload).boxed_local()),
            stack_size: None,
        }
    }

    /// Build a backend from a synchronous closure. The closure occupies the
    /// worker thread for its whole run.
    pub fn blocking<F>(f: F) -> Self
    where
        F: Fn(P) -> Result<R, TaskError> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Self::new(move |payload| {
            let f = Arc::clone(&f);
            async move { f(payload) }
        })
    }

    /// Stack size for worker threads (default: the platform default).
    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }
}

impl<P, R> ExecutionBackend for ThreadBackend<P, R>
where
    P: Send + 'static,
    R: Send + 'static,
{
    type Payload = P;
    type Output = R;
    type Worker = ThreadWorker<P, R>;

    fn spawn(&self, id: WorkerId, name: &str) -> Result<Self::Worker, PoolError> {
        let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
        let shutdown = Arc::new(Notify::new());
        let (ready_tx, ready_rx) = std::sync::mpsc::sync_channel::<Result<(), String>>(1);

        let mut builder = std::thread::Builder::new().name(name.to_string());
        if let Some(bytes) = self.stack_size {
            builder = builder.stack_size(bytes);
        }

        let handler = Arc::clone(&self.handler);
        let thread_shutdown = Arc::clone(&shutdown);
        builder
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        let _ = ready_tx.send(Err(format!("runtime: {e}")));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));
                let local = LocalSet::new();
                local.block_on(&runtime, worker_loop(id, handler, jobs_rx, thread_shutdown));
                // Dropping the LocalSet here cancels any job still in flight.
            })
            .map_err(|e| PoolError::Spawn(format!("{name}: {e}")))?;

        // The thread reports back as soon as its runtime exists.
        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(PoolError::Spawn(format!("{name}: {e}"))),
            Err(_) => return Err(PoolError::Spawn(format!("{name}: thread exited during startup"))),
        }

        debug!(worker = %id, thread = name, "worker thread started");
        Ok(ThreadWorker {
            id,
            jobs: jobs_tx,
            shutdown,
        })
    }
}

// ── ThreadWorker ────────────────────────────────────────────────────

/// Handle to a worker thread owned by [`ThreadBackend`].
pub struct ThreadWorker<P, R> {
    id: WorkerId,
    jobs: mpsc::UnboundedSender<Job<P, R>>,
    shutdown: Arc<Notify>,
}

impl<P, R> WorkerHandle<P, R> for ThreadWorker<P, R>
where
    P: Send + 'static,
    R: Send + 'static,
{
    fn execute(&self, task: TaskId, payload: P) -> TaskFuture<R> {
        let (reply, rx) = oneshot::channel();
        if self.jobs.send(Job { task, payload, reply }).is_err() {
            return future::ready(Err(TaskError::WorkerExited)).boxed();
        }
        async move { rx.await.unwrap_or(Err(TaskError::WorkerExited)) }.boxed()
    }

    fn terminate(&self) {
        debug!(worker = %self.id, "terminating worker thread");
        // notify_one stores a permit, so a loop that isn't parked yet still sees it.
        self.shutdown.notify_one();
    }
}

async fn worker_loop<P, R>(
    id: WorkerId,
    handler: Handler<P, R>,
    mut jobs: mpsc::UnboundedReceiver<Job<P, R>>,
    shutdown: Arc<Notify>,
) where
    P: 'static,
    R: 'static,
{
    loop {
        tokio::select! {
            biased;
            _ = shutdown.notified() => {
                info!(worker = %id, "worker thread stopping");
                break;
            }
            job = jobs.recv() => match job {
                Some(job) => {
                    tokio::task::spawn_local(run_job(Arc::clone(&handler), job));
                }
                None => break,
            },
        }
    }
}

async fn run_job<P, R>(handler: Handler<P, R>, job: Job<P, R>) {
    let Job { task, payload, reply } = job;
    let outcome = AssertUnwindSafe(async move { handler(payload).await })
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err(TaskError::Panicked(panic_message(&*panic))));

    if reply.send(outcome).is_err() {
        debug!(task = %task, "result receiver dropped before completion");
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
