use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::runtime::Handle;
use tokio::sync::Notify;
use tracing::{info, warn};

use crate::backend::{ExecutionBackend, WorkerHandle};
use crate::config::PoolConfig;
use crate::error::PoolError;
use crate::metrics::PoolMetrics;
use crate::queue::TaskQueue;
use crate::task::{PendingTask, RunningTask, TaskHandle, TaskId, TaskState};
use crate::worker::{WorkerId, WorkerInfo, WorkerState};

use super::workers::WorkerSet;

/// Everything the dispatcher mutates, behind one lock.
pub(super) struct PoolState<B: ExecutionBackend> {
    pub workers: WorkerSet<B::Worker>,
    pub queue: TaskQueue<PendingTask<B::Payload, B::Output>>,
    pub running: HashMap<TaskId, RunningTask<B::Output>>,
    pub metrics: PoolMetrics,
    pub next_task: u64,
    pub destroyed: bool,
}

impl<B: ExecutionBackend> PoolState<B> {
    fn new(config: &PoolConfig) -> Self {
        Self {
            workers: WorkerSet::new(
                config.min_threads,
                config.max_threads,
                config.concurrent_tasks_per_worker,
            ),
            queue: TaskQueue::new(config.resolved_max_queue()),
            running: HashMap::new(),
            metrics: PoolMetrics::default(),
            next_task: 1,
            destroyed: false,
        }
    }

    pub fn next_task_id(&mut self) -> TaskId {
        let id = TaskId(self.next_task);
        self.next_task += 1;
        id
    }

    pub fn is_drained(&self) -> bool {
        self.queue.is_empty() && self.running.is_empty()
    }
}

/// Shared core of a [`Pool`]; completion tasks hold their own `Arc` to it.
pub(super) struct Inner<B: ExecutionBackend> {
    pub backend: B,
    pub config: PoolConfig,
    pub runtime: Handle,
    pub state: Mutex<PoolState<B>>,
    pub drained: Notify,
}

impl<B: ExecutionBackend> Inner<B> {
    /// Lock pool state. A panic while holding the lock cannot leave the
    /// counters half-updated in a way later operations can't tolerate, so a
    /// poisoned lock is recovered rather than propagated.
    pub fn lock(&self) -> MutexGuard<'_, PoolState<B>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn worker_name(&self, id: WorkerId) -> String {
        format!("{}-{}", self.config.thread_name_prefix, id.0)
    }

    /// Settle every outstanding task with the termination error and stop all
    /// workers. Returns `false` if the pool was already destroyed.
    pub fn destroy_now(&self) -> bool {
        let (abandoned, workers) = {
            let mut state = self.lock();
            if state.destroyed {
                return false;
            }
            state.destroyed = true;

            let mut abandoned: Vec<_> = state.running.drain().map(|(_, r)| r.result_tx).collect();
            abandoned.extend(state.queue.drain().map(|t| t.result_tx));
            state.metrics.tasks_aborted += abandoned.len() as u64;
            (abandoned, state.workers.terminate_all())
        };

        let aborted = abandoned.len();
        for tx in abandoned {
            let _ = tx.send(Err(PoolError::terminating()));
        }

        let worker_count = workers.len();
        for mut worker in workers {
            worker.handle.terminate();
            worker.state = WorkerState::Terminated;
        }

        self.drained.notify_waiters();
        info!(workers = worker_count, aborted, "pool destroyed");
        true
    }
}

// ── Pool ────────────────────────────────────────────────────────────

/// A bounded, dynamically sized pool of workers with a FIFO backlog.
///
/// Every submission goes through a single admission decision: run on a worker
/// with a free slot, spawn a new worker, queue, or reject. Completions free a
/// slot and pull the oldest queued task.
///
/// # Example
/// ```ignore
/// let backend = ThreadBackend::blocking(|n: u64| Ok(fib(n)));
/// let pool = Pool::new(PoolConfig::new().with_max_threads(4), backend)?;
/// let value = pool.submit(30).await?;
/// pool.destroy().await;
/// ```
pub struct Pool<B: ExecutionBackend> {
    pub(super) inner: Arc<Inner<B>>,
}

impl<B: ExecutionBackend> Pool<B> {
    /// Create a pool on the current tokio runtime and spawn `min_threads`
    /// workers eagerly.
    pub fn new(config: PoolConfig, backend: B) -> Result<Self, PoolError> {
        let runtime = Handle::try_current().map_err(|_| PoolError::NoRuntime)?;
        Self::with_runtime(config, backend, runtime)
    }

    /// Create a pool whose completion tracking runs on `runtime`.
    pub fn with_runtime(config: PoolConfig, backend: B, runtime: Handle) -> Result<Self, PoolError> {
        config.validate()?;
        let inner = Arc::new(Inner {
            state: Mutex::new(PoolState::new(&config)),
            backend,
            config,
            runtime,
            drained: Notify::new(),
        });

        let spawned = {
            let mut state = inner.lock();
            let result = state
                .workers
                .ensure_minimum(|id| inner.backend.spawn(id, &inner.worker_name(id)));
            if let Ok(ids) = &result {
                state.metrics.workers_spawned += ids.len() as u64;
            }
            result
        };

        match spawned {
            Ok(ids) => {
                info!(
                    workers = ids.len(),
                    min_threads = inner.config.min_threads,
                    max_threads = inner.config.max_threads,
                    max_queue = %inner.config.max_queue,
                    concurrency = inner.config.concurrent_tasks_per_worker,
                    "pool started"
                );
                Ok(Self { inner })
            }
            Err(e) => {
                warn!(error = %e, "failed to start minimum workers");
                inner.destroy_now();
                Err(e)
            }
        }
    }

    /// Submit a payload. Rejections are reported through the returned handle,
    /// which is already resolved in that case.
    pub fn submit(&self, payload: B::Payload) -> TaskHandle<B::Output> {
        match self.inner.admit(payload) {
            Ok(handle) => handle,
            Err(rejected) => TaskHandle::rejected(rejected.id, rejected.error),
        }
    }

    /// Submit a payload, surfacing admission rejections synchronously.
    pub fn try_submit(&self, payload: B::Payload) -> Result<TaskHandle<B::Output>, PoolError> {
        self.inner.admit(payload).map_err(|rejected| rejected.error)
    }

    /// Tasks admitted but not yet handed to a worker.
    pub fn queue_size(&self) -> usize {
        self.inner.lock().queue.len()
    }

    /// Live workers.
    pub fn thread_count(&self) -> usize {
        self.inner.lock().workers.len()
    }

    /// Snapshot of every live worker.
    pub fn threads(&self) -> Vec<WorkerInfo> {
        self.inner.lock().workers.infos()
    }

    /// Where a live task currently is: `Queued` or `Running`.
    ///
    /// Settled tasks are not tracked, so this returns `None` once a task has
    /// completed, been aborted, or was never admitted. The terminal outcome is
    /// what its [`TaskHandle`] resolves to.
    pub fn task_state(&self, id: TaskId) -> Option<TaskState> {
        let state = self.inner.lock();
        if state.running.contains_key(&id) {
            return Some(TaskState::Running);
        }
        let queued = state.queue.iter().find(|t| t.id == id).map(|t| t.state);
        queued
    }

    /// Snapshot of pool metrics, including current load.
    pub fn metrics(&self) -> PoolMetrics {
        let state = self.inner.lock();
        let mut metrics = state.metrics.clone();
        let (active, slots) = state.workers.load();
        metrics.utilization = if slots == 0 { 0.0 } else { active as f64 / slots as f64 };
        metrics.queue_size = state.queue.len();
        metrics.thread_count = state.workers.len();
        metrics.running_tasks = state.running.len();
        metrics
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.lock().destroyed
    }

    /// Wait until no task is queued or running.
    pub async fn drain(&self) {
        loop {
            let notified = self.inner.drained.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.inner.lock().is_drained() {
                return;
            }
            notified.await;
        }
    }

    /// Shut the pool down. Every running or queued task resolves with
    /// [`PoolError::Aborted`], all workers are terminated, and later
    /// submissions fail with [`PoolError::Destroyed`]. Idempotent.
    pub async fn destroy(&self) {
        self.inner.destroy_now();
        // Let completion tasks observe their workers going away.
        tokio::task::yield_now().await;
    }
}

impl<B: ExecutionBackend> Drop for Pool<B> {
    fn drop(&mut self) {
        self.inner.destroy_now();
    }
}
