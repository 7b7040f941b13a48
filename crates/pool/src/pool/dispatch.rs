//! The admission algorithm and the completion path.
//!
//! Both run as one critical section on the pool state lock: the four-way
//! admission decision (free slot, spawn, queue, reject) and the
//! release-then-refill sequence after a completion. `execute` and
//! `terminate` never block under the lock; `spawn` waits only for the new
//! worker to report startup.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::backend::{ExecutionBackend, WorkerHandle};
use crate::error::{PoolError, TaskError};
use crate::queue::QueueFull;
use crate::task::{PendingTask, RunningTask, TaskHandle, TaskId, TaskState};
use crate::worker::{WorkerId, WorkerState};

use super::core::{Inner, PoolState};

/// A submission refused at admission time.
pub(super) struct Rejected {
    pub id: TaskId,
    pub error: PoolError,
}

/// Outcome of trying to put a task on a worker without touching the queue.
enum Placement<T> {
    Dispatched,
    /// Every worker is saturated and the pool is at `max_threads`.
    NoCapacity(T),
    SpawnFailed(T, PoolError),
}

type Pending<B> = PendingTask<<B as ExecutionBackend>::Payload, <B as ExecutionBackend>::Output>;

impl<B: ExecutionBackend> Inner<B> {
    // ── Admission ───────────────────────────────────────────────────

    /// Decide the fate of a new submission.
    pub(super) fn admit(
        self: &Arc<Self>,
        payload: B::Payload,
    ) -> Result<TaskHandle<B::Output>, Rejected> {
        let mut state = self.lock();
        let id = state.next_task_id();
        if state.destroyed {
            return Err(Rejected { id, error: PoolError::Destroyed });
        }

        let (task, handle) = PendingTask::new(id, payload);
        let task = match self.place(&mut state, task) {
            Placement::Dispatched => return Ok(handle),
            Placement::NoCapacity(task) => task,
            Placement::SpawnFailed(_, error) => {
                state.metrics.tasks_rejected += 1;
                warn!(task = %id, error = %error, "rejecting task, worker spawn failed");
                return Err(Rejected { id, error });
            }
        };

        if state.queue.capacity() == 0 {
            state.metrics.tasks_rejected += 1;
            warn!(task = %id, "rejecting task, queuing disabled and all workers busy");
            return Err(Rejected { id, error: PoolError::NoQueueAvailable });
        }

        let mut task = task;
        task.state = TaskState::Queued;
        match state.queue.enqueue(task) {
            Ok(()) => {
                debug!(task = %id, queue_size = state.queue.len(), "task queued");
                Ok(handle)
            }
            Err(QueueFull(_)) => {
                state.metrics.tasks_rejected += 1;
                warn!(task = %id, limit = state.queue.capacity(), "rejecting task, queue at limit");
                Err(Rejected { id, error: PoolError::QueueAtLimit })
            }
        }
    }

    /// Steps 1 and 2 of admission: a worker with a free slot, else a fresh
    /// worker if the pool is below `max_threads`.
    fn place(self: &Arc<Self>, state: &mut PoolState<B>, task: Pending<B>) -> Placement<Pending<B>> {
        let worker = match state.workers.find_worker_with_capacity() {
            Some(id) => id,
            None if state.workers.can_spawn() => {
                match state
                    .workers
                    .spawn_worker(|id| self.backend.spawn(id, &self.worker_name(id)))
                {
                    Ok(id) => {
                        state.metrics.workers_spawned += 1;
                        info!(worker = %id, threads = state.workers.len(), "spawned worker");
                        id
                    }
                    Err(e) => return Placement::SpawnFailed(task, e),
                }
            }
            None => return Placement::NoCapacity(task),
        };

        match self.dispatch(state, worker, task) {
            Ok(()) => Placement::Dispatched,
            Err(task) => Placement::NoCapacity(task),
        }
    }

    /// Hand `task` to `worker` and track its completion. Gives the task back
    /// if `worker` is no longer in the set.
    fn dispatch(
        self: &Arc<Self>,
        state: &mut PoolState<B>,
        worker: WorkerId,
        task: Pending<B>,
    ) -> Result<(), Pending<B>> {
        let Some(w) = state.workers.assign(worker) else {
            return Err(task);
        };
        let PendingTask {
            id,
            payload,
            result_tx,
            submitted,
            ..
        } = task;
        let execution = w.handle.execute(id, payload);

        state.metrics.record_dispatch(submitted.elapsed());
        state.running.insert(
            id,
            RunningTask {
                worker,
                result_tx,
                submitted,
                started: Instant::now(),
            },
        );
        debug!(task = %id, worker = %worker, "task dispatched");

        let inner = Arc::clone(self);
        self.runtime.spawn(async move {
            let outcome = execution.await;
            inner.complete(id, outcome);
        });
        Ok(())
    }

    // ── Completion ──────────────────────────────────────────────────

    /// A worker finished `id`: free its slot, refill from the queue, then
    /// settle the caller's handle.
    pub(super) fn complete(self: &Arc<Self>, id: TaskId, outcome: Result<B::Output, TaskError>) {
        let (running, retire, drained) = {
            let mut state = self.lock();
            let Some(running) = state.running.remove(&id) else {
                // Already settled by destroy.
                debug!(task = %id, "discarding outcome for settled task");
                return;
            };

            state
                .metrics
                .record_completion(running.started.elapsed(), outcome.is_ok());
            let retire = state
                .workers
                .release(running.worker)
                .map(|epoch| (running.worker, epoch));

            self.pump_queue(&mut state);
            (running, retire, state.is_drained())
        };

        match &outcome {
            Ok(_) => debug!(
                task = %id,
                worker = %running.worker,
                latency = ?running.submitted.elapsed(),
                "task completed"
            ),
            Err(e) => warn!(task = %id, worker = %running.worker, error = %e, "task failed"),
        }
        let _ = running.result_tx.send(outcome.map_err(PoolError::from));

        if let Some((worker, epoch)) = retire {
            self.schedule_retire(worker, epoch);
        }
        if drained {
            self.drained.notify_waiters();
        }
    }

    /// Move queued tasks onto free capacity, oldest first. A task leaving the
    /// queue is never rejected; if it cannot be placed it goes back to the head.
    fn pump_queue(self: &Arc<Self>, state: &mut PoolState<B>) {
        while let Some(task) = state.queue.dequeue() {
            match self.place(state, task) {
                Placement::Dispatched => {}
                Placement::NoCapacity(task) => {
                    state.queue.requeue_front(task);
                    break;
                }
                Placement::SpawnFailed(task, e) => {
                    warn!(task = %task.id, error = %e, "worker spawn failed, task stays queued");
                    state.queue.requeue_front(task);
                    break;
                }
            }
        }
    }

    // ── Scale-down ──────────────────────────────────────────────────

    fn schedule_retire(self: &Arc<Self>, worker: WorkerId, epoch: u64) {
        let timeout = self.config.idle_timeout();
        let inner = Arc::clone(self);
        self.runtime.spawn(async move {
            if !timeout.is_zero() {
                tokio::time::sleep(timeout).await;
            }
            inner.retire_if_idle(worker, epoch);
        });
    }

    fn retire_if_idle(&self, worker: WorkerId, epoch: u64) {
        let retired = {
            let mut state = self.lock();
            if state.destroyed {
                return;
            }
            let retired = state.workers.retire_if_idle(worker, epoch);
            if retired.is_some() {
                state.metrics.workers_retired += 1;
            }
            retired.map(|w| (w, state.workers.len()))
        };

        if let Some((mut w, threads)) = retired {
            w.handle.terminate();
            w.state = WorkerState::Terminated;
            info!(worker = %worker, threads, "retired idle worker");
        }
    }
}
