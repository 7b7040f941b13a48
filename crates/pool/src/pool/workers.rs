use std::cmp::Reverse;
use std::collections::BTreeMap;

use crate::error::PoolError;
use crate::worker::{Worker, WorkerId, WorkerInfo, WorkerState};

/// The pool's set of workers, keyed by stable id.
///
/// Enforces `|workers| <= max_threads` on every spawn. All methods run under
/// the pool state lock; none of them talk to the backend except through the
/// spawn closure, and removed workers are handed back so the caller can
/// terminate them after releasing the lock.
pub(crate) struct WorkerSet<H> {
    workers: BTreeMap<WorkerId, Worker<H>>,
    next_id: u64,
    assign_seq: u64,
    min_threads: usize,
    max_threads: usize,
    capacity: usize,
}

impl<H> WorkerSet<H> {
    pub fn new(min_threads: usize, max_threads: usize, capacity: usize) -> Self {
        Self {
            workers: BTreeMap::new(),
            next_id: 1,
            assign_seq: 0,
            min_threads,
            max_threads,
            capacity,
        }
    }

    /// Spawn workers until `min_threads` exist. Returns the new ids.
    pub fn ensure_minimum(
        &mut self,
        mut spawn: impl FnMut(WorkerId) -> Result<H, PoolError>,
    ) -> Result<Vec<WorkerId>, PoolError> {
        let mut spawned = Vec::new();
        while self.workers.len() < self.min_threads {
            spawned.push(self.spawn_worker(&mut spawn)?);
        }
        Ok(spawned)
    }

    /// Create one worker, or fail with `ResourceExhausted` at `max_threads`.
    pub fn spawn_worker(
        &mut self,
        spawn: impl FnOnce(WorkerId) -> Result<H, PoolError>,
    ) -> Result<WorkerId, PoolError> {
        if self.workers.len() >= self.max_threads {
            return Err(PoolError::ResourceExhausted {
                max_threads: self.max_threads,
            });
        }
        let id = WorkerId(self.next_id);
        self.next_id += 1;

        let handle = spawn(id)?;
        let mut worker = Worker::new(id, handle, self.capacity);
        worker.mark_started();
        self.workers.insert(id, worker);
        Ok(id)
    }

    /// Pick the worker with the most free slots; ties go to the one assigned
    /// least recently, then to the oldest.
    pub fn find_worker_with_capacity(&self) -> Option<WorkerId> {
        self.workers
            .values()
            .filter(|w| w.free_slots() > 0)
            .min_by_key(|w| (Reverse(w.free_slots()), w.last_assigned))
            .map(|w| w.id)
    }

    /// Count one more active task on `id`.
    pub fn assign(&mut self, id: WorkerId) -> Option<&mut Worker<H>> {
        self.assign_seq += 1;
        let seq = self.assign_seq;
        let worker = self.workers.get_mut(&id)?;
        worker.assign(seq);
        Some(worker)
    }

    /// Count one task finished on `id`. When the worker becomes idle and the
    /// pool is above `min_threads`, returns the idle epoch to check against
    /// at scale-down time.
    pub fn release(&mut self, id: WorkerId) -> Option<u64> {
        let above_minimum = self.workers.len() > self.min_threads;
        let worker = self.workers.get_mut(&id)?;
        if worker.release() && above_minimum {
            Some(worker.idle_epoch)
        } else {
            None
        }
    }

    /// Scale-down: remove `id` if it is still idle at `epoch` and the pool is
    /// above `min_threads`.
    pub fn retire_if_idle(&mut self, id: WorkerId, epoch: u64) -> Option<Worker<H>> {
        if self.workers.len() <= self.min_threads {
            return None;
        }
        let worker = self.workers.get(&id)?;
        if worker.state != WorkerState::Idle || worker.idle_epoch != epoch {
            return None;
        }
        let mut worker = self.workers.remove(&id)?;
        worker.state = WorkerState::Draining;
        Some(worker)
    }

    /// Remove every worker, marked `Draining`, oldest first.
    pub fn terminate_all(&mut self) -> Vec<Worker<H>> {
        std::mem::take(&mut self.workers)
            .into_values()
            .map(|mut w| {
                w.state = WorkerState::Draining;
                w
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn can_spawn(&self) -> bool {
        self.workers.len() < self.max_threads
    }

    pub fn infos(&self) -> Vec<WorkerInfo> {
        self.workers.values().map(Worker::info).collect()
    }

    /// (active tasks, total slots) across live workers.
    pub fn load(&self) -> (usize, usize) {
        self.workers
            .values()
            .fold((0, 0), |(active, slots), w| (active + w.active, slots + w.capacity))
    }
}
