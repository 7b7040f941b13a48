//! Pool-side record of one execution context.
//!
//! The backend owns the thread; this record tracks how much of its capacity
//! the dispatcher has handed out and where it is in its lifecycle:
//!
//! ```text
//! Starting -> Idle <-> Busy
//!               |       |
//!               +-> Draining -> Terminated
//! ```

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Stable worker identifier. Never reused within a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkerId(pub u64);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerState {
    /// Backend context created, not yet accepting work.
    Starting,
    /// No active tasks.
    Idle,
    /// At least one active task.
    Busy,
    /// Being retired; accepts no new work.
    Draining,
    /// Backend asked to stop. Terminal.
    Terminated,
}

/// Serializable snapshot of a worker, as exposed by [`crate::Pool::threads`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerInfo {
    pub id: WorkerId,
    pub state: WorkerState,
    pub active_tasks: usize,
    pub capacity: usize,
    /// How long the worker has had no active tasks.
    pub idle_for: Option<Duration>,
}

pub(crate) struct Worker<H> {
    pub id: WorkerId,
    pub handle: H,
    pub capacity: usize,
    pub active: usize,
    pub state: WorkerState,
    /// Bumped every time the worker takes a task; a scale-down check scheduled
    /// for an older epoch is stale.
    pub idle_epoch: u64,
    /// Dispatcher-wide sequence number of the last assignment, for tie-breaks.
    pub last_assigned: u64,
    pub idle_since: Option<Instant>,
}

impl<H> Worker<H> {
    pub fn new(id: WorkerId, handle: H, capacity: usize) -> Self {
        Self {
            id,
            handle,
            capacity,
            active: 0,
            state: WorkerState::Starting,
            idle_epoch: 0,
            last_assigned: 0,
            idle_since: None,
        }
    }

    /// Backend reported the context is up.
    pub fn mark_started(&mut self) {
        debug_assert_eq!(self.state, WorkerState::Starting);
        self.state = WorkerState::Idle;
        self.idle_since = Some(Instant::now());
    }

    pub fn accepts_work(&self) -> bool {
        matches!(self.state, WorkerState::Idle | WorkerState::Busy)
    }

    pub fn free_slots(&self) -> usize {
        if self.accepts_work() {
            self.capacity - self.active
        } else {
            0
        }
    }

    /// Take one task. Caller must have checked `free_slots() > 0`.
    pub fn assign(&mut self, sequence: u64) {
        debug_assert!(self.active < self.capacity);
        self.active += 1;
        self.state = WorkerState::Busy;
        self.idle_epoch += 1;
        self.last_assigned = sequence;
        self.idle_since = None;
    }

    /// Release one task slot. Returns `true` if the worker became idle.
    pub fn release(&mut self) -> bool {
        self.active = self.active.saturating_sub(1);
        if self.active == 0 && self.state == WorkerState::Busy {
            self.state = WorkerState::Idle;
            self.idle_since = Some(Instant::now());
            return true;
        }
        false
    }

    pub fn info(&self) -> WorkerInfo {
        WorkerInfo {
            id: self.id,
            state: self.state,
            active_tasks: self.active,
            capacity: self.capacity,
            idle_for: self.idle_since.map(|t| t.elapsed()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_transitions() {
        let mut w = Worker::new(WorkerId(1), (), 2);
        assert_eq!(w.state, WorkerState::Starting);
        assert_eq!(w.free_slots(), 0);

        w.mark_started();
        assert_eq!(w.state, WorkerState::Idle);
        assert_eq!(w.free_slots(), 2);

        w.assign(1);
        w.assign(2);
        assert_eq!(w.state, WorkerState::Busy);
        assert_eq!(w.free_slots(), 0);
        assert_eq!(w.idle_epoch, 2);

        assert!(!w.release());
        assert!(w.release());
        assert_eq!(w.state, WorkerState::Idle);
        assert!(w.info().idle_for.is_some());
    }

    #[test]
    fn draining_worker_has_no_free_slots() {
        let mut w = Worker::new(WorkerId(2), (), 4);
        w.mark_started();
        w.state = WorkerState::Draining;
        assert_eq!(w.free_slots(), 0);
        assert!(!w.accepts_work());
    }

    #[test]
    fn worker_id_display() {
        assert_eq!(WorkerId(12).to_string(), "worker-12");
    }
}
