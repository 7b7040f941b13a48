use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Pool operational metrics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PoolMetrics {
    /// Tasks whose payload returned successfully.
    pub tasks_completed: u64,
    /// Tasks whose payload failed, panicked, or lost its worker.
    pub tasks_failed: u64,
    /// Tasks settled by pool shutdown.
    pub tasks_aborted: u64,
    /// Submissions refused by backpressure (queue full or disabled).
    pub tasks_rejected: u64,
    /// Workers created over the pool's lifetime.
    pub workers_spawned: u64,
    /// Workers retired by idle scale-down.
    pub workers_retired: u64,
    /// Mean time from dispatch to completion.
    pub avg_run_time: Duration,
    /// Mean time from submission to dispatch.
    pub avg_wait_time: Duration,
    /// Last time any task finished.
    pub last_completed_at: Option<DateTime<Utc>>,
    /// Fraction of total worker slots in use (0.0 - 1.0), at snapshot time.
    pub utilization: f64,
    /// Queued tasks at snapshot time.
    pub queue_size: usize,
    /// Live workers at snapshot time.
    pub thread_count: usize,
    /// Running tasks at snapshot time.
    pub running_tasks: usize,

    #[serde(skip)]
    settled: u64,
    #[serde(skip)]
    dispatched: u64,
}

impl PoolMetrics {
    /// Record a task leaving the queue (or skipping it) for a worker.
    pub fn record_dispatch(&mut self, waited: Duration) {
        self.dispatched += 1;
        self.avg_wait_time = incremental_mean(self.avg_wait_time, waited, self.dispatched);
    }

    /// Record a task the backend finished, successfully or not.
    pub fn record_completion(&mut self, run_time: Duration, success: bool) {
        if success {
            self.tasks_completed += 1;
        } else {
            self.tasks_failed += 1;
        }
        self.settled += 1;
        self.avg_run_time = incremental_mean(self.avg_run_time, run_time, self.settled);
        self.last_completed_at = Some(Utc::now());
    }
}

// Incremental mean: new_avg = prev_avg + (sample - prev_avg) / count
fn incremental_mean(prev: Duration, sample: Duration, count: u64) -> Duration {
    if count <= 1 {
        return sample;
    }
    let prev_nanos = prev.as_nanos() as f64;
    let cur_nanos = sample.as_nanos() as f64;
    let avg_nanos = prev_nanos + (cur_nanos - prev_nanos) / count as f64;
    Duration::from_nanos(avg_nanos as u64)
}
