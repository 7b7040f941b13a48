//! A bounded worker-pool task scheduler.
//!
//! Callers submit payloads to a [`Pool`]; the pool runs them on a set of
//! workers that grows on demand between `min_threads` and `max_threads`,
//! queues overflow up to `max_queue`, and rejects beyond that. Results come
//! back through a [`TaskHandle`] future.

pub mod backend;
pub mod config;
pub mod error;
pub mod metrics;
pub mod pool;
pub mod queue;
pub mod task;
pub mod worker;

pub use backend::{ExecutionBackend, TaskFuture, ThreadBackend, WorkerHandle};
pub use config::{PoolConfig, QueueLimit};
pub use error::{PoolError, TaskError, TERMINATING_MESSAGE};
pub use metrics::PoolMetrics;
pub use pool::Pool;
pub use queue::{QueueFull, TaskQueue};
pub use task::{TaskHandle, TaskId, TaskState};
pub use worker::{WorkerId, WorkerInfo, WorkerState};
