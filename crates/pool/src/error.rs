use thiserror::Error;

/// Message attached to tasks abandoned by [`crate::Pool::destroy`].
pub const TERMINATING_MESSAGE: &str = "terminating worker thread";

/// Errors surfaced by the pool to callers and to the configuration layer.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("task queue is at limit")]
    QueueAtLimit,

    #[error("no task queue available and all workers are busy")]
    NoQueueAvailable,

    /// Internal: a spawn was attempted past `max_threads`. Admission checks the
    /// worker count first, so callers never observe this.
    #[error("worker limit reached ({max_threads} threads)")]
    ResourceExhausted { max_threads: usize },

    #[error("task aborted: {0}")]
    Aborted(String),

    #[error("pool destroyed")]
    Destroyed,

    #[error("failed to spawn worker: {0}")]
    Spawn(String),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error("pool must be created inside a tokio runtime")]
    NoRuntime,

    #[error("config error: {0}")]
    Config(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("config I/O error: {0}")]
    ConfigIo(#[from] std::io::Error),
}

impl PoolError {
    /// Shutdown error handed to every task outstanding at destroy time.
    pub fn terminating() -> Self {
        PoolError::Aborted(TERMINATING_MESSAGE.to_string())
    }

    /// Whether the caller may retry the same payload later (backpressure).
    pub fn is_backpressure(&self) -> bool {
        matches!(self, PoolError::QueueAtLimit | PoolError::NoQueueAvailable)
    }
}

/// Failure reported by the execution backend for a single payload.
///
/// The pool does not interpret these; they reach the caller wrapped in
/// [`PoolError::Task`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("task failed: {0}")]
    Failed(String),

    #[error("task panicked: {0}")]
    Panicked(String),

    #[error("worker exited before the task finished")]
    WorkerExited,
}
