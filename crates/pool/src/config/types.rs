use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::PoolError;

// ── Queue limit ─────────────────────────────────────────────────────

/// Upper bound on the number of admitted-but-not-dispatched tasks.
///
/// In TOML this is either an integer or one of the keywords `"unbounded"`
/// and `"auto"`. `auto` resolves to `max_threads²`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawQueueLimit", into = "RawQueueLimit")]
pub enum QueueLimit {
    /// At most `n` queued tasks. `0` disables queuing entirely.
    Bounded(usize),
    /// No limit.
    Unbounded,
    /// `max_threads * max_threads`.
    Auto,
}

impl QueueLimit {
    /// Concrete capacity for a pool with the given thread ceiling.
    /// Unbounded maps to `usize::MAX`.
    pub fn resolve(self, max_threads: usize) -> usize {
        match self {
            QueueLimit::Bounded(n) => n,
            QueueLimit::Unbounded => usize::MAX,
            QueueLimit::Auto => max_threads.saturating_mul(max_threads),
        }
    }
}

impl fmt::Display for QueueLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueLimit::Bounded(n) => write!(f, "{n}"),
            QueueLimit::Unbounded => f.write_str("unbounded"),
            QueueLimit::Auto => f.write_str("auto"),
        }
    }
}

impl FromStr for QueueLimit {
    type Err = PoolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "unbounded" | "infinity" => Ok(QueueLimit::Unbounded),
            "auto" => Ok(QueueLimit::Auto),
            other => other.parse::<usize>().map(QueueLimit::Bounded).map_err(|_| {
                PoolError::Config(format!(
                    "invalid max_queue '{other}', expected a number, 'auto' or 'unbounded'"
                ))
            }),
        }
    }
}

/// Wire form of [`QueueLimit`]: a bare integer or a keyword string.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawQueueLimit {
    Count(usize),
    Keyword(String),
}

impl TryFrom<RawQueueLimit> for QueueLimit {
    type Error = PoolError;

    fn try_from(raw: RawQueueLimit) -> Result<Self, Self::Error> {
        match raw {
            RawQueueLimit::Count(n) => Ok(QueueLimit::Bounded(n)),
            RawQueueLimit::Keyword(s) => s.parse(),
        }
    }
}

impl From<QueueLimit> for RawQueueLimit {
    fn from(limit: QueueLimit) -> Self {
        match limit {
            QueueLimit::Bounded(n) => RawQueueLimit::Count(n),
            other => RawQueueLimit::Keyword(other.to_string()),
        }
    }
}

// ── Pool config ─────────────────────────────────────────────────────

/// Worker pool configuration, fixed once the pool is constructed.
///
/// Parsed from TOML with `POOLSIDE_*` environment overrides, or built in code
/// via the `with_*` setters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Workers spawned eagerly at construction and kept through scale-down.
    #[serde(default = "default_min_threads")]
    pub min_threads: usize,

    /// Hard ceiling on live workers.
    #[serde(default = "default_max_threads")]
    pub max_threads: usize,

    /// Backlog allowed once every worker is saturated.
    #[serde(default = "default_max_queue")]
    pub max_queue: QueueLimit,

    /// Tasks a single worker may run at once.
    #[serde(default = "default_concurrency")]
    pub concurrent_tasks_per_worker: usize,

    /// How long a worker above `min_threads` may sit idle before it is retired.
    #[serde(default)]
    pub idle_timeout_ms: u64,

    /// Prefix for worker thread names (`{prefix}-{id}`).
    #[serde(default = "default_thread_name_prefix")]
    pub thread_name_prefix: String,
}

fn available_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn default_min_threads() -> usize {
    (available_cpus() / 2).max(1)
}

fn default_max_threads() -> usize {
    (available_cpus() * 3 / 2).max(1)
}

fn default_max_queue() -> QueueLimit {
    QueueLimit::Unbounded
}

fn default_concurrency() -> usize {
    1
}

fn default_thread_name_prefix() -> String {
    "poolside-worker".into()
}

impl PoolConfig {
    /// Defaults derived from the host's available parallelism.
    pub fn new() -> Self {
        Self {
            min_threads: default_min_threads(),
            max_threads: default_max_threads(),
            max_queue: default_max_queue(),
            concurrent_tasks_per_worker: default_concurrency(),
            idle_timeout_ms: 0,
            thread_name_prefix: default_thread_name_prefix(),
        }
    }

    pub fn with_min_threads(mut self, n: usize) -> Self {
        self.min_threads = n;
        self
    }

    pub fn with_max_threads(mut self, n: usize) -> Self {
        self.max_threads = n;
        self
    }

    pub fn with_max_queue(mut self, limit: QueueLimit) -> Self {
        self.max_queue = limit;
        self
    }

    pub fn with_concurrent_tasks_per_worker(mut self, n: usize) -> Self {
        self.concurrent_tasks_per_worker = n;
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Queue capacity with `auto`/`unbounded` resolved against `max_threads`.
    pub fn resolved_max_queue(&self) -> usize {
        self.max_queue.resolve(self.max_threads)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }
}
