use super::types::PoolConfig;
use crate::error::PoolError;

impl PoolConfig {
    /// Validate thread bounds, per-worker concurrency, and naming.
    pub fn validate(&self) -> Result<(), PoolError> {
        self.validate_thread_bounds()?;
        self.validate_concurrency()?;
        self.validate_thread_name_prefix()?;
        Ok(())
    }

    /// `max_threads` must allow at least one worker and cover `min_threads`.
    fn validate_thread_bounds(&self) -> Result<(), PoolError> {
        if self.max_threads == 0 {
            return Err(PoolError::Config("max_threads must be at least 1".into()));
        }
        if self.min_threads > self.max_threads {
            return Err(PoolError::Config(format!(
                "min_threads ({}) exceeds max_threads ({})",
                self.min_threads, self.max_threads
            )));
        }
        Ok(())
    }

    fn validate_concurrency(&self) -> Result<(), PoolError> {
        if self.concurrent_tasks_per_worker == 0 {
            return Err(PoolError::Config(
                "concurrent_tasks_per_worker must be at least 1".into(),
            ));
        }
        Ok(())
    }

    fn validate_thread_name_prefix(&self) -> Result<(), PoolError> {
        if self.thread_name_prefix.trim().is_empty() {
            return Err(PoolError::Config("thread_name_prefix must not be empty".into()));
        }
        Ok(())
    }
}
