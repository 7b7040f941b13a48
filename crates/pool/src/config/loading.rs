use std::path::Path;

use tracing::warn;

use crate::error::PoolError;

use super::types::PoolConfig;

impl PoolConfig {
    /// Parse config from a TOML string, apply env overrides, and validate.
    pub fn from_toml(toml_str: &str) -> Result<Self, PoolError> {
        let mut config: Self = toml::from_str(toml_str)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load config from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PoolError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    // ── Environment variable overrides ──────────────────────────────

    /// Apply environment variable overrides.
    ///
    /// Convention: `POOLSIDE_KEY` overrides `key`.
    /// - `POOLSIDE_MIN_THREADS` -> `min_threads`
    /// - `POOLSIDE_MAX_THREADS` -> `max_threads`
    /// - `POOLSIDE_MAX_QUEUE` -> `max_queue` (number, `auto` or `unbounded`)
    /// - `POOLSIDE_CONCURRENT_TASKS_PER_WORKER` -> `concurrent_tasks_per_worker`
    /// - `POOLSIDE_IDLE_TIMEOUT_MS` -> `idle_timeout_ms`
    pub(crate) fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup. Unparseable values are logged
    /// and ignored.
    pub(crate) fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(n) = parse_usize(&lookup, "POOLSIDE_MIN_THREADS") {
            self.min_threads = n;
        }
        if let Some(n) = parse_usize(&lookup, "POOLSIDE_MAX_THREADS") {
            self.max_threads = n;
        }
        if let Some(v) = lookup("POOLSIDE_MAX_QUEUE") {
            match v.parse() {
                Ok(limit) => self.max_queue = limit,
                Err(e) => warn!(error = %e, "ignoring POOLSIDE_MAX_QUEUE"),
            }
        }
        if let Some(n) = parse_usize(&lookup, "POOLSIDE_CONCURRENT_TASKS_PER_WORKER") {
            self.concurrent_tasks_per_worker = n;
        }
        if let Some(v) = lookup("POOLSIDE_IDLE_TIMEOUT_MS") {
            match v.parse::<u64>() {
                Ok(ms) => self.idle_timeout_ms = ms,
                Err(_) => warn!(value = %v, "ignoring POOLSIDE_IDLE_TIMEOUT_MS"),
            }
        }
    }
}

fn parse_usize(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<usize> {
    let value = lookup(key)?;
    match value.parse::<usize>() {
        Ok(n) => Some(n),
        Err(_) => {
            warn!(key, value = %value, "ignoring non-numeric override");
            None
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new()
    }
}
