//! pool-bench: push synthetic blocking work through a poolside pool.
//!
//! Loads a pool config (TOML + `POOLSIDE_*` overrides), submits `--tasks`
//! payloads that each hold a worker thread for `--work-ms`, backs off and
//! retries on queue rejections, then prints the pool metrics as JSON.

use std::time::{Duration, Instant};

use clap::Parser;
use tracing::{info, warn};

use poolside::{Pool, PoolConfig, PoolError, TaskError, ThreadBackend};

// ── CLI ─────────────────────────────────────────────────────────────

/// Load generator for the poolside worker pool.
#[derive(Parser, Debug)]
#[command(name = "pool-bench", version, about)]
struct Cli {
    /// Path to the pool TOML config.
    #[arg(long, env = "POOLSIDE_CONFIG", default_value = "config/poolside.toml")]
    config: String,

    /// Number of tasks to submit.
    #[arg(long, default_value_t = 100)]
    tasks: u64,

    /// Milliseconds each task occupies its worker thread.
    #[arg(long, default_value_t = 5)]
    work_ms: u64,

    /// Milliseconds to back off after a queue rejection.
    #[arg(long, default_value_t = 10)]
    backoff_ms: u64,

    /// Fail one in every N tasks (0 = never).
    #[arg(long, default_value_t = 0)]
    fail_every: u64,
}

/// Simulated CPU-bound payload.
fn busy_work(n: u64, work: Duration, fail_every: u64) -> Result<u64, TaskError> {
    if fail_every > 0 && n % fail_every == 0 {
        return Err(TaskError::Failed(format!("task {n} failed by request")));
    }
    std::thread::sleep(work);
    Ok(n)
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    // Fall back to defaults (plus env overrides) if the file is missing.
    let config = match PoolConfig::from_file(&cli.config) {
        Ok(cfg) => {
            info!(path = %cli.config, "loaded pool config");
            cfg
        }
        Err(e) => {
            warn!(error = %e, path = %cli.config, "failed to load config, using defaults");
            PoolConfig::from_toml("")?
        }
    };

    let work = Duration::from_millis(cli.work_ms);
    let fail_every = cli.fail_every;
    let backend = ThreadBackend::blocking(move |n: u64| busy_work(n, work, fail_every));
    let pool = Pool::new(config, backend)?;

    let started = Instant::now();
    let mut handles = Vec::with_capacity(cli.tasks as usize);
    let mut retries = 0u64;
    for n in 1..=cli.tasks {
        loop {
            match pool.try_submit(n) {
                Ok(handle) => {
                    handles.push(handle);
                    break;
                }
                Err(e) if e.is_backpressure() => {
                    retries += 1;
                    tokio::time::sleep(Duration::from_millis(cli.backoff_ms)).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
    info!(submitted = cli.tasks, retries, "all tasks admitted");

    let mut failed = 0u64;
    for handle in handles {
        match handle.await {
            Ok(_) => {}
            Err(PoolError::Task(e)) => {
                failed += 1;
                warn!(error = %e, "task failed");
            }
            Err(e) => return Err(e.into()),
        }
    }

    let elapsed = started.elapsed();
    info!(
        elapsed = ?elapsed,
        failed,
        throughput = cli.tasks as f64 / elapsed.as_secs_f64(),
        "benchmark complete"
    );
    println!("{}", serde_json::to_string_pretty(&pool.metrics())?);

    pool.destroy().await;
    Ok(())
}
