//! Concurrent submitters against a small pool: bounds hold and nothing is lost.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, timeout};

use poolside::{Pool, PoolConfig, PoolError, QueueLimit, ThreadBackend};

const TIMEOUT: Duration = Duration::from_secs(20);
const SUBMITTERS: usize = 8;
const PER_SUBMITTER: usize = 25;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn bounds_hold_under_concurrent_submission() {
    let cfg = PoolConfig::new()
        .with_min_threads(1)
        .with_max_threads(3)
        .with_max_queue(QueueLimit::Bounded(10))
        .with_concurrent_tasks_per_worker(2);
    let backend = ThreadBackend::new(|n: u64| async move {
        tokio::time::sleep(Duration::from_millis(2)).await;
        Ok(n * 2)
    });
    let pool = Arc::new(Pool::new(cfg, backend).unwrap());

    // Sample invariants while submitters run.
    let done = Arc::new(AtomicBool::new(false));
    let sampler = {
        let pool = Arc::clone(&pool);
        let done = Arc::clone(&done);
        tokio::spawn(async move {
            while !done.load(Ordering::Relaxed) {
                let threads = pool.threads();
                assert!(threads.len() <= 3, "too many workers: {}", threads.len());
                for t in &threads {
                    assert!(t.active_tasks <= t.capacity, "{t:?} over capacity");
                }
                assert!(pool.queue_size() <= 10);
                sleep(Duration::from_millis(1)).await;
            }
        })
    };

    let mut submitters = Vec::new();
    for s in 0..SUBMITTERS {
        let pool = Arc::clone(&pool);
        submitters.push(tokio::spawn(async move {
            let mut ok = 0usize;
            let mut rejected = 0usize;
            for i in 0..PER_SUBMITTER {
                let n = (s * PER_SUBMITTER + i) as u64;
                match pool.submit(n).await {
                    Ok(v) => {
                        assert_eq!(v, n * 2);
                        ok += 1;
                    }
                    Err(e) if e.is_backpressure() => rejected += 1,
                    Err(e) => panic!("unexpected error: {e}"),
                }
            }
            (ok, rejected)
        }));
    }

    let mut total_ok = 0;
    let mut total_rejected = 0;
    for handle in submitters {
        let (ok, rejected) = timeout(TIMEOUT, handle).await.unwrap().unwrap();
        total_ok += ok;
        total_rejected += rejected;
    }
    done.store(true, Ordering::Relaxed);
    sampler.await.unwrap();

    assert_eq!(total_ok + total_rejected, SUBMITTERS * PER_SUBMITTER);
    let metrics = pool.metrics();
    assert_eq!(metrics.tasks_completed as usize, total_ok);
    assert_eq!(metrics.tasks_rejected as usize, total_rejected);
    assert!(metrics.workers_spawned >= 1);
    pool.destroy().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn burst_of_fire_and_forget_submissions_all_settle() {
    let cfg = PoolConfig::new()
        .with_min_threads(0)
        .with_max_threads(2)
        .with_max_queue(QueueLimit::Unbounded);
    let pool = Pool::new(cfg, ThreadBackend::blocking(|n: u32| Ok(n))).unwrap();

    let handles: Vec<_> = (0..200).map(|n| pool.submit(n)).collect();
    assert!(pool.thread_count() <= 2);

    for (n, handle) in handles.into_iter().enumerate() {
        let value = timeout(TIMEOUT, handle).await.unwrap().unwrap();
        assert_eq!(value, n as u32);
    }
    assert_eq!(pool.metrics().tasks_completed, 200);

    pool.destroy().await;
    assert!(matches!(pool.try_submit(0), Err(PoolError::Destroyed)));
}
