//! Pool shutdown and scale-down against real worker threads.

use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::{sleep, timeout};

use poolside::{Pool, PoolConfig, PoolError, QueueLimit, TaskError, ThreadBackend, TERMINATING_MESSAGE};

const TIMEOUT: Duration = Duration::from_secs(5);

fn gated_backend() -> ThreadBackend<oneshot::Receiver<u32>, u32> {
    ThreadBackend::new(|gate: oneshot::Receiver<u32>| async move {
        gate.await
            .map_err(|_| TaskError::Failed("gate dropped".into()))
    })
}

async fn eventually(mut check: impl FnMut() -> bool) {
    timeout(TIMEOUT, async {
        while !check() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn destroy_aborts_running_and_queued_tasks() {
    let cfg = PoolConfig::new()
        .with_min_threads(1)
        .with_max_threads(2)
        .with_max_queue(QueueLimit::Bounded(4));
    let pool = Pool::new(cfg, gated_backend()).unwrap();

    let mut gates = Vec::new();
    let mut results = Vec::new();
    for _ in 0..5 {
        let (tx, rx) = oneshot::channel();
        results.push(pool.submit(rx));
        gates.push(tx);
    }
    assert_eq!(pool.thread_count(), 2);
    assert_eq!(pool.queue_size(), 3);

    pool.destroy().await;
    assert_eq!(pool.thread_count(), 0);
    assert_eq!(pool.queue_size(), 0);

    for result in results {
        match timeout(TIMEOUT, result).await.unwrap() {
            Err(PoolError::Aborted(msg)) => assert_eq!(msg, TERMINATING_MESSAGE),
            other => panic!("expected abort, got {other:?}"),
        }
    }
    assert_eq!(pool.metrics().tasks_aborted, 5);

    let (_tx, rx) = oneshot::channel();
    assert!(matches!(pool.try_submit(rx), Err(PoolError::Destroyed)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn destroy_does_not_wait_for_blocked_thread() {
    // A payload that never yields cannot be interrupted; the caller still
    // gets its abort immediately.
    let backend = ThreadBackend::blocking(|gate: mpsc::Receiver<()>| {
        let _ = gate.recv();
        Ok(())
    });
    let pool = Pool::new(PoolConfig::new().with_min_threads(1).with_max_threads(1), backend).unwrap();

    let (release, gate) = mpsc::channel();
    let result = pool.submit(gate);
    sleep(Duration::from_millis(20)).await;

    pool.destroy().await;
    let err = timeout(TIMEOUT, result).await.unwrap().unwrap_err();
    assert!(matches!(err, PoolError::Aborted(_)));

    // Let the detached thread finish.
    let _ = release.send(());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn idle_workers_retire_after_timeout() {
    let cfg = PoolConfig::new()
        .with_min_threads(1)
        .with_max_threads(3)
        .with_idle_timeout(Duration::from_millis(300));
    let pool = Pool::new(cfg, gated_backend()).unwrap();

    let mut gates = Vec::new();
    let mut results = Vec::new();
    for _ in 0..3 {
        let (tx, rx) = oneshot::channel();
        results.push(pool.submit(rx));
        gates.push(tx);
    }
    assert_eq!(pool.thread_count(), 3);

    for gate in gates {
        gate.send(1).unwrap();
    }
    for result in results {
        timeout(TIMEOUT, result).await.unwrap().unwrap();
    }

    // Still above minimum until the timeout elapses.
    assert_eq!(pool.thread_count(), 3);
    eventually(|| pool.thread_count() == 1).await;
    assert_eq!(pool.metrics().workers_retired, 2);

    // The survivor still serves work.
    let (tx, rx) = oneshot::channel();
    let result = pool.submit(rx);
    tx.send(9).unwrap();
    assert_eq!(timeout(TIMEOUT, result).await.unwrap().unwrap(), 9);
    pool.destroy().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn drain_resolves_when_work_finishes() {
    let pool = Arc::new(
        Pool::new(
            PoolConfig::new().with_min_threads(0).with_max_threads(2),
            ThreadBackend::blocking(|ms: u64| {
                std::thread::sleep(Duration::from_millis(ms));
                Ok(ms)
            }),
        )
        .unwrap(),
    );

    for _ in 0..6 {
        let _ = pool.submit(10);
    }
    timeout(TIMEOUT, pool.drain()).await.unwrap();

    let metrics = pool.metrics();
    assert_eq!(metrics.tasks_completed, 6);
    assert_eq!(metrics.queue_size, 0);
    assert_eq!(metrics.running_tasks, 0);
    pool.destroy().await;
}
