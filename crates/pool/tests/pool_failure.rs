//! Factory failures and the validity hook.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use reservoir_pool::{Error, Lease, Pool, Result, from_async};

// ---------------------------------------------------------------------------
// Factory failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn factory_error_propagates_unchanged() {
    let pool = Pool::<u64>::builder()
        .factory(|| -> Result<u64> {
            Err(Error::initialization_with(
                "connect failed",
                std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
            ))
        })
        .build()
        .unwrap();

    let err = pool.acquire().await.unwrap_err();
    match err {
        Error::Initialization { reason, source } => {
            assert_eq!(reason, "connect failed");
            assert_eq!(source.unwrap().to_string(), "refused");
        }
        other => panic!("expected Initialization, got: {other:?}"),
    }

    let stats = pool.stats();
    assert_eq!(stats.created, 0);
    assert_eq!(stats.active, 0);
    assert_eq!(stats.total_acquisitions, 0);
}

#[tokio::test]
async fn factory_is_not_retried() {
    let calls = Arc::new(AtomicU64::new(0));
    let calls_c = Arc::clone(&calls);
    let pool = Pool::<u64>::builder()
        .factory(move || -> Result<u64> {
            calls_c.fetch_add(1, Ordering::SeqCst);
            Err(Error::initialization("down"))
        })
        .build()
        .unwrap();

    assert!(pool.acquire().await.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_construction_gives_back_the_slot() {
    let healthy = Arc::new(AtomicBool::new(false));
    let healthy_c = Arc::clone(&healthy);
    let pool = Pool::<u64>::builder()
        .max_size(1)
        .factory(move || -> Result<u64> {
            if healthy_c.load(Ordering::SeqCst) {
                Ok(1)
            } else {
                Err(Error::initialization("not yet"))
            }
        })
        .build()
        .unwrap();

    for _ in 0..3 {
        assert!(pool.acquire_timeout(Duration::from_millis(50)).await.is_err());
    }

    healthy.store(true, Ordering::SeqCst);
    let lease = pool
        .acquire_timeout(Duration::from_millis(50))
        .await
        .expect("failed constructions must not hold capacity");
    assert_eq!(*lease, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cold_acquires_construct_in_parallel() {
    let pool = Pool::<u64>::builder()
        .max_size(4)
        .factory(from_async(|| async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(0)
        }))
        .build()
        .unwrap();

    let started = std::time::Instant::now();
    let mut set = tokio::task::JoinSet::new();
    for _ in 0..4 {
        let pool = pool.clone();
        set.spawn(async move { pool.acquire().await.map(Lease::detach) });
    }
    while let Some(result) = set.join_next().await {
        result.unwrap().unwrap().unwrap();
    }

    // Four serial constructions would take 800ms.
    assert!(started.elapsed() < Duration::from_millis(700));
    assert_eq!(pool.stats().total_acquisitions, 4);
}

// ---------------------------------------------------------------------------
// Validity hook
// ---------------------------------------------------------------------------

#[tokio::test]
async fn invalid_idle_instance_is_discarded() {
    let counter = Arc::new(AtomicU64::new(0));
    let counter_c = Arc::clone(&counter);
    let pool = Pool::<u64>::builder()
        .max_size(1)
        .factory(move || -> Result<u64> { Ok(counter_c.fetch_add(1, Ordering::SeqCst)) })
        // Only even ids are considered healthy.
        .validate(|id: &u64| id % 2 == 0)
        .build()
        .unwrap();

    // #0 is valid and gets reused.
    drop(pool.acquire().await.unwrap());
    assert_eq!(*pool.acquire().await.unwrap(), 0);

    // Swap in #1 by discarding #0.
    let mut lease = pool.acquire().await.unwrap();
    lease.discard().unwrap();
    let odd = pool.acquire().await.unwrap();
    assert_eq!(*odd, 1);
    drop(odd);

    // #1 fails validation on the way out, #2 is built in its place, and the
    // rejected instance does not count against the single slot.
    let lease = pool.acquire_timeout(Duration::from_millis(50)).await.unwrap();
    assert_eq!(*lease, 2);

    let stats = pool.stats();
    assert_eq!(stats.created, 3);
    assert_eq!(stats.destroyed, 2);
    assert_eq!(stats.live(), 1);
    assert_eq!(stats.active, 1);
}

#[tokio::test]
async fn validation_skips_to_next_idle_instance() {
    let counter = Arc::new(AtomicU64::new(0));
    let counter_c = Arc::clone(&counter);
    let pool = Pool::<u64>::builder()
        .factory(move || -> Result<u64> { Ok(counter_c.fetch_add(1, Ordering::SeqCst)) })
        .validate(|id: &u64| *id != 1)
        .build()
        .unwrap();

    let a = pool.acquire().await.unwrap();
    let b = pool.acquire().await.unwrap();
    drop(a);
    drop(b);

    // LIFO would hand out #1 first; it is rejected and #0 is served instead.
    let lease = pool.acquire().await.unwrap();
    assert_eq!(*lease, 0);
    assert_eq!(counter.load(Ordering::SeqCst), 2);
    assert_eq!(pool.stats().idle, 0);
}

#[tokio::test]
async fn panicking_validator_leaves_no_outstanding_lease() {
    let pool = Pool::<u64>::builder()
        .max_size(1)
        .factory(|| -> Result<u64> { Ok(7) })
        .validate(|_: &u64| panic!("validator blew up"))
        .build()
        .unwrap();
    drop(pool.acquire().await.unwrap());

    let handle = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.acquire().await.map(|_| ()) })
    };
    assert!(handle.await.unwrap_err().is_panic());

    let stats = pool.stats();
    assert_eq!(stats.active, 0);
    assert_eq!(stats.idle, 0);
    assert_eq!(stats.destroyed, 1);
    assert_eq!(stats.live(), 0);
    assert_eq!(stats.total_acquisitions, stats.total_releases);
    assert_eq!(stats.active + stats.idle, stats.live() as usize);

    // The capacity slot came back: the next acquire builds a fresh instance
    // and skips validation because the free list is empty.
    let lease = pool.acquire_timeout(Duration::from_millis(100)).await.unwrap();
    assert_eq!(*lease, 7);
    assert_eq!(pool.stats().created, 2);
}
