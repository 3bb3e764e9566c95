use std::sync::Arc;
use std::time::Duration;

use enom_dispatch::{DelayRange, DispatchError, Dispatcher};
use futures::future::join_all;
use parking_lot::Mutex;
use tokio::time::Instant;

const MIN_GAP: Duration = Duration::from_millis(200);

#[tokio::test(start_paused = true)]
async fn tasks_run_in_submission_order_even_when_earlier_ones_are_slower() {
    let dispatcher = Dispatcher::new(DelayRange::default());
    let log = Arc::new(Mutex::new(Vec::new()));

    let pending: Vec<_> = (0..5u64)
        .map(|i| {
            let log = log.clone();
            dispatcher.schedule(async move {
                // Earlier tasks take longer, so an unthrottled pool would reverse them.
                tokio::time::sleep(Duration::from_millis((5 - i) * 50)).await;
                log.lock().push(i);
                i
            })
        })
        .collect();

    let results: Vec<u64> = join_all(pending)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    assert_eq!(results, vec![0, 1, 2, 3, 4]);
    assert_eq!(*log.lock(), vec![0, 1, 2, 3, 4]);
}

#[tokio::test(start_paused = true)]
async fn completions_are_spaced_by_at_least_the_minimum_delay() {
    let dispatcher = Dispatcher::new(DelayRange::default());
    let stamps = Arc::new(Mutex::new(Vec::new()));

    let pending: Vec<_> = (0..4)
        .map(|_| {
            let stamps = stamps.clone();
            dispatcher.schedule(async move {
                stamps.lock().push(Instant::now());
            })
        })
        .collect();
    for result in join_all(pending).await {
        result.unwrap();
    }

    let stamps = stamps.lock();
    assert_eq!(stamps.len(), 4);
    for pair in stamps.windows(2) {
        let gap = pair[1] - pair[0];
        assert!(gap >= MIN_GAP, "gap {gap:?} shorter than {MIN_GAP:?}");
        assert!(gap <= Duration::from_millis(500), "gap {gap:?} longer than max delay");
    }
}

#[tokio::test(start_paused = true)]
async fn delay_applies_after_a_failed_task() {
    let dispatcher = Dispatcher::new(DelayRange::fixed(Duration::from_millis(300)));

    let failed = dispatcher.schedule(async { Err::<(), _>("upstream said no") });
    let next = dispatcher.schedule(async { Instant::now() });

    let failed_at = Instant::now();
    assert_eq!(failed.await.unwrap(), Err("upstream said no"));
    let started = next.await.unwrap();

    assert!(started - failed_at >= Duration::from_millis(300));
}

#[tokio::test(start_paused = true)]
async fn result_resolves_before_the_trailing_delay() {
    let dispatcher = Dispatcher::new(DelayRange::fixed(Duration::from_millis(400)));

    let begin = Instant::now();
    let value = dispatcher.schedule(async { 7 }).await.unwrap();

    assert_eq!(value, 7);
    assert!(begin.elapsed() < Duration::from_millis(400));
}

#[tokio::test(start_paused = true)]
async fn panicking_task_is_aborted_and_queue_keeps_going() {
    let dispatcher = Dispatcher::new(DelayRange::default());

    let explode = true;
    let boom = dispatcher.schedule(async move {
        if explode {
            panic!("task exploded");
        }
        0
    });
    let after = dispatcher.schedule(async { 1 });

    assert_eq!(boom.await, Err(DispatchError::Aborted));
    assert_eq!(after.await, Ok(1));
}

#[tokio::test(start_paused = true)]
async fn clones_share_one_queue() {
    let first = Dispatcher::new(DelayRange::default());
    let second = first.clone();
    let log = Arc::new(Mutex::new(Vec::new()));

    let a = {
        let log = log.clone();
        first.schedule(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            log.lock().push("a");
        })
    };
    let b = {
        let log = log.clone();
        second.schedule(async move { log.lock().push("b") })
    };
    let (ra, rb) = tokio::join!(a, b);
    ra.unwrap();
    rb.unwrap();

    assert_eq!(*log.lock(), vec!["a", "b"]);
}

#[test]
fn schedule_after_runtime_shutdown_reports_closed() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let dispatcher = runtime.block_on(async { Dispatcher::new(DelayRange::default()) });
    drop(runtime);

    let other = tokio::runtime::Runtime::new().unwrap();
    let result = other.block_on(dispatcher.schedule(async { 1 }));
    assert_eq!(result, Err(DispatchError::Closed));
}
