//! Tests for [`TaskGroup`].

use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn counter() -> Arc<AtomicUsize> {
    Arc::new(AtomicUsize::new(0))
}

#[tokio::test]
async fn test_empty_group_succeeds() {
    let group = TaskGroup::with_limit(&DispatchContext::background(), 0);
    assert!(group.wait().await.is_ok());
}

#[tokio::test]
async fn test_all_tasks_run_once() {
    let ran = counter();
    let mut group = TaskGroup::with_limit(&DispatchContext::background(), 5);

    for _ in 0..5 {
        let ran = ran.clone();
        group.spawn(move |_ctx| async move {
            ran.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
    }

    assert!(group.wait().await.is_ok());
    assert_eq!(ran.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn test_first_error_stops_pending_tasks() {
    // Arrange: with a limit of one the second task is still waiting for a
    // permit when the first one fails.
    let second_ran = counter();
    let mut group = TaskGroup::with_limit(&DispatchContext::background(), 1);

    group.spawn(|_ctx| async { Err(DispatchError::Handler("first".into())) });
    {
        let second_ran = second_ran.clone();
        group.spawn(move |_ctx| async move {
            second_ran.fetch_add(1, Ordering::SeqCst);
            Err(DispatchError::Handler("second".into()))
        });
    }

    // Act
    let result = group.wait().await;

    // Assert
    match result {
        Err(DispatchError::Handler(inner)) => assert_eq!(inner.to_string(), "first"),
        other => panic!("expected first handler error, got {other:?}"),
    }
    assert_eq!(second_ran.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_error_cancels_running_siblings() {
    let mut group = TaskGroup::with_limit(&DispatchContext::background(), 2);
    let observed = counter();

    {
        let observed = observed.clone();
        group.spawn(move |ctx| async move {
            let cause = ctx.done().await;
            assert!(matches!(cause, DispatchError::Cancelled));
            observed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
    }
    group.spawn(|_ctx| async {
        tokio::task::yield_now().await;
        Err(DispatchError::Handler("boom".into()))
    });

    let result = group.wait().await;

    assert!(matches!(result, Err(DispatchError::Handler(_))));
    assert_eq!(observed.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_waits_for_running_tasks() {
    let ctx = DispatchContext::with_timeout(Duration::from_millis(50));
    let finished = counter();
    let started_late = counter();
    let mut group = TaskGroup::with_limit(&ctx, 1);

    {
        let finished = finished.clone();
        group.spawn(move |_ctx| async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            finished.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
    }
    {
        let started_late = started_late.clone();
        group.spawn(move |_ctx| async move {
            started_late.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
    }

    let start = tokio::time::Instant::now();
    let result = group.wait().await;

    assert!(matches!(result, Err(DispatchError::DeadlineExceeded)));
    assert!(start.elapsed() >= Duration::from_millis(100));
    assert_eq!(finished.load(Ordering::SeqCst), 1);
    assert_eq!(started_late.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_cancelled_parent_skips_tasks() {
    let parent = DispatchContext::background();
    parent.cancel();
    let ran = counter();
    let mut group = TaskGroup::with_limit(&parent, 3);

    for _ in 0..3 {
        let ran = ran.clone();
        group.spawn(move |_ctx| async move {
            ran.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
    }

    let result = group.wait().await;

    assert!(matches!(result, Err(DispatchError::Cancelled)));
    assert_eq!(ran.load(Ordering::SeqCst), 0);
}

async fn explode() -> Result<(), DispatchError> {
    panic!("handler exploded")
}

#[tokio::test]
async fn test_panic_is_reported() {
    let mut group = TaskGroup::with_limit(&DispatchContext::background(), 1);
    group.spawn(|_ctx| explode());

    let result = group.wait().await;

    match result {
        Err(DispatchError::TaskPanicked { message }) => {
            assert_eq!(message, "handler exploded")
        }
        other => panic!("expected TaskPanicked, got {other:?}"),
    }
}

#[tokio::test]
async fn test_group_cancellation_does_not_reach_parent() {
    let parent = DispatchContext::background();
    let mut group = TaskGroup::with_limit(&parent, 1);
    group.spawn(|_ctx| async { Err(DispatchError::Handler("boom".into())) });

    let _ = group.wait().await;

    assert!(!parent.is_done());
}
