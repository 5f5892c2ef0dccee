// Census behaviour against an in-memory debuggee

mod common;

use common::{busy_count, snapshots, Harness};
use memory_view::testing::MockDebuggee;
use memory_view::{
    InstancesTracker, StatusText, TrackedStrategy, TrackingType, ViewOptions, ViewUpdate,
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_batched_census_preserves_order() {
    let mut h = Harness::with_batch_size(MockDebuggee::with_classes(1000), 300);
    h.settle().await;
    h.drain();

    let updates = h.pause_and_count().await;

    assert_eq!(h.debuggee.batch_sizes(), vec![300, 300, 300, 100]);
    let published = snapshots(&updates);
    assert_eq!(published.len(), 1);

    let snapshot = published[0];
    assert_eq!(snapshot.len(), 1000);
    let expected = h.debuggee.classes();
    assert!(snapshot.classes().eq(expected.iter()));
    for (i, row) in snapshot.rows.iter().enumerate() {
        assert_eq!(row.count, i as u64 + 1);
    }

    assert_eq!(busy_count(&updates, true), 1);
    assert_eq!(busy_count(&updates, false), 1);
    assert!(updates.contains(&ViewUpdate::Status(StatusText::NothingToShow)));
}

#[tokio::test(start_paused = true)]
async fn test_constrained_backend_gets_smaller_batches() {
    let debuggee = MockDebuggee::with_classes(1200);
    debuggee.set_constrained(true);
    let mut h = Harness::new(debuggee);

    h.pause_and_count().await;
    assert_eq!(h.debuggee.batch_sizes(), vec![500, 500, 200]);
}

#[tokio::test(start_paused = true)]
async fn test_unconstrained_backend_counts_in_one_call() {
    let mut h = Harness::new(MockDebuggee::with_classes(1200));

    h.pause_and_count().await;
    assert_eq!(h.debuggee.batch_sizes(), vec![1200]);
}

#[tokio::test(start_paused = true)]
async fn test_resume_mid_walk_discards_results() {
    let debuggee = MockDebuggee::with_classes(1000);
    debuggee.set_count_latency(Duration::from_millis(100));
    let tracker = InstancesTracker::new();
    // Picked up by the view's start-up restore
    tracker.add("pkg.C0", TrackingType::CreationTracked);
    let mut h = Harness::with(
        debuggee,
        tracker,
        ViewOptions {
            batch_size: Some(300),
            ..Default::default()
        },
    );
    h.settle().await;
    let c0 = h.debuggee.classes()[0].clone();
    assert!(h.view.strategy(&c0).is_some());
    h.drain();

    let session = Arc::clone(&h.session);
    h.debuggee.on_instance_counts(move |call| {
        if call == 2 {
            session.resumed();
        }
    });

    let updates = h.pause_and_count().await;

    assert!(snapshots(&updates).is_empty());
    assert_eq!(h.debuggee.batch_sizes(), vec![300, 300]);
    assert_eq!(busy_count(&updates, false), 1);
    assert!(updates.contains(&ViewUpdate::HideContent));
    assert!(updates.contains(&ViewUpdate::Status(StatusText::Running)));
    assert!(!h.view.has_pending_census_request());

    match h.view.strategy(&c0) {
        Some(TrackedStrategy::Creation(tracker)) => assert!(tracker.is_obsolete()),
        _ => panic!("expected a creation tracker for pkg.C0"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_empty_class_list_publishes_nothing() {
    let mut h = Harness::new(MockDebuggee::new());

    let updates = h.pause_and_count().await;

    assert!(snapshots(&updates).is_empty());
    assert_eq!(h.debuggee.instance_count_calls(), 0);
    assert_eq!(busy_count(&updates, false), 1);
}

#[tokio::test(start_paused = true)]
async fn test_count_failure_abandons_census_then_next_pause_retries() {
    let debuggee = MockDebuggee::with_classes(1000);
    debuggee.fail_counts_on_call(2);
    let mut h = Harness::with_batch_size(debuggee, 300);

    let updates = h.pause_and_count().await;
    assert!(snapshots(&updates).is_empty());
    assert_eq!(busy_count(&updates, false), 1);
    assert_eq!(h.debuggee.batch_sizes(), vec![300, 300]);

    let updates = h.pause_and_count().await;
    let published = snapshots(&updates);
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].len(), 1000);
    assert_eq!(busy_count(&updates, false), 1);
}

#[tokio::test(start_paused = true)]
async fn test_enumeration_failure_clears_busy() {
    let debuggee = MockDebuggee::with_classes(10);
    debuggee.set_fail_all_classes(true);
    let mut h = Harness::new(debuggee);

    let updates = h.pause_and_count().await;
    assert!(snapshots(&updates).is_empty());
    assert_eq!(busy_count(&updates, true), 1);
    assert_eq!(busy_count(&updates, false), 1);
}

#[tokio::test(start_paused = true)]
async fn test_delay_follows_last_batch_latency() {
    let debuggee = MockDebuggee::with_classes(10);
    debuggee.set_count_latency(Duration::from_millis(300));
    let mut h = Harness::new(debuggee);

    h.pause_and_count().await;
    assert_eq!(h.view.alarm_delay(), Duration::from_millis(150));
    assert_eq!(h.debuggee.all_classes_calls(), 1);

    // A regular request now waits out the adaptive delay
    h.view.update_classes_and_counts();
    assert!(h.view.has_pending_census_request());
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.debuggee.all_classes_calls(), 1);
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(h.debuggee.all_classes_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_burst_of_requests_runs_one_census() {
    let mut h = Harness::new(MockDebuggee::with_classes(5));
    h.session.paused();
    h.settle().await;
    h.drain();

    for _ in 0..10 {
        h.view.update_classes_and_counts();
    }
    h.settle().await;

    let updates = h.drain();
    assert_eq!(h.debuggee.all_classes_calls(), 1);
    assert_eq!(snapshots(&updates).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_superseded_pause_cancels_queued_census() {
    let debuggee = MockDebuggee::with_classes(5);
    debuggee.set_count_latency(Duration::from_secs(1));
    let mut h = Harness::new(debuggee);
    h.view.set_need_reload(true);

    // First census blocks the worker inside the count call
    h.session.paused();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(h.debuggee.instance_count_calls(), 1);

    // Queued behind it, then superseded before it starts
    h.session.paused();
    tokio::time::sleep(Duration::from_millis(10)).await;
    h.session.paused();
    h.settle().await;

    let updates = h.drain();
    assert_eq!(h.debuggee.all_classes_calls(), 2);
    assert_eq!(snapshots(&updates).len(), 1);
    assert_eq!(busy_count(&updates, true), 3);
    assert_eq!(busy_count(&updates, false), 3);
}

#[tokio::test(start_paused = true)]
async fn test_no_census_while_running() {
    let mut h = Harness::new(MockDebuggee::with_classes(5));

    h.view.set_need_reload(true);
    h.view.update_classes_and_counts();
    h.settle().await;

    assert_eq!(h.debuggee.all_classes_calls(), 0);
    assert!(snapshots(&h.drain()).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_detached_debuggee_is_not_queried() {
    let debuggee = MockDebuggee::with_classes(5);
    debuggee.set_attached(false);
    let mut h = Harness::new(debuggee);

    h.pause_and_count().await;
    assert_eq!(h.debuggee.all_classes_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_dispose_clears_busy_for_queued_census() {
    let debuggee = MockDebuggee::with_classes(5);
    debuggee.set_count_latency(Duration::from_secs(1));
    let mut h = Harness::new(debuggee);
    h.view.set_need_reload(true);

    // One census running, the next one queued behind it
    h.session.paused();
    tokio::time::sleep(Duration::from_millis(10)).await;
    h.session.paused();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(h.debuggee.all_classes_calls(), 1);

    h.view.dispose();
    h.settle().await;

    let updates = h.drain();
    assert_eq!(busy_count(&updates, true), 2);
    assert_eq!(busy_count(&updates, false), 2);
    assert_eq!(h.debuggee.all_classes_calls(), 1);
}
