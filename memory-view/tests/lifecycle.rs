// Session lifecycle: pause, resume, stop and view disposal

mod common;

use common::{snapshots, Harness};
use memory_view::testing::MockDebuggee;
use memory_view::{
    ClassDescriptor, InstanceHandle, StatusText, TrackedStrategy, TrackingType, ViewUpdate,
};
use std::time::Duration;

fn foo() -> ClassDescriptor {
    ClassDescriptor::new("com.example.Foo", 1)
}

fn debuggee_with_foo() -> MockDebuggee {
    let debuggee = MockDebuggee::new();
    debuggee.add_class(foo(), vec![InstanceHandle(1), InstanceHandle(2)]);
    debuggee
}

#[tokio::test(start_paused = true)]
async fn test_tracked_class_is_picked_up_when_loaded() {
    let late = ClassDescriptor::new("com.example.Late", 7);
    let h = Harness::with_tracked(
        MockDebuggee::new(),
        &[("com.example.Late", TrackingType::CreationTracked)],
    );
    h.settle().await;

    assert_eq!(h.debuggee.pending_class_prepared("com.example.Late"), 1);
    assert!(h.view.registry().is_empty());
    assert!(h.view.is_subscribed_to_tracker());

    h.debuggee.load_class(late.clone(), Vec::new());
    h.settle().await;

    assert!(matches!(
        h.view.strategy(&late),
        Some(TrackedStrategy::Creation(_))
    ));
    assert_eq!(h.debuggee.open_creation_feeds(&late), 1);
}

#[tokio::test(start_paused = true)]
async fn test_pause_without_reload_flag_only_updates_status() {
    let mut h = Harness::new(debuggee_with_foo());
    h.settle().await;
    h.drain();

    h.session.paused();
    h.settle().await;

    assert_eq!(h.debuggee.all_classes_calls(), 0);
    assert_eq!(
        h.drain(),
        vec![ViewUpdate::Status(StatusText::NothingToShow)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_raising_reload_flag_counts_current_pause_once() {
    let mut h = Harness::new(debuggee_with_foo());
    h.session.paused();
    h.settle().await;
    assert_eq!(h.debuggee.all_classes_calls(), 0);

    h.view.set_need_reload(true);
    h.settle().await;
    assert_eq!(h.debuggee.all_classes_calls(), 1);
    assert_eq!(snapshots(&h.drain()).len(), 1);

    // Same pause already counted
    h.view.set_need_reload(false);
    h.view.set_need_reload(true);
    h.settle().await;
    assert_eq!(h.debuggee.all_classes_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_resume_hides_content_and_cancels_pending_census() {
    let debuggee = debuggee_with_foo();
    debuggee.set_count_latency(Duration::from_millis(400));
    let mut h = Harness::new(debuggee);
    h.pause_and_count().await;
    assert_eq!(h.view.alarm_delay(), Duration::from_millis(200));

    h.view.update_classes_and_counts();
    assert!(h.view.has_pending_census_request());

    h.session.resumed();
    assert!(!h.view.has_pending_census_request());
    let updates = h.drain();
    assert_eq!(
        updates,
        vec![
            ViewUpdate::Status(StatusText::Running),
            ViewUpdate::HideContent
        ]
    );

    h.settle().await;
    assert_eq!(h.debuggee.all_classes_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_select_class_lists_instances_while_paused() {
    let mut h = Harness::new(debuggee_with_foo());
    h.settle().await;

    assert!(!h.view.select_class(&foo()));

    h.session.paused();
    assert!(h.view.select_class(&foo()));
    h.settle().await;

    assert!(h.drain().contains(&ViewUpdate::Instances {
        class: foo(),
        instances: vec![InstanceHandle(1), InstanceHandle(2)],
    }));
}

#[tokio::test(start_paused = true)]
async fn test_selection_from_ended_pause_is_dropped() {
    let mut h = Harness::new(debuggee_with_foo());
    h.settle().await;

    h.session.paused();
    assert!(h.view.select_class(&foo()));
    h.session.resumed();
    h.settle().await;

    assert_eq!(h.debuggee.instances_calls(), 0);
    assert!(!h
        .drain()
        .iter()
        .any(|update| matches!(update, ViewUpdate::Instances { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_stop_detaches_observer() {
    let h = Harness::new(debuggee_with_foo());
    h.settle().await;
    assert_eq!(h.session.listener_count(), 1);

    h.session.stopped();
    assert_eq!(h.session.listener_count(), 0);
    assert!(h.session.paused().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_dispose_releases_everything() {
    let h = Harness::with_tracked(
        debuggee_with_foo(),
        &[("com.example.Foo", TrackingType::CreationTracked)],
    );
    h.settle().await;
    let tracker = match h.view.strategy(&foo()) {
        Some(TrackedStrategy::Creation(tracker)) => tracker,
        _ => panic!("expected a creation tracker"),
    };
    assert_eq!(h.tracker.listener_count(), 1);

    h.view.dispose();
    h.view.dispose();

    assert!(tracker.is_disposed());
    assert!(h.view.registry().is_empty());
    assert!(!h.view.is_subscribed_to_tracker());
    assert_eq!(h.tracker.listener_count(), 0);
    assert_eq!(h.session.listener_count(), 0);
    assert_eq!(h.debuggee.open_creation_feeds(&foo()), 0);

    h.view.set_need_reload(true);
    h.session.paused();
    h.settle().await;
    assert_eq!(h.debuggee.all_classes_calls(), 0);
}
