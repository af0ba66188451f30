//! Monitor tick integration tests
//!
//! Requests are brought to `monitoring` through the conversation, then the
//! tick runs against the same store with a scripted oracle and a recording
//! notifier.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{scenario_slots, FakeOracle, Harness, RecordingNotifier, USER};
use seatwatch_core::store::RequestStore;
use seatwatch_core::{MonitoringRequest, RequestStatus, TimeSlot};
use seatwatch_server::subsystems::monitor::{run_monitor_tick, MonitorContext};

async fn reach_monitoring(h: &Harness) {
    h.reach_day_selection().await;
    h.choose("calendar_day:2026-11-02").await;
    h.choose("multi_time_toggle:09:00").await;
    h.choose("multi_time_toggle:14:30").await;
    h.choose("multi_time_done").await;
    h.choose("seat_select:Ekonomi").await;
    assert_eq!(h.status().await, RequestStatus::Monitoring);
}

fn monitor(h: &Harness, notifier: &Arc<RecordingNotifier>) -> MonitorContext {
    MonitorContext::new(
        h.store.clone(),
        h.oracle.clone(),
        notifier.clone(),
        Duration::from_secs(5),
        Some("https://booking.example".to_string()),
    )
}

// ===========================================================================
// TEST 1: seats on a selected time notify and complete the request
// ===========================================================================
#[tokio::test]
async fn test_match_notifies_and_completes() {
    let h = Harness::new(FakeOracle::returning(scenario_slots()));
    reach_monitoring(&h).await;
    let notifier = Arc::new(RecordingNotifier::default());
    let ctx = monitor(&h, &notifier);

    let report = run_monitor_tick(&ctx).await.unwrap();
    assert_eq!(report.scanned, 1);
    assert_eq!(report.matched, 1);
    assert_eq!(report.notified, 1);
    assert_eq!(h.status().await, RequestStatus::Completed);

    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, USER);
    assert!(sent[0].1.contains("14:30"));
    assert!(sent[0].1.contains("Ekonomi"));
    assert!(sent[0].1.contains('5'));
    assert!(sent[0].1.contains("https://booking.example"));
}

// ===========================================================================
// TEST 2: a completed request is never checked again
// ===========================================================================
#[tokio::test]
async fn test_completed_request_not_rechecked() {
    let h = Harness::new(FakeOracle::returning(scenario_slots()));
    reach_monitoring(&h).await;
    let notifier = Arc::new(RecordingNotifier::default());
    let ctx = monitor(&h, &notifier);

    run_monitor_tick(&ctx).await.unwrap();
    let calls = h.oracle.calls();

    let report = run_monitor_tick(&ctx).await.unwrap();
    assert_eq!(report.scanned, 0);
    assert_eq!(h.oracle.calls(), calls);
    assert_eq!(notifier.sent().len(), 1);
}

// ===========================================================================
// TEST 3: failed notification keeps monitoring, next tick retries
// ===========================================================================
#[tokio::test]
async fn test_notify_failure_keeps_monitoring() {
    let h = Harness::new(FakeOracle::returning(scenario_slots()));
    reach_monitoring(&h).await;
    let notifier = Arc::new(RecordingNotifier::default());
    notifier.set_failing(true);
    let ctx = monitor(&h, &notifier);

    let report = run_monitor_tick(&ctx).await.unwrap();
    assert_eq!(report.matched, 1);
    assert_eq!(report.notify_failures, 1);
    assert_eq!(h.status().await, RequestStatus::Monitoring);

    notifier.set_failing(false);
    let report = run_monitor_tick(&ctx).await.unwrap();
    assert_eq!(report.notified, 1);
    assert_eq!(h.status().await, RequestStatus::Completed);
}

// ===========================================================================
// TEST 4: no free seats leaves the request alone
// ===========================================================================
#[tokio::test]
async fn test_no_match_stays_monitoring() {
    let h = Harness::new(FakeOracle::returning(scenario_slots()));
    reach_monitoring(&h).await;
    h.oracle.set_slots(Some(vec![
        TimeSlot::new("09:00", &[("Ekonomi", 0), ("Business", 3)]),
        TimeSlot::new("14:30", &[("Ekonomi", 0)]),
    ]));
    let notifier = Arc::new(RecordingNotifier::default());
    let ctx = monitor(&h, &notifier);

    let report = run_monitor_tick(&ctx).await.unwrap();
    assert_eq!(report.matched, 0);
    assert!(notifier.sent().is_empty());
    assert_eq!(h.status().await, RequestStatus::Monitoring);
}

// ===========================================================================
// TEST 5: oracle failure is counted and skipped
// ===========================================================================
#[tokio::test]
async fn test_oracle_failure_skips_request() {
    let h = Harness::new(FakeOracle::returning(scenario_slots()));
    reach_monitoring(&h).await;
    h.oracle.set_slots(None);
    let notifier = Arc::new(RecordingNotifier::default());
    let ctx = monitor(&h, &notifier);

    let report = run_monitor_tick(&ctx).await.unwrap();
    assert_eq!(report.oracle_failures, 1);
    assert_eq!(h.status().await, RequestStatus::Monitoring);
}

// ===========================================================================
// TEST 6: incomplete requests are skipped without an oracle call
// ===========================================================================
#[tokio::test]
async fn test_incomplete_request_skipped() {
    let h = Harness::new(FakeOracle::returning(scenario_slots()));
    let mut request = MonitoringRequest::new("incomplete", chrono::Utc::now());
    request.status = RequestStatus::Monitoring;
    request.mapped_departure = Some("Ankara".to_string());
    h.store.upsert(&request).await.unwrap();

    let notifier = Arc::new(RecordingNotifier::default());
    let report = run_monitor_tick(&monitor(&h, &notifier)).await.unwrap();
    assert_eq!(report.scanned, 1);
    assert_eq!(report.skipped_incomplete, 1);
    assert_eq!(h.oracle.calls(), 0);
}

// ===========================================================================
// TEST 7: a restart during the check is neither notified nor overwritten
// ===========================================================================
#[tokio::test]
async fn test_restart_during_check_wins() {
    let h = Harness::new(FakeOracle::returning(scenario_slots()).with_delay(Duration::from_millis(200)));
    reach_monitoring(&h).await;
    let notifier = Arc::new(RecordingNotifier::default());
    let ctx = Arc::new(monitor(&h, &notifier));

    let tick = tokio::spawn({
        let ctx = ctx.clone();
        async move { run_monitor_tick(&ctx).await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    h.text("/start").await;

    let report = tick.await.unwrap().unwrap();
    assert_eq!(report.matched, 1);
    assert_eq!(report.notified, 0);
    assert!(notifier.sent().is_empty());
    assert_eq!(h.status().await, RequestStatus::AwaitingDeparture);
}

// ===========================================================================
// TEST 8: overlapping ticks are skipped
// ===========================================================================
#[tokio::test]
async fn test_overlapping_tick_skipped() {
    let h = Harness::new(FakeOracle::returning(Vec::new()).with_delay(Duration::from_millis(200)));
    reach_monitoring_with_empty_results(&h).await;
    let notifier = Arc::new(RecordingNotifier::default());
    let ctx = Arc::new(monitor(&h, &notifier));

    let first = tokio::spawn({
        let ctx = ctx.clone();
        async move { run_monitor_tick(&ctx).await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let second = run_monitor_tick(&ctx).await.unwrap();
    assert!(second.skipped_busy);
    assert_eq!(second.scanned, 0);

    let first = first.await.unwrap().unwrap();
    assert!(!first.skipped_busy);
    assert_eq!(first.scanned, 1);
}

// ===========================================================================
// TEST 9: /stop during the check suppresses the notification
// ===========================================================================
#[tokio::test]
async fn test_stop_during_check_not_notified() {
    let h = Harness::new(FakeOracle::returning(scenario_slots()).with_delay(Duration::from_millis(200)));
    reach_monitoring(&h).await;
    let notifier = Arc::new(RecordingNotifier::default());
    let ctx = Arc::new(monitor(&h, &notifier));

    let tick = tokio::spawn({
        let ctx = ctx.clone();
        async move { run_monitor_tick(&ctx).await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    h.text("/stop").await;

    let report = tick.await.unwrap().unwrap();
    assert_eq!(report.matched, 1);
    assert_eq!(report.notified, 0);
    assert_eq!(report.store_failures, 0);
    assert!(notifier.sent().is_empty());
    assert_eq!(h.status().await, RequestStatus::Cancelled);
}

// ===========================================================================
// TEST 10: failing to write completed is counted, the request stays monitoring
// ===========================================================================
#[tokio::test]
async fn test_completed_write_failure_counted() {
    let h = Harness::new(FakeOracle::returning(scenario_slots()));
    reach_monitoring(&h).await;
    let notifier = Arc::new(RecordingNotifier::default());
    let ctx = monitor(&h, &notifier);

    h.store.set_fail_writes(true);
    let report = run_monitor_tick(&ctx).await.unwrap();
    h.store.set_fail_writes(false);

    assert_eq!(report.notified, 1);
    assert_eq!(report.store_failures, 1);
    assert_eq!(notifier.sent().len(), 1);
    assert_eq!(h.status().await, RequestStatus::Monitoring);
}

// ===========================================================================
// TEST 11: a failed re-read skips the notification and is counted
// ===========================================================================
#[tokio::test]
async fn test_reread_failure_skips_notification() {
    let h = Harness::new(FakeOracle::returning(scenario_slots()).with_delay(Duration::from_millis(200)));
    reach_monitoring(&h).await;
    let notifier = Arc::new(RecordingNotifier::default());
    let ctx = Arc::new(monitor(&h, &notifier));

    let tick = tokio::spawn({
        let ctx = ctx.clone();
        async move { run_monitor_tick(&ctx).await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    h.store.set_fail_reads(true);

    let report = tick.await.unwrap().unwrap();
    h.store.set_fail_reads(false);

    assert_eq!(report.matched, 1);
    assert_eq!(report.store_failures, 1);
    assert_eq!(report.notified, 0);
    assert!(notifier.sent().is_empty());
    assert_eq!(h.status().await, RequestStatus::Monitoring);
}

// ===========================================================================
// TEST 12: a failed listing fails the whole tick
// ===========================================================================
#[tokio::test]
async fn test_list_failure_fails_tick() {
    let h = Harness::new(FakeOracle::returning(scenario_slots()));
    reach_monitoring(&h).await;
    let notifier = Arc::new(RecordingNotifier::default());
    let ctx = monitor(&h, &notifier);

    h.store.set_fail_reads(true);
    assert!(run_monitor_tick(&ctx).await.is_err());
    h.store.set_fail_reads(false);

    assert_eq!(h.oracle.calls(), 1);
    assert_eq!(h.status().await, RequestStatus::Monitoring);
}

async fn reach_monitoring_with_empty_results(h: &Harness) {
    let mut request = MonitoringRequest::new(USER, chrono::Utc::now());
    request.status = RequestStatus::Monitoring;
    request.mapped_departure = Some("Ankara".to_string());
    request.mapped_arrival = Some("Konya".to_string());
    request.selected_date = chrono::NaiveDate::from_ymd_opt(2026, 11, 2);
    request.selected_times.insert("10:00".to_string());
    request.seat_type = Some("Ekonomi".to_string());
    h.store.upsert(&request).await.unwrap();
}
