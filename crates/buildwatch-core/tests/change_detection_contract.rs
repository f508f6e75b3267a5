//! Architectural Contract Test: Change Detection & Replay
//!
//! Verifies the detection pass for one master, one cycle:
//! - Exactly one ChangeRecord per changed job, none for unchanged jobs
//! - Cache entries created, overwritten, and removed at the right moments
//! - Missed intermediate builds replayed in ascending order
//! - The already-announced build is suppressed during replay
//! - Failures scoped to one build, one job, or one master
//!
//! If this test fails, the event stream consumers see wrong or duplicated
//! build history.

mod common;

use common::*;

use std::sync::Arc;

use buildwatch_core::traits::{BuildCache, BuildSnapshot, Job, IN_PROGRESS_RESULT};
use buildwatch_core::ChangeDetector;

fn detector(
    source: &Arc<ScriptedSource>,
    cache: &Arc<CountingCache>,
    sink: &Arc<RecordingSink>,
) -> ChangeDetector {
    ChangeDetector::new(source.clone(), cache.clone(), sink.clone())
}

#[tokio::test]
async fn new_job_is_announced_once_and_cached() {
    let source = Arc::new(ScriptedSource::new());
    let cache = Arc::new(CountingCache::new());
    let sink = Arc::new(RecordingSink::new());

    source.set_jobs(
        "masterA",
        vec![Job::new("jobX", Some(BuildSnapshot::finished(1, "SUCCESS")))],
    );

    let records = detector(&source, &cache, &sink)
        .detect("masterA")
        .await
        .unwrap();

    assert_eq!(records.len(), 1);
    assert!(records[0].previous.is_none());
    assert_eq!(records[0].current.number, 1);

    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].number, 1);
    assert_eq!(events[0].result, "SUCCESS");

    let entry = cache.get_entry("masterA", "jobX").await.unwrap().unwrap();
    assert_eq!(entry.last_build_number, 1);
    assert!(!entry.building);
}

#[tokio::test]
async fn unchanged_job_produces_nothing_on_second_poll() {
    let source = Arc::new(ScriptedSource::new());
    let cache = Arc::new(CountingCache::new());
    let sink = Arc::new(RecordingSink::new());

    source.set_jobs(
        "masterA",
        vec![Job::new("jobX", Some(BuildSnapshot::finished(1, "SUCCESS")))],
    );

    let det = detector(&source, &cache, &sink);
    det.detect("masterA").await.unwrap();

    let writes_after_first = cache.write_calls();
    let events_after_first = sink.events().len();

    // Nothing changed on the source between polls
    let records = det.detect("masterA").await.unwrap();

    assert!(records.is_empty(), "second poll must produce no records");
    assert_eq!(
        cache.write_calls(),
        writes_after_first,
        "second poll must not mutate the cache"
    );
    assert_eq!(sink.events().len(), events_after_first);
}

#[tokio::test]
async fn vanished_job_is_dropped_silently() {
    let source = Arc::new(ScriptedSource::new());
    let cache = Arc::new(CountingCache::new());
    let sink = Arc::new(RecordingSink::new());

    // jobY is tracked from an earlier cycle but gone from the live listing
    cache.set_entry("masterA", "jobY", 5, false).await.unwrap();
    source.set_jobs("masterA", vec![]);

    let records = detector(&source, &cache, &sink)
        .detect("masterA")
        .await
        .unwrap();

    assert!(records.is_empty());
    assert!(sink.events().is_empty(), "removals emit no events");
    assert!(cache.get_entry("masterA", "jobY").await.unwrap().is_none());
}

#[tokio::test]
async fn simple_change_suppresses_already_announced_build() {
    let source = Arc::new(ScriptedSource::new());
    let cache = Arc::new(CountingCache::new());
    let sink = Arc::new(RecordingSink::new());

    // Build #1 was announced last cycle as finished
    cache.set_entry("masterA", "jobX", 1, false).await.unwrap();

    source.set_jobs(
        "masterA",
        vec![Job::new("jobX", Some(BuildSnapshot::finished(2, "SUCCESS")))],
    );
    source.set_history(
        "masterA",
        "jobX",
        vec![
            BuildSnapshot::finished(1, "SUCCESS"),
            BuildSnapshot::finished(2, "SUCCESS"),
        ],
    );

    detector(&source, &cache, &sink)
        .detect("masterA")
        .await
        .unwrap();

    // #1 matches the cached (number, building) pair and is suppressed
    assert_eq!(sink.numbers_for("jobX"), vec![2]);

    let entry = cache.get_entry("masterA", "jobX").await.unwrap().unwrap();
    assert_eq!(entry.last_build_number, 2);
}

#[tokio::test]
async fn replay_announces_cached_build_when_its_flag_changed() {
    let source = Arc::new(ScriptedSource::new());
    let cache = Arc::new(CountingCache::new());
    let sink = Arc::new(RecordingSink::new());

    // #1 was announced while still building; it has since finished
    cache.set_entry("masterA", "jobX", 1, true).await.unwrap();

    source.set_jobs(
        "masterA",
        vec![Job::new("jobX", Some(BuildSnapshot::finished(2, "SUCCESS")))],
    );
    source.set_history(
        "masterA",
        "jobX",
        vec![
            BuildSnapshot::finished(1, "FAILURE"),
            BuildSnapshot::finished(2, "SUCCESS"),
        ],
    );

    detector(&source, &cache, &sink)
        .detect("masterA")
        .await
        .unwrap();

    // #1's final state carries new information and must be replayed
    assert_eq!(sink.numbers_for("jobX"), vec![1, 2]);
}

#[tokio::test]
async fn backfill_replays_missed_builds_in_ascending_order() {
    let source = Arc::new(ScriptedSource::new());
    let cache = Arc::new(CountingCache::new());
    let sink = Arc::new(RecordingSink::new());

    cache.set_entry("masterA", "jobX", 1, false).await.unwrap();

    source.set_jobs(
        "masterA",
        vec![Job::new("jobX", Some(BuildSnapshot::finished(4, "SUCCESS")))],
    );
    // History deliberately unsorted: the detector must sort it
    source.set_history(
        "masterA",
        "jobX",
        vec![
            BuildSnapshot::finished(3, "SUCCESS"),
            BuildSnapshot::finished(1, "SUCCESS"),
            BuildSnapshot::finished(4, "SUCCESS"),
            BuildSnapshot::finished(2, "FAILURE"),
        ],
    );

    let records = detector(&source, &cache, &sink)
        .detect("masterA")
        .await
        .unwrap();

    assert_eq!(sink.numbers_for("jobX"), vec![2, 3, 4]);
    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].previous.as_ref().map(|e| e.last_build_number),
        Some(1)
    );

    let entry = cache.get_entry("masterA", "jobX").await.unwrap().unwrap();
    assert_eq!(entry.last_build_number, 4);
    assert!(!entry.building);
}

#[tokio::test]
async fn building_flag_flip_with_same_number_is_a_change() {
    let source = Arc::new(ScriptedSource::new());
    let cache = Arc::new(CountingCache::new());
    let sink = Arc::new(RecordingSink::new());

    cache.set_entry("masterA", "jobX", 3, true).await.unwrap();

    source.set_jobs(
        "masterA",
        vec![Job::new("jobX", Some(BuildSnapshot::finished(3, "FAILURE")))],
    );
    source.set_history(
        "masterA",
        "jobX",
        vec![BuildSnapshot::finished(3, "FAILURE")],
    );

    let records = detector(&source, &cache, &sink)
        .detect("masterA")
        .await
        .unwrap();

    assert_eq!(records.len(), 1);
    // Replay range is empty (cached == current number); only the current
    // snapshot is announced
    assert_eq!(sink.numbers_for("jobX"), vec![3]);
    assert_eq!(sink.events()[0].result, "FAILURE");

    let entry = cache.get_entry("masterA", "jobX").await.unwrap().unwrap();
    assert!(!entry.building);
}

#[tokio::test]
async fn history_fetch_failure_skips_backfill_only() {
    let source = Arc::new(ScriptedSource::new());
    let cache = Arc::new(CountingCache::new());
    let sink = Arc::new(RecordingSink::new());

    cache.set_entry("masterA", "jobX", 1, false).await.unwrap();

    source.set_jobs(
        "masterA",
        vec![Job::new("jobX", Some(BuildSnapshot::finished(4, "SUCCESS")))],
    );
    source.fail_history("masterA", "jobX");

    let records = detector(&source, &cache, &sink)
        .detect("masterA")
        .await
        .unwrap();

    // No backfill, but the current snapshot is still announced and cached
    assert_eq!(sink.numbers_for("jobX"), vec![4]);
    assert_eq!(records.len(), 1);

    let entry = cache.get_entry("masterA", "jobX").await.unwrap().unwrap();
    assert_eq!(entry.last_build_number, 4);
}

#[tokio::test]
async fn sink_failure_does_not_abort_the_cycle() {
    let source = Arc::new(ScriptedSource::new());
    let cache = Arc::new(CountingCache::new());
    let sink = Arc::new(RecordingSink::new());
    sink.fail_publishes();

    source.set_jobs(
        "masterA",
        vec![
            Job::new("jobX", Some(BuildSnapshot::finished(1, "SUCCESS"))),
            Job::new("jobY", Some(BuildSnapshot::finished(7, "FAILURE"))),
        ],
    );

    let records = detector(&source, &cache, &sink)
        .detect("masterA")
        .await
        .unwrap();

    // Both jobs processed and cached despite every publish failing
    assert_eq!(records.len(), 2);
    assert!(cache.get_entry("masterA", "jobX").await.unwrap().is_some());
    assert!(cache.get_entry("masterA", "jobY").await.unwrap().is_some());
}

#[tokio::test]
async fn never_built_job_is_skipped() {
    let source = Arc::new(ScriptedSource::new());
    let cache = Arc::new(CountingCache::new());
    let sink = Arc::new(RecordingSink::new());

    source.set_jobs("masterA", vec![Job::new("jobX", None)]);

    let records = detector(&source, &cache, &sink)
        .detect("masterA")
        .await
        .unwrap();

    assert!(records.is_empty());
    assert!(sink.events().is_empty());
    assert_eq!(cache.write_calls(), 0);
}

#[tokio::test]
async fn in_flight_build_without_result_is_normalized() {
    let source = Arc::new(ScriptedSource::new());
    let cache = Arc::new(CountingCache::new());
    let sink = Arc::new(RecordingSink::new());

    source.set_jobs(
        "masterA",
        vec![Job::new("jobX", Some(BuildSnapshot::in_flight(1)))],
    );

    detector(&source, &cache, &sink)
        .detect("masterA")
        .await
        .unwrap();

    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert!(events[0].building);
    assert_eq!(events[0].result, IN_PROGRESS_RESULT);

    let entry = cache.get_entry("masterA", "jobX").await.unwrap().unwrap();
    assert!(entry.building);
}

#[tokio::test]
async fn master_listing_failure_surfaces_as_error() {
    let source = Arc::new(ScriptedSource::new());
    let cache = Arc::new(CountingCache::new());
    let sink = Arc::new(RecordingSink::new());

    source.fail_master("masterA");

    let result = detector(&source, &cache, &sink).detect("masterA").await;

    assert!(result.is_err());
    assert!(sink.events().is_empty());
    assert_eq!(cache.write_calls(), 0);
}
