#![forbid(unsafe_code)]

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use chrono::{DateTime, Duration, FixedOffset};
use schedule_gate_contracts::schedule::Schedule;
use schedule_gate_os::clock::ManualClock;
use schedule_gate_os::config::GateConfig;
use schedule_gate_os::gate::ScheduleGate;
use schedule_gate_storage::file_slot::FilePendingSlot;
use serde_json::json;

type FileGate = ScheduleGate<FilePendingSlot, Arc<ManualClock>>;

fn t0() -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339("2026-03-01T08:30:00+01:00").unwrap()
}

fn schedule(value: serde_json::Value) -> Schedule {
    Schedule::v1(value).unwrap()
}

fn open(path: &Path, clock: &Arc<ManualClock>) -> FileGate {
    ScheduleGate::new(FilePendingSlot::new(path), Arc::clone(clock))
}

#[test]
fn at_gate_file_01_scenario_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state").join("pending_schedule.json");
    let clock = Arc::new(ManualClock::new(t0()));

    let applies_at = open(&path, &clock)
        .propose(
            schedule(json!({"blocked": ["a.com"]})),
            schedule(json!({"blocked": []})),
        )
        .unwrap();
    assert_eq!(applies_at, t0() + Duration::hours(24));
    assert!(path.exists());

    clock.set(t0() + Duration::hours(23) + Duration::minutes(59));
    let reopened = open(&path, &clock);
    assert_eq!(reopened.promote_if_ready(), None);
    assert_eq!(reopened.time_remaining().as_deref(), Some("1m"));

    clock.set(t0() + Duration::hours(24));
    let reopened = open(&path, &clock);
    assert_eq!(
        reopened.promote_if_ready(),
        Some(schedule(json!({"blocked": ["a.com"]})))
    );
    assert!(!path.exists());
    assert_eq!(open(&path, &clock).promote_if_ready(), None);
}

#[test]
fn at_gate_file_02_record_uses_documented_field_names() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pending_schedule.json");
    let clock = Arc::new(ManualClock::new(t0()));
    open(&path, &clock)
        .propose(schedule(json!({"v": 1})), schedule(json!({"v": 0})))
        .unwrap();

    let raw: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
    assert_eq!(raw["schedule"], json!({"v": 1}));
    assert_eq!(raw["old_schedule"], json!({"v": 0}));
    let applies_at = raw["applies_at"].as_str().unwrap();
    assert_eq!(
        DateTime::parse_from_rfc3339(applies_at).unwrap(),
        t0() + Duration::hours(24)
    );
}

#[test]
fn at_gate_file_03_corrupt_file_is_discarded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pending_schedule.json");
    fs::write(&path, b"not json at all").unwrap();
    let clock = Arc::new(ManualClock::new(t0()));
    let gate = open(&path, &clock);

    assert_eq!(gate.time_remaining(), None);
    assert!(!path.exists());
    assert_eq!(gate.promote_if_ready(), None);
}

#[test]
fn at_gate_file_04_legacy_naive_timestamp_reads_in_local_offset() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pending_schedule.json");
    fs::write(
        &path,
        br#"{"schedule":{"v":1},"old_schedule":{},"applies_at":"2026-03-02T08:30:00.250000"}"#,
    )
    .unwrap();
    let clock = Arc::new(ManualClock::new(t0()));
    let gate = open(&path, &clock);

    let pending = gate.pending().unwrap();
    assert_eq!(
        pending.activation_time,
        DateTime::parse_from_rfc3339("2026-03-02T08:30:00.25+01:00").unwrap()
    );
    assert_eq!(gate.time_remaining().as_deref(), Some("24h 0m"));

    clock.set(pending.activation_time);
    assert_eq!(gate.promote_if_ready(), Some(schedule(json!({"v": 1}))));
}

#[test]
fn at_gate_file_05_separate_handles_share_one_slot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pending_schedule.json");
    let clock = Arc::new(ManualClock::new(t0()));
    open(&path, &clock)
        .propose(schedule(json!({"v": 1})), schedule(json!({})))
        .unwrap();
    clock.advance(Duration::hours(24));

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let path = path.clone();
            let clock = Arc::clone(&clock);
            thread::spawn(move || open(&path, &clock).promote_if_ready())
        })
        .collect();
    let promoted = workers
        .into_iter()
        .filter_map(|worker| worker.join().unwrap())
        .count();
    assert_eq!(promoted, 1);
}

#[test]
fn at_gate_file_06_clear_on_fresh_location_is_ok() {
    let dir = tempfile::tempdir().unwrap();
    let config = GateConfig::for_path(dir.path().join("nested").join("pending_schedule.json"));
    let gate = ScheduleGate::open_local(&config);
    gate.clear().unwrap();
    assert_eq!(gate.pending(), None);
    assert_eq!(gate.time_remaining(), None);
}
