#![forbid(unsafe_code)]

use std::sync::Arc;
use std::thread;

use chrono::{DateTime, FixedOffset};
use schedule_gate_contracts::pending::{LegacyZone, PendingChange};
use schedule_gate_contracts::schedule::Schedule;
use schedule_gate_storage::memory_slot::InMemoryPendingSlot;
use schedule_gate_storage::repo::{PendingSlotRepo, SlotLoad, StorageError};
use serde_json::json;

fn utc() -> LegacyZone {
    LegacyZone::Fixed(FixedOffset::east_opt(0).unwrap())
}

fn change(counter: u64) -> PendingChange {
    PendingChange::v1(
        Schedule::v1(json!({"counter": counter})).unwrap(),
        Schedule::v1(json!({})).unwrap(),
        DateTime::parse_from_rfc3339("2026-10-19T09:00:00Z").unwrap(),
    )
    .unwrap()
}

#[test]
fn at_mem_db_01_store_counts_writes_and_roundtrips() {
    let slot = InMemoryPendingSlot::new();
    assert_eq!(slot.load_slot(utc()).unwrap(), SlotLoad::Absent);
    slot.store_slot(&change(1)).unwrap();
    slot.store_slot(&change(2)).unwrap();
    assert_eq!(slot.write_count(), 2);
    assert_eq!(slot.load_slot(utc()).unwrap(), SlotLoad::Present(change(2)));
}

#[test]
fn at_mem_db_02_read_failure_is_distinct_from_absent() {
    let slot = InMemoryPendingSlot::new();
    slot.set_fail_reads(true);
    assert!(matches!(
        slot.load_slot(utc()),
        Err(StorageError::Unavailable(_))
    ));
}

#[test]
fn at_mem_db_03_failed_store_keeps_previous_record() {
    let slot = InMemoryPendingSlot::new();
    slot.store_slot(&change(1)).unwrap();
    slot.set_fail_writes(true);
    assert!(slot.store_slot(&change(2)).is_err());
    assert_eq!(slot.write_count(), 1);
    assert_eq!(slot.load_slot(utc()).unwrap(), SlotLoad::Present(change(1)));
}

#[test]
fn at_mem_db_04_garbage_bytes_are_corrupt() {
    let slot = InMemoryPendingSlot::new();
    slot.put_raw(b"not json".to_vec());
    assert!(matches!(
        slot.load_slot(utc()).unwrap(),
        SlotLoad::Corrupt { .. }
    ));
}

#[test]
fn at_mem_db_05_exclusive_region_serializes_threads() {
    let slot = Arc::new(InMemoryPendingSlot::new());
    slot.store_slot(&change(0)).unwrap();
    let workers: Vec<_> = (0..16)
        .map(|_| {
            let slot = Arc::clone(&slot);
            thread::spawn(move || {
                let out: Result<(), StorageError> = slot.with_slot_exclusive(|| {
                    let current = slot.load_slot(utc())?.into_present().unwrap();
                    let counter = current.proposed.as_value()["counter"].as_u64().unwrap();
                    thread::yield_now();
                    slot.store_slot(&change(counter + 1))
                });
                out.unwrap();
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
    let last = slot.load_slot(utc()).unwrap().into_present().unwrap();
    assert_eq!(last.proposed.as_value()["counter"], json!(16));
}
