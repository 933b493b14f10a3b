#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use schedule_gate_contracts::pending::{LegacyZone, PendingChange};

use crate::repo::{PendingSlotRepo, SlotLoad, StorageError};

/// In-memory slot holding the encoded record, so corrupt bytes and failing writes can be staged.
#[derive(Debug, Default)]
pub struct InMemoryPendingSlot {
    bytes: Mutex<Option<Vec<u8>>>,
    exclusive: Mutex<()>,
    writes: AtomicUsize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl InMemoryPendingSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_raw(&self, raw: impl Into<Vec<u8>>) {
        *self.bytes.lock().unwrap_or_else(PoisonError::into_inner) = Some(raw.into());
    }

    pub fn raw(&self) -> Option<Vec<u8>> {
        self.bytes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_empty(&self) -> bool {
        self.raw().is_none()
    }

    /// Successful `store_slot` calls so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes `store_slot` and `clear_slot` fail as a full or read-only disk would.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable(
                "in-memory slot is read-only".to_string(),
            ));
        }
        Ok(())
    }
}

impl PendingSlotRepo for InMemoryPendingSlot {
    fn load_slot(&self, legacy_zone: LegacyZone) -> Result<SlotLoad, StorageError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable(
                "in-memory slot is unreadable".to_string(),
            ));
        }
        Ok(match self.raw() {
            Some(bytes) => SlotLoad::decode(&bytes, legacy_zone),
            None => SlotLoad::Absent,
        })
    }

    fn store_slot(&self, change: &PendingChange) -> Result<(), StorageError> {
        self.check_writable()?;
        let serialized = change.encode_json()?;
        self.put_raw(serialized);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn clear_slot(&self) -> Result<(), StorageError> {
        self.check_writable()?;
        *self.bytes.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }

    fn with_slot_exclusive<T, E, F>(&self, op: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<StorageError>,
    {
        let _guard = self.exclusive.lock().unwrap_or_else(PoisonError::into_inner);
        op()
    }
}
