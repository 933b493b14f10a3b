#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use schedule_gate_contracts::pending::{LegacyZone, PendingChange};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("pending slot {op} failed at {path:?}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("pending slot lock failed at {path:?}: {source}")]
    Lock {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("pending slot encode failed: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("pending slot backend unavailable: {0}")]
    Unavailable(String),
}

/// Result of reading the slot when the backend itself answered.
///
/// Backend failures (permission denied, lock timeout, ...) are `Err(StorageError)` instead, so a
/// caller can tell "nothing is pending" apart from "could not look".
#[derive(Debug, Clone, PartialEq)]
pub enum SlotLoad {
    Absent,
    Corrupt { reason: String },
    Present(PendingChange),
}

impl SlotLoad {
    pub fn decode(bytes: &[u8], legacy_zone: LegacyZone) -> Self {
        match PendingChange::decode_json(bytes, legacy_zone) {
            Ok(change) => SlotLoad::Present(change),
            Err(violation) => SlotLoad::Corrupt {
                reason: violation.to_string(),
            },
        }
    }

    pub fn into_present(self) -> Option<PendingChange> {
        match self {
            SlotLoad::Present(change) => Some(change),
            SlotLoad::Absent | SlotLoad::Corrupt { .. } => None,
        }
    }
}

/// Typed repository interface for the single pending-change slot.
///
/// Implementations must make `store_slot` an atomic replace: a concurrent reader sees either the
/// previous record or the new one, never a mix.
pub trait PendingSlotRepo: Send + Sync {
    fn load_slot(&self, legacy_zone: LegacyZone) -> Result<SlotLoad, StorageError>;
    fn store_slot(&self, change: &PendingChange) -> Result<(), StorageError>;

    /// Idempotent; an already-empty slot is not an error.
    fn clear_slot(&self) -> Result<(), StorageError>;

    /// Runs `op` while holding the backend's exclusive lock on the slot.
    fn with_slot_exclusive<T, E, F>(&self, op: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<StorageError>;
}

impl<R: PendingSlotRepo> PendingSlotRepo for Arc<R> {
    fn load_slot(&self, legacy_zone: LegacyZone) -> Result<SlotLoad, StorageError> {
        (**self).load_slot(legacy_zone)
    }

    fn store_slot(&self, change: &PendingChange) -> Result<(), StorageError> {
        (**self).store_slot(change)
    }

    fn clear_slot(&self) -> Result<(), StorageError> {
        (**self).clear_slot()
    }

    fn with_slot_exclusive<T, E, F>(&self, op: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<StorageError>,
    {
        (**self).with_slot_exclusive(op)
    }
}
