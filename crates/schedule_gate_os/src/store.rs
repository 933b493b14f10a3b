#![forbid(unsafe_code)]

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, FixedOffset};
use schedule_gate_contracts::pending::{activation_delay, format_activation_time, PendingChange};
use schedule_gate_contracts::schedule::Schedule;
use schedule_gate_contracts::ContractViolation;
use schedule_gate_engines::fingerprint::fingerprint;
use schedule_gate_storage::repo::{PendingSlotRepo, SlotLoad, StorageError};
use tracing::{debug, error, info, warn};

use crate::clock::Clock;

#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("contract violation: {0}")]
    Contract(#[from] ContractViolation),
    #[error("schedule encode failed: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("promoted schedule could not be installed: {0}")]
    Install(#[source] std::io::Error),
}

/// Owner of the single pending-change slot.
///
/// Every read-modify-write runs inside one region: the in-process mutex first, then the backend's
/// exclusive lock, so threads and sibling processes both observe a serial history.
#[derive(Debug)]
pub struct PendingChangeStore<R, C> {
    repo: R,
    clock: C,
    region: Mutex<()>,
}

impl<R, C> PendingChangeStore<R, C>
where
    R: PendingSlotRepo,
    C: Clock,
{
    pub fn new(repo: R, clock: C) -> Self {
        Self {
            repo,
            clock,
            region: Mutex::new(()),
        }
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub(crate) fn exclusive<T>(
        &self,
        op: impl FnOnce() -> Result<T, GateError>,
    ) -> Result<T, GateError> {
        let _guard = self.region.lock().unwrap_or_else(PoisonError::into_inner);
        self.repo.with_slot_exclusive(op)
    }

    /// Raw slot state, distinguishing corrupt from absent and surfacing backend failures.
    pub fn try_load(&self) -> Result<SlotLoad, GateError> {
        self.exclusive(|| Ok(self.repo.load_slot(self.clock.legacy_zone())?))
    }

    /// The pending change, or `None` when absent, corrupt, or unreadable.
    pub fn load(&self) -> Option<PendingChange> {
        match self.exclusive(|| self.load_locked()) {
            Ok(pending) => pending,
            Err(err) => {
                error!(error = %err, "pending slot unreadable; treating as absent");
                None
            }
        }
    }

    /// Reads the slot; a corrupt record is discarded so the gate fails open instead of wedging.
    pub(crate) fn load_locked(&self) -> Result<Option<PendingChange>, GateError> {
        match self.repo.load_slot(self.clock.legacy_zone())? {
            SlotLoad::Present(change) => Ok(Some(change)),
            SlotLoad::Absent => Ok(None),
            SlotLoad::Corrupt { reason } => {
                warn!(%reason, "discarding corrupt pending schedule record");
                if let Err(err) = self.repo.clear_slot() {
                    warn!(error = %err, "failed to discard corrupt pending schedule record");
                }
                Ok(None)
            }
        }
    }

    /// Starts a delay window for `proposed`, or keeps the running one if it is the same schedule.
    pub fn propose(
        &self,
        proposed: Schedule,
        current_active: Schedule,
    ) -> Result<DateTime<FixedOffset>, GateError> {
        self.exclusive(|| {
            let now = self.clock.now();
            let existing = match self.load_locked() {
                Ok(existing) => existing,
                Err(err) => {
                    error!(
                        error = %err,
                        "pending slot unreadable during propose; treating as absent"
                    );
                    None
                }
            };

            let proposed_fingerprint = fingerprint(&proposed)?;
            if let Some(existing) = &existing {
                if fingerprint(&existing.proposed)? == proposed_fingerprint {
                    debug!(
                        fingerprint = %proposed_fingerprint,
                        activation_time = %format_activation_time(&existing.activation_time),
                        "schedule already pending; keeping existing timer"
                    );
                    return Ok(existing.activation_time);
                }
            }

            let mut activation_time = now + activation_delay();
            if let Some(existing) = &existing {
                // A distinct proposal never activates earlier than the deadline it replaces,
                // even when the wall clock stepped backwards since that proposal.
                if existing.activation_time > activation_time {
                    activation_time = existing.activation_time;
                }
            }

            let change = PendingChange::v1(proposed, current_active, activation_time)?;
            self.repo.store_slot(&change)?;
            info!(
                fingerprint = %proposed_fingerprint,
                replaced = existing.is_some(),
                activation_time = %format_activation_time(&activation_time),
                "pending schedule change recorded"
            );
            Ok(activation_time)
        })
    }

    pub fn clear(&self) -> Result<(), GateError> {
        self.exclusive(|| {
            self.repo.clear_slot()?;
            info!("pending schedule change cleared");
            Ok(())
        })
    }
}
