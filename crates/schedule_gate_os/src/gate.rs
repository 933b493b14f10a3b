#![forbid(unsafe_code)]

use chrono::{DateTime, FixedOffset};
use schedule_gate_contracts::pending::{format_activation_time, PendingChange};
use schedule_gate_contracts::schedule::Schedule;
use schedule_gate_engines::fingerprint::fingerprint;
use schedule_gate_engines::promotion::{evaluate, remaining_display, PromotionDecision};
use schedule_gate_storage::file_slot::FilePendingSlot;
use schedule_gate_storage::repo::PendingSlotRepo;
use tracing::{debug, error, info};

use crate::clock::{Clock, SystemClock};
use crate::config::GateConfig;
use crate::store::{GateError, PendingChangeStore};

/// Delayed-mutation gate in front of the active blocking schedule.
///
/// Time is only looked at when a method is called; there is no timer thread. Hosts call
/// [`ScheduleGate::promote_if_ready`] as often as they like (once per intercepted request is fine)
/// and install whatever it returns as the live schedule.
///
/// Read-side methods come in two forms. `try_*` returns the backend failure; the plain form logs it
/// and answers "nothing pending", so the interception path never stops on account of the gate.
#[derive(Debug)]
pub struct ScheduleGate<R, C> {
    store: PendingChangeStore<R, C>,
}

impl ScheduleGate<FilePendingSlot, SystemClock> {
    pub fn open_local(config: &GateConfig) -> Self {
        Self::new(FilePendingSlot::new(config.slot_path.clone()), SystemClock)
    }
}

impl<R, C> ScheduleGate<R, C>
where
    R: PendingSlotRepo,
    C: Clock,
{
    pub fn new(repo: R, clock: C) -> Self {
        Self {
            store: PendingChangeStore::new(repo, clock),
        }
    }

    pub fn store(&self) -> &PendingChangeStore<R, C> {
        &self.store
    }

    pub fn propose(
        &self,
        proposed: Schedule,
        current_active: Schedule,
    ) -> Result<DateTime<FixedOffset>, GateError> {
        self.store.propose(proposed, current_active)
    }

    pub fn clear(&self) -> Result<(), GateError> {
        self.store.clear()
    }

    pub fn try_pending(&self) -> Result<Option<PendingChange>, GateError> {
        self.store.exclusive(|| self.store.load_locked())
    }

    pub fn pending(&self) -> Option<PendingChange> {
        self.store.load()
    }

    /// Consumes the pending change once its deadline has passed.
    ///
    /// The slot is deleted before the schedule is handed out; if the delete fails nothing is
    /// returned, so a change can never be promoted twice.
    pub fn try_promote_if_ready(&self) -> Result<Option<Schedule>, GateError> {
        self.try_promote_with(|_| Ok(()))
    }

    /// Promotion that installs the due schedule before the slot is consumed.
    ///
    /// `install` runs inside the exclusive region. If it fails the record stays in place with its
    /// original deadline and the error is returned as [`GateError::Install`].
    pub fn try_promote_with<F>(&self, install: F) -> Result<Option<Schedule>, GateError>
    where
        F: FnOnce(&Schedule) -> std::io::Result<()>,
    {
        self.store.exclusive(|| {
            let Some(pending) = self.store.load_locked()? else {
                return Ok(None);
            };
            let now = self.store.clock().now();
            match evaluate(&pending, now) {
                PromotionDecision::Waiting { remaining } => {
                    debug!(
                        remaining_s = remaining.num_seconds(),
                        "pending schedule not yet due"
                    );
                    Ok(None)
                }
                PromotionDecision::Ready { overdue } => {
                    let promoted_fingerprint = fingerprint(&pending.proposed)?;
                    install(&pending.proposed).map_err(GateError::Install)?;
                    self.store.repo().clear_slot()?;
                    info!(
                        fingerprint = %promoted_fingerprint,
                        activation_time = %format_activation_time(&pending.activation_time),
                        overdue_s = overdue.num_seconds(),
                        "pending schedule promoted"
                    );
                    Ok(Some(pending.proposed))
                }
            }
        })
    }

    pub fn promote_if_ready(&self) -> Option<Schedule> {
        match self.try_promote_if_ready() {
            Ok(promoted) => promoted,
            Err(err) => {
                error!(
                    error = %err,
                    "pending schedule promotion failed; will retry on next check"
                );
                None
            }
        }
    }

    pub fn try_time_remaining(&self) -> Result<Option<String>, GateError> {
        let pending = self.try_pending()?;
        Ok(pending.map(|pending| remaining_display(&pending, self.store.clock().now())))
    }

    /// Human-readable wait for display only; never changes state beyond discarding corruption.
    pub fn time_remaining(&self) -> Option<String> {
        match self.try_time_remaining() {
            Ok(remaining) => remaining,
            Err(err) => {
                error!(error = %err, "pending slot unreadable; no remaining time to report");
                None
            }
        }
    }
}
