#![forbid(unsafe_code)]

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, FixedOffset, Local};
use schedule_gate_contracts::pending::LegacyZone;

/// Single source of "now" for every deadline decision.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Wall-clock time carrying the offset it was observed in.
    fn now(&self) -> DateTime<FixedOffset>;

    /// Zone for stored timestamps that carry no offset.
    fn legacy_zone(&self) -> LegacyZone {
        LegacyZone::Fixed(*self.now().offset())
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> DateTime<FixedOffset> {
        (**self).now()
    }

    fn legacy_zone(&self) -> LegacyZone {
        (**self).legacy_zone()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().into()
    }

    fn legacy_zone(&self) -> LegacyZone {
        LegacyZone::SystemLocal
    }
}

/// Hand-driven clock for tests and replay.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<FixedOffset>>,
}

impl ManualClock {
    pub fn new(start: DateTime<FixedOffset>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, at: DateTime<FixedOffset>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = at;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now = *now + by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<FixedOffset> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
