#![forbid(unsafe_code)]

use chrono::{DateTime, Duration, FixedOffset, Local, NaiveDateTime, SecondsFormat, TimeZone};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schedule::Schedule;
use crate::{ContractViolation, SchemaVersion, Validate};

pub const PENDING_CHANGE_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

/// Cooling-off period between a distinct proposal and its activation.
pub const DELAY_HOURS: i64 = 24;

pub fn activation_delay() -> Duration {
    Duration::hours(DELAY_HOURS)
}

/// The single in-flight schedule change.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingChange {
    pub schema_version: SchemaVersion,
    pub proposed: Schedule,
    pub fallback: Schedule,
    pub activation_time: DateTime<FixedOffset>,
}

impl PendingChange {
    pub fn v1(
        proposed: Schedule,
        fallback: Schedule,
        activation_time: DateTime<FixedOffset>,
    ) -> Result<Self, ContractViolation> {
        let change = Self {
            schema_version: PENDING_CHANGE_CONTRACT_VERSION,
            proposed,
            fallback,
            activation_time,
        };
        change.validate()?;
        Ok(change)
    }

    pub fn to_record(&self) -> PendingChangeRecord {
        PendingChangeRecord {
            schedule: self.proposed.as_value().clone(),
            old_schedule: self.fallback.as_value().clone(),
            applies_at: format_activation_time(&self.activation_time),
        }
    }

    pub fn encode_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(&self.to_record())
    }

    /// Decodes a persisted slot. Offset-less timestamps are placed with `legacy_zone`.
    pub fn decode_json(bytes: &[u8], legacy_zone: LegacyZone) -> Result<Self, ContractViolation> {
        let record = serde_json::from_slice::<PendingChangeRecord>(bytes).map_err(|err| {
            ContractViolation::Malformed {
                field: "pending_change",
                detail: err.to_string(),
            }
        })?;
        Self::from_record(record, legacy_zone)
    }

    pub fn from_record(
        record: PendingChangeRecord,
        legacy_zone: LegacyZone,
    ) -> Result<Self, ContractViolation> {
        let activation_time = parse_activation_time(&record.applies_at, legacy_zone)?;
        Self::v1(
            Schedule::v1(record.schedule)?,
            Schedule::v1(record.old_schedule)?,
            activation_time,
        )
    }
}

impl Validate for PendingChange {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != PENDING_CHANGE_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "pending_change.schema_version",
                reason: "must match PENDING_CHANGE_CONTRACT_VERSION",
            });
        }
        self.proposed.validate()?;
        self.fallback.validate()?;
        Ok(())
    }
}

/// On-disk shape of the slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PendingChangeRecord {
    pub schedule: Value,
    pub old_schedule: Value,
    pub applies_at: String,
}

/// Where an `applies_at` written without an offset sits on the timeline.
///
/// Older writers stored naive local wall time. `SystemLocal` resolves it with the host zone rules
/// for that date, so a record written before a DST switch keeps its wall-clock deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyZone {
    SystemLocal,
    Fixed(FixedOffset),
}

impl LegacyZone {
    /// Ambiguous wall times (clocks turned back) take the earlier instant; skipped ones are `None`.
    pub fn resolve(self, naive: NaiveDateTime) -> Option<DateTime<FixedOffset>> {
        match self {
            LegacyZone::SystemLocal => Local
                .from_local_datetime(&naive)
                .earliest()
                .map(DateTime::<FixedOffset>::from),
            LegacyZone::Fixed(offset) => offset.from_local_datetime(&naive).single(),
        }
    }
}

impl From<FixedOffset> for LegacyZone {
    fn from(offset: FixedOffset) -> Self {
        LegacyZone::Fixed(offset)
    }
}

pub fn format_activation_time(at: &DateTime<FixedOffset>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, false)
}

pub fn parse_activation_time(
    raw: &str,
    legacy_zone: LegacyZone,
) -> Result<DateTime<FixedOffset>, ContractViolation> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at);
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").map_err(|err| {
        ContractViolation::Malformed {
            field: "pending_change.applies_at",
            detail: format!("{raw:?}: {err}"),
        }
    })?;
    legacy_zone
        .resolve(naive)
        .ok_or(ContractViolation::InvalidValue {
            field: "pending_change.applies_at",
            reason: "must map to a single instant",
        })
}
