#![forbid(unsafe_code)]

use serde::Serialize;
use serde_json::Value;

use crate::{ContractViolation, Validate};

pub const SCHEDULE_FINGERPRINT_HEX_LEN: usize = 64;

/// Blocking policy as supplied by the live configuration source.
///
/// The gate never looks inside a schedule. It only requires the top level to be a JSON object so
/// that a stray scalar or array in the settings file cannot be promoted as a policy.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Schedule(Value);

impl Schedule {
    pub fn v1(value: Value) -> Result<Self, ContractViolation> {
        let schedule = Self(value);
        schedule.validate()?;
        Ok(schedule)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ContractViolation> {
        let value = serde_json::from_str::<Value>(raw).map_err(|err| {
            ContractViolation::Malformed {
                field: "schedule",
                detail: err.to_string(),
            }
        })?;
        Self::v1(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl Validate for Schedule {
    fn validate(&self) -> Result<(), ContractViolation> {
        if !self.0.is_object() {
            return Err(ContractViolation::InvalidValue {
                field: "schedule",
                reason: "must be a JSON object",
            });
        }
        Ok(())
    }
}

/// Lowercase hex SHA-256 of a schedule's canonical encoding.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScheduleFingerprint(String);

impl ScheduleFingerprint {
    pub fn new(hex: impl Into<String>) -> Result<Self, ContractViolation> {
        let fingerprint = Self(hex.into());
        fingerprint.validate()?;
        Ok(fingerprint)
    }

    pub fn from_sha256_digest(digest: &[u8; 32]) -> Self {
        Self(hex::encode(digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ScheduleFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Validate for ScheduleFingerprint {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.0.len() != SCHEDULE_FINGERPRINT_HEX_LEN {
            return Err(ContractViolation::InvalidValue {
                field: "schedule_fingerprint",
                reason: "must be 64 hex characters",
            });
        }
        if !self
            .0
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        {
            return Err(ContractViolation::InvalidValue {
                field: "schedule_fingerprint",
                reason: "must be lowercase hex",
            });
        }
        Ok(())
    }
}
