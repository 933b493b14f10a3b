#![forbid(unsafe_code)]

use schedule_gate_contracts::schedule::{Schedule, ScheduleFingerprint};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Compact JSON encoding with object keys sorted at every depth.
pub fn canonical_bytes(value: &Value) -> Result<Vec<u8>, serde_json::Error> {
    fn sort(value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                let mut sorted = Map::new();
                for key in keys {
                    sorted.insert(key.clone(), sort(&map[key]));
                }
                Value::Object(sorted)
            }
            Value::Array(items) => Value::Array(items.iter().map(sort).collect()),
            other => other.clone(),
        }
    }
    serde_json::to_vec(&sort(value))
}

pub fn fingerprint_value(value: &Value) -> Result<ScheduleFingerprint, serde_json::Error> {
    let digest: [u8; 32] = Sha256::digest(canonical_bytes(value)?).into();
    Ok(ScheduleFingerprint::from_sha256_digest(&digest))
}

pub fn fingerprint(schedule: &Schedule) -> Result<ScheduleFingerprint, serde_json::Error> {
    fingerprint_value(schedule.as_value())
}
