#![forbid(unsafe_code)]

use std::env;
use std::path::PathBuf;

pub const PENDING_PATH_ENV: &str = "SCHEDULE_GATE_PENDING_PATH";

const APP_DIR: &str = "schedule_gate";
const PENDING_FILE_NAME: &str = "pending_schedule.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateConfig {
    pub slot_path: PathBuf,
}

impl GateConfig {
    pub fn default_local() -> Self {
        let slot_path = env::var_os(PENDING_PATH_ENV)
            .filter(|raw| !raw.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_slot_path);
        Self { slot_path }
    }

    pub fn for_path(slot_path: impl Into<PathBuf>) -> Self {
        Self {
            slot_path: slot_path.into(),
        }
    }
}

fn default_slot_path() -> PathBuf {
    if let Some(state_home) = env::var_os("XDG_STATE_HOME").filter(|raw| !raw.is_empty()) {
        return PathBuf::from(state_home).join(APP_DIR).join(PENDING_FILE_NAME);
    }
    if let Some(home) = env::var_os("HOME").filter(|raw| !raw.is_empty()) {
        return PathBuf::from(home)
            .join(".local")
            .join("state")
            .join(APP_DIR)
            .join(PENDING_FILE_NAME);
    }
    PathBuf::from(format!(".{APP_DIR}")).join(PENDING_FILE_NAME)
}
