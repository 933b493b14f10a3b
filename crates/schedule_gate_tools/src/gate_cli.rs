#![forbid(unsafe_code)]

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::Subcommand;
use schedule_gate_contracts::pending::format_activation_time;
use schedule_gate_contracts::schedule::{Schedule, ScheduleFingerprint};
use schedule_gate_engines::fingerprint::fingerprint;
use schedule_gate_engines::promotion::remaining_display;
use schedule_gate_os::clock::Clock;
use schedule_gate_os::gate::ScheduleGate;
use schedule_gate_storage::file_slot::sync_parent_dir;
use schedule_gate_storage::repo::PendingSlotRepo;
use tracing::info;

pub const NO_PENDING: &str = "no pending change";
pub const NOT_READY: &str = "not ready";

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum GateCommand {
    /// Show the pending change, if any.
    Status,
    /// Start (or keep) a delay window for NEW, remembering ACTIVE as the fallback.
    Propose { new: PathBuf, active: PathBuf },
    /// Print the pending schedule if its delay has elapsed, consuming it.
    Promote,
    /// Cancel the pending change.
    Clear,
    /// Print the canonical fingerprint of a schedule file.
    Fingerprint { file: PathBuf },
    /// Promote a ready change into ACTIVE, then propose LIVE if it differs from ACTIVE.
    Sync { live: PathBuf, active: PathBuf },
}

pub fn execute_gate_command<R, C>(
    gate: &ScheduleGate<R, C>,
    command: &GateCommand,
) -> Result<String, String>
where
    R: PendingSlotRepo,
    C: Clock,
{
    match command {
        GateCommand::Status => status_line(gate),
        GateCommand::Propose { new, active } => {
            let proposed = read_schedule(new)?;
            let current = read_schedule(active)?;
            let applies_at = gate
                .propose(proposed, current)
                .map_err(|e| format!("failed to record pending change: {e}"))?;
            Ok(format_activation_time(&applies_at))
        }
        GateCommand::Promote => {
            let promoted = gate
                .try_promote_if_ready()
                .map_err(|e| format!("failed to promote pending change: {e}"))?;
            match promoted {
                Some(schedule) => render_schedule(&schedule),
                None => Ok(NOT_READY.to_string()),
            }
        }
        GateCommand::Clear => {
            gate.clear()
                .map_err(|e| format!("failed to clear pending change: {e}"))?;
            Ok("OK".to_string())
        }
        GateCommand::Fingerprint { file } => {
            let schedule = read_schedule(file)?;
            Ok(schedule_fingerprint(&schedule)?.to_string())
        }
        GateCommand::Sync { live, active } => sync(gate, live, active),
    }
}

fn sync<R, C>(gate: &ScheduleGate<R, C>, live: &Path, active: &Path) -> Result<String, String>
where
    R: PendingSlotRepo,
    C: Clock,
{
    let mut lines = Vec::new();
    let promoted = gate
        .try_promote_with(|schedule| write_schedule(active, schedule))
        .map_err(|e| {
            format!(
                "failed to promote pending change into {}: {e}",
                active.display()
            )
        })?;
    if let Some(schedule) = promoted {
        info!(active = %active.display(), "promoted schedule written to active file");
        lines.push(format!("promoted {}", schedule_fingerprint(&schedule)?));
    }

    let live_schedule = read_schedule(live)?;
    let active_schedule = read_schedule(active)?;
    if schedule_fingerprint(&live_schedule)? != schedule_fingerprint(&active_schedule)? {
        gate.propose(live_schedule, active_schedule)
            .map_err(|e| format!("failed to record pending change: {e}"))?;
    }
    lines.push(status_line(gate)?);
    Ok(lines.join("\n"))
}

fn status_line<R, C>(gate: &ScheduleGate<R, C>) -> Result<String, String>
where
    R: PendingSlotRepo,
    C: Clock,
{
    let pending = gate
        .try_pending()
        .map_err(|e| format!("failed to read pending change: {e}"))?;
    let Some(pending) = pending else {
        return Ok(NO_PENDING.to_string());
    };
    let remaining = remaining_display(&pending, gate.store().clock().now());
    Ok(format!(
        "pending {} applies at {} ({remaining})",
        schedule_fingerprint(&pending.proposed)?,
        format_activation_time(&pending.activation_time)
    ))
}

fn read_schedule(path: &Path) -> Result<Schedule, String> {
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("failed to read schedule {}: {e}", path.display()))?;
    Schedule::from_json_str(&raw)
        .map_err(|e| format!("invalid schedule {}: {e}", path.display()))
}

fn schedule_fingerprint(schedule: &Schedule) -> Result<ScheduleFingerprint, String> {
    fingerprint(schedule).map_err(|e| format!("failed to fingerprint schedule: {e}"))
}

fn render_schedule(schedule: &Schedule) -> Result<String, String> {
    serde_json::to_string_pretty(schedule.as_value())
        .map_err(|e| format!("failed to encode schedule: {e}"))
}

/// Replaces `path` with the rendered schedule via a synced temp file and rename.
fn write_schedule(path: &Path, schedule: &Schedule) -> io::Result<()> {
    let rendered = serde_json::to_vec_pretty(schedule.as_value())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(format!(".tmp.{}", std::process::id()));
    let tmp = PathBuf::from(tmp);
    let write = || -> io::Result<()> {
        let mut file = File::create(&tmp)?;
        file.write_all(&rendered)?;
        file.sync_all()?;
        fs::rename(&tmp, path)?;
        sync_parent_dir(path)
    };
    write().map_err(|err| {
        let _ = fs::remove_file(&tmp);
        err
    })
}
