#![forbid(unsafe_code)]

use chrono::{DateTime, Duration, FixedOffset};
use schedule_gate_contracts::pending::PendingChange;

/// Shown when the deadline has passed but nobody has promoted the change yet.
pub const ACTIVATING_SOON: &str = "applying soon";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromotionDecision {
    /// `now >= activation_time`; `overdue` is zero when promoted exactly on the deadline.
    Ready { overdue: Duration },
    Waiting { remaining: Duration },
}

impl PromotionDecision {
    pub fn is_ready(&self) -> bool {
        matches!(self, PromotionDecision::Ready { .. })
    }
}

pub fn evaluate(pending: &PendingChange, now: DateTime<FixedOffset>) -> PromotionDecision {
    if now >= pending.activation_time {
        PromotionDecision::Ready {
            overdue: now.signed_duration_since(pending.activation_time),
        }
    } else {
        PromotionDecision::Waiting {
            remaining: pending.activation_time.signed_duration_since(now),
        }
    }
}

/// `{H}h {M}m` with at least one whole hour left, `{M}m` otherwise. Components are truncated.
pub fn format_remaining(remaining: Duration) -> String {
    if remaining <= Duration::zero() {
        return ACTIVATING_SOON.to_string();
    }
    let total_seconds = remaining.num_seconds();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

pub fn remaining_display(pending: &PendingChange, now: DateTime<FixedOffset>) -> String {
    match evaluate(pending, now) {
        PromotionDecision::Ready { .. } => ACTIVATING_SOON.to_string(),
        PromotionDecision::Waiting { remaining } => format_remaining(remaining),
    }
}
