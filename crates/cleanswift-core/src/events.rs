use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::checklist::ChecklistState;
use crate::points::PointsAward;
use crate::task::gate::GateStatus;
use crate::task::TaskStatus;

/// Every state change in a focus session produces an Event.
/// Front ends subscribe to them through the session controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    SessionOpened {
        session_id: String,
        task_id: String,
        at: DateTime<Utc>,
    },
    /// Task moved from pending to in_progress.
    TaskStarted {
        task_id: String,
        at: DateTime<Utc>,
    },
    ClockStarted {
        elapsed_secs: u64,
        at: DateTime<Utc>,
    },
    ClockPaused {
        elapsed_secs: u64,
        at: DateTime<Utc>,
    },
    ClockTicked {
        elapsed_secs: u64,
        at: DateTime<Utc>,
    },
    ChecklistReady {
        session_id: String,
        step_count: usize,
        at: DateTime<Utc>,
    },
    /// Analysis failed; the session continues without a checklist.
    ChecklistUnavailable {
        session_id: String,
        reason: String,
        at: DateTime<Utc>,
    },
    StepToggled {
        index: usize,
        completed: bool,
        remaining: usize,
        at: DateTime<Utc>,
    },
    TaskCompleted {
        task_id: String,
        actual_minutes: u32,
        at: DateTime<Utc>,
    },
    PointsAwarded {
        owner_id: String,
        award: PointsAward,
        total_points: u64,
        level: u32,
        at: DateTime<Utc>,
    },
    SessionExited {
        session_id: String,
        task_id: String,
        elapsed_secs: u64,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        task_id: String,
        status: TaskStatus,
        elapsed_secs: u64,
        running: bool,
        progress_percent: u8,
        checklist: ChecklistState,
        gate: GateStatus,
        at: DateTime<Utc>,
    },
}
