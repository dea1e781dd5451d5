//! Task model and lifecycle state machine.
//!
//! A task moves through a strictly linear lifecycle:
//!
//! ```text
//!   PENDING ──start──> IN_PROGRESS ──complete (gated)──> COMPLETED
//! ```
//!
//! There is no way back: a completed task cannot be restarted and a pending
//! task cannot be completed without passing through `in_progress`.
//! Completion additionally requires the [`gate::CompletionGate`] to hold.

pub mod gate;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{SessionError, ValidationError};
use gate::{CompletionGate, SessionEvidence};

/// Task status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Captured but not yet worked on (initial state)
    #[default]
    Pending,
    /// A focus session may be opened on it
    InProgress,
    /// Terminal
    Completed,
}

impl TaskStatus {
    /// Check if a transition is valid.
    pub fn can_transition_to(&self, to: &TaskStatus) -> bool {
        matches!(
            (self, to),
            (TaskStatus::Pending, TaskStatus::InProgress)
                | (TaskStatus::InProgress, TaskStatus::Completed)
        )
    }

    /// Get valid next states for this state.
    pub fn valid_transitions(&self) -> &[TaskStatus] {
        match self {
            TaskStatus::Pending => &[TaskStatus::InProgress],
            TaskStatus::InProgress => &[TaskStatus::Completed],
            TaskStatus::Completed => &[],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "in_progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            other => Err(ValidationError::InvalidValue {
                field: "status".into(),
                message: format!("unknown status '{other}'"),
            }),
        }
    }
}

/// Task priority. Serialized as its numeric rank (1 = high).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(try_from = "u8", into = "u8")]
pub enum Priority {
    High = 1,
    Medium = 2,
    Low = 3,
}

impl Priority {
    pub fn rank(self) -> u8 {
        self as u8
    }

    pub fn label(self) -> &'static str {
        match self {
            Priority::High => "High",
            Priority::Medium => "Medium",
            Priority::Low => "Low",
        }
    }
}

impl TryFrom<u8> for Priority {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Priority::High),
            2 => Ok(Priority::Medium),
            3 => Ok(Priority::Low),
            other => Err(ValidationError::InvalidValue {
                field: "priority".into(),
                message: format!("expected 1, 2 or 3, got {other}"),
            }),
        }
    }
}

impl From<Priority> for u8 {
    fn from(p: Priority) -> Self {
        p.rank()
    }
}

/// A cleaning chore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier
    pub id: String,
    /// Owning user
    pub owner_id: String,
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub status: TaskStatus,
    /// Estimated duration in minutes
    pub estimated_minutes: Option<u32>,
    /// Actual duration in minutes, set only on completion
    pub actual_minutes: Option<u32>,
    /// Photo of the room (data URL or http(s) URL)
    pub image_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Set only on completion
    pub completed_at: Option<DateTime<Utc>>,
    /// Optimistic concurrency counter, bumped by every successful save
    #[serde(default)]
    pub version: u32,
}

impl Task {
    /// Create a pending task with a fresh id.
    pub fn new(owner_id: impl Into<String>, title: impl Into<String>) -> Self {
        Task {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.into(),
            title: title.into(),
            description: None,
            priority: None,
            status: TaskStatus::Pending,
            estimated_minutes: None,
            actual_minutes: None,
            image_ref: None,
            created_at: Utc::now(),
            completed_at: None,
            version: 0,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    /// Check the record-level invariants.
    ///
    /// Actual duration and completion timestamp are present if and only if
    /// the task is completed.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        let completion_fields = (self.actual_minutes.is_some(), self.completed_at.is_some());
        let consistent = match self.status {
            TaskStatus::Completed => completion_fields == (true, true),
            _ => completion_fields == (false, false),
        };
        if !consistent {
            return Err(ValidationError::InconsistentCompletion {
                task_id: self.id.clone(),
                status: self.status,
            });
        }
        Ok(())
    }
}

/// Title for a photo task whose file name gives nothing usable.
pub const PHOTO_TASK_TITLE: &str = "Clean Room";
/// Estimate given to photo tasks.
pub const PHOTO_TASK_ESTIMATE_MINUTES: u32 = 30;
pub const PHOTO_TASK_DESCRIPTION: &str =
    "This room will be analyzed with AI when you start the task.";

/// Builder for captured tasks, typed in by hand or created from a photo.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    owner_id: String,
    title: String,
    description: Option<String>,
    priority: Option<Priority>,
    estimated_minutes: Option<u32>,
    image_ref: Option<String>,
}

impl NewTask {
    pub fn new(owner_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            title: title.into(),
            ..Default::default()
        }
    }

    /// A high-priority task around a room photo. The checklist is produced
    /// from the photo when a session opens. The title comes from the file
    /// name, with `-` and `_` read as spaces.
    pub fn from_photo(owner_id: impl Into<String>, image_ref: impl Into<String>) -> Self {
        let image_ref = image_ref.into();
        Self {
            owner_id: owner_id.into(),
            title: photo_title(&image_ref),
            description: Some(PHOTO_TASK_DESCRIPTION.to_string()),
            priority: Some(Priority::High),
            estimated_minutes: Some(PHOTO_TASK_ESTIMATE_MINUTES),
            image_ref: Some(image_ref),
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        let description = description.into();
        self.description = (!description.trim().is_empty()).then_some(description);
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn estimated_minutes(mut self, minutes: u32) -> Self {
        self.estimated_minutes = Some(minutes);
        self
    }

    pub fn image_ref(mut self, image_ref: impl Into<String>) -> Self {
        self.image_ref = Some(image_ref.into());
        self
    }

    pub fn build(self) -> Result<Task, ValidationError> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        if self.estimated_minutes == Some(0) {
            return Err(ValidationError::InvalidValue {
                field: "estimated_minutes".into(),
                message: "must be at least 1".into(),
            });
        }
        let mut task = Task::new(self.owner_id, title);
        task.description = self.description;
        task.priority = self.priority;
        task.estimated_minutes = self.estimated_minutes;
        task.image_ref = self.image_ref;
        Ok(task)
    }
}

fn photo_title(image_ref: &str) -> String {
    if image_ref.starts_with("data:") {
        return PHOTO_TASK_TITLE.to_string();
    }
    let path = image_ref.split(['?', '#']).next().unwrap_or_default();
    let file_name = path.rsplit(['/', '\\']).next().unwrap_or_default();
    let stem = file_name.split('.').next().unwrap_or_default();
    let title = stem.replace(['-', '_'], " ");
    let title = title.trim();
    if title.is_empty() {
        PHOTO_TASK_TITLE.to_string()
    } else {
        title.to_string()
    }
}

/// User-facing lifecycle operation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleAction {
    /// PENDING → IN_PROGRESS
    Start,
    /// IN_PROGRESS → COMPLETED (gated)
    Complete,
}

impl LifecycleAction {
    fn target(self) -> TaskStatus {
        match self {
            LifecycleAction::Start => TaskStatus::InProgress,
            LifecycleAction::Complete => TaskStatus::Completed,
        }
    }
}

impl fmt::Display for LifecycleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleAction::Start => write!(f, "start"),
            LifecycleAction::Complete => write!(f, "complete"),
        }
    }
}

/// Entry in state transition history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionEntry {
    pub from: TaskStatus,
    pub to: TaskStatus,
    pub action: LifecycleAction,
    pub at: DateTime<Utc>,
}

/// Task state machine wrapper with transition history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskLifecycle {
    task: Task,
    #[serde(default)]
    history: Vec<TransitionEntry>,
}

impl TaskLifecycle {
    pub fn new(task: Task) -> Self {
        TaskLifecycle {
            task,
            history: Vec::new(),
        }
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn into_task(self) -> Task {
        self.task
    }

    /// Adopt the stored copy returned by a save (same record, newer version).
    pub(crate) fn sync_stored(&mut self, stored: Task) {
        debug_assert_eq!(stored.id, self.task.id);
        self.task = stored;
    }

    pub fn status(&self) -> TaskStatus {
        self.task.status
    }

    pub fn history(&self) -> &[TransitionEntry] {
        &self.history
    }

    /// Actions the current status permits (the completion gate is not consulted).
    pub fn available_actions(&self) -> Vec<LifecycleAction> {
        match self.task.status {
            TaskStatus::Pending => vec![LifecycleAction::Start],
            TaskStatus::InProgress => vec![LifecycleAction::Complete],
            TaskStatus::Completed => vec![],
        }
    }

    /// PENDING → IN_PROGRESS. Does not touch any clock.
    pub fn start(&mut self) -> Result<(), SessionError> {
        self.ensure_allowed(LifecycleAction::Start)?;
        self.apply(LifecycleAction::Start, Utc::now());
        Ok(())
    }

    /// IN_PROGRESS → COMPLETED, if the gate holds for `evidence`.
    ///
    /// Status is checked before the gate, so completing a pending task always
    /// reports `InvalidTransition`. Returns the recorded actual minutes.
    pub fn complete(
        &mut self,
        gate: &CompletionGate,
        evidence: &SessionEvidence<'_>,
        now: DateTime<Utc>,
    ) -> Result<u32, SessionError> {
        self.ensure_allowed(LifecycleAction::Complete)?;
        gate.check(evidence)?;

        let actual_minutes = u32::try_from(evidence.elapsed_secs.div_ceil(60)).unwrap_or(u32::MAX);
        self.task.actual_minutes = Some(actual_minutes);
        self.task.completed_at = Some(now);
        self.apply(LifecycleAction::Complete, now);
        Ok(actual_minutes)
    }

    fn ensure_allowed(&self, action: LifecycleAction) -> Result<(), SessionError> {
        if self.task.status.can_transition_to(&action.target()) {
            Ok(())
        } else {
            Err(SessionError::InvalidTransition {
                from: self.task.status,
                action,
            })
        }
    }

    fn apply(&mut self, action: LifecycleAction, at: DateTime<Utc>) {
        let from = self.task.status;
        let to = action.target();
        self.task.status = to;
        tracing::info!(task_id = %self.task.id, %from, %to, "task transition");
        self.history.push(TransitionEntry { from, to, action, at });
    }
}

impl From<Task> for TaskLifecycle {
    fn from(task: Task) -> Self {
        Self::new(task)
    }
}
