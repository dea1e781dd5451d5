//! Task analytics.
//!
//! Summaries over a user's task list for a time window: counts per status,
//! completion rate, focused minutes and the most recent completions with
//! their actual vs estimated minutes.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::ValidationError;
use crate::task::{Task, TaskStatus};

/// Number of recent completions reported.
const RECENT_LIMIT: usize = 5;
/// Titles longer than this are cut and suffixed with "...".
const TITLE_WIDTH: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeRange {
    #[default]
    Week,
    Month,
    All,
}

impl TimeRange {
    /// Earliest instant inside the range, `None` for all time.
    pub fn start(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            TimeRange::Week => Some(now - Duration::days(7)),
            TimeRange::Month => Some(now - Duration::days(30)),
            TimeRange::All => None,
        }
    }

    /// Tasks are placed in time by completion, falling back to creation.
    pub fn contains(self, task: &Task, now: DateTime<Utc>) -> bool {
        let at = task.completed_at.unwrap_or(task.created_at);
        match self.start(now) {
            Some(start) => at >= start && at <= now,
            None => true,
        }
    }
}

impl FromStr for TimeRange {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "week" => Ok(TimeRange::Week),
            "month" => Ok(TimeRange::Month),
            "all" => Ok(TimeRange::All),
            other => Err(ValidationError::InvalidValue {
                field: "range".into(),
                message: format!("expected week, month or all, got '{other}'"),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentCompletion {
    pub label: String,
    pub actual_minutes: u32,
    pub estimated_minutes: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStats {
    pub range: TimeRange,
    pub total: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    /// Rounded percent, 0 when there are no tasks.
    pub completion_rate: u32,
    pub total_minutes: u64,
    pub recent: Vec<RecentCompletion>,
}

impl TaskStats {
    pub fn compute(tasks: &[Task], range: TimeRange, now: DateTime<Utc>) -> Self {
        let in_range: Vec<&Task> = tasks.iter().filter(|t| range.contains(t, now)).collect();
        let count = |status: TaskStatus| in_range.iter().filter(|t| t.status == status).count();

        let mut completed: Vec<&Task> = in_range
            .iter()
            .copied()
            .filter(|t| t.status == TaskStatus::Completed)
            .collect();
        completed.sort_by_key(|t| t.completed_at);

        let total = in_range.len();
        let completion_rate = if total == 0 {
            0
        } else {
            ((completed.len() as f64 / total as f64) * 100.0).round() as u32
        };
        let total_minutes = completed
            .iter()
            .map(|t| u64::from(t.actual_minutes.unwrap_or(0)))
            .sum();
        let recent = completed
            .iter()
            .rev()
            .take(RECENT_LIMIT)
            .rev()
            .map(|t| RecentCompletion {
                label: truncate_title(&t.title),
                actual_minutes: t.actual_minutes.unwrap_or(0),
                estimated_minutes: t.estimated_minutes.unwrap_or(0),
            })
            .collect();

        Self {
            range,
            total,
            pending: count(TaskStatus::Pending),
            in_progress: count(TaskStatus::InProgress),
            completed: completed.len(),
            completion_rate,
            total_minutes,
            recent,
        }
    }
}

fn truncate_title(title: &str) -> String {
    if title.chars().count() > TITLE_WIDTH {
        let cut: String = title.chars().take(TITLE_WIDTH).collect();
        format!("{cut}...")
    } else {
        title.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(title: &str, status: TaskStatus, age_days: i64, now: DateTime<Utc>) -> Task {
        let mut task = Task::new("u-1", title);
        task.created_at = now - Duration::days(age_days);
        task.status = status;
        if status == TaskStatus::Completed {
            task.completed_at = Some(task.created_at);
            task.actual_minutes = Some(12);
            task.estimated_minutes = Some(15);
        }
        task
    }

    #[test]
    fn week_window_filters_by_completion_or_creation() {
        let now = Utc::now();
        let tasks = vec![
            task("fresh", TaskStatus::Completed, 1, now),
            task("pending", TaskStatus::Pending, 2, now),
            task("working", TaskStatus::InProgress, 3, now),
            task("old", TaskStatus::Completed, 20, now),
            task("ancient", TaskStatus::Completed, 90, now),
        ];

        let week = TaskStats::compute(&tasks, TimeRange::Week, now);
        assert_eq!(week.total, 3);
        assert_eq!(week.completed, 1);
        assert_eq!(week.pending, 1);
        assert_eq!(week.in_progress, 1);
        assert_eq!(week.completion_rate, 33);
        assert_eq!(week.total_minutes, 12);

        let month = TaskStats::compute(&tasks, TimeRange::Month, now);
        assert_eq!(month.total, 4);
        assert_eq!(month.completion_rate, 50);

        let all = TaskStats::compute(&tasks, TimeRange::All, now);
        assert_eq!(all.completed, 3);
        assert_eq!(all.total_minutes, 36);
    }

    #[test]
    fn empty_list_has_zero_rate() {
        let stats = TaskStats::compute(&[], TimeRange::All, Utc::now());
        assert_eq!(stats.completion_rate, 0);
        assert!(stats.recent.is_empty());
    }

    #[test]
    fn recent_keeps_last_five_and_truncates_titles() {
        let now = Utc::now();
        let tasks: Vec<Task> = (0..7)
            .map(|i| task(&format!("Clean shelf number {i}"), TaskStatus::Completed, 7 - i, now))
            .collect();
        let stats = TaskStats::compute(&tasks, TimeRange::All, now);
        assert_eq!(stats.recent.len(), 5);
        assert_eq!(stats.recent[0].label, "Clean shelf num...");
        assert_eq!(stats.recent[0].estimated_minutes, 15);

        assert_eq!(truncate_title("Kitchen"), "Kitchen");
    }

    #[test]
    fn range_parsing() {
        assert_eq!("Month".parse::<TimeRange>().unwrap(), TimeRange::Month);
        assert!("year".parse::<TimeRange>().is_err());
    }
}
