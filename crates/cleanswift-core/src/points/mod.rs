//! Points and leveling.
//!
//! Points are awarded once per completed task; level and badge tier are
//! always derived from the cumulative total and never stored.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::checklist::Checklist;

/// Floor on the minute-based component of an award.
pub const MIN_BASE_POINTS: u64 = 10;
/// Awarded when the session's checklist was fully worked through.
pub const CHECKLIST_BONUS: u64 = 20;
pub const POINTS_PER_LEVEL: u64 = 100;

/// Points earned by one completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsAward {
    pub base: u64,
    pub bonus: u64,
    pub total: u64,
}

impl PointsAward {
    /// `base = max(10, actual_minutes)`; the bonus applies when a checklist
    /// existed and every step is checked.
    pub fn for_completion(actual_minutes: u32, checklist: Option<&Checklist>) -> Self {
        let base = u64::from(actual_minutes).max(MIN_BASE_POINTS);
        let bonus = match checklist {
            Some(list) if list.all_completed() => CHECKLIST_BONUS,
            _ => 0,
        };
        Self {
            base,
            bonus,
            total: base + bonus,
        }
    }
}

/// `floor(points / 100) + 1`.
pub fn level(points: u64) -> u32 {
    u32::try_from(points / POINTS_PER_LEVEL)
        .unwrap_or(u32::MAX - 1)
        .saturating_add(1)
}

/// Points earned inside the current level, out of 100.
pub fn level_progress(points: u64) -> u64 {
    points % POINTS_PER_LEVEL
}

pub fn points_to_next_level(points: u64) -> u64 {
    POINTS_PER_LEVEL - level_progress(points)
}

/// Display tier derived from cumulative points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeTier {
    Beginner,
    Regular,
    Advanced,
    Expert,
    Master,
}

impl BadgeTier {
    /// Inclusive lower bounds, highest first.
    const THRESHOLDS: [(u64, BadgeTier); 4] = [
        (1000, BadgeTier::Master),
        (500, BadgeTier::Expert),
        (200, BadgeTier::Advanced),
        (100, BadgeTier::Regular),
    ];

    pub fn for_points(points: u64) -> Self {
        Self::THRESHOLDS
            .iter()
            .find(|(min, _)| points >= *min)
            .map(|(_, tier)| *tier)
            .unwrap_or(BadgeTier::Beginner)
    }

    pub fn label(self) -> &'static str {
        match self {
            BadgeTier::Beginner => "Beginner",
            BadgeTier::Regular => "Regular Cleaner",
            BadgeTier::Advanced => "Advanced Cleaner",
            BadgeTier::Expert => "Expert Cleaner",
            BadgeTier::Master => "Master Cleaner",
        }
    }

    /// Points needed to reach this tier.
    pub fn min_points(self) -> u64 {
        Self::THRESHOLDS
            .iter()
            .find(|(_, tier)| *tier == self)
            .map(|(min, _)| *min)
            .unwrap_or(0)
    }
}

impl fmt::Display for BadgeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
