//! Leaderboard ranking.
//!
//! Read-only view over all profiles: points descending, ties broken by owner
//! id ascending so the order is total and deterministic.

use serde::{Deserialize, Serialize};

use crate::points::BadgeTier;
use crate::profile::Profile;

/// Rows the product shows by default.
pub const DEFAULT_LIMIT: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    /// 1-based
    pub rank: usize,
    pub profile: Profile,
    pub level: u32,
    pub badge: BadgeTier,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Leaderboard {
    entries: Vec<LeaderboardEntry>,
}

impl Leaderboard {
    pub fn rank(profiles: &[Profile]) -> Self {
        let mut sorted: Vec<&Profile> = profiles.iter().collect();
        sorted.sort_by(|a, b| {
            b.points
                .cmp(&a.points)
                .then_with(|| a.owner_id.cmp(&b.owner_id))
        });
        let entries = sorted
            .into_iter()
            .enumerate()
            .map(|(i, profile)| LeaderboardEntry {
                rank: i + 1,
                level: profile.level(),
                badge: profile.badge(),
                profile: profile.clone(),
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[LeaderboardEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn top(&self, n: usize) -> &[LeaderboardEntry] {
        &self.entries[..n.min(self.entries.len())]
    }

    /// `None` means unranked.
    pub fn rank_of(&self, owner_id: &str) -> Option<usize> {
        self.entry_for(owner_id).map(|entry| entry.rank)
    }

    pub fn entry_for(&self, owner_id: &str) -> Option<&LeaderboardEntry> {
        self.entries
            .iter()
            .find(|entry| entry.profile.owner_id == owner_id)
    }
}
