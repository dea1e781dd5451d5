//! User profile and its derived display values.

use serde::{Deserialize, Serialize};

use crate::points::{self, BadgeTier};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub owner_id: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    /// Cumulative points. Only ever grows, via the atomic increment.
    #[serde(default)]
    pub points: u64,
}

impl Profile {
    pub fn new(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            display_name: None,
            email: None,
            points: 0,
        }
    }

    pub fn level(&self) -> u32 {
        points::level(self.points)
    }

    pub fn badge(&self) -> BadgeTier {
        BadgeTier::for_points(self.points)
    }

    /// Display name, else the local part of the email, else the owner id.
    pub fn display_name_or_fallback(&self) -> &str {
        self.display_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .or_else(|| {
                self.email
                    .as_deref()
                    .and_then(|email| email.split('@').next())
                    .filter(|local| !local.is_empty())
            })
            .unwrap_or(self.owner_id.as_str())
    }

    /// Up to two uppercase initials of the display name.
    pub fn initials(&self) -> String {
        self.display_name_or_fallback()
            .split_whitespace()
            .filter_map(|word| word.chars().next())
            .take(2)
            .flat_map(char::to_uppercase)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_values() {
        let mut profile = Profile::new("u-1");
        assert_eq!(profile.level(), 1);
        assert_eq!(profile.badge(), BadgeTier::Beginner);
        profile.points = 512;
        assert_eq!(profile.level(), 6);
        assert_eq!(profile.badge(), BadgeTier::Expert);
    }

    #[test]
    fn name_fallback_chain() {
        let mut profile = Profile::new("u-1");
        assert_eq!(profile.display_name_or_fallback(), "u-1");

        profile.email = Some("sam.rivera@example.com".into());
        assert_eq!(profile.display_name_or_fallback(), "sam.rivera");

        profile.display_name = Some("  ".into());
        assert_eq!(profile.display_name_or_fallback(), "sam.rivera");

        profile.display_name = Some("Sam Rivera".into());
        assert_eq!(profile.display_name_or_fallback(), "Sam Rivera");
    }

    #[test]
    fn initials() {
        let mut profile = Profile::new("u-1");
        profile.display_name = Some("sam lee rivera".into());
        assert_eq!(profile.initials(), "SL");
        profile.display_name = Some("Alex".into());
        assert_eq!(profile.initials(), "A");
    }
}
