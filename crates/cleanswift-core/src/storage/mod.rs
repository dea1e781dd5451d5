mod config;
pub mod database;

pub use config::{AiConfig, Config, SessionConfig, UserConfig};
pub use database::Database;

use std::path::PathBuf;

use crate::error::{ConfigError, PersistenceError};
use crate::profile::Profile;
use crate::task::Task;

/// Returns the data directory, creating it if needed.
///
/// `CLEANSWIFT_DATA_DIR` overrides the location entirely. Otherwise this is
/// `~/.config/cleanswift[-dev]/`, with `CLEANSWIFT_ENV=dev` selecting the
/// development directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("CLEANSWIFT_DATA_DIR") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env =
                std::env::var("CLEANSWIFT_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("cleanswift-dev")
            } else {
                base_dir.join("cleanswift")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Task persistence collaborator.
pub trait TaskStore: Send + Sync {
    fn create_task(&self, task: &Task) -> Result<Task, PersistenceError>;

    fn load_task(&self, id: &str) -> Result<Task, PersistenceError>;

    /// Write `task` if the stored row still has `task.version`. Returns the
    /// task with its bumped version, or `Conflict` when the row moved on.
    fn save_task(&self, task: &Task) -> Result<Task, PersistenceError>;

    /// Priority ascending (absent last), then newest first.
    fn list_tasks(&self, owner_id: &str) -> Result<Vec<Task>, PersistenceError>;
}

/// Profile persistence collaborator.
pub trait ProfileStore: Send + Sync {
    fn load_profile(&self, owner_id: &str) -> Result<Profile, PersistenceError>;

    /// Create the profile or update its name and email. Points are untouched.
    fn upsert_profile(&self, profile: &Profile) -> Result<Profile, PersistenceError>;

    /// Atomically add `delta` points, creating the profile at zero first if
    /// needed, and return the updated row.
    fn increment_profile_points(
        &self,
        owner_id: &str,
        delta: u64,
    ) -> Result<Profile, PersistenceError>;

    fn list_profiles(&self) -> Result<Vec<Profile>, PersistenceError>;
}

/// Everything the session controller needs from persistence.
pub trait Store: TaskStore + ProfileStore {}

impl<T: TaskStore + ProfileStore> Store for T {}
