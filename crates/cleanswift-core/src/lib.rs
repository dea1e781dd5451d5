//! # CleanSwift Core Library
//!
//! Business logic for CleanSwift: capture cleaning chores, work them inside
//! timed focus sessions and earn points that feed a leaderboard. The CLI
//! binary is a thin front end over this crate.
//!
//! ## Architecture
//!
//! - **Task lifecycle**: `pending -> in_progress -> completed`, with a
//!   completion gate that requires real work (and a fully ticked checklist
//!   when one exists)
//! - **Session clock**: a pausable elapsed-time accumulator driven by the
//!   caller or by the controller's one-second ticker
//! - **Checklist**: AI vision output normalized into ordered steps
//! - **Points**: awarded on completion; level and badge tier are derived
//! - **Storage**: SQLite tasks and profiles, TOML configuration
//!
//! ## Key Components
//!
//! - [`SessionController`]: owns the live focus session
//! - [`TaskLifecycle`]: task state machine with transition history
//! - [`Database`]: task and profile persistence
//! - [`Config`]: application configuration management
//! - [`GroqClient`]: vision and chat collaborators over HTTP

pub mod ai;
pub mod checklist;
pub mod error;
pub mod events;
pub mod leaderboard;
pub mod points;
pub mod profile;
pub mod session;
pub mod stats;
pub mod storage;
pub mod task;
pub mod timer;

pub use ai::{ChatAssistant, ChatMessage, ChatRole, GroqClient, VisionAnalyzer};
pub use checklist::{Checklist, ChecklistOutcome, ChecklistState, ChecklistStep, VisionAnalysis};
pub use error::{
    AiError, ConfigError, CoreError, DatabaseError, PersistenceError, SessionError,
    ValidationError,
};
pub use events::Event;
pub use leaderboard::{Leaderboard, LeaderboardEntry};
pub use points::{BadgeTier, PointsAward};
pub use profile::Profile;
pub use session::{CompletionOutcome, SessionController, SessionSettings, SessionSnapshot};
pub use stats::{TaskStats, TimeRange};
pub use storage::{Config, Database, ProfileStore, Store, TaskStore};
pub use task::gate::{CompletionGate, GateStatus, SessionEvidence, UnmetCondition};
pub use task::{LifecycleAction, NewTask, Priority, Task, TaskLifecycle, TaskStatus};
pub use timer::{ManualTime, MonotonicTime, SessionClock, TimeSource};

/// Load the configuration and open the database from the data directory.
///
/// # Errors
/// Returns an error if the configuration cannot be loaded or the database
/// cannot be opened.
pub fn open_workspace() -> error::Result<(Config, Database)> {
    let config = Config::load()?;
    config.validate()?;
    let db = Database::open()?;
    Ok((config, db))
}
