//! Core error types for cleanswift-core.
//!
//! Every failure the engine can report is a discriminated value; nothing in
//! this crate treats an error as fatal to the process.

use std::path::PathBuf;
use thiserror::Error;

use crate::task::gate::UnmetCondition;
use crate::task::{LifecycleAction, TaskStatus};

/// Core error type for cleanswift-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Focus session errors
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Persistence collaborator errors
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// AI collaborator errors
    #[error("AI service error: {0}")]
    Ai(#[from] AiError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// A stored row could not be decoded
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown dot-path key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Missing required configuration key
    #[error("Missing required configuration key: {0}")]
    MissingKey(String),

    /// Data directory could not be prepared
    #[error("Data directory unavailable: {0}")]
    DataDir(#[from] std::io::Error),
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Task title is empty after trimming
    #[error("Task title must not be empty")]
    EmptyTitle,

    /// Completion fields disagree with the status
    #[error("Task {task_id} is {status} but completion fields are inconsistent")]
    InconsistentCompletion { task_id: String, status: TaskStatus },

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Errors reported by the persistence collaborator.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// The stored row moved on since it was loaded.
    #[error("Task {id} was modified concurrently (expected version {expected_version})")]
    Conflict { id: String, expected_version: u32 },

    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Errors reported by the AI collaborators.
#[derive(Error, Debug)]
pub enum AiError {
    /// Transport-level failure (connect, timeout, body read)
    #[error("Request failed: {0}")]
    Request(String),

    /// Non-success HTTP status
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Response did not have the expected envelope
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Model answered but without a usable structured result
    #[error("No structured result in model output: {0}")]
    NoStructuredResult(String),

    /// Image reference could not be turned into bytes
    #[error("Image unavailable: {0}")]
    Image(String),

    /// API key environment variable is not set
    #[error("API key not configured (set {0})")]
    MissingApiKey(String),
}

/// Errors surfaced by the task lifecycle and the session controller.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Completion attempted before the gate holds. Expected and user-correctable.
    #[error("Completion gate not satisfied: {}", describe_unmet(.unmet))]
    GateNotSatisfied { unmet: Vec<UnmetCondition> },

    /// Lifecycle action not allowed from the current status
    #[error("Cannot {action} a task that is {from}")]
    InvalidTransition {
        from: TaskStatus,
        action: LifecycleAction,
    },

    /// Checklist toggle with no checklist or an out-of-range index
    #[error("{}", describe_step_index(.index, .len))]
    InvalidStepIndex { index: usize, len: Option<usize> },

    /// Step toggle on a session whose checklist could not be produced
    #[error("Checklist unavailable: {0}")]
    ChecklistUnavailable(String),

    /// Focus sessions are only opened on tasks that are in progress
    #[error("Task {task_id} is {status}; only in-progress tasks can be focused on")]
    NotInProgress { task_id: String, status: TaskStatus },

    #[error("No focus session is open")]
    NoActiveSession,

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Ai(#[from] AiError),
}

impl SessionError {
    /// True for outcomes the user can fix by continuing to work.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SessionError::GateNotSatisfied { .. }
                | SessionError::InvalidStepIndex { .. }
                | SessionError::ChecklistUnavailable(_)
                | SessionError::Persistence(_)
                | SessionError::Ai(_)
        )
    }
}

fn describe_unmet(unmet: &[UnmetCondition]) -> String {
    unmet
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn describe_step_index(index: &usize, len: &Option<usize>) -> String {
    match len {
        Some(len) => format!("Step index {index} out of bounds for checklist (length: {len})"),
        None => format!("Step index {index} given but this session has no checklist"),
    }
}

// Helper implementations for converting from other error types

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg) => {
                if e.code == rusqlite::ErrorCode::DatabaseLocked
                    || e.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for PersistenceError {
    fn from(err: rusqlite::Error) -> Self {
        PersistenceError::Database(err.into())
    }
}

impl From<reqwest::Error> for AiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AiError::Request(format!("timeout: {err}"))
        } else if err.is_decode() {
            AiError::MalformedResponse(err.to_string())
        } else {
            AiError::Request(err.to_string())
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
