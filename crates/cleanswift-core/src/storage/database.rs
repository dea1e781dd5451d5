//! SQLite-backed task and profile storage.
//!
//! Provides persistent storage for:
//! - Tasks, with an optimistic `version` check on every save
//! - Profiles, whose points only change through an atomic increment

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::{data_dir, ProfileStore, TaskStore};
use crate::error::{DatabaseError, PersistenceError};
use crate::profile::Profile;
use crate::task::{Priority, Task, TaskStatus};

const TASK_COLUMNS: &str = "id, owner_id, title, description, priority, status, \
     estimated_minutes, actual_minutes, image_ref, created_at, completed_at, version";

/// SQLite database for tasks and profiles.
///
/// The connection sits behind a mutex so one handle can be shared between
/// the session controller and its spawned tasks.
pub struct Database {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

impl Database {
    /// Open the database at `<data dir>/cleanswift.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, DatabaseError> {
        let dir = data_dir().map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        Self::open_at(&dir.join("cleanswift.db"))
    }

    pub fn open_at(path: &Path) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::with_connection(conn)
    }

    /// Open an in-memory database (for tests and dry runs).
    pub fn open_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, DatabaseError> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DatabaseError> {
        self.conn.lock().map_err(|_| DatabaseError::Locked)
    }

    fn migrate(&self) -> Result<(), DatabaseError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS tasks (
                    id                TEXT PRIMARY KEY,
                    owner_id          TEXT NOT NULL,
                    title             TEXT NOT NULL,
                    description       TEXT,
                    priority          INTEGER,
                    status            TEXT NOT NULL DEFAULT 'pending',
                    estimated_minutes INTEGER,
                    actual_minutes    INTEGER,
                    image_ref         TEXT,
                    created_at        TEXT NOT NULL,
                    completed_at      TEXT,
                    version           INTEGER NOT NULL DEFAULT 0
                );

                CREATE TABLE IF NOT EXISTS profiles (
                    owner_id     TEXT PRIMARY KEY,
                    display_name TEXT,
                    email        TEXT,
                    points       INTEGER NOT NULL DEFAULT 0 CHECK (points >= 0)
                );

                CREATE INDEX IF NOT EXISTS idx_tasks_owner ON tasks(owner_id);
                CREATE INDEX IF NOT EXISTS idx_profiles_points ON profiles(points DESC);",
            )
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))
    }
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| DatabaseError::Corrupt(format!("bad timestamp '{raw}': {e}")))
}

/// Columns as stored, before domain decoding.
struct TaskRow {
    id: String,
    owner_id: String,
    title: String,
    description: Option<String>,
    priority: Option<u8>,
    status: String,
    estimated_minutes: Option<u32>,
    actual_minutes: Option<u32>,
    image_ref: Option<String>,
    created_at: String,
    completed_at: Option<String>,
    version: u32,
}

impl TaskRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            priority: row.get(4)?,
            status: row.get(5)?,
            estimated_minutes: row.get(6)?,
            actual_minutes: row.get(7)?,
            image_ref: row.get(8)?,
            created_at: row.get(9)?,
            completed_at: row.get(10)?,
            version: row.get(11)?,
        })
    }

    fn into_task(self) -> Result<Task, DatabaseError> {
        let corrupt = |e: crate::error::ValidationError| {
            DatabaseError::Corrupt(format!("task {}: {e}", self.id))
        };
        let status: TaskStatus = self.status.parse().map_err(corrupt)?;
        let priority = self
            .priority
            .map(Priority::try_from)
            .transpose()
            .map_err(corrupt)?;
        let created_at = parse_timestamp(&self.created_at)?;
        let completed_at = self
            .completed_at
            .as_deref()
            .map(parse_timestamp)
            .transpose()?;
        Ok(Task {
            id: self.id,
            owner_id: self.owner_id,
            title: self.title,
            description: self.description,
            priority,
            status,
            estimated_minutes: self.estimated_minutes,
            actual_minutes: self.actual_minutes,
            image_ref: self.image_ref,
            created_at,
            completed_at,
            version: self.version,
        })
    }
}

fn read_profile(row: &Row<'_>) -> rusqlite::Result<Profile> {
    Ok(Profile {
        owner_id: row.get(0)?,
        display_name: row.get(1)?,
        email: row.get(2)?,
        points: row.get(3)?,
    })
}

impl TaskStore for Database {
    fn create_task(&self, task: &Task) -> Result<Task, PersistenceError> {
        task.validate()?;
        let mut stored = task.clone();
        stored.version = 0;
        self.conn()?.execute(
            &format!("INSERT INTO tasks ({TASK_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"),
            params![
                stored.id,
                stored.owner_id,
                stored.title,
                stored.description,
                stored.priority.map(Priority::rank),
                stored.status.as_str(),
                stored.estimated_minutes,
                stored.actual_minutes,
                stored.image_ref,
                timestamp(&stored.created_at),
                stored.completed_at.as_ref().map(timestamp),
                stored.version,
            ],
        )?;
        tracing::debug!(task_id = %stored.id, "task created");
        Ok(stored)
    }

    fn load_task(&self, id: &str) -> Result<Task, PersistenceError> {
        let row = self
            .conn()?
            .query_row(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
                params![id],
                TaskRow::read,
            )
            .optional()?;
        match row {
            Some(row) => Ok(row.into_task()?),
            None => Err(PersistenceError::NotFound {
                kind: "task",
                id: id.to_string(),
            }),
        }
    }

    fn save_task(&self, task: &Task) -> Result<Task, PersistenceError> {
        task.validate()?;
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE tasks SET
                title = ?3, description = ?4, priority = ?5, status = ?6,
                estimated_minutes = ?7, actual_minutes = ?8, image_ref = ?9,
                completed_at = ?10, version = version + 1
             WHERE id = ?1 AND version = ?2",
            params![
                task.id,
                task.version,
                task.title,
                task.description,
                task.priority.map(Priority::rank),
                task.status.as_str(),
                task.estimated_minutes,
                task.actual_minutes,
                task.image_ref,
                task.completed_at.as_ref().map(timestamp),
            ],
        )?;
        if changed == 0 {
            let exists = conn
                .query_row("SELECT 1 FROM tasks WHERE id = ?1", params![task.id], |_| Ok(()))
                .optional()?
                .is_some();
            return Err(if exists {
                PersistenceError::Conflict {
                    id: task.id.clone(),
                    expected_version: task.version,
                }
            } else {
                PersistenceError::NotFound {
                    kind: "task",
                    id: task.id.clone(),
                }
            });
        }
        let mut saved = task.clone();
        saved.version += 1;
        Ok(saved)
    }

    fn list_tasks(&self, owner_id: &str) -> Result<Vec<Task>, PersistenceError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE owner_id = ?1
             ORDER BY priority IS NULL, priority ASC, created_at DESC"
        ))?;
        let rows = stmt.query_map(params![owner_id], TaskRow::read)?;
        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(row?.into_task()?);
        }
        Ok(tasks)
    }
}

impl ProfileStore for Database {
    fn load_profile(&self, owner_id: &str) -> Result<Profile, PersistenceError> {
        self.conn()?
            .query_row(
                "SELECT owner_id, display_name, email, points FROM profiles WHERE owner_id = ?1",
                params![owner_id],
                read_profile,
            )
            .optional()?
            .ok_or_else(|| PersistenceError::NotFound {
                kind: "profile",
                id: owner_id.to_string(),
            })
    }

    fn upsert_profile(&self, profile: &Profile) -> Result<Profile, PersistenceError> {
        let profile = self.conn()?.query_row(
            "INSERT INTO profiles (owner_id, display_name, email) VALUES (?1, ?2, ?3)
             ON CONFLICT(owner_id) DO UPDATE SET
                display_name = excluded.display_name,
                email = excluded.email
             RETURNING owner_id, display_name, email, points",
            params![profile.owner_id, profile.display_name, profile.email],
            read_profile,
        )?;
        Ok(profile)
    }

    fn increment_profile_points(
        &self,
        owner_id: &str,
        delta: u64,
    ) -> Result<Profile, PersistenceError> {
        let profile = self.conn()?.query_row(
            "INSERT INTO profiles (owner_id, points) VALUES (?1, ?2)
             ON CONFLICT(owner_id) DO UPDATE SET points = points + excluded.points
             RETURNING owner_id, display_name, email, points",
            params![owner_id, delta],
            read_profile,
        )?;
        tracing::info!(owner_id, delta, total = profile.points, "points incremented");
        Ok(profile)
    }

    fn list_profiles(&self) -> Result<Vec<Profile>, PersistenceError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT owner_id, display_name, email, points FROM profiles
             ORDER BY points DESC, owner_id ASC",
        )?;
        let profiles = stmt
            .query_map([], read_profile)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(profiles)
    }
}
