//! Task management commands for CLI.

use clap::Subcommand;
use cleanswift_core::{NewTask, Priority, Task, TaskLifecycle, TaskStore};

use super::{print_table, workspace, CliResult};

#[derive(Subcommand)]
pub enum TaskAction {
    /// Create a new task, typed in or from a room photo
    Create {
        /// Task title (optional with --image; taken from the file name)
        title: Option<String>,
        /// Task description
        #[arg(long)]
        description: Option<String>,
        /// Priority: 1 (high), 2 (medium) or 3 (low)
        #[arg(long)]
        priority: Option<u8>,
        /// Estimated minutes
        #[arg(long)]
        estimate: Option<u32>,
        /// Photo of the room: a path, an http(s) URL or a data: URL. Photo
        /// tasks default to high priority and a 30 minute estimate
        #[arg(long)]
        image: Option<String>,
    },
    /// List your tasks
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Get task details
    Get {
        /// Task ID
        id: String,
    },
    /// Move a pending task to in progress
    Start {
        /// Task ID
        id: String,
    },
}

pub fn run(action: TaskAction) -> CliResult {
    let (config, db) = workspace()?;
    let owner_id = config.user.owner_id.as_str();

    match action {
        TaskAction::Create {
            title,
            description,
            priority,
            estimate,
            image,
        } => {
            let mut draft = match (title, image) {
                (title, Some(image)) => {
                    let draft = NewTask::from_photo(owner_id, image);
                    match title {
                        Some(title) => draft.title(title),
                        None => draft,
                    }
                }
                (Some(title), None) => NewTask::new(owner_id, title),
                (None, None) => return Err("a title or --image is required".into()),
            };
            if let Some(description) = description {
                draft = draft.description(description);
            }
            if let Some(priority) = priority {
                draft = draft.priority(Priority::try_from(priority)?);
            }
            if let Some(minutes) = estimate {
                draft = draft.estimated_minutes(minutes);
            }
            let task = db.create_task(&draft.build()?)?;
            println!("Task created: {}", task.id);
            println!("{}", serde_json::to_string_pretty(&task)?);
        }
        TaskAction::List { json } => {
            let tasks = db.list_tasks(owner_id)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&tasks)?);
            } else if tasks.is_empty() {
                println!("No tasks yet. Create one with `cleanswift task create <title>`.");
            } else {
                let rows: Vec<Vec<String>> = tasks.iter().map(row).collect();
                print_table(&["ID", "STATUS", "PRIORITY", "EST", "TITLE"], &rows);
            }
        }
        TaskAction::Get { id } => {
            let task = db.load_task(&id)?;
            println!("{}", serde_json::to_string_pretty(&task)?);
        }
        TaskAction::Start { id } => {
            let mut lifecycle = TaskLifecycle::new(db.load_task(&id)?);
            lifecycle.start()?;
            let task = db.save_task(lifecycle.task())?;
            println!("Task started: {}", task.id);
        }
    }
    Ok(())
}

fn row(task: &Task) -> Vec<String> {
    vec![
        task.id.clone(),
        task.status.to_string(),
        task.priority
            .map(|p| p.label().to_string())
            .unwrap_or_else(|| "-".into()),
        task.estimated_minutes
            .map(|m| format!("{m}m"))
            .unwrap_or_else(|| "-".into()),
        task.title.clone(),
    ]
}
